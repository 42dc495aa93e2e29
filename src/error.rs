use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort the pipeline. Any of these is shown as-is in place of
/// the map; nothing is rendered partially.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Fetch of {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Fetch of {url} failed: HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Column '{0}' not found in CSV header")]
    MissingColumn(String),

    #[error("GeoJSON parse error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Boundary file must be a GeoJSON FeatureCollection")]
    NotFeatureCollection,

    #[error("No data parsed from CSV")]
    EmptyDataset,
}
