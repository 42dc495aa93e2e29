use crate::config::InputConfig;
use crate::error::PipelineError;
use crate::processing::aggregate_counties;
use crate::render::{self, StyledMap};
use crate::stats::DashboardStats;
use crate::types::{CountyArea, CountyCounts, Record, StyledCounty};
use csv::{ReaderBuilder, Trim};
use geo::MultiPolygon;
use geojson::{Feature, FeatureCollection, GeoJson};
use std::path::PathBuf;
use tracing::{info, warn};

pub const EV_TYPE_COLUMN: &str = "Electric Vehicle Type";
pub const CAFV_COLUMN: &str = "Clean Alternative Fuel Vehicle (CAFV) Eligibility";
pub const RANGE_COLUMN: &str = "Electric Range";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Path(PathBuf),
    Url(String),
}

impl From<&str> for Source {
    fn from(value: &str) -> Self {
        let value = value.trim();
        if value.starts_with("http://") || value.starts_with("https://") {
            Source::Url(value.to_string())
        } else {
            Source::Path(PathBuf::from(value))
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub counts: CountyCounts,
    pub map: FeatureCollection,
    pub counties: Vec<StyledCounty>,
    pub areas: Vec<CountyArea>,
    pub stats: DashboardStats,
}

pub async fn fetch_text(source: &Source) -> Result<String, PipelineError> {
    match source {
        Source::Path(path) => {
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| PipelineError::Io {
                    path: path.clone(),
                    source,
                })
        }
        Source::Url(url) => {
            let fetch_err = |source: reqwest::Error| PipelineError::Fetch {
                url: url.clone(),
                source,
            };
            let response = reqwest::get(url.as_str()).await.map_err(fetch_err)?;
            let status = response.status();
            if !status.is_success() {
                return Err(PipelineError::HttpStatus {
                    url: url.clone(),
                    status: status.as_u16(),
                });
            }
            response.text().await.map_err(fetch_err)
        }
    }
}

pub fn parse_records(text: &str, county_column: &str) -> Result<Vec<Record>, PipelineError> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        return Err(PipelineError::EmptyDataset);
    }

    let column = |name: &str| headers.iter().position(|h| h == name);
    let county_idx = column(county_column)
        .ok_or_else(|| PipelineError::MissingColumn(county_column.to_string()))?;
    let ev_type_idx = column(EV_TYPE_COLUMN);
    let cafv_idx = column(CAFV_COLUMN);
    let range_idx = column(RANGE_COLUMN);

    let mut records = Vec::new();
    for result in rdr.records() {
        let row = result?;
        let field = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .unwrap_or("")
                .to_string()
        };
        records.push(Record {
            county: field(Some(county_idx)),
            ev_type: field(ev_type_idx),
            cafv_eligibility: field(cafv_idx),
            electric_range: field(range_idx),
        });
    }

    Ok(records)
}

pub fn parse_boundaries(text: &str) -> Result<FeatureCollection, PipelineError> {
    match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => Ok(fc),
        _ => Err(PipelineError::NotFeatureCollection),
    }
}

// The boundary file is only requested once the CSV has aggregated.
pub async fn load_dashboard(input: &InputConfig) -> Result<Dashboard, PipelineError> {
    let csv_source = Source::from(input.data_csv.as_str());
    info!("Loading registrations from {:?}", csv_source);
    let csv_text = fetch_text(&csv_source).await?;
    let records = parse_records(&csv_text, &input.county_column)?;
    info!("Parsed {} registration rows", records.len());

    let counts = aggregate_counties(&records)?;
    let stats = DashboardStats::from_records(&records);

    let boundary_source = Source::from(input.boundaries.as_str());
    info!("Loading boundaries from {:?}", boundary_source);
    let boundary_text = fetch_text(&boundary_source).await?;
    let collection = parse_boundaries(&boundary_text)?;

    let StyledMap {
        collection: map,
        counties,
    } = render::style_collection(collection, &counts, &input.boundary_name_property);

    let areas: Vec<CountyArea> = map
        .features
        .iter()
        .zip(&counties)
        .filter_map(|(feature, county)| {
            feature_geometry(feature).map(|geometry| CountyArea {
                county: county.clone(),
                geometry,
            })
        })
        .collect();
    info!("Indexed {} county polygons", areas.len());

    Ok(Dashboard {
        counts,
        map,
        counties,
        areas,
        stats,
    })
}

fn feature_geometry(feature: &Feature) -> Option<MultiPolygon<f64>> {
    let geometry = feature.geometry.as_ref()?;
    match geo::Geometry::<f64>::try_from(geometry.value.clone()) {
        Ok(geo::Geometry::MultiPolygon(mp)) => Some(mp),
        Ok(geo::Geometry::Polygon(p)) => Some(MultiPolygon::new(vec![p])),
        Ok(_) => None, // Points and lines have no area to query
        Err(e) => {
            warn!("Skipping unconvertible boundary geometry: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::normalize_county;
    use std::fs;

    const CSV: &str = "\
County ,Electric Vehicle Type, Electric Range
King,Battery Electric Vehicle (BEV),215
 king ,Plug-in Hybrid Electric Vehicle (PHEV),25

,Battery Electric Vehicle (BEV),0
Yakima County,Battery Electric Vehicle (BEV)
";

    const GEOJSON: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "JURISDICT_NM": "King County" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-122.5, 47.0], [-121.0, 47.0], [-121.0, 48.0], [-122.5, 48.0], [-122.5, 47.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "JURISDICT_NM": "Yakima County" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-121.0, 46.0], [-120.0, 46.0], [-120.0, 47.0], [-121.0, 47.0], [-121.0, 46.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "JURISDICT_NM": "Lincoln County" },
                "geometry": null
            }
        ]
    }"#;

    fn input(dir: &std::path::Path, csv: &str, boundaries: Option<&str>) -> InputConfig {
        let csv_path = dir.join("Data.csv");
        fs::write(&csv_path, csv).unwrap();
        let geo_path = dir.join("counties.geojson");
        if let Some(body) = boundaries {
            fs::write(&geo_path, body).unwrap();
        }
        InputConfig {
            data_csv: csv_path.to_string_lossy().into_owned(),
            boundaries: geo_path.to_string_lossy().into_owned(),
            county_column: "County".into(),
            boundary_name_property: "JURISDICT_NM".into(),
        }
    }

    #[test]
    fn source_detects_urls() {
        assert_eq!(
            Source::from("https://data.example.org/Data.csv"),
            Source::Url("https://data.example.org/Data.csv".into())
        );
        assert_eq!(Source::from("Data.csv"), Source::Path(PathBuf::from("Data.csv")));
    }

    #[test]
    fn parses_trimmed_headers_and_short_rows() {
        let records = parse_records(CSV, "County").unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(records[1].county, "king");
        assert_eq!(records[0].electric_range, "215");
        assert_eq!(records[3].electric_range, "");
        assert_eq!(records[3].cafv_eligibility, "");
    }

    #[test]
    fn blank_file_has_no_data() {
        assert!(matches!(parse_records("", "County"), Err(PipelineError::EmptyDataset)));
    }

    #[test]
    fn missing_county_column_is_an_error() {
        let err = parse_records("Make,Model\nTesla,Model 3\n", "County").unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn(c) if c == "County"));
    }

    #[test]
    fn boundaries_must_be_a_feature_collection() {
        let err = parse_boundaries(r#"{"type": "Point", "coordinates": [0.0, 0.0]}"#).unwrap_err();
        assert!(matches!(err, PipelineError::NotFeatureCollection));

        assert!(matches!(parse_boundaries("not json"), Err(PipelineError::GeoJson(_))));
    }

    #[tokio::test]
    async fn loads_and_joins_both_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let input = input(dir.path(), CSV, Some(GEOJSON));

        let dashboard = load_dashboard(&input).await.unwrap();

        assert_eq!(dashboard.counts.get(&normalize_county("King").unwrap()), 2);
        assert_eq!(dashboard.counts.get(&normalize_county("Yakima").unwrap()), 1);
        assert_eq!(dashboard.stats.total_vehicles, 4);
        assert_eq!(dashboard.map.features.len(), 3);
        assert_eq!(dashboard.counties.len(), 3);
        assert_eq!(dashboard.counties[2].popup, "Lincoln County: 0 EVs");
        // Lincoln has no geometry so it is not queryable.
        assert_eq!(dashboard.areas.len(), 2);
        assert_eq!(dashboard.areas[0].county.popup, "King County: 2 EVs");
    }

    #[tokio::test]
    async fn empty_csv_fails_before_boundaries_are_read() {
        let dir = tempfile::tempdir().unwrap();
        // No boundary file on disk: reaching it would surface an Io error.
        let input = input(dir.path(), "County,Electric Vehicle Type\n", None);

        let err = load_dashboard(&input).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDataset));
    }

    async fn serve_csv() -> std::net::SocketAddr {
        use axum::{routing::get, Router};

        let app = Router::new().route("/Data.csv", get(|| async { "County\nKing\n" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn fetches_csv_over_http() {
        let addr = serve_csv().await;

        let body = fetch_text(&Source::Url(format!("http://{addr}/Data.csv")))
            .await
            .unwrap();
        assert_eq!(body, "County\nKing\n");
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_code() {
        let addr = serve_csv().await;
        let url = format!("http://{addr}/missing.csv");

        let err = fetch_text(&Source::Url(url.clone())).await.unwrap_err();
        assert!(matches!(err, PipelineError::HttpStatus { status: 404, .. }));
        assert_eq!(err.to_string(), format!("Fetch of {url} failed: HTTP 404"));
    }

    #[tokio::test]
    async fn refused_connection_is_a_fetch_error() {
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let err = fetch_text(&Source::Url(format!("http://{addr}/Data.csv")))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { .. }));
        assert!(err.to_string().starts_with(&format!("Fetch of http://{addr}/Data.csv failed")));
    }

    #[tokio::test]
    async fn missing_file_surfaces_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = fetch_text(&Source::Path(dir.path().join("absent.csv")))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
        assert!(err.to_string().contains("absent.csv"));
    }
}
