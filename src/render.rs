use crate::processing::normalize_county;
use crate::stats::DashboardStats;
use crate::types::{CountyCounts, FeatureStyle, Legend, LegendEntry, StyledCounty};
use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info};

// Descending thresholds; a count belongs to the first bucket it strictly exceeds.
const THRESHOLDS: [(u64, &str); 4] = [
    (500, "#084594"),
    (300, "#2171b5"),
    (100, "#6baed6"),
    (50, "#bdd7e7"),
];

/// Color for counts at or below the lowest threshold.
pub const BASE_COLOR: &str = "#eff3ff";

pub const LEGEND_TITLE: &str = "EV Count per County";

pub fn color_for(count: u64) -> &'static str {
    THRESHOLDS
        .iter()
        .find(|(threshold, _)| count > *threshold)
        .map(|(_, color)| *color)
        .unwrap_or(BASE_COLOR)
}

pub fn legend() -> Legend {
    let mut bounds: Vec<u64> = THRESHOLDS.iter().map(|(t, _)| *t).collect();
    bounds.reverse();

    let mut entries = Vec::with_capacity(bounds.len() + 1);
    let mut min = 0;
    for upper in bounds {
        entries.push(LegendEntry {
            min,
            max: Some(upper),
            color: color_for(upper),
            label: format!("{min}\u{2013}{upper}"),
        });
        min = upper + 1;
    }
    entries.push(LegendEntry {
        min,
        max: None,
        color: color_for(min),
        label: format!("{min}+"),
    });

    Legend {
        title: LEGEND_TITLE,
        entries,
    }
}

pub fn feature_style(fill_color: &'static str) -> FeatureStyle {
    FeatureStyle {
        fill_color,
        weight: 1.0,
        opacity: 1.0,
        color: "white",
        fill_opacity: 0.7,
    }
}

pub fn style_feature(feature: &Feature, counts: &CountyCounts, name_property: &str) -> StyledCounty {
    let name = feature
        .property(name_property)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string);
    let key = name.as_deref().and_then(normalize_county);
    let (count, matched) = match &key {
        Some(k) => (counts.get(k), counts.contains(k)),
        None => (0, false),
    };
    let color = color_for(count);
    let popup = format!("{}: {} EVs", name.as_deref().unwrap_or("Unknown"), count);

    StyledCounty {
        name,
        key,
        count,
        matched,
        color,
        style: feature_style(color),
        popup,
    }
}

fn style_value(style: &FeatureStyle) -> JsonValue {
    json!({
        "fillColor": style.fill_color,
        "weight": style.weight,
        "opacity": style.opacity,
        "color": style.color,
        "fillOpacity": style.fill_opacity,
    })
}

pub struct StyledMap {
    pub collection: FeatureCollection,
    pub counties: Vec<StyledCounty>,
}

// Writes ev_count, popup and style into each feature's properties.
pub fn style_collection(
    collection: FeatureCollection,
    counts: &CountyCounts,
    name_property: &str,
) -> StyledMap {
    let FeatureCollection {
        bbox,
        features,
        foreign_members,
    } = collection;

    let (features, counties): (Vec<Feature>, Vec<StyledCounty>) = features
        .into_par_iter()
        .map(|mut feature| {
            let county = style_feature(&feature, counts, name_property);
            debug!(
                "Boundary {:?} -> key {:?}, count {}",
                county.name, county.key, county.count
            );
            feature.set_property("ev_count", county.count);
            feature.set_property("popup", county.popup.clone());
            feature.set_property("style", style_value(&county.style));
            (feature, county)
        })
        .unzip();

    let misses = counties.iter().filter(|c| !c.matched).count();
    info!(
        "Styled {} boundary features ({} without a matching county)",
        counties.len(),
        misses
    );

    StyledMap {
        collection: FeatureCollection {
            bbox,
            features,
            foreign_members,
        },
        counties,
    }
}

pub fn write_artifacts(
    dir: &Path,
    map: &FeatureCollection,
    counties: &[StyledCounty],
    stats: &DashboardStats,
) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create output dir: {:?}", dir))?;

    write_json(&dir.join("map.geojson"), map)?;
    write_json(&dir.join("legend.json"), &legend())?;
    write_json(&dir.join("stats.json"), stats)?;
    write_json(&dir.join("counties.json"), counties)?;

    info!("Wrote map, legend, stats and counties to {:?}", dir);
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}
