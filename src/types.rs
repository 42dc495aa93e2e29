use geo::MultiPolygon;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Normalized county name joining CSV rows to boundary polygons. Built only
/// by `processing::normalize_county`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CountyKey(pub(crate) String);

impl CountyKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub county: String,
    pub ev_type: String,
    pub cafv_eligibility: String,
    pub electric_range: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CountyCounts(pub(crate) BTreeMap<CountyKey, u64>);

impl CountyCounts {
    // Zero on a join miss.
    pub fn get(&self, key: &CountyKey) -> u64 {
        self.0.get(key).copied().unwrap_or(0)
    }

    pub fn contains(&self, key: &CountyKey) -> bool {
        self.0.contains_key(key)
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CountyKey, u64)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureStyle {
    pub fill_color: &'static str,
    pub weight: f64,
    pub opacity: f64,
    pub color: &'static str,
    pub fill_opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyledCounty {
    pub name: Option<String>,
    pub key: Option<CountyKey>,
    pub count: u64,
    pub matched: bool,
    pub color: &'static str,
    pub style: FeatureStyle,
    pub popup: String,
}

#[derive(Debug, Clone)]
pub struct CountyArea {
    pub county: StyledCounty,
    pub geometry: MultiPolygon<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
    pub min: u64,
    pub max: Option<u64>,
    pub color: &'static str,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Legend {
    pub title: &'static str,
    pub entries: Vec<LegendEntry>,
}
