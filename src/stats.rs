use crate::types::Record;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Number of counties shown in the "top counties" panel.
pub const TOP_COUNTIES: usize = 5;

/// Width of an electric-range histogram bucket, in miles.
pub const RANGE_BUCKET_MILES: u32 = 50;

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeBucket {
    pub lower: u32,
    pub upper: u32,
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_vehicles: u64,
    pub ev_type_breakdown: Vec<CategoryCount>,
    pub cafv_eligibility: Vec<CategoryCount>,
    pub county_breakdown: Vec<CategoryCount>,
    pub top_counties: Vec<CategoryCount>,
    pub range_distribution: Vec<RangeBucket>,
}

impl DashboardStats {
    pub fn from_records(records: &[Record]) -> Self {
        let county_breakdown = breakdown(records.iter().map(|r| r.county.as_str()));
        let top_counties = county_breakdown.iter().take(TOP_COUNTIES).cloned().collect();

        Self {
            total_vehicles: records.len() as u64,
            ev_type_breakdown: breakdown(records.iter().map(|r| r.ev_type.as_str())),
            cafv_eligibility: breakdown(records.iter().map(|r| r.cafv_eligibility.as_str())),
            county_breakdown,
            top_counties,
            range_distribution: range_distribution(records),
        }
    }
}

// Largest first, ties by label.
fn breakdown<'a>(values: impl Iterator<Item = &'a str>) -> Vec<CategoryCount> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for value in values {
        let label = match value.trim() {
            "" => UNKNOWN,
            v => v,
        };
        *counts.entry(label).or_insert(0) += 1;
    }

    let mut out: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(label, count)| CategoryCount {
            label: label.to_string(),
            count,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    out
}

fn range_distribution(records: &[Record]) -> Vec<RangeBucket> {
    let mut buckets: BTreeMap<u32, u64> = BTreeMap::new();
    for record in records {
        let range = parse_range(&record.electric_range);
        if range > 0 {
            let lower = range / RANGE_BUCKET_MILES * RANGE_BUCKET_MILES;
            *buckets.entry(lower).or_insert(0) += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(lower, count)| {
            let upper = lower.saturating_add(RANGE_BUCKET_MILES - 1);
            RangeBucket {
                lower,
                upper,
                label: format!("{lower}-{upper}"),
                count,
            }
        })
        .collect()
}

// Integer miles; fractional values truncate and anything unparseable is 0.
fn parse_range(raw: &str) -> u32 {
    let raw = raw.trim();
    raw.parse::<u32>()
        .ok()
        .or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v > 0.0)
                .map(|v| v as u32)
        })
        .unwrap_or(0)
}
