use crate::error::PipelineError;
use crate::types::{CountyCounts, CountyKey, Record};
use std::collections::BTreeMap;
use tracing::info;

pub const COUNTY_SUFFIX: &str = " county";

/// Trim, lowercase and append " county" when absent. Shared by CSV rows and
/// boundary names.
pub fn normalize_county(raw: &str) -> Option<CountyKey> {
    let key = raw.trim().to_lowercase();
    if key.is_empty() {
        return None;
    }
    if key.ends_with(COUNTY_SUFFIX) {
        Some(CountyKey(key))
    } else {
        Some(CountyKey(format!("{key}{COUNTY_SUFFIX}")))
    }
}

pub fn aggregate_counties(records: &[Record]) -> Result<CountyCounts, PipelineError> {
    if records.is_empty() {
        return Err(PipelineError::EmptyDataset);
    }

    let mut counts: BTreeMap<CountyKey, u64> = BTreeMap::new();
    let mut skipped = 0usize;
    for record in records {
        match normalize_county(&record.county) {
            Some(key) => *counts.entry(key).or_insert(0) += 1,
            None => skipped += 1,
        }
    }

    info!(
        "Aggregated {} rows into {} counties ({} rows without a county)",
        records.len(),
        counts.len(),
        skipped
    );

    Ok(CountyCounts(counts))
}
