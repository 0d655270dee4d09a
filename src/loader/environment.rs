//! Environment time-series loading.
//!
//! Each group owns one CSV file named `<groupId>_환경데이터.csv` (in
//! whichever Unicode encoding the collecting machine wrote). Rows are
//! parsed into [`EnvironmentRecord`]s tagged with the group id and its
//! target EC. A group whose file is missing or malformed is skipped
//! with a warning; it never blocks the other groups.

use crate::error::PipelineError;
use crate::loader::cache::SourceCache;
use crate::models::{
    EnvironmentRecord, GroupSeries, LoadOutcome, TreatmentGroup, TreatmentRegistry, Warning,
};
use crate::resolver::{self, canonical_key};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Required columns of an environment table, by canonical header name.
const TIME_COLUMN: &str = "time";
const REQUIRED_COLUMNS: [&str; 5] = [TIME_COLUMN, "temperature", "humidity", "ph", "ec"];

/// Timestamp layouts observed across the collecting loggers.
const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Loader for per-group environment CSV files.
pub struct EnvironmentLoader {
    file_suffix: String,
    cache: SourceCache<Vec<EnvironmentRecord>>,
}

impl EnvironmentLoader {
    /// `file_suffix` is appended to a group id to form the logical file
    /// name, e.g. `_환경데이터.csv`.
    pub fn new(file_suffix: impl Into<String>) -> Self {
        Self {
            file_suffix: file_suffix.into(),
            cache: SourceCache::new(),
        }
    }

    /// The configured filename suffix.
    pub fn file_suffix(&self) -> &str {
        &self.file_suffix
    }

    /// Load the environment series of every registered group found in
    /// `dir`. Groups whose source is missing or malformed are omitted
    /// and recorded in the outcome's warnings.
    pub fn load(
        &mut self,
        dir: &Path,
        registry: &TreatmentRegistry,
    ) -> Result<LoadOutcome<EnvironmentRecord>, PipelineError> {
        let mut outcome = LoadOutcome::empty();

        for group in registry.iter() {
            let logical_name = format!("{}{}", group.id, self.file_suffix);

            let resolved = match resolver::resolve(dir, &logical_name)? {
                Some(resolved) => resolved,
                None => {
                    warn!("no environment file for group '{}'", group.id);
                    outcome.warnings.push(Warning::SourceNotFound {
                        group_id: group.id.clone(),
                    });
                    continue;
                }
            };

            for duplicate in &resolved.duplicates {
                outcome.warnings.push(Warning::AmbiguousSource {
                    logical_name: logical_name.clone(),
                    chosen: resolved.file_name.clone(),
                });
                debug!("ignored duplicate environment file '{}'", duplicate);
            }

            let parsed = self
                .cache
                .get_or_insert_with(&resolved.path, || parse_file(&resolved, group));

            match parsed {
                Ok(records) => {
                    debug!("loaded {} environment rows for '{}'", records.len(), group.id);
                    outcome.groups.push(GroupSeries {
                        group_id: group.id.clone(),
                        records,
                    });
                }
                Err(e) => {
                    warn!("skipping environment data for '{}': {}", group.id, e);
                    outcome.warnings.push(Warning::ParseFailure {
                        group_id: group.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }
}

fn parse_file(
    resolved: &crate::resolver::ResolvedFile,
    group: &TreatmentGroup,
) -> Result<Vec<EnvironmentRecord>, PipelineError> {
    let mut reader = csv::Reader::from_path(&resolved.path)
        .map_err(|e| PipelineError::Csv(resolved.file_name.clone(), e))?;

    let headers = reader
        .headers()
        .map_err(|e| PipelineError::Csv(resolved.file_name.clone(), e))?
        .clone();
    let columns = bind_columns(&headers, &resolved.file_name)?;

    let mut records = Vec::new();

    for (row_index, result) in reader.records().enumerate() {
        let row = result.map_err(|e| PipelineError::Csv(resolved.file_name.clone(), e))?;

        records.push(EnvironmentRecord {
            group_id: group.id.clone(),
            timestamp: parse_timestamp(field(&row, columns[TIME_COLUMN])),
            temperature: parse_float(&row, &columns, "temperature", row_index, resolved)?,
            humidity: parse_float(&row, &columns, "humidity", row_index, resolved)?,
            ph: parse_float(&row, &columns, "ph", row_index, resolved)?,
            measured_ec: parse_float(&row, &columns, "ec", row_index, resolved)?,
            target_ec: group.target_ec,
        });
    }

    Ok(records)
}

/// Bind required column names to their positions in the header row.
///
/// Headers are compared by canonical key, lowercased, so stray spaces
/// or alternate Unicode encodings in the header do not break binding.
fn bind_columns(
    headers: &csv::StringRecord,
    source_name: &str,
) -> Result<HashMap<&'static str, usize>, PipelineError> {
    let mut columns = HashMap::new();

    for (position, header) in headers.iter().enumerate() {
        let key = canonical_key(header).to_lowercase();
        for required in REQUIRED_COLUMNS {
            if key == required && !columns.contains_key(required) {
                columns.insert(required, position);
            }
        }
    }

    for required in REQUIRED_COLUMNS {
        if !columns.contains_key(required) {
            return Err(PipelineError::MissingColumn {
                source_name: source_name.to_string(),
                column: required.to_string(),
            });
        }
    }

    Ok(columns)
}

fn field<'a>(row: &'a csv::StringRecord, position: usize) -> &'a str {
    row.get(position).unwrap_or("").trim()
}

fn parse_float(
    row: &csv::StringRecord,
    columns: &HashMap<&'static str, usize>,
    column: &'static str,
    row_index: usize,
    resolved: &crate::resolver::ResolvedFile,
) -> Result<f64, PipelineError> {
    let raw = field(row, columns[column]);
    raw.parse::<f64>().map_err(|_| PipelineError::Malformed {
        source_name: resolved.file_name.clone(),
        detail: format!("row {}: '{}' is not a number in column '{}'", row_index + 2, raw, column),
    })
}

/// Coerce a raw timestamp to a temporal value. Unparsable timestamps
/// become `None` rather than failing the group.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if raw.is_empty() {
        return None;
    }

    for format in TIMESTAMP_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed);
        }
    }

    // Date-only sources map to midnight.
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
