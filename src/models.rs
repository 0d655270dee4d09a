//! Data models for the trial pipeline.
//!
//! This module contains the core data structures used throughout the
//! application: the treatment registry, raw record types, and the
//! per-group summary rows derived from them.

use crate::error::PipelineError;
use crate::resolver::canonical_key;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One experimental group (site) under a fixed treatment level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentGroup {
    /// Group identifier, stored in NFC form.
    pub id: String,
    /// Target EC level assigned to the group. Strictly positive.
    pub target_ec: f64,
    /// Optional display color for downstream presentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Ordered, immutable mapping of group id to treatment level.
///
/// Iteration order is declaration order; it drives deterministic
/// tie-breaking in ranking and the row order of every summary table.
#[derive(Debug, Clone)]
pub struct TreatmentRegistry {
    groups: Vec<TreatmentGroup>,
    index: HashMap<String, usize>,
}

impl TreatmentRegistry {
    /// Build a registry from group definitions.
    ///
    /// Ids are normalized to NFC before insertion. Duplicate ids (after
    /// normalization) and non-positive target levels are rejected.
    pub fn new(groups: Vec<TreatmentGroup>) -> Result<Self, PipelineError> {
        let mut normalized = Vec::with_capacity(groups.len());
        let mut index = HashMap::with_capacity(groups.len());

        for mut group in groups {
            group.id = canonical_key(&group.id);

            if group.target_ec <= 0.0 {
                return Err(PipelineError::Config(format!(
                    "group '{}' has non-positive target EC {}",
                    group.id, group.target_ec
                )));
            }
            if index.contains_key(&group.id) {
                return Err(PipelineError::Config(format!(
                    "duplicate group id '{}'",
                    group.id
                )));
            }

            index.insert(group.id.clone(), normalized.len());
            normalized.push(group);
        }

        Ok(Self {
            groups: normalized,
            index,
        })
    }

    /// Iterate groups in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &TreatmentGroup> {
        self.groups.iter()
    }

    /// Look up a group by id. The id is normalized before lookup, so
    /// NFC and NFD spellings of the same text both resolve.
    #[allow(dead_code)] // Utility for registry consumers
    pub fn get(&self, id: &str) -> Option<&TreatmentGroup> {
        self.get_full(id).map(|(_, group)| group)
    }

    /// Look up a group together with its registry position.
    pub fn get_full(&self, id: &str) -> Option<(usize, &TreatmentGroup)> {
        self.index
            .get(&canonical_key(id))
            .map(|&i| (i, &self.groups[i]))
    }

    /// Number of registered groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[allow(dead_code)] // Companion to len
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// One environmental sample from a group's time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    pub group_id: String,
    /// Sampling instant. `None` when the source value did not parse.
    pub timestamp: Option<NaiveDateTime>,
    pub temperature: f64,
    pub humidity: f64,
    pub ph: f64,
    /// Observed EC at the sampling instant.
    pub measured_ec: f64,
    /// Treatment level copied from the registry.
    pub target_ec: f64,
}

/// One measured individual from a group's growth sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthRecord {
    pub group_id: String,
    pub individual_id: String,
    pub fresh_weight_g: f64,
    pub leaf_count: f64,
    pub shoot_length_mm: f64,
    /// Treatment level copied from the registry.
    pub target_ec: f64,
}

/// Ordered sequence of records belonging to one group.
///
/// Loaders return these in registry iteration order, standing in for
/// an ordered mapping of group id to record sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSeries<T> {
    pub group_id: String,
    pub records: Vec<T>,
}

/// Per-group environment averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSummary {
    pub group_id: String,
    pub avg_temperature: f64,
    pub avg_humidity: f64,
    pub avg_ph: f64,
    pub avg_measured_ec: f64,
    pub target_ec: f64,
}

/// Per-group growth averages and sample count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthSummary {
    pub group_id: String,
    pub target_ec: f64,
    pub avg_fresh_weight: f64,
    pub avg_leaf_count: f64,
    pub avg_shoot_length: f64,
    pub sample_count: usize,
}

/// Whole-study figures derived from all loaded rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyOverview {
    /// Total measured individuals across all growth groups.
    pub total_individuals: usize,
    /// Mean temperature across every environment row of every group.
    pub avg_temperature: f64,
    /// Mean humidity across every environment row of every group.
    pub avg_humidity: f64,
}

/// A recoverable omission observed while loading.
///
/// Every group or sheet the pipeline skips is recorded here so the
/// caller can tell a partial result from a complete one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// No source file matched the group's expected name.
    SourceNotFound { group_id: String },
    /// A resolved source was malformed or missing a required column.
    ParseFailure { group_id: String, reason: String },
    /// Several files matched one logical name; the first one was used.
    AmbiguousSource { logical_name: String, chosen: String },
    /// A workbook sheet did not match any registered group.
    UnmatchedSheet { sheet: String },
    /// No growth workbook was found in the data directory.
    WorkbookNotFound,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::SourceNotFound { group_id } => {
                write!(f, "no source file found for group '{}'", group_id)
            }
            Warning::ParseFailure { group_id, reason } => {
                write!(f, "skipped group '{}': {}", group_id, reason)
            }
            Warning::AmbiguousSource {
                logical_name,
                chosen,
            } => write!(
                f,
                "multiple files match '{}'; using '{}'",
                logical_name, chosen
            ),
            Warning::UnmatchedSheet { sheet } => {
                write!(f, "workbook sheet '{}' matches no registered group", sheet)
            }
            Warning::WorkbookNotFound => write!(f, "no growth workbook found"),
        }
    }
}

/// Loader result: the groups that made it through, plus every omission.
#[derive(Debug, Clone)]
pub struct LoadOutcome<T> {
    pub groups: Vec<GroupSeries<T>>,
    pub warnings: Vec<Warning>,
}

impl<T> LoadOutcome<T> {
    pub fn empty() -> Self {
        Self {
            groups: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Total record count across all groups.
    pub fn record_count(&self) -> usize {
        self.groups.iter().map(|g| g.records.len()).sum()
    }
}
