//! Per-group summarization, merging, and ranking.
//!
//! Pure functions over the loaders' outputs. Input order is preserved
//! everywhere: summaries come out in the order the groups went in, and
//! ties in ranking resolve to the earlier group.

use crate::error::PipelineError;
use crate::models::{
    EnvironmentRecord, EnvironmentSummary, GroupSeries, GrowthRecord, GrowthSummary,
    StudyOverview,
};

fn mean<T>(records: &[T], value: impl Fn(&T) -> f64) -> f64 {
    records.iter().map(value).sum::<f64>() / records.len() as f64
}

/// Compute per-group environment averages.
///
/// Groups with zero rows are excluded rather than rendered as NaN.
pub fn summarize_environment(
    env_by_group: &[GroupSeries<EnvironmentRecord>],
) -> Vec<EnvironmentSummary> {
    env_by_group
        .iter()
        .filter(|series| !series.records.is_empty())
        .map(|series| {
            let records = &series.records;
            EnvironmentSummary {
                group_id: series.group_id.clone(),
                avg_temperature: mean(records, |r| r.temperature),
                avg_humidity: mean(records, |r| r.humidity),
                avg_ph: mean(records, |r| r.ph),
                avg_measured_ec: mean(records, |r| r.measured_ec),
                target_ec: records[0].target_ec,
            }
        })
        .collect()
}

/// Compute per-group growth averages and sample counts.
///
/// Summaries are reported per group id, never collapsed by treatment
/// level; the level stays on the row as a joinable attribute.
pub fn summarize_growth(growth_by_group: &[GroupSeries<GrowthRecord>]) -> Vec<GrowthSummary> {
    growth_by_group
        .iter()
        .filter(|series| !series.records.is_empty())
        .map(|series| {
            let records = &series.records;
            GrowthSummary {
                group_id: series.group_id.clone(),
                target_ec: records[0].target_ec,
                avg_fresh_weight: mean(records, |r| r.fresh_weight_g),
                avg_leaf_count: mean(records, |r| r.leaf_count),
                avg_shoot_length: mean(records, |r| r.shoot_length_mm),
                sample_count: records.len(),
            }
        })
        .collect()
}

/// Pick the group with the strictly maximal mean fresh weight.
///
/// Exact ties resolve to the group encountered first, so the result is
/// deterministic for a fixed registry order. Empty input is a logic
/// guard violation: upstream construction excludes empty groups.
pub fn pick_optimal(summaries: &[GrowthSummary]) -> Result<&GrowthSummary, PipelineError> {
    summaries
        .iter()
        .reduce(|best, candidate| {
            if candidate.avg_fresh_weight > best.avg_fresh_weight {
                candidate
            } else {
                best
            }
        })
        .ok_or(PipelineError::EmptyAggregation(
            "ranking requires at least one growth summary",
        ))
}

/// Concatenate per-group sequences into one flat table.
///
/// Rows keep their group tag and intra-group order; nothing is
/// deduplicated, so the output length equals the sum of input lengths.
pub fn merge<T: Clone>(by_group: &[GroupSeries<T>]) -> Vec<T> {
    by_group
        .iter()
        .flat_map(|series| series.records.iter().cloned())
        .collect()
}

/// Whole-study overview: total growth individuals and environment-wide
/// temperature/humidity means across all groups.
pub fn study_overview(
    env_by_group: &[GroupSeries<EnvironmentRecord>],
    growth_by_group: &[GroupSeries<GrowthRecord>],
) -> StudyOverview {
    let env_rows: Vec<&EnvironmentRecord> = env_by_group
        .iter()
        .flat_map(|series| series.records.iter())
        .collect();

    let (avg_temperature, avg_humidity) = if env_rows.is_empty() {
        (0.0, 0.0)
    } else {
        (
            env_rows.iter().map(|r| r.temperature).sum::<f64>() / env_rows.len() as f64,
            env_rows.iter().map(|r| r.humidity).sum::<f64>() / env_rows.len() as f64,
        )
    };

    StudyOverview {
        total_individuals: growth_by_group.iter().map(|s| s.records.len()).sum(),
        avg_temperature,
        avg_humidity,
    }
}
