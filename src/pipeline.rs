//! The single-pass trial pipeline: resolve, load, summarize, merge,
//! rank.
//!
//! Per-group failures reduce the working set and are surfaced as
//! warnings; the run only aborts when environment or growth data is
//! empty after all recoverable skips, so callers never render a
//! misleading empty summary.

use crate::analysis;
use crate::error::PipelineError;
use crate::loader::{EnvironmentLoader, GrowthLoader};
use crate::models::{
    EnvironmentRecord, EnvironmentSummary, GroupSeries, GrowthRecord, GrowthSummary,
    StudyOverview, TreatmentRegistry, Warning,
};
use crate::resolver;
use std::path::Path;
use tracing::info;

/// Everything one run produces: canonical per-group tables, summary
/// tables, merged raw tables, the ranked best group, and every
/// recoverable omission observed along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialData {
    pub env_by_group: Vec<GroupSeries<EnvironmentRecord>>,
    pub growth_by_group: Vec<GroupSeries<GrowthRecord>>,
    pub env_summaries: Vec<EnvironmentSummary>,
    pub growth_summaries: Vec<GrowthSummary>,
    pub merged_environment: Vec<EnvironmentRecord>,
    pub merged_growth: Vec<GrowthRecord>,
    pub optimal: GrowthSummary,
    pub overview: StudyOverview,
    pub warnings: Vec<Warning>,
}

/// Resolution status of one expected source, for dry runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceStatus {
    pub logical_name: String,
    pub resolved: Option<String>,
}

/// Owns the registry and the loaders (with their parse caches), so a
/// long-lived process can re-run cheaply on unchanged sources.
pub struct Pipeline {
    registry: TreatmentRegistry,
    env_loader: EnvironmentLoader,
    growth_loader: GrowthLoader,
}

impl Pipeline {
    pub fn new(
        registry: TreatmentRegistry,
        env_file_suffix: impl Into<String>,
        growth_workbook_suffix: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            env_loader: EnvironmentLoader::new(env_file_suffix),
            growth_loader: GrowthLoader::new(growth_workbook_suffix),
        }
    }

    pub fn registry(&self) -> &TreatmentRegistry {
        &self.registry
    }

    /// Run the whole pass over `data_dir`.
    pub fn run(&mut self, data_dir: &Path) -> Result<TrialData, PipelineError> {
        info!("loading trial data from {}", data_dir.display());

        let env = self.env_loader.load(data_dir, &self.registry)?;
        let growth = self.growth_loader.load(data_dir, &self.registry)?;

        if env.groups.is_empty() {
            return Err(PipelineError::EmptyPipeline("environment"));
        }
        if growth.groups.is_empty() {
            return Err(PipelineError::EmptyPipeline("growth"));
        }

        info!(
            "loaded {} environment rows across {} groups, {} growth rows across {} groups",
            env.record_count(),
            env.groups.len(),
            growth.record_count(),
            growth.groups.len()
        );

        let mut warnings = env.warnings;
        warnings.extend(growth.warnings);

        let env_summaries = analysis::summarize_environment(&env.groups);
        let growth_summaries = analysis::summarize_growth(&growth.groups);
        let optimal = analysis::pick_optimal(&growth_summaries)?.clone();
        let overview = analysis::study_overview(&env.groups, &growth.groups);
        let merged_environment = analysis::merge(&env.groups);
        let merged_growth = analysis::merge(&growth.groups);

        Ok(TrialData {
            env_by_group: env.groups,
            growth_by_group: growth.groups,
            env_summaries,
            growth_summaries,
            merged_environment,
            merged_growth,
            optimal,
            overview,
            warnings,
        })
    }

    /// Resolve every expected source without parsing anything.
    pub fn resolve_sources(&self, data_dir: &Path) -> Result<Vec<SourceStatus>, PipelineError> {
        let mut statuses = Vec::new();

        for group in self.registry.iter() {
            let logical_name = format!("{}{}", group.id, self.env_loader.file_suffix());
            let resolved = resolver::resolve(data_dir, &logical_name)?;
            statuses.push(SourceStatus {
                logical_name,
                resolved: resolved.map(|r| r.file_name),
            });
        }

        let suffix = self.growth_loader.workbook_suffix();
        let resolved = resolver::resolve_by_suffix(data_dir, suffix)?;
        statuses.push(SourceStatus {
            logical_name: format!("*{}", suffix),
            resolved: resolved.map(|r| r.file_name),
        });

        Ok(statuses)
    }
}
