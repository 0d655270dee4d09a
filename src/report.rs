//! Report rendering.
//!
//! Turns one pipeline run into a Markdown or JSON document. This is
//! the thin presentation shell over the canonical tables; it draws no
//! charts and performs no spreadsheet encoding.

use crate::pipeline::TrialData;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::json;

/// Run-level facts attached to every report.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub data_dir: String,
    pub generated_at: DateTime<Utc>,
    pub duration_seconds: f64,
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(data: &TrialData, ctx: &ReportContext) -> String {
    let mut output = String::new();

    output.push_str("# EC Trial Summary\n\n");
    output.push_str(&generate_metadata_section(data, ctx));
    output.push_str(&generate_overview_section(data));
    output.push_str(&generate_environment_section(data));
    output.push_str(&generate_growth_section(data));
    output.push_str(&generate_warnings_section(data));

    output.push_str("---\n\n*Generated by EcGrow*\n");

    output
}

fn generate_metadata_section(data: &TrialData, ctx: &ReportContext) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Data Directory:** {}\n", ctx.data_dir));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        ctx.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Environment Rows:** {}\n",
        data.merged_environment.len()
    ));
    section.push_str(&format!("- **Growth Rows:** {}\n", data.merged_growth.len()));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n\n",
        ctx.duration_seconds
    ));

    section
}

fn generate_overview_section(data: &TrialData) -> String {
    let mut section = String::new();

    section.push_str("## Study Overview\n\n");
    section.push_str(&format!(
        "- **Total Individuals:** {}\n",
        data.overview.total_individuals
    ));
    section.push_str(&format!(
        "- **Average Temperature:** {:.2} ℃\n",
        data.overview.avg_temperature
    ));
    section.push_str(&format!(
        "- **Average Humidity:** {:.2} %\n",
        data.overview.avg_humidity
    ));
    section.push_str(&format!(
        "- **Best Group:** {} (target EC {}, mean fresh weight {:.2} g)\n\n",
        data.optimal.group_id, data.optimal.target_ec, data.optimal.avg_fresh_weight
    ));

    section
}

fn generate_environment_section(data: &TrialData) -> String {
    let mut section = String::new();

    section.push_str("## Environment Averages\n\n");
    section.push_str("| Group | Avg Temp (℃) | Avg Humidity (%) | Avg pH | Measured EC | Target EC |\n");
    section.push_str("|---|---|---|---|---|---|\n");

    for row in &data.env_summaries {
        section.push_str(&format!(
            "| {} | {:.2} | {:.2} | {:.2} | {:.2} | {} |\n",
            row.group_id,
            row.avg_temperature,
            row.avg_humidity,
            row.avg_ph,
            row.avg_measured_ec,
            row.target_ec
        ));
    }

    section.push('\n');
    section
}

fn generate_growth_section(data: &TrialData) -> String {
    let mut section = String::new();

    section.push_str("## Growth Averages\n\n");
    section.push_str(
        "| Group | Target EC | Fresh Weight (g) | Leaf Count | Shoot Length (mm) | Samples |\n",
    );
    section.push_str("|---|---|---|---|---|---|\n");

    for row in &data.growth_summaries {
        let marker = if row.group_id == data.optimal.group_id {
            " ⭐"
        } else {
            ""
        };
        section.push_str(&format!(
            "| {}{} | {} | {:.2} | {:.2} | {:.2} | {} |\n",
            row.group_id,
            marker,
            row.target_ec,
            row.avg_fresh_weight,
            row.avg_leaf_count,
            row.avg_shoot_length,
            row.sample_count
        ));
    }

    section.push('\n');
    section
}

fn generate_warnings_section(data: &TrialData) -> String {
    if data.warnings.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Warnings\n\n");
    for warning in &data.warnings {
        section.push_str(&format!("- ⚠️ {}\n", warning));
    }
    section.push('\n');

    section
}

/// Generate a JSON report carrying the canonical tables in full.
pub fn generate_json_report(data: &TrialData, ctx: &ReportContext) -> Result<String> {
    let value = json!({
        "metadata": {
            "data_dir": ctx.data_dir,
            "generated_at": ctx.generated_at,
            "duration_seconds": ctx.duration_seconds,
        },
        "overview": data.overview,
        "environment_summaries": data.env_summaries,
        "growth_summaries": data.growth_summaries,
        "optimal": data.optimal,
        "merged_environment": data.merged_environment,
        "merged_growth": data.merged_growth,
        "warnings": data.warnings,
    });

    Ok(serde_json::to_string_pretty(&value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        EnvironmentSummary, GrowthRecord, GrowthSummary, StudyOverview, Warning,
    };

    fn sample_data() -> TrialData {
        let growth_summary = GrowthSummary {
            group_id: "하늘고".to_string(),
            target_ec: 2.0,
            avg_fresh_weight: 18.7,
            avg_leaf_count: 6.0,
            avg_shoot_length: 84.0,
            sample_count: 2,
        };
        TrialData {
            env_by_group: Vec::new(),
            growth_by_group: Vec::new(),
            env_summaries: vec![EnvironmentSummary {
                group_id: "하늘고".to_string(),
                avg_temperature: 19.0,
                avg_humidity: 60.25,
                avg_ph: 6.05,
                avg_measured_ec: 2.1,
                target_ec: 2.0,
            }],
            growth_summaries: vec![growth_summary.clone()],
            merged_environment: Vec::new(),
            merged_growth: vec![GrowthRecord {
                group_id: "하늘고".to_string(),
                individual_id: "1".to_string(),
                fresh_weight_g: 18.0,
                leaf_count: 6.0,
                shoot_length_mm: 84.0,
                target_ec: 2.0,
            }],
            optimal: growth_summary,
            overview: StudyOverview {
                total_individuals: 2,
                avg_temperature: 19.0,
                avg_humidity: 60.25,
            },
            warnings: vec![Warning::SourceNotFound {
                group_id: "아라고".to_string(),
            }],
        }
    }

    fn ctx() -> ReportContext {
        ReportContext {
            data_dir: "data".to_string(),
            generated_at: Utc::now(),
            duration_seconds: 0.2,
        }
    }

    #[test]
    fn test_markdown_report_sections() {
        let report = generate_markdown_report(&sample_data(), &ctx());

        assert!(report.contains("# EC Trial Summary"));
        assert!(report.contains("## Environment Averages"));
        assert!(report.contains("## Growth Averages"));
        assert!(report.contains("하늘고 ⭐"));
        assert!(report.contains("## Warnings"));
        assert!(report.contains("아라고"));
    }

    #[test]
    fn test_markdown_report_omits_empty_warnings() {
        let mut data = sample_data();
        data.warnings.clear();

        let report = generate_markdown_report(&data, &ctx());
        assert!(!report.contains("## Warnings"));
    }

    #[test]
    fn test_json_report_round_trips() {
        let report = generate_json_report(&sample_data(), &ctx()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report).unwrap();

        assert_eq!(value["optimal"]["group_id"], "하늘고");
        assert_eq!(value["growth_summaries"][0]["sample_count"], 2);
        assert_eq!(value["warnings"][0]["kind"], "source_not_found");
        assert_eq!(value["merged_growth"].as_array().unwrap().len(), 1);
    }
}
