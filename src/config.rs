//! Configuration file handling.
//!
//! This module handles loading `ecgrow.toml`, which declares the data
//! directory layout and the treatment registry. The compiled-in
//! defaults reproduce the original four-school study.

use crate::error::PipelineError;
use crate::models::{TreatmentGroup, TreatmentRegistry};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory layout.
    #[serde(default)]
    pub data: DataConfig,

    /// Registered treatment groups, in reporting order.
    #[serde(default = "default_groups")]
    pub groups: Vec<GroupConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            groups: default_groups(),
        }
    }
}

/// Where and how the source files are named.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding the per-group CSV files and the workbook.
    #[serde(default = "default_dir")]
    pub dir: String,

    /// Appended to a group id to form its environment file name.
    #[serde(default = "default_env_suffix")]
    pub env_file_suffix: String,

    /// Fixed tail of the growth workbook name (the school-count prefix
    /// varies between deliveries).
    #[serde(default = "default_growth_suffix")]
    pub growth_workbook_suffix: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            env_file_suffix: default_env_suffix(),
            growth_workbook_suffix: default_growth_suffix(),
        }
    }
}

fn default_dir() -> String {
    "data".to_string()
}

fn default_env_suffix() -> String {
    "_환경데이터.csv".to_string()
}

fn default_growth_suffix() -> String {
    "개교_생육결과데이터.xlsx".to_string()
}

/// One group declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub id: String,
    pub target_ec: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

fn default_groups() -> Vec<GroupConfig> {
    [("송도고", 1.0), ("하늘고", 2.0), ("아라고", 4.0), ("동산고", 8.0)]
        .into_iter()
        .map(|(id, target_ec)| GroupConfig {
            id: id.to_string(),
            target_ec,
            color: None,
        })
        .collect()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists
    /// but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new("ecgrow.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref dir) = args.data {
            self.data.dir = dir.display().to_string();
        }
    }

    /// Build the immutable treatment registry from the declarations,
    /// enforcing unique ids and strictly positive target levels.
    pub fn registry(&self) -> Result<TreatmentRegistry, PipelineError> {
        if self.groups.is_empty() {
            return Err(PipelineError::Config(
                "no treatment groups declared".to_string(),
            ));
        }

        TreatmentRegistry::new(
            self.groups
                .iter()
                .map(|g| TreatmentGroup {
                    id: g.id.clone(),
                    target_ec: g.target_ec,
                    color: g.color.clone(),
                })
                .collect(),
        )
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
