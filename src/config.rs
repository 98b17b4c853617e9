use serde::Deserialize;
use std::path::Path;

use crate::constants::{DEFAULT_FEED_URL, DEFAULT_TOP_N};
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::BracketScheme;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub report: ReportSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub base_url: String,
    pub gender: String,
    pub batch_size: u32,
    pub total: u32,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_FEED_URL.to_string(),
            gender: "male".to_string(),
            batch_size: 1000,
            total: 30000,
            timeout_seconds: 20,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Which bucketing scheme this pipeline instance runs with. Explicit so
    /// the two schemes in the repository are never silently mixed.
    pub bracket_scheme: BracketScheme,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub top_n: u32,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self { top_n: DEFAULT_TOP_N }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
