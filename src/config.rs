use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{PipelineError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config/default";

const ATTIO_BASE_URL: &str = "https://api.attio.com/v2";
const CLAY_BASE_URL: &str = "https://api.clay.com/v1";

/// Longest staleness window accepted, one year
const MAX_TIMEOUT_HOURS: u64 = 24 * 365;

/// Environment variables that must be present before any phase runs.
const REQUIRED_ENV: [(&str, &str); 3] = [
    ("ATTIO_API_KEY", "attio.api_key"),
    ("CLAY_API_KEY", "clay.api_key"),
    ("CLAY_TABLE_ID", "clay.table_id"),
];

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub attio: AttioConfig,
    pub clay: ClayConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AttioConfig {
    #[serde(default)]
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClayConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub table_id: String,
    pub base_url: String,
    /// Rows requested per page when looking up results
    pub page_size: usize,
    /// Optional bound on pages walked per lookup; unset walks the whole table
    #[serde(default)]
    pub max_pages: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Max records submitted per run
    pub batch_size: usize,
    /// Candidate records fetched when looking for unenriched contacts
    pub scan_limit: usize,
    /// Max `sent_to_clay` records resolved per run
    pub pending_limit: usize,
    /// Max `enriched` records linked per run
    pub link_limit: usize,
    pub rate_limit_delay_ms: u64,
    pub timeout_hours: u64,
    pub dry_run: bool,
}

impl PipelineConfig {
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    pub fn timeout(&self) -> chrono::Duration {
        chrono::Duration::hours(self.timeout_hours as i64)
    }
}

impl Config {
    /// Load configuration from `.env`, the optional config file and the process environment.
    pub fn load(path: Option<&str>) -> Result<Self> {
        dotenv::dotenv().ok();

        let env: HashMap<String, String> = std::env::vars().collect();
        Self::from_sources(path.unwrap_or(DEFAULT_CONFIG_PATH), &env)
    }

    /// Build configuration from an explicit file path and environment map.
    pub fn from_sources(path: &str, env: &HashMap<String, String>) -> Result<Self> {
        let env_source: config::Map<String, String> =
            env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        let mut builder = config::Config::builder()
            .set_default("attio.base_url", ATTIO_BASE_URL)?
            .set_default("clay.base_url", CLAY_BASE_URL)?
            .set_default("clay.page_size", 100)?
            .set_default("pipeline.batch_size", 50)?
            .set_default("pipeline.scan_limit", 200)?
            .set_default("pipeline.pending_limit", 100)?
            .set_default("pipeline.link_limit", 100)?
            .set_default("pipeline.rate_limit_delay_ms", 500)?
            .set_default("pipeline.timeout_hours", 2)?
            .set_default("pipeline.dry_run", false)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("ENRICHMENT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(env_source)),
            );

        for (var, key) in REQUIRED_ENV {
            let value = env.get(var).filter(|v| !v.trim().is_empty()).cloned();
            builder = builder.set_override_option(key, value)?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let present = [
            !self.attio.api_key.trim().is_empty(),
            !self.clay.api_key.trim().is_empty(),
            !self.clay.table_id.trim().is_empty(),
        ];

        let missing: Vec<&str> = REQUIRED_ENV
            .iter()
            .zip(present)
            .filter(|(_, ok)| !ok)
            .map(|((var, _), _)| *var)
            .collect();

        if !missing.is_empty() {
            return Err(PipelineError::Config(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        if self.pipeline.batch_size == 0 || self.clay.page_size == 0 {
            return Err(PipelineError::Config(
                "batch_size and page_size must be greater than zero".to_string(),
            ));
        }

        if self.pipeline.timeout_hours == 0 || self.pipeline.timeout_hours > MAX_TIMEOUT_HOURS {
            return Err(PipelineError::Config(format!(
                "timeout_hours must be between 1 and {}, got {}",
                MAX_TIMEOUT_HOURS, self.pipeline.timeout_hours
            )));
        }

        if self.clay.max_pages == Some(0) {
            return Err(PipelineError::Config(
                "max_pages must be greater than zero when set".to_string(),
            ));
        }

        Ok(())
    }
}
