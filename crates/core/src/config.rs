//! Pipeline configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::concentration::ConcentrationConfig;
use crate::constants::DEFAULT_WORKER_COUNT;
use crate::errors::{Error, Result};
use crate::governor::GovernorConfig;
use crate::ingest::RetryPolicy;
use crate::resolver::ResolverConfig;

/// Every tunable of an ingest run. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub governor: GovernorConfig,
    pub resolver: ResolverConfig,
    pub concentration: ConcentrationConfig,
    pub retry: RetryPolicy,
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            governor: GovernorConfig::default(),
            resolver: ResolverConfig::default(),
            concentration: ConcentrationConfig::default(),
            retry: RetryPolicy::default(),
            workers: DEFAULT_WORKER_COUNT,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::ConfigIO(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.governor.requests_per_second == 0 || self.governor.requests_per_day == 0 {
            return Err(Error::InvalidConfigValue(
                "Request ceilings must be positive".to_string(),
            ));
        }
        if self.governor.daily_reset_hour_utc > 23 {
            return Err(Error::InvalidConfigValue(format!(
                "Daily reset hour {} is not within 0-23",
                self.governor.daily_reset_hour_utc
            )));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfigValue(
                "At least one worker is required".to_string(),
            ));
        }
        self.resolver.validate()
    }
}
