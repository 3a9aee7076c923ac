use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use stakeledger_core::config::PipelineConfig;

const DEFAULT_DB_PATH: &str = "./db/stakeledger.db";
const DEFAULT_USER_AGENT: &str = "stakeledger research contact@example.com";

pub struct Config {
    pub db_path: String,
    pub manifest_path: PathBuf,
    pub aliases_path: Option<PathBuf>,
    pub shares_outstanding_path: Option<PathBuf>,
    pub pipeline: PipelineConfig,
    pub user_agent: String,
    pub log_format: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any variable source. `STAKELEDGER_CONFIG` names
    /// an optional JSON pipeline config; individual variables override it.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut pipeline = match var("STAKELEDGER_CONFIG") {
            Some(path) => PipelineConfig::from_json_file(PathBuf::from(path).as_path())?,
            None => PipelineConfig::default(),
        };
        if let Some(v) = parse(&var, "STAKELEDGER_REQUESTS_PER_SECOND")? {
            pipeline.governor.requests_per_second = v;
        }
        if let Some(v) = parse(&var, "STAKELEDGER_REQUESTS_PER_DAY")? {
            pipeline.governor.requests_per_day = v;
        }
        if let Some(v) = parse(&var, "STAKELEDGER_RESET_HOUR_UTC")? {
            pipeline.governor.daily_reset_hour_utc = v;
        }
        if let Some(v) = parse(&var, "STAKELEDGER_WORKERS")? {
            pipeline.workers = v;
        }
        if let Some(majors) = var("STAKELEDGER_TRACKED_MAJORS") {
            pipeline.concentration.tracked_majors = majors
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        pipeline.validate()?;

        let manifest_path = var("STAKELEDGER_MANIFEST")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("STAKELEDGER_MANIFEST must name a filing manifest"))?;

        Ok(Self {
            db_path: var("STAKELEDGER_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.into()),
            manifest_path,
            aliases_path: var("STAKELEDGER_ALIASES").map(PathBuf::from),
            shares_outstanding_path: var("STAKELEDGER_SHARES_OUTSTANDING").map(PathBuf::from),
            pipeline,
            user_agent: var("STAKELEDGER_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.into()),
            log_format: var("STAKELEDGER_LOG_FORMAT").unwrap_or_else(|| "text".into()),
        })
    }
}

fn parse<T, F>(var: &F, name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|raw| raw.trim().parse::<T>().with_context(|| format!("Invalid {}: '{}'", name, raw)))
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_with_manifest_only() {
        let config = config(&[("STAKELEDGER_MANIFEST", "filings.json")]).unwrap();
        assert_eq!(config.db_path, DEFAULT_DB_PATH);
        assert_eq!(config.manifest_path, PathBuf::from("filings.json"));
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert!(config.aliases_path.is_none());
        assert_eq!(config.log_format, "text");
    }

    #[test]
    fn test_manifest_is_required() {
        assert!(config(&[]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("STAKELEDGER_MANIFEST", "filings.json"),
            ("STAKELEDGER_REQUESTS_PER_SECOND", "5"),
            ("STAKELEDGER_REQUESTS_PER_DAY", "1000"),
            ("STAKELEDGER_RESET_HOUR_UTC", "5"),
            ("STAKELEDGER_WORKERS", "2"),
            ("STAKELEDGER_TRACKED_MAJORS", "Vanguard Group, BlackRock,,State Street"),
        ])
        .unwrap();
        assert_eq!(config.pipeline.governor.requests_per_second, 5);
        assert_eq!(config.pipeline.governor.requests_per_day, 1000);
        assert_eq!(config.pipeline.governor.daily_reset_hour_utc, 5);
        assert_eq!(config.pipeline.workers, 2);
        assert_eq!(
            config.pipeline.concentration.tracked_majors,
            vec!["Vanguard Group", "BlackRock", "State Street"]
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(config(&[
            ("STAKELEDGER_MANIFEST", "filings.json"),
            ("STAKELEDGER_REQUESTS_PER_SECOND", "ten"),
        ])
        .is_err());
        assert!(config(&[
            ("STAKELEDGER_MANIFEST", "filings.json"),
            ("STAKELEDGER_RESET_HOUR_UTC", "24"),
        ])
        .is_err());
    }
}
