use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use stakeledger_core::clock::{Clock, SystemClock};
use stakeledger_core::concentration::{
    ConcentrationEngine, HolderPresence, NoSharesOutstanding, SharesOutstandingReference,
    StaticSharesOutstanding,
};
use stakeledger_core::events::{DomainEventSink, LoggingDomainEventSink};
use stakeledger_core::governor::{AuditLog, ComplianceReport, GovernorUsage, RequestGovernor};
use stakeledger_core::holders::HolderStore;
use stakeledger_core::ingest::{
    AdapterRegistry, FilingRequest, IngestPipeline, JsonTupleAdapter, RunSummary,
};
use stakeledger_core::ownership::{CompanyId, CompanyLocks, OwnershipService};
use stakeledger_core::resolver::{AliasTable, EntityResolver};
use stakeledger_core::shutdown::StopHandle;
use stakeledger_storage_sqlite::SqliteStores;

use crate::config::Config;
use crate::fetcher::HttpFilingFetcher;

const TOP_HOLDERS: usize = 20;

pub fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Read the JSON array of filings to ingest.
pub fn load_requests(path: &Path) -> anyhow::Result<Vec<FilingRequest>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    let requests: Vec<FilingRequest> = serde_json::from_str(&contents)
        .with_context(|| format!("Manifest {} is not a list of filings", path.display()))?;
    Ok(requests)
}

/// Everything printed once a run ends.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub summary: RunSummary,
    pub compliance: ComplianceReport,
    pub usage: GovernorUsage,
    pub company_count: usize,
    pub top_holders: Vec<HolderPresence>,
    pub companies_with_all_tracked: Vec<CompanyId>,
}

pub struct Runner {
    pipeline: Arc<IngestPipeline>,
    governor: Arc<RequestGovernor>,
    engine: Arc<ConcentrationEngine>,
    audit: Arc<dyn AuditLog>,
    config: Config,
}

impl Runner {
    /// Open storage, hydrate the resolver and wire the pipeline.
    pub fn build(config: Config) -> anyhow::Result<Self> {
        let stores = SqliteStores::open(&config.db_path)
            .with_context(|| format!("Failed to open database {}", config.db_path))?;

        let mut aliases = AliasTable::seeded();
        if let Some(path) = &config.aliases_path {
            aliases.extend(AliasTable::from_json_file(path)?);
        }
        let resolver = Arc::new(EntityResolver::new(config.pipeline.resolver.clone(), &aliases)?);
        let known = stores.holders.list_holders()?;
        tracing::info!("Hydrating resolver with {} stored holders", known.len());
        resolver.hydrate(known)?;

        let outstanding: Arc<dyn SharesOutstandingReference> =
            match &config.shares_outstanding_path {
                Some(path) => Arc::new(StaticSharesOutstanding::from_json_file(path)?),
                None => Arc::new(NoSharesOutstanding),
            };

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let sink: Arc<dyn DomainEventSink> = Arc::new(LoggingDomainEventSink);
        let locks = Arc::new(CompanyLocks::new());

        let engine = Arc::new(ConcentrationEngine::new(
            &config.pipeline.concentration,
            stores.facts.clone(),
            stores.holders.clone(),
            stores.snapshots.clone(),
            outstanding,
            locks.clone(),
            clock.clone(),
            sink.clone(),
        ));
        let ownership = Arc::new(
            OwnershipService::new(stores.facts.clone(), locks, sink.clone())
                .with_hook(engine.clone()),
        );
        let governor = Arc::new(RequestGovernor::with_clock(
            config.pipeline.governor.clone(),
            stores.audit.clone(),
            clock.clone(),
        )?);
        let fetcher = Arc::new(HttpFilingFetcher::new(&config.user_agent)?);

        let pipeline = Arc::new(
            IngestPipeline::new(
                governor.clone(),
                fetcher,
                AdapterRegistry::new().register(Arc::new(JsonTupleAdapter)),
                resolver,
                stores.holders.clone() as Arc<dyn HolderStore>,
                ownership,
                sink,
                clock,
            )
            .with_retry_policy(config.pipeline.retry.clone())
            .with_workers(config.pipeline.workers),
        );

        Ok(Self {
            pipeline,
            governor,
            engine,
            audit: stores.audit.clone(),
            config,
        })
    }

    pub async fn run(&self, stop: Arc<StopHandle>) -> anyhow::Result<RunReport> {
        let requests = load_requests(&self.config.manifest_path)?;
        let summary = Arc::clone(&self.pipeline).run(requests, stop).await;

        let governor = &self.config.pipeline.governor;
        let compliance = ComplianceReport::from_records(
            &self.audit.records()?,
            governor.requests_per_second,
            governor.daily_reset_hour_utc,
        );
        let presence = self.engine.presence_report()?;

        Ok(RunReport {
            summary,
            compliance,
            usage: self.governor.usage(),
            company_count: presence.company_count,
            top_holders: presence.top(TOP_HOLDERS).to_vec(),
            companies_with_all_tracked: presence.companies_with_all_tracked,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use stakeledger_core::ownership::FilingType;

    use super::*;

    #[test]
    fn test_load_requests_reads_manifest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{
                "companyId": "KO",
                "filingId": "0000021344-24-000010",
                "filingType": "DEF 14A",
                "endpoint": "https://www.sec.gov/Archives/edgar/data/21344/ownership.json"
            }}]"#
        )
        .unwrap();

        let requests = load_requests(file.path()).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].company_id, CompanyId::new("KO"));
        assert_eq!(requests[0].filing_type, FilingType::Def14a);
    }

    #[test]
    fn test_load_requests_rejects_bad_manifest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"not": "a list"}}"#).unwrap();
        assert!(load_requests(file.path()).is_err());
    }
}
