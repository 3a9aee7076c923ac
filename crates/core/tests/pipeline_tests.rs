//! End-to-end ingest tests over the in-memory store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use stakeledger_core::clock::SystemClock;
use stakeledger_core::concentration::{
    ConcentrationConfig, ConcentrationEngine, NoSharesOutstanding,
};
use stakeledger_core::events::{DomainEvent, MockDomainEventSink};
use stakeledger_core::governor::{AuditLog, ComplianceReport, GovernorConfig, RequestGovernor};
use stakeledger_core::holders::{CanonicalHolder, HolderId, HolderStore};
use stakeledger_core::ingest::{
    AdapterRegistry, FetchError, FilingBlob, FilingFetcher, FilingRequest, IngestPipeline,
    JsonTupleAdapter, RetryPolicy, RunSummary, RunTermination,
};
use stakeledger_core::memory::InMemoryStore;
use stakeledger_core::ownership::{
    CompanyId, CompanyLocks, FilingId, FilingType, OwnershipService, OwnershipStore,
};
use stakeledger_core::resolver::{AliasTable, EntityResolver, ResolverConfig};
use stakeledger_core::shutdown::stop_channel;
use stakeledger_core::Error;

/// Serves canned bodies; a filing may fail transiently a set number of times.
#[derive(Default)]
struct ScriptedFetcher {
    bodies: HashMap<String, Result<String, FetchError>>,
    transient_failures: Mutex<HashMap<String, usize>>,
}

impl ScriptedFetcher {
    fn body(mut self, filing: &str, body: &str) -> Self {
        self.bodies.insert(filing.to_string(), Ok(body.to_string()));
        self
    }

    fn permanent(mut self, filing: &str) -> Self {
        self.bodies.insert(
            filing.to_string(),
            Err(FetchError::Permanent("404 Not Found".to_string())),
        );
        self
    }

    fn flaky(self, filing: &str, failures: usize) -> Self {
        self.transient_failures
            .lock()
            .unwrap()
            .insert(filing.to_string(), failures);
        self
    }
}

#[async_trait]
impl FilingFetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FilingRequest) -> Result<FilingBlob, FetchError> {
        let key = request.filing_id.as_str().to_string();
        {
            let mut failures = self.transient_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(FetchError::Transient("503 Service Unavailable".to_string()));
                }
            }
        }
        match self.bodies.get(&key) {
            Some(Ok(body)) => Ok(FilingBlob::new(request.filing_id.clone(), body.as_bytes())),
            Some(Err(e)) => Err(e.clone()),
            None => Err(FetchError::Permanent(format!("unknown filing {}", key))),
        }
    }
}

/// Holder store whose first write is slow and may fail.
struct FirstWriteHolders {
    inner: Arc<InMemoryStore>,
    delay: Duration,
    fail: bool,
    used: AtomicBool,
}

impl FirstWriteHolders {
    fn new(inner: Arc<InMemoryStore>, delay: Duration, fail: bool) -> Self {
        Self {
            inner,
            delay,
            fail,
            used: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl HolderStore for FirstWriteHolders {
    async fn upsert_holder(&self, holder: &CanonicalHolder) -> stakeledger_core::Result<()> {
        if !self.used.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(Error::Unexpected("disk full".to_string()));
            }
        }
        self.inner.upsert_holder(holder).await
    }

    fn get_holder(&self, holder_id: &HolderId) -> stakeledger_core::Result<Option<CanonicalHolder>> {
        self.inner.get_holder(holder_id)
    }

    fn list_holders(&self) -> stakeledger_core::Result<Vec<CanonicalHolder>> {
        self.inner.list_holders()
    }
}

struct Harness {
    store: Arc<InMemoryStore>,
    engine: Arc<ConcentrationEngine>,
    resolver: Arc<EntityResolver>,
    sink: Arc<MockDomainEventSink>,
    pipeline: Arc<IngestPipeline>,
}

fn harness(fetcher: ScriptedFetcher, governor: GovernorConfig, workers: usize) -> Harness {
    harness_with_holders(fetcher, governor, workers, |store| store as Arc<dyn HolderStore>)
}

fn harness_with_holders<F>(
    fetcher: ScriptedFetcher,
    governor: GovernorConfig,
    workers: usize,
    holders: F,
) -> Harness
where
    F: FnOnce(Arc<InMemoryStore>) -> Arc<dyn HolderStore>,
{
    let store = Arc::new(InMemoryStore::new());
    let sink = Arc::new(MockDomainEventSink::new());
    let locks = Arc::new(CompanyLocks::new());
    let clock = Arc::new(SystemClock);

    let engine = Arc::new(ConcentrationEngine::new(
        &ConcentrationConfig {
            tracked_majors: vec!["Vanguard Group".to_string(), "BlackRock".to_string()],
        },
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(NoSharesOutstanding),
        locks.clone(),
        clock.clone(),
        sink.clone(),
    ));
    let ownership = Arc::new(
        OwnershipService::new(store.clone(), locks, sink.clone()).with_hook(engine.clone()),
    );
    let resolver = Arc::new(
        EntityResolver::new(ResolverConfig::default(), &AliasTable::seeded()).unwrap(),
    );
    let governor = Arc::new(RequestGovernor::new(governor, store.clone()).unwrap());

    let pipeline = Arc::new(
        IngestPipeline::new(
            governor,
            Arc::new(fetcher),
            AdapterRegistry::new().register(Arc::new(JsonTupleAdapter)),
            resolver.clone(),
            holders(store.clone()),
            ownership,
            sink.clone(),
            clock,
        )
        .with_retry_policy(RetryPolicy {
            max_retries: 3,
            backoff_base_ms: 1,
        })
        .with_workers(workers),
    );

    Harness {
        store,
        engine,
        resolver,
        sink,
        pipeline,
    }
}

fn request(company: &str, filing: &str) -> FilingRequest {
    FilingRequest {
        company_id: CompanyId::new(company),
        filing_id: FilingId::new(filing),
        filing_type: FilingType::Def14a,
        endpoint: format!("https://www.sec.gov/Archives/{}", filing),
    }
}

fn relaxed() -> GovernorConfig {
    GovernorConfig {
        requests_per_second: 100,
        requests_per_day: 1_000,
        daily_reset_hour_utc: 0,
    }
}

async fn run(h: &Harness, requests: Vec<FilingRequest>) -> RunSummary {
    let (stop, _signal) = stop_channel();
    Arc::clone(&h.pipeline).run(requests, Arc::new(stop)).await
}

const KO_2024: &str = r#"[
    {"holderName": "The Vanguard Group, Inc.", "shares": 300, "percent": 30.0, "asOfDate": "2024-02-20"},
    {"holderName": "Vanguard Group", "shares": 100, "percent": 10.0, "asOfDate": "2024-02-20"},
    {"holderName": "BlackRock, Inc.", "shares": 200, "percent": 20.0, "asOfDate": "2024-02-20"},
    {"holderName": "Berkshire Hathaway Inc.", "shares": 400, "percent": 40.0, "asOfDate": "2024-02-20"},
    {"holderName": "All directors and officers as a group (total)", "shares": 5, "percent": 0.1, "asOfDate": "2024-02-20"}
]"#;

#[tokio::test]
async fn test_ingest_commits_and_computes_snapshot() {
    let h = harness(ScriptedFetcher::default().body("ko-1", KO_2024), relaxed(), 2);
    let summary = run(&h, vec![request("KO", "ko-1")]).await;

    assert!(summary.is_fully_successful(), "{:?}", summary);
    assert_eq!(summary.filings_committed, 1);
    assert_eq!(summary.facts_inserted, 3);
    assert_eq!(summary.rows_dropped, 1);

    let company = CompanyId::new("KO");
    let current = h.store.current_facts(&company).unwrap();
    assert_eq!(current.len(), 3);

    let vanguard = HolderId::for_canonical_name("Vanguard Group");
    let vanguard_fact = current.iter().find(|f| f.holder_id == vanguard).unwrap();
    assert_eq!(vanguard_fact.shares, 400);
    assert_eq!(vanguard_fact.percent, Some(40.0));

    let snapshot = h.engine.latest(&company).unwrap().unwrap();
    assert_eq!(snapshot.metrics.cr1, 40.0);
    assert_eq!(snapshot.metrics.cr3, 100.0);
    assert_eq!(snapshot.metrics.hhi, 1600.0 + 1600.0 + 400.0);
    assert_eq!(snapshot.metrics.big_k_percent, 60.0);

    // Every referenced holder was persisted.
    for fact in &current {
        assert!(h.store.get_holder(&fact.holder_id).unwrap().is_some());
    }
}

#[tokio::test]
async fn test_reingest_is_idempotent() {
    let h = harness(ScriptedFetcher::default().body("ko-1", KO_2024), relaxed(), 1);
    run(&h, vec![request("KO", "ko-1")]).await;
    let company = CompanyId::new("KO");
    let before = h.engine.latest(&company).unwrap().unwrap();

    let again = run(&h, vec![request("KO", "ko-1")]).await;
    assert!(again.is_fully_successful());
    assert_eq!(again.facts_inserted, 0);
    assert_eq!(again.facts_unchanged, 3);

    let after = h.engine.latest(&company).unwrap().unwrap();
    assert_eq!(before, after);
    assert_eq!(h.engine.history(&company).unwrap().len(), 1);
}

#[tokio::test]
async fn test_parse_failure_is_skipped() {
    let fetcher = ScriptedFetcher::default()
        .body("ko-1", KO_2024)
        .body("pep-1", "<html>not a table</html>");
    let h = harness(fetcher, relaxed(), 2);

    let summary = run(&h, vec![request("PEP", "pep-1"), request("KO", "ko-1")]).await;
    assert_eq!(summary.parse_skips, 1);
    assert_eq!(summary.filings_committed, 1);
    assert!(summary.is_fully_successful());
    assert_eq!(summary.failures.len(), 1);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let fetcher = ScriptedFetcher::default().body("ko-1", KO_2024).flaky("ko-1", 2);
    let h = harness(fetcher, relaxed(), 1);

    let summary = run(&h, vec![request("KO", "ko-1")]).await;
    assert_eq!(summary.filings_committed, 1);
    assert_eq!(summary.fetch_retries, 2);

    // One admission per attempt, all audited.
    assert_eq!(h.store.records().unwrap().len(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_and_permanent_failures_are_skipped() {
    let fetcher = ScriptedFetcher::default()
        .body("ko-1", KO_2024)
        .flaky("ko-1", 10)
        .permanent("pep-1");
    let h = harness(fetcher, relaxed(), 1);

    let summary = run(&h, vec![request("KO", "ko-1"), request("PEP", "pep-1")]).await;
    assert_eq!(summary.fetch_failures, 2);
    assert_eq!(summary.fetch_retries, 3);
    assert_eq!(summary.filings_committed, 0);
    assert_eq!(summary.termination, RunTermination::Completed);
}

#[tokio::test]
async fn test_quota_exhaustion_stops_run() {
    let fetcher = ScriptedFetcher::default()
        .body("ko-1", KO_2024)
        .body("ko-2", KO_2024)
        .body("ko-3", KO_2024);
    let governor = GovernorConfig {
        requests_per_second: 100,
        requests_per_day: 1,
        daily_reset_hour_utc: 0,
    };
    let h = harness(fetcher, governor, 1);

    let summary = run(
        &h,
        vec![request("KO", "ko-1"), request("KO", "ko-2"), request("KO", "ko-3")],
    )
    .await;

    assert!(matches!(summary.termination, RunTermination::QuotaExhausted { .. }));
    assert!(!summary.is_fully_successful());
    assert_eq!(summary.filings_committed, 1);
    assert_eq!(summary.not_started(), 1);

    let records = h.store.records().unwrap();
    let report = ComplianceReport::from_records(&records, 100, 0);
    assert_eq!(report.admitted, 1);
    assert_eq!(report.quota_exhaustions.len(), 1);
}

#[tokio::test]
async fn test_ambiguous_names_are_reported() {
    let body = r#"[
        {"holderName": "Vanguard Group", "shares": 10, "percent": 5.0, "asOfDate": "2024-01-02"},
        {"holderName": "Vaneck Group", "shares": 10, "percent": 2.0, "asOfDate": "2024-01-02"}
    ]"#;
    let h = harness(ScriptedFetcher::default().body("gdx-1", body), relaxed(), 1);

    let summary = run(&h, vec![request("NEM", "gdx-1")]).await;
    assert!(summary.is_fully_successful());
    assert_eq!(summary.curation_candidates.len(), 1);
    assert_eq!(summary.curation_candidates[0].raw_name, "Vaneck Group");

    let vaneck = &summary.curation_candidates[0].holder_id;
    assert!(h.store.get_holder(vaneck).unwrap().is_some());
    assert_ne!(*vaneck, HolderId::for_canonical_name("Vanguard Group"));
    assert!(h.resolver.holder(vaneck).is_some());
    assert!(h
        .sink
        .events()
        .iter()
        .any(|e| matches!(e, DomainEvent::AmbiguousHolder { .. })));
}

#[tokio::test]
async fn test_stop_before_start_cancels_run() {
    let h = harness(ScriptedFetcher::default().body("ko-1", KO_2024), relaxed(), 1);
    let (stop, _signal) = stop_channel();
    stop.trigger();

    let summary = Arc::clone(&h.pipeline)
        .run(vec![request("KO", "ko-1")], Arc::new(stop))
        .await;
    assert_eq!(summary.termination, RunTermination::Cancelled);
    assert_eq!(summary.not_started(), 1);
    assert!(!summary.is_fully_successful());
}

const GEODE_ONLY: &str = r#"[
    {"holderName": "Geode Capital Management, LLC", "shares": 50, "percent": 5.0, "asOfDate": "2024-03-01"}
]"#;

#[tokio::test]
async fn test_seeded_holders_are_stored_on_first_use() {
    let h = harness(ScriptedFetcher::default().body("ko-1", KO_2024), relaxed(), 1);
    assert!(h.store.list_holders().unwrap().is_empty());

    let summary = run(&h, vec![request("KO", "ko-1")]).await;
    assert_eq!(summary.store_failures, 0, "{:?}", summary.failures);

    let vanguard = HolderId::for_canonical_name("Vanguard Group");
    let stored = h.store.get_holder(&vanguard).unwrap().unwrap();
    assert_eq!(stored.canonical_name, "Vanguard Group");
    assert!(stored.known_aliases.contains("The Vanguard Group, Inc."));
    assert!(h.sink.events().iter().any(|e| matches!(
        e,
        DomainEvent::HoldersChanged { holder_ids } if holder_ids.contains(&vanguard)
    )));
}

#[tokio::test]
async fn test_workers_share_a_new_holder() {
    let mut fetcher = ScriptedFetcher::default();
    let companies = ["NEM", "GOLD", "AEM", "KGC", "WPM", "FNV"];
    for company in companies {
        fetcher = fetcher.body(&format!("{}-1", company), GEODE_ONLY);
    }
    let h = harness(fetcher, relaxed(), 4);

    let requests = companies
        .iter()
        .map(|c| request(c, &format!("{}-1", c)))
        .collect();
    let summary = run(&h, requests).await;

    assert!(summary.is_fully_successful(), "{:?}", summary.failures);
    assert_eq!(summary.filings_committed, companies.len());

    let geode = HolderId::for_canonical_name("Geode Capital Management");
    let holders = h.store.list_holders().unwrap();
    assert_eq!(holders.iter().filter(|x| x.holder_id == geode).count(), 1);
    for company in companies {
        let facts = h.store.current_facts(&CompanyId::new(company)).unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].holder_id, geode);
    }
}

#[tokio::test]
async fn test_commit_waits_for_holder_minted_by_another_worker() {
    let fetcher = ScriptedFetcher::default()
        .body("nem-1", GEODE_ONLY)
        .body("gold-1", GEODE_ONLY);
    let h = harness_with_holders(fetcher, relaxed(), 2, |store| {
        Arc::new(FirstWriteHolders::new(store, Duration::from_millis(50), false)) as Arc<dyn HolderStore>
    });

    let summary = run(&h, vec![request("NEM", "nem-1"), request("GOLD", "gold-1")]).await;

    assert!(summary.is_fully_successful(), "{:?}", summary.failures);
    assert_eq!(summary.filings_committed, 2);
    assert_eq!(h.store.current_facts(&CompanyId::new("NEM")).unwrap().len(), 1);
    assert_eq!(h.store.current_facts(&CompanyId::new("GOLD")).unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_holder_write_is_retried_by_next_filing() {
    let fetcher = ScriptedFetcher::default()
        .body("nem-1", GEODE_ONLY)
        .body("gold-1", GEODE_ONLY);
    let h = harness_with_holders(fetcher, relaxed(), 1, |store| {
        Arc::new(FirstWriteHolders::new(store, Duration::from_millis(1), true)) as Arc<dyn HolderStore>
    });

    let summary = run(&h, vec![request("NEM", "nem-1"), request("GOLD", "gold-1")]).await;

    assert_eq!(summary.store_failures, 1);
    assert_eq!(summary.filings_committed, 1);
    assert!(!summary.is_fully_successful());

    let geode = HolderId::for_canonical_name("Geode Capital Management");
    assert!(h.store.get_holder(&geode).unwrap().is_some());
    assert!(h.store.current_facts(&CompanyId::new("NEM")).unwrap().is_empty());
    assert_eq!(h.store.current_facts(&CompanyId::new("GOLD")).unwrap().len(), 1);
}
