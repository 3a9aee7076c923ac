//! Ingest pipeline.
//!
//! Worker tasks pull filing requests from a shared queue. Each request is
//! admitted by the governor, fetched (with bounded retries), parsed, cleaned,
//! resolved to canonical holders, aggregated and committed. Every holder a
//! filing references is persisted, in its current directory form, before the
//! filing's facts are committed.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, error, info, warn};

use super::adapter::{AdapterRegistry, RawOwnershipTuple};
use super::errors::{IngestError, RecoveryClass};
use super::fetcher::{FetchError, FilingBlob, FilingFetcher, FilingRequest};
use super::retry::RetryPolicy;
use super::rows::{aggregate_positions, clean_rows, RowReport};
use super::summary::{FilingFailure, RunSummary, RunTermination};
use crate::clock::Clock;
use crate::constants::DEFAULT_WORKER_COUNT;
use crate::errors::{Error, Result};
use crate::events::{DomainEvent, DomainEventSink};
use crate::governor::{GovernorError, RequestGovernor};
use crate::holders::{CanonicalHolder, HolderId, HolderStore};
use crate::ownership::{CommitReport, OwnershipService};
use crate::resolver::EntityResolver;
use crate::shutdown::{StopHandle, StopSignal};

/// Everything a committed filing produced.
#[derive(Debug, Default)]
struct FilingOutcome {
    commit: CommitReport,
    rows: RowReport,
    fetch_retries: usize,
}

/// Per-filing failure together with the retries spent before it.
struct FilingError {
    error: Error,
    fetch_retries: usize,
}

impl From<Error> for FilingError {
    fn from(error: Error) -> Self {
        Self {
            error,
            fetch_retries: 0,
        }
    }
}

impl From<IngestError> for FilingError {
    fn from(error: IngestError) -> Self {
        Error::from(error).into()
    }
}

/// Fatal outcome seen by a worker, kept for the run's termination.
#[derive(Default)]
struct FatalState {
    quota_resets_at: Option<DateTime<Utc>>,
    reason: Option<String>,
}

pub struct IngestPipeline {
    governor: Arc<RequestGovernor>,
    fetcher: Arc<dyn FilingFetcher>,
    adapters: AdapterRegistry,
    resolver: Arc<EntityResolver>,
    holders: Arc<dyn HolderStore>,
    /// Holders as this pipeline last wrote them to `holders`.
    persisted: DashMap<HolderId, CanonicalHolder>,
    ownership: Arc<OwnershipService>,
    event_sink: Arc<dyn DomainEventSink>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    workers: usize,
}

impl IngestPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        governor: Arc<RequestGovernor>,
        fetcher: Arc<dyn FilingFetcher>,
        adapters: AdapterRegistry,
        resolver: Arc<EntityResolver>,
        holders: Arc<dyn HolderStore>,
        ownership: Arc<OwnershipService>,
        event_sink: Arc<dyn DomainEventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            governor,
            fetcher,
            adapters,
            resolver,
            holders,
            persisted: DashMap::new(),
            ownership,
            event_sink,
            clock,
            retry: RetryPolicy::default(),
            workers: DEFAULT_WORKER_COUNT,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Ingest every request, stopping early on quota exhaustion, a fatal
    /// error, or when `stop` is triggered by the caller.
    pub async fn run(
        self: Arc<Self>,
        requests: Vec<FilingRequest>,
        stop: Arc<StopHandle>,
    ) -> RunSummary {
        let started_at = self.clock.now();
        let requested = requests.len();
        let candidates_before = self.resolver.curation_candidates().len();
        info!("Ingesting {} filings with {} workers", requested, self.workers);

        let queue = Arc::new(Mutex::new(VecDeque::from(requests)));
        let fatal = Arc::new(Mutex::new(FatalState::default()));

        let handles: Vec<_> = (0..self.workers.min(requested.max(1)))
            .map(|worker_id| {
                let pipeline = Arc::clone(&self);
                let queue = Arc::clone(&queue);
                let fatal = Arc::clone(&fatal);
                let stop = Arc::clone(&stop);
                tokio::spawn(async move { pipeline.work(worker_id, queue, fatal, stop).await })
            })
            .collect();

        let mut summary = RunSummary::new(started_at, requested);
        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok(tally) => summary.absorb(tally),
                Err(e) => {
                    error!("Ingest worker panicked: {}", e);
                    lock(&fatal).reason = Some(format!("worker panicked: {}", e));
                }
            }
        }

        summary.curation_candidates = self
            .resolver
            .curation_candidates()
            .into_iter()
            .skip(candidates_before)
            .collect();

        let fatal = lock(&fatal);
        summary.termination = if let Some(resets_at) = fatal.quota_resets_at {
            RunTermination::QuotaExhausted { resets_at }
        } else if let Some(reason) = &fatal.reason {
            RunTermination::Failed {
                reason: reason.clone(),
            }
        } else if stop.is_triggered() && (summary.cancelled > 0 || summary.not_started() > 0) {
            RunTermination::Cancelled
        } else {
            RunTermination::Completed
        };
        summary.finished_at = self.clock.now();

        info!(
            "Ingest finished ({:?}): {}/{} committed, {} skipped, {} candidates, {} unresolved conflicts",
            summary.termination,
            summary.filings_committed,
            summary.filings_requested,
            summary.skipped(),
            summary.curation_candidates.len(),
            summary.unresolved_conflicts
        );
        summary
    }

    async fn work(
        &self,
        worker_id: usize,
        queue: Arc<Mutex<VecDeque<FilingRequest>>>,
        fatal: Arc<Mutex<FatalState>>,
        stop: Arc<StopHandle>,
    ) -> RunSummary {
        let signal = stop.signal();
        let mut tally = RunSummary::new(self.clock.now(), 0);

        loop {
            if signal.is_stopped() {
                debug!("Worker {} stopping", worker_id);
                break;
            }
            let Some(request) = lock(&queue).pop_front() else {
                break;
            };
            tally.filings_attempted += 1;

            match self.process(&request, &signal).await {
                Ok(outcome) => {
                    tally.filings_committed += 1;
                    tally.facts_inserted += outcome.commit.inserted;
                    tally.facts_updated += outcome.commit.updated;
                    tally.facts_unchanged += outcome.commit.unchanged;
                    tally.conflicts_retried += outcome.commit.conflicts_retried;
                    tally.rows_dropped += outcome.rows.dropped_blank + outcome.rows.dropped_total;
                    tally.percents_nulled += outcome.rows.nulled_percent;
                    tally.fetch_retries += outcome.fetch_retries;
                }
                Err(failure) => {
                    tally.fetch_retries += failure.fetch_retries;
                    self.record_failure(&request, failure.error, &mut tally, &fatal, &stop);
                }
            }
        }

        tally
    }

    fn record_failure(
        &self,
        request: &FilingRequest,
        error: Error,
        tally: &mut RunSummary,
        fatal: &Mutex<FatalState>,
        stop: &StopHandle,
    ) {
        let class = classify(&error);
        match (&error, class) {
            (Error::Ingest(IngestError::Parse { .. }), _) => {
                warn!("Skipping {}: {}", request.filing_id, error);
                tally.parse_skips += 1;
            }
            (Error::Ingest(IngestError::TransientFetch { .. }), _)
            | (Error::Ingest(IngestError::PermanentFetch { .. }), _) => {
                warn!("Skipping {}: {}", request.filing_id, error);
                tally.fetch_failures += 1;
            }
            (Error::Ingest(IngestError::StoreConflict { .. }), _) => {
                error!("Unresolved store conflict on {}: {}", request.filing_id, error);
                tally.unresolved_conflicts += 1;
            }
            (Error::Ingest(IngestError::Cancelled), _) => {
                info!("Abandoned {} on stop", request.filing_id);
                tally.cancelled += 1;
            }
            (Error::Ingest(IngestError::QuotaExhausted { resets_at }), _) => {
                error!(
                    "Daily quota exhausted while fetching {}; stopping run until {}",
                    request.filing_id, resets_at
                );
                lock(fatal).quota_resets_at.get_or_insert(*resets_at);
                stop.trigger();
            }
            (_, RecoveryClass::Fatal) => {
                error!("Fatal error on {}: {}", request.filing_id, error);
                lock(fatal).reason.get_or_insert_with(|| error.to_string());
                stop.trigger();
            }
            _ => {
                error!("Failed to store {}: {}", request.filing_id, error);
                tally.store_failures += 1;
            }
        }

        tally.failures.push(FilingFailure {
            company_id: request.company_id.clone(),
            filing_id: request.filing_id.clone(),
            error: error.to_string(),
            class,
        });
    }

    async fn process(
        &self,
        request: &FilingRequest,
        stop: &StopSignal,
    ) -> std::result::Result<FilingOutcome, FilingError> {
        let (blob, fetch_retries) = self.fetch_with_retry(request, stop).await?;
        let with_retries = |error: Error| FilingError {
            error,
            fetch_retries,
        };

        let rows = self
            .adapters
            .parse(&blob, &request.filing_type)
            .map_err(|e| {
                with_retries(
                    IngestError::Parse {
                        filing_id: request.filing_id.to_string(),
                        message: e.to_string(),
                    }
                    .into(),
                )
            })?;
        let (rows, row_report) = clean_rows(&request.filing_id, rows);

        let resolved = self.resolve_rows(rows).await.map_err(with_retries)?;

        let facts = aggregate_positions(
            &request.company_id,
            &request.filing_id,
            &request.filing_type,
            resolved,
        );

        let commit = self
            .ownership
            .commit_filing(&request.company_id, &request.filing_id, &facts)
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    with_retries(
                        IngestError::StoreConflict {
                            company_id: request.company_id.to_string(),
                            message: e.to_string(),
                        }
                        .into(),
                    )
                } else {
                    with_retries(e)
                }
            })?;

        Ok(FilingOutcome {
            commit,
            rows: row_report,
            fetch_retries,
        })
    }

    /// Fetch a filing, re-admitting through the governor before every try.
    async fn fetch_with_retry(
        &self,
        request: &FilingRequest,
        stop: &StopSignal,
    ) -> std::result::Result<(FilingBlob, usize), FilingError> {
        let mut retries = 0u32;
        loop {
            let fail = |error: Error| FilingError {
                error,
                fetch_retries: retries as usize,
            };

            self.governor
                .acquire(&request.endpoint, stop)
                .await
                .map_err(|e| fail(governor_error(e)))?;

            match self.fetcher.fetch(request).await {
                Ok(blob) => return Ok((blob, retries as usize)),
                Err(FetchError::Transient(message)) if self.retry.should_retry(retries) => {
                    let delay = self.retry.backoff(retries);
                    warn!(
                        "Transient failure fetching {} (retry {} in {:?}): {}",
                        request.filing_id,
                        retries + 1,
                        delay,
                        message
                    );
                    if !stop.sleep(delay).await {
                        return Err(fail(IngestError::Cancelled.into()));
                    }
                    retries += 1;
                }
                Err(FetchError::Transient(message)) => {
                    return Err(fail(
                        IngestError::TransientFetch {
                            filing_id: request.filing_id.to_string(),
                            message,
                        }
                        .into(),
                    ));
                }
                Err(FetchError::Permanent(message)) => {
                    return Err(fail(
                        IngestError::PermanentFetch {
                            filing_id: request.filing_id.to_string(),
                            message,
                        }
                        .into(),
                    ));
                }
            }
        }
    }

    /// Resolve every row and persist the holders they reference.
    async fn resolve_rows(
        &self,
        rows: Vec<RawOwnershipTuple>,
    ) -> Result<Vec<(HolderId, RawOwnershipTuple)>> {
        let mut resolved = Vec::with_capacity(rows.len());
        let mut referenced: BTreeSet<HolderId> = BTreeSet::new();

        for row in rows {
            let resolution = self.resolver.resolve(&row.holder_name)?;
            if let Some(candidate) = &resolution.candidate {
                self.event_sink.emit(DomainEvent::ambiguous_holder(
                    candidate.holder_id.clone(),
                    candidate.similar_holder_id.clone(),
                    candidate.score,
                ));
            }
            referenced.insert(resolution.holder.holder_id.clone());
            resolved.push((resolution.holder.holder_id, row));
        }

        self.persist_holders(referenced).await?;
        Ok(resolved)
    }

    /// Write each holder whose directory entry differs from what this
    /// pipeline last stored.
    ///
    /// Seeded holders and holders minted by another worker arrive with
    /// `changed == false`, so the flag is not consulted. A holder counts as
    /// persisted only once its own upsert has returned.
    async fn persist_holders(&self, holder_ids: BTreeSet<HolderId>) -> Result<()> {
        let mut written = Vec::new();
        for holder_id in holder_ids {
            let holder = self.resolver.holder(&holder_id).ok_or_else(|| {
                Error::Unexpected(format!("Resolved holder {} is not in the directory", holder_id))
            })?;
            let current = self
                .persisted
                .get(&holder_id)
                .map(|stored| *stored == holder)
                .unwrap_or(false);
            if current {
                continue;
            }

            self.holders.upsert_holder(&holder).await?;
            self.persisted.insert(holder_id.clone(), holder);
            written.push(holder_id);
        }

        if !written.is_empty() {
            debug!("Persisted {} holders", written.len());
            self.event_sink.emit(DomainEvent::holders_changed(written));
        }
        Ok(())
    }
}

fn governor_error(error: GovernorError) -> Error {
    match error {
        GovernorError::QuotaExhausted { resets_at, .. } => {
            IngestError::QuotaExhausted { resets_at }.into()
        }
        GovernorError::Cancelled => IngestError::Cancelled.into(),
        other => other.into(),
    }
}

fn classify(error: &Error) -> RecoveryClass {
    match error {
        Error::Ingest(e) => e.recovery_class(),
        Error::Governor(_) => RecoveryClass::Fatal,
        e if e.is_conflict() => RecoveryClass::RetryOnce,
        _ => RecoveryClass::SkipAndLog,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("Ingest pipeline mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}
