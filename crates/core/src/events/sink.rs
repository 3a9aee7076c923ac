//! Where domain events go.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{info, warn};

use super::DomainEvent;

/// Receives events after the mutation they describe has been stored.
///
/// Called from ingest workers and commit hooks while they hold no store
/// locks. Implementations must return quickly and must not fail the caller;
/// a lost event never rolls back a commit.
pub trait DomainEventSink: Send + Sync {
    fn emit(&self, event: DomainEvent);

    fn emit_batch(&self, events: Vec<DomainEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

/// Drops every event.
#[derive(Clone, Default)]
pub struct NoOpDomainEventSink;

impl DomainEventSink for NoOpDomainEventSink {
    fn emit(&self, _event: DomainEvent) {}
}

/// Logs each event as one JSON line under the `stakeledger::events` target,
/// so a run's holder, commit and snapshot history can be grepped from logs.
#[derive(Clone, Default)]
pub struct LoggingDomainEventSink;

impl DomainEventSink for LoggingDomainEventSink {
    fn emit(&self, event: DomainEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => info!(target: "stakeledger::events", "{}", json),
            Err(e) => warn!("Failed to serialize domain event: {}", e),
        }
    }
}

/// Keeps events in memory for assertions.
#[derive(Clone, Default)]
pub struct MockDomainEventSink {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl MockDomainEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far, oldest first.
    pub fn events(&self) -> Vec<DomainEvent> {
        self.lock_events().clone()
    }

    pub fn clear(&self) {
        self.lock_events().clear();
    }

    pub fn len(&self) -> usize {
        self.lock_events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_events().is_empty()
    }

    fn lock_events(&self) -> MutexGuard<'_, Vec<DomainEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| {
            warn!("Event sink mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl DomainEventSink for MockDomainEventSink {
    fn emit(&self, event: DomainEvent) {
        self.lock_events().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holders::HolderId;

    #[test]
    fn test_mock_sink_keeps_emission_order() {
        let sink = MockDomainEventSink::new();
        assert!(sink.is_empty());
        sink.emit(DomainEvent::holders_changed(vec![HolderId::new("h_1")]));
        sink.emit_batch(vec![
            DomainEvent::holders_changed(vec![HolderId::new("h_2")]),
            DomainEvent::holders_changed(vec![HolderId::new("h_3")]),
        ]);
        assert_eq!(sink.len(), 3);

        let ids: Vec<HolderId> = sink
            .events()
            .into_iter()
            .flat_map(|e| match e {
                DomainEvent::HoldersChanged { holder_ids } => holder_ids,
                _ => Vec::new(),
            })
            .collect();
        assert_eq!(ids, vec![HolderId::new("h_1"), HolderId::new("h_2"), HolderId::new("h_3")]);

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_clones_share_one_buffer() {
        let sink = MockDomainEventSink::new();
        let handle = sink.clone();
        handle.emit(DomainEvent::holders_changed(vec![HolderId::new("h_1")]));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_noop_and_logging_sinks_accept_events() {
        NoOpDomainEventSink.emit(DomainEvent::holders_changed(Vec::new()));
        LoggingDomainEventSink.emit(DomainEvent::holders_changed(vec![HolderId::new("h_1")]));
    }
}
