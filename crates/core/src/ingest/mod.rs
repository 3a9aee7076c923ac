//! Filing ingestion.
//!
//! This module provides:
//! - Fetch and adapter interfaces for getting ownership rows out of filings
//! - The error taxonomy and its recovery classes
//! - Row cleaning and per-holder aggregation
//! - The worker pipeline and its end-of-run summary

mod adapter;
mod errors;
mod fetcher;
mod pipeline;
mod retry;
mod rows;
mod summary;

pub use adapter::{AdapterRegistry, FilingAdapter, JsonTupleAdapter, ParseError, RawOwnershipTuple};
pub use errors::{IngestError, RecoveryClass};
pub use fetcher::{FetchError, FilingBlob, FilingFetcher, FilingRequest};
pub use pipeline::IngestPipeline;
pub use retry::RetryPolicy;
pub use rows::{aggregate_positions, clean_rows, RowReport};
pub use summary::{FilingFailure, RunSummary, RunTermination};
