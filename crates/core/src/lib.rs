//! Stakeledger Core - Ownership pipeline domain, services, and traits.
//!
//! This crate contains the request governor, entity resolver, ownership
//! store interfaces, concentration engine and ingest pipeline. It is
//! database-agnostic and defines traits that are implemented by the
//! `storage-sqlite` crate.

pub mod clock;
pub mod concentration;
pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod governor;
pub mod holders;
pub mod ingest;
pub mod memory;
pub mod ownership;
pub mod resolver;
pub mod shutdown;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
