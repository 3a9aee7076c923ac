//! SQLite storage implementation for Stakeledger.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the store traits defined in `stakeledger-core` and contains:
//! - Database connection pooling and management
//! - Diesel migrations
//! - Repository implementations for holders, facts, snapshots and the request audit log
//! - Database-specific model types (with Diesel derives)
//!
//! # Architecture
//!
//! This crate is the only place in the workspace where Diesel dependencies exist.
//! `core` is database-agnostic and works with traits.
//!
//! ```text
//!        core (domain, pipeline)
//!                  │
//!                  ▼
//!          storage-sqlite (this crate)
//!                  │
//!                  ▼
//!              SQLite DB
//! ```

use std::sync::Arc;

pub mod audit;
pub mod concentration;
pub mod db;
pub mod errors;
pub mod holders;
pub mod ownership;
pub mod schema;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, init, open, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

pub use audit::AuditRepository;
pub use concentration::SnapshotRepository;
pub use holders::HolderRepository;
pub use ownership::OwnershipRepository;

// Re-export from stakeledger-core for convenience
pub use stakeledger_core::errors::{DatabaseError, Error, Result};

/// Every repository over one pool and one writer actor.
pub struct SqliteStores {
    pub holders: Arc<HolderRepository>,
    pub facts: Arc<OwnershipRepository>,
    pub snapshots: Arc<SnapshotRepository>,
    pub audit: Arc<AuditRepository>,
}

impl SqliteStores {
    /// Open (and migrate) the database at `db_path`. Must be called inside a
    /// tokio runtime, since it spawns the writer actor.
    pub fn open(db_path: &str) -> Result<Self> {
        let pool = db::open(db_path)?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: Arc<DbPool>) -> Self {
        let writer = spawn_writer((*pool).clone());
        Self {
            holders: Arc::new(HolderRepository::new(pool.clone(), writer.clone())),
            facts: Arc::new(OwnershipRepository::new(pool.clone(), writer.clone())),
            snapshots: Arc::new(SnapshotRepository::new(pool.clone(), writer)),
            audit: Arc::new(AuditRepository::new(pool)),
        }
    }
}
