//! Relational store for projected tables.
//!
//! The store owns schema reconciliation, the atomic application of a
//! [`MultiStatement`] together with its checkpoint, and the read queries
//! exposed to callers. Backends share one implementation parameterized by
//! [`SqlDatabase`].

mod error;
pub mod query;
pub mod schema;
mod sql;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{StorageConfig, StorageType};
use crate::handler::{MultiStatement, MultiTableCheck};

pub use error::{is_transient, Result, StoreError};
pub use query::{IdpTemplate, IdpTemplateDetails, IdpTemplateQueries};
pub use sql::{render_statement, SqlDatabase, SqlProjectionStore};

#[cfg(feature = "postgres")]
pub use sql::postgres::{Postgres, PostgresProjectionStore};
#[cfg(feature = "sqlite")]
pub use sql::sqlite::{Sqlite, SqliteProjectionStore};

/// Last applied log position of one projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub projection: String,
    pub position: u64,
}

impl Checkpoint {
    pub fn new(projection: impl Into<String>, position: u64) -> Self {
        Self {
            projection: projection.into(),
            position,
        }
    }

    /// Checkpoint after applying the event at `position`.
    pub fn advanced_to(&self, position: u64) -> Self {
        Self::new(self.projection.clone(), position)
    }
}

/// Interface for the relational store behind projections.
///
/// Implementations:
/// - `SqliteProjectionStore`: SQLite storage (default feature)
/// - `PostgresProjectionStore`: PostgreSQL storage
#[async_trait]
pub trait ProjectionStore: Send + Sync {
    /// Create or migrate the declared tables and the checkpoint table.
    ///
    /// Fails with [`StoreError::SchemaConflict`] if an existing table cannot
    /// be reconciled with its declaration.
    async fn ensure_schema(&self, check: &MultiTableCheck) -> Result<()>;

    /// Durable checkpoint, position 0 if the projection never ran.
    async fn load_checkpoint(&self, projection: &str) -> Result<Checkpoint>;

    /// Apply every statement in order and persist `checkpoint`, all in one
    /// transaction. Nothing is visible unless everything succeeds.
    async fn apply(
        &self,
        base_table: &str,
        multi: &MultiStatement,
        checkpoint: &Checkpoint,
    ) -> Result<()>;

    /// Advance the checkpoint past events that produced no statements.
    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Delete every projected row and the checkpoint, so the next run
    /// replays from the start of the log.
    async fn reset(&self, check: &MultiTableCheck, projection: &str) -> Result<()>;
}

/// Connect the store selected by configuration.
pub async fn init_store(config: &StorageConfig) -> Result<Arc<dyn ProjectionStore>> {
    match config.storage_type {
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            let store = SqliteProjectionStore::connect(&config.sqlite).await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "postgres")]
        StorageType::Postgres => {
            let store = PostgresProjectionStore::connect(&config.postgres).await?;
            Ok(Arc::new(store))
        }
        #[allow(unreachable_patterns)]
        ref other => Err(StoreError::Unsupported(format!("{other:?}"))),
    }
}
