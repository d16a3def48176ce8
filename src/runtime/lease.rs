//! Exclusive catch-up leases.
//!
//! At most one writer may advance a projection's checkpoint at a time. The
//! runtime consumes that discipline through [`LeaseProvider`]; how leases
//! are coordinated across processes is up to the provider.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum LeaseError {
    #[error("Lease backend unavailable: {0}")]
    Unavailable(String),
}

/// Held while a writer owns a projection. Released on drop.
pub struct Lease {
    projection: String,
    _guard: Box<dyn Any + Send + Sync>,
}

impl Lease {
    pub fn new(projection: impl Into<String>, guard: impl Any + Send + Sync) -> Self {
        Self {
            projection: projection.into(),
            _guard: Box::new(guard),
        }
    }

    pub fn projection(&self) -> &str {
        &self.projection
    }
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("projection", &self.projection)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait LeaseProvider: Send + Sync {
    /// Acquire the lease for `projection`, or `None` if another writer
    /// holds it. Never blocks waiting for the holder.
    async fn try_acquire(&self, projection: &str) -> Result<Option<Lease>, LeaseError>;
}

/// In-process leases, one per projection name.
#[derive(Default)]
pub struct LocalLeaseProvider {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LocalLeaseProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseProvider for LocalLeaseProvider {
    async fn try_acquire(&self, projection: &str) -> Result<Option<Lease>, LeaseError> {
        let lock = self
            .locks
            .lock()
            .await
            .entry(projection.to_string())
            .or_default()
            .clone();

        Ok(lock
            .try_lock_owned()
            .ok()
            .map(|guard| Lease::new(projection, guard)))
    }
}
