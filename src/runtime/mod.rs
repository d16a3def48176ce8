//! Checkpoint and catch-up runtime.
//!
//! Each projection runs on its own tokio task:
//!
//! 1. wait for the exclusive catch-up lease
//! 2. reconcile the schema (`Initializing`)
//! 3. load the durable checkpoint
//! 4. replay every event after the checkpoint (`CatchingUp`), committing each
//!    event's statements together with the advanced checkpoint
//! 5. wait for a trigger or the poll interval (`Idle`), then go to 4
//!
//! Reducer errors and fatal store errors halt the projection (`Stopped`).
//! Transient store errors are retried with backoff and never leave the task.

mod lease;
mod log;

use std::future::Future;
use std::sync::Arc;

use backon::Retryable;
use futures::StreamExt;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::RuntimeConfig;
use crate::event::EventFilter;
use crate::handler::{Projection, ReduceError};
use crate::store::{Checkpoint, ProjectionStore, StoreError};

pub use lease::{Lease, LeaseError, LeaseProvider, LocalLeaseProvider};
pub use log::{EventLog, EventLogError, EventStream, InMemoryEventLog};

/// Lifecycle of one projection's catch-up task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeState {
    /// Converged, or waiting for the lease.
    Idle,
    Initializing,
    CatchingUp,
    /// Terminal. `error` is set when the projection halted on a fatal error.
    Stopped { error: Option<String> },
}

impl RuntimeState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, RuntimeState::Stopped { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Reduce(#[from] ReduceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    EventLog(#[from] EventLogError),

    #[error(transparent)]
    Lease(#[from] LeaseError),

    #[error("Catch-up cancelled")]
    Cancelled,

    #[error("Runtime task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl RuntimeError {
    /// Errors worth another catch-up cycle without operator action.
    pub fn is_transient(&self) -> bool {
        match self {
            RuntimeError::Store(e) => e.is_transient(),
            RuntimeError::EventLog(e) => e.is_transient(),
            RuntimeError::Lease(_) => true,
            _ => false,
        }
    }

    /// Errors that halt the projection until an operator intervenes.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RuntimeError::Cancelled) && !self.is_transient()
    }
}

/// Resolves once cancellation is requested or the handle is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|stop| *stop).await;
}

/// Drives one projection from its checkpoint to the head of the log.
pub struct ProjectionRuntime {
    projection: Arc<Projection>,
    filter: EventFilter,
    store: Arc<dyn ProjectionStore>,
    log: Arc<dyn EventLog>,
    lease: Arc<dyn LeaseProvider>,
    config: RuntimeConfig,
}

/// Channels shared between a running task and its [`RuntimeHandle`].
struct Signals {
    state: watch::Sender<RuntimeState>,
    position: watch::Sender<u64>,
    trigger: Arc<Notify>,
    cancel: watch::Receiver<bool>,
}

impl Signals {
    fn transition(&self, projection: &str, state: RuntimeState) {
        if *self.state.borrow() != state {
            info!(projection, state = ?state, "Projection state changed");
        }
        self.state.send_replace(state);
    }
}

impl ProjectionRuntime {
    pub fn new(
        projection: Projection,
        store: Arc<dyn ProjectionStore>,
        log: Arc<dyn EventLog>,
        lease: Arc<dyn LeaseProvider>,
        config: RuntimeConfig,
    ) -> Self {
        let filter = projection.reducers.filter();
        Self {
            projection: Arc::new(projection),
            filter,
            store,
            log,
            lease,
            config,
        }
    }

    pub fn name(&self) -> &'static str {
        self.projection.name
    }

    /// Start the catch-up task.
    ///
    /// Returns a handle that can be used to observe, wake and stop it.
    pub fn spawn(self) -> RuntimeHandle {
        let (state_tx, state_rx) = watch::channel(RuntimeState::Idle);
        let (position_tx, position_rx) = watch::channel(0u64);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let trigger = Arc::new(Notify::new());
        let projection = self.name();

        let mut signals = Signals {
            state: state_tx,
            position: position_tx,
            trigger: trigger.clone(),
            cancel: cancel_rx,
        };

        let task = tokio::spawn(async move {
            let result = match self.run(&mut signals).await {
                Err(RuntimeError::Cancelled) => Ok(()),
                other => other,
            };

            let error = match &result {
                Ok(()) => None,
                Err(e) => {
                    error!(
                        projection,
                        position = *signals.position.borrow(),
                        error = %e,
                        "Projection halted"
                    );
                    Some(e.to_string())
                }
            };
            signals.transition(projection, RuntimeState::Stopped { error });
            result
        });

        RuntimeHandle {
            projection,
            state: state_rx,
            position: position_rx,
            trigger,
            cancel: cancel_tx,
            task,
        }
    }

    async fn run(&self, signals: &mut Signals) -> Result<(), RuntimeError> {
        let name = self.name();

        let _lease = self.acquire_lease(&mut signals.cancel).await?;
        info!(projection = name, "Catch-up lease acquired");

        signals.transition(name, RuntimeState::Initializing);
        let check = &self.projection.check;
        self.with_store_retry("ensure_schema", &mut signals.cancel, || {
            self.store.ensure_schema(check)
        })
        .await?;

        let mut checkpoint = self
            .with_store_retry("load_checkpoint", &mut signals.cancel, || {
                self.store.load_checkpoint(name)
            })
            .await?;
        signals.position.send_replace(checkpoint.position);
        info!(projection = name, position = checkpoint.position, "Checkpoint loaded");

        loop {
            signals.transition(name, RuntimeState::CatchingUp);
            match self.catch_up(&mut checkpoint, signals).await {
                Ok(()) => {}
                Err(e) if e.is_transient() => {
                    warn!(
                        projection = name,
                        position = checkpoint.position,
                        error = %e,
                        "Catch-up interrupted by transient error, retrying next cycle"
                    );
                }
                Err(e) => return Err(e),
            }

            signals.transition(name, RuntimeState::Idle);
            tokio::select! {
                _ = signals.trigger.notified() => {}
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
                _ = cancelled(&mut signals.cancel) => return Err(RuntimeError::Cancelled),
            }
        }
    }

    async fn acquire_lease(
        &self,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<Lease, RuntimeError> {
        loop {
            match self.lease.try_acquire(self.name()).await {
                Ok(Some(lease)) => return Ok(lease),
                Ok(None) => {
                    warn!(projection = self.name(), "Catch-up lease held by another writer");
                }
                Err(e) => {
                    warn!(projection = self.name(), error = %e, "Failed to acquire catch-up lease");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.lease_retry()) => {}
                _ = cancelled(cancel) => return Err(RuntimeError::Cancelled),
            }
        }
    }

    /// Apply every event after `checkpoint` until the log is exhausted.
    async fn catch_up(
        &self,
        checkpoint: &mut Checkpoint,
        signals: &mut Signals,
    ) -> Result<(), RuntimeError> {
        let name = self.name();
        let base_table = self.projection.base_table();
        let batch_size = self.config.batch_size.max(1);

        loop {
            let mut events = self
                .log
                .fetch_since(&self.filter, checkpoint.position, batch_size)
                .await?;

            let mut fetched = 0usize;
            let mut applied = 0usize;
            // Checkpoint advanced past events without statements but not yet saved.
            let mut unsaved = false;

            while let Some(event) = events.next().await {
                let event = event?;
                fetched += 1;

                if *signals.cancel.borrow() {
                    return Err(RuntimeError::Cancelled);
                }
                if event.position <= checkpoint.position {
                    continue;
                }

                let next = checkpoint.advanced_to(event.position);
                match self.projection.reducers.reduce(&event)? {
                    Some(multi) => {
                        self.with_store_retry("apply", &mut signals.cancel, || {
                            self.store.apply(base_table, &multi, &next)
                        })
                        .await?;
                        debug!(
                            projection = name,
                            position = event.position,
                            event_type = %event.event_type,
                            aggregate_id = %event.aggregate.id,
                            sequence = event.sequence,
                            statements = multi.statements.len(),
                            "Event applied"
                        );
                        applied += 1;
                        unsaved = false;
                        *checkpoint = next;
                        signals.position.send_replace(checkpoint.position);
                    }
                    None => {
                        unsaved = true;
                        *checkpoint = next;
                    }
                }
            }

            if unsaved {
                let saved = checkpoint.clone();
                self.with_store_retry("save_checkpoint", &mut signals.cancel, || {
                    self.store.save_checkpoint(&saved)
                })
                .await?;
                signals.position.send_replace(checkpoint.position);
            }

            if fetched > 0 {
                info!(
                    projection = name,
                    position = checkpoint.position,
                    fetched,
                    applied,
                    "Catch-up batch complete"
                );
            }

            if fetched < batch_size {
                return Ok(());
            }
        }
    }

    /// Run one store operation, retrying transient failures with backoff.
    ///
    /// Cancellation drops the in-flight attempt, which rolls back any open
    /// transaction.
    async fn with_store_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        cancel: &mut watch::Receiver<bool>,
        op: F,
    ) -> Result<T, RuntimeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let projection = self.name();
        let attempt = op
            .retry(self.config.retry.backoff())
            .when(StoreError::is_transient)
            .notify(|err: &StoreError, delay| {
                warn!(
                    projection,
                    operation,
                    error = %err,
                    retry_in = ?delay,
                    "Transient store error, retrying"
                );
            });

        tokio::select! {
            result = attempt => result.map_err(RuntimeError::from),
            _ = cancelled(cancel) => Err(RuntimeError::Cancelled),
        }
    }
}

/// Spawn one runtime per projection, sharing the collaborators.
pub fn spawn_all(
    projections: Vec<Projection>,
    store: Arc<dyn ProjectionStore>,
    log: Arc<dyn EventLog>,
    lease: Arc<dyn LeaseProvider>,
    config: &RuntimeConfig,
) -> Vec<RuntimeHandle> {
    projections
        .into_iter()
        .map(|projection| {
            ProjectionRuntime::new(
                projection,
                store.clone(),
                log.clone(),
                lease.clone(),
                config.clone(),
            )
            .spawn()
        })
        .collect()
}

/// Handle to a running catch-up task.
pub struct RuntimeHandle {
    projection: &'static str,
    state: watch::Receiver<RuntimeState>,
    position: watch::Receiver<u64>,
    trigger: Arc<Notify>,
    cancel: watch::Sender<bool>,
    task: JoinHandle<Result<(), RuntimeError>>,
}

impl RuntimeHandle {
    pub fn projection(&self) -> &'static str {
        self.projection
    }

    /// Watch the task's state.
    pub fn state(&self) -> watch::Receiver<RuntimeState> {
        self.state.clone()
    }

    /// Last position durably committed by the task.
    pub fn position(&self) -> u64 {
        *self.position.borrow()
    }

    /// Tell the task that new events exist.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Signal the task to stop. An in-flight transaction is rolled back.
    pub fn stop(&self) {
        self.cancel.send_replace(true);
    }

    /// Wait until the task has passed `target`.
    ///
    /// Returns `false` if the task stopped first.
    pub async fn wait_for_position(&self, target: u64) -> bool {
        let mut position = self.position.clone();
        let mut state = self.state.clone();

        loop {
            if *position.borrow_and_update() >= target {
                return true;
            }
            if state.borrow_and_update().is_stopped() {
                return false;
            }

            tokio::select! {
                changed = position.changed() => {
                    if changed.is_err() {
                        return *position.borrow() >= target;
                    }
                }
                changed = state.changed() => {
                    if changed.is_err() {
                        return *position.borrow() >= target;
                    }
                }
            }
        }
    }

    /// Wait until the task reaches `state`. Returns `false` if it stopped first.
    pub async fn wait_for_state(&self, target: RuntimeState) -> bool {
        let mut state = self.state.clone();
        state
            .wait_for(|s| *s == target || s.is_stopped())
            .await
            .map(|s| *s == target)
            .unwrap_or(false)
    }

    /// Wait for the task to finish. `Ok(())` after a requested stop.
    pub async fn join(self) -> Result<(), RuntimeError> {
        self.task.await?
    }
}

#[cfg(test)]
mod tests;
