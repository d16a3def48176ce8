use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::stream::{self, StreamExt};
use serde_json::json;
use tokio::sync::Mutex;

use super::*;
use crate::config::RetryConfig;
use crate::event::{org, Aggregate, Event, EventFilter};
use crate::handler::{MultiStatement, MultiTableCheck};
use crate::projections::idp_template;
use crate::store;

// ============================================================================
// Fixtures
// ============================================================================

/// Store that records what the runtime asks of it.
#[derive(Default)]
struct FakeStore {
    applied: Mutex<Vec<(u64, String, u64)>>,
    checkpoints: Mutex<HashMap<String, u64>>,
    transient_failures: AtomicUsize,
    fail_schema: bool,
}

impl FakeStore {
    fn failing_transiently(times: usize) -> Self {
        Self {
            transient_failures: AtomicUsize::new(times),
            ..Default::default()
        }
    }

    async fn applied(&self) -> Vec<(u64, String, u64)> {
        self.applied.lock().await.clone()
    }

    async fn checkpoint(&self, projection: &str) -> u64 {
        self.checkpoints
            .lock()
            .await
            .get(projection)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ProjectionStore for FakeStore {
    async fn ensure_schema(&self, check: &MultiTableCheck) -> store::Result<()> {
        if self.fail_schema {
            return Err(StoreError::SchemaConflict {
                table: check.base_table.to_string(),
                reason: "column state is NULL, declared NOT NULL".to_string(),
            });
        }
        Ok(())
    }

    async fn load_checkpoint(&self, projection: &str) -> store::Result<Checkpoint> {
        Ok(Checkpoint::new(projection, self.checkpoint(projection).await))
    }

    async fn apply(
        &self,
        _base_table: &str,
        multi: &MultiStatement,
        checkpoint: &Checkpoint,
    ) -> store::Result<()> {
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Transient(sqlx::Error::PoolTimedOut));
        }

        self.applied.lock().await.push((
            multi.position,
            multi.aggregate_id.clone(),
            multi.sequence,
        ));
        self.checkpoints
            .lock()
            .await
            .insert(checkpoint.projection.clone(), checkpoint.position);
        Ok(())
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> store::Result<()> {
        self.checkpoints
            .lock()
            .await
            .insert(checkpoint.projection.clone(), checkpoint.position);
        Ok(())
    }

    async fn reset(&self, _check: &MultiTableCheck, projection: &str) -> store::Result<()> {
        self.applied.lock().await.clear();
        self.checkpoints.lock().await.remove(projection);
        Ok(())
    }
}

/// Log that ignores the filter, as a log without server-side filtering would.
struct UnfilteredLog(Vec<Event>);

#[async_trait]
impl EventLog for UnfilteredLog {
    async fn fetch_since(
        &self,
        _filter: &EventFilter,
        position: u64,
        limit: usize,
    ) -> Result<EventStream, EventLogError> {
        let batch: Vec<_> = self
            .0
            .iter()
            .filter(|e| e.position > position)
            .take(limit)
            .cloned()
            .map(Ok)
            .collect();
        Ok(stream::iter(batch).boxed())
    }
}

fn test_config() -> RuntimeConfig {
    RuntimeConfig {
        batch_size: 2,
        poll_interval_ms: 20,
        lease_retry_ms: 10,
        retry: RetryConfig {
            min_delay_ms: 1,
            max_delay_ms: 5,
            max_times: 5,
        },
    }
}

fn event(aggregate_id: &str, event_type: &str, sequence: u64, position: u64, payload: serde_json::Value) -> Event {
    Event {
        aggregate: Aggregate::new(org::AGGREGATE_TYPE, aggregate_id, "inst-1", aggregate_id),
        event_type: event_type.to_string(),
        sequence,
        position,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
            + chrono::Duration::seconds(position as i64),
        payload,
    }
}

fn idp_removed(aggregate_id: &str, idp: &str, sequence: u64, position: u64) -> Event {
    event(aggregate_id, org::IDP_REMOVED, sequence, position, json!({ "id": idp }))
}

fn runtime(store: Arc<FakeStore>, log: Arc<dyn EventLog>) -> ProjectionRuntime {
    ProjectionRuntime::new(
        idp_template::projection().unwrap(),
        store,
        log,
        Arc::new(LocalLeaseProvider::new()),
        test_config(),
    )
}

async fn wait(handle: &RuntimeHandle, position: u64) {
    let reached = tokio::time::timeout(Duration::from_secs(5), handle.wait_for_position(position))
        .await
        .expect("timed out waiting for position");
    assert!(reached, "runtime stopped before position {position}");
}

// ============================================================================
// Catch-up
// ============================================================================

#[tokio::test]
async fn test_catch_up_applies_in_log_order() {
    let log = Arc::new(InMemoryEventLog::new());
    log.append_all([
        idp_removed("org-a", "idp1", 1, 1),
        idp_removed("org-b", "idp2", 1, 2),
        idp_removed("org-a", "idp3", 2, 3),
        idp_removed("org-a", "idp4", 3, 4),
        idp_removed("org-b", "idp5", 2, 5),
    ])
    .await
    .unwrap();
    let store = Arc::new(FakeStore::default());

    let handle = runtime(store.clone(), log).spawn();
    wait(&handle, 5).await;
    handle.stop();
    handle.join().await.unwrap();

    let applied = store.applied().await;
    let positions: Vec<u64> = applied.iter().map(|(p, _, _)| *p).collect();
    assert_eq!(positions, vec![1, 2, 3, 4, 5]);

    let org_a: Vec<u64> = applied
        .iter()
        .filter(|(_, agg, _)| agg == "org-a")
        .map(|(_, _, seq)| *seq)
        .collect();
    assert_eq!(org_a, vec![1, 2, 3]);
    assert_eq!(store.checkpoint(idp_template::TABLE).await, 5);
}

#[tokio::test]
async fn test_catch_up_resumes_after_checkpoint() {
    let log = Arc::new(InMemoryEventLog::new());
    log.append_all([
        idp_removed("org-a", "idp1", 1, 1),
        idp_removed("org-a", "idp2", 2, 2),
        idp_removed("org-a", "idp3", 3, 3),
    ])
    .await
    .unwrap();
    let store = Arc::new(FakeStore::default());
    store
        .checkpoints
        .lock()
        .await
        .insert(idp_template::TABLE.to_string(), 2);

    let handle = runtime(store.clone(), log).spawn();
    wait(&handle, 3).await;
    handle.stop();
    handle.join().await.unwrap();

    let positions: Vec<u64> = store.applied().await.iter().map(|(p, _, _)| *p).collect();
    assert_eq!(positions, vec![3]);
}

#[tokio::test]
async fn test_trigger_picks_up_new_events() {
    let log = Arc::new(InMemoryEventLog::new());
    log.append(idp_removed("org-a", "idp1", 1, 1)).await.unwrap();
    let store = Arc::new(FakeStore::default());

    let handle = runtime(store.clone(), log.clone()).spawn();
    wait(&handle, 1).await;

    log.append(idp_removed("org-a", "idp2", 2, 2)).await.unwrap();
    handle.trigger();
    wait(&handle, 2).await;

    handle.stop();
    handle.join().await.unwrap();
    assert_eq!(store.applied().await.len(), 2);
}

#[tokio::test]
async fn test_unregistered_events_advance_checkpoint_without_statements() {
    let unrelated = Event {
        aggregate: Aggregate::new("user", "user-1", "inst-1", "org-a"),
        ..event("user-1", "user.added", 1, 2, json!({}))
    };
    let log = Arc::new(UnfilteredLog(vec![
        idp_removed("org-a", "idp1", 1, 1),
        unrelated,
    ]));
    let store = Arc::new(FakeStore::default());

    let handle = runtime(store.clone(), log).spawn();
    wait(&handle, 2).await;
    handle.stop();
    handle.join().await.unwrap();

    assert_eq!(store.applied().await.len(), 1);
    assert_eq!(store.checkpoint(idp_template::TABLE).await, 2);
}

#[tokio::test]
async fn test_transient_store_errors_are_retried() {
    let log = Arc::new(InMemoryEventLog::new());
    log.append(idp_removed("org-a", "idp1", 1, 1)).await.unwrap();
    let store = Arc::new(FakeStore::failing_transiently(3));

    let handle = runtime(store.clone(), log).spawn();
    wait(&handle, 1).await;
    handle.stop();
    handle.join().await.unwrap();

    assert_eq!(store.applied().await.len(), 1);
}

// ============================================================================
// Fatal halts
// ============================================================================

#[tokio::test]
async fn test_malformed_payload_halts_without_skipping() {
    let log = Arc::new(InMemoryEventLog::new());
    log.append_all([
        idp_removed("org-a", "idp1", 1, 1),
        event("org-a", org::IDP_REMOVED, 2, 2, json!({ "id": 42 })),
        idp_removed("org-a", "idp3", 3, 3),
    ])
    .await
    .unwrap();
    let store = Arc::new(FakeStore::default());

    let handle = runtime(store.clone(), log).spawn();
    let state = handle.state();
    let err = handle.join().await.unwrap_err();

    let stopped = state.borrow().clone();
    match stopped {
        RuntimeState::Stopped { error: Some(message) } => {
            assert!(message.contains(org::IDP_REMOVED), "{message}");
        }
        other => panic!("unexpected state: {other:?}"),
    }
    assert!(matches!(err, RuntimeError::Reduce(ReduceError::MalformedPayload { .. })));
    assert!(err.is_fatal());
    assert_eq!(store.applied().await.len(), 1);
    assert_eq!(store.checkpoint(idp_template::TABLE).await, 1);
}

#[tokio::test]
async fn test_schema_conflict_stops_before_catch_up() {
    let log = Arc::new(InMemoryEventLog::new());
    log.append(idp_removed("org-a", "idp1", 1, 1)).await.unwrap();
    let store = Arc::new(FakeStore {
        fail_schema: true,
        ..Default::default()
    });

    let handle = runtime(store.clone(), log).spawn();
    let err = handle.join().await.unwrap_err();

    assert!(matches!(err, RuntimeError::Store(StoreError::SchemaConflict { .. })));
    assert!(store.applied().await.is_empty());
}

// ============================================================================
// Lease and cancellation
// ============================================================================

#[tokio::test]
async fn test_second_writer_waits_for_lease() {
    let log = Arc::new(InMemoryEventLog::new());
    log.append(idp_removed("org-a", "idp1", 1, 1)).await.unwrap();
    let store = Arc::new(FakeStore::default());
    let leases = Arc::new(LocalLeaseProvider::new());
    let held = leases
        .try_acquire(idp_template::TABLE)
        .await
        .unwrap()
        .unwrap();

    let handle = ProjectionRuntime::new(
        idp_template::projection().unwrap(),
        store,
        log,
        leases,
        test_config(),
    )
    .spawn();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*handle.state().borrow(), RuntimeState::Idle);

    assert_eq!(handle.position(), 0);

    drop(held);
    wait(&handle, 1).await;

    handle.stop();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn test_stop_while_idle_is_clean() {
    let log = Arc::new(InMemoryEventLog::new());
    let store = Arc::new(FakeStore::default());

    let handle = runtime(store, log).spawn();
    handle.stop();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn test_local_lease_is_exclusive_per_projection() {
    let leases = LocalLeaseProvider::new();

    let first = leases.try_acquire("a").await.unwrap();
    assert!(first.is_some());
    assert!(leases.try_acquire("a").await.unwrap().is_none());
    assert!(leases.try_acquire("b").await.unwrap().is_some());

    drop(first);
    let again = leases.try_acquire("a").await.unwrap().unwrap();
    assert_eq!(again.projection(), "a");
}

// ============================================================================
// Event log
// ============================================================================

#[tokio::test]
async fn test_in_memory_log_rejects_reordered_sequence() {
    let log = InMemoryEventLog::new();
    log.append(idp_removed("org-a", "idp1", 2, 1)).await.unwrap();

    let err = log.append(idp_removed("org-a", "idp2", 2, 2)).await.unwrap_err();
    assert!(matches!(err, EventLogError::SequenceOutOfOrder { sequence: 2, last: 2, .. }));

    // other aggregates have their own sequence
    log.append(idp_removed("org-b", "idp3", 1, 3)).await.unwrap();
}

#[tokio::test]
async fn test_in_memory_log_rejects_position_regression() {
    let log = InMemoryEventLog::new();
    log.append(idp_removed("org-a", "idp1", 1, 5)).await.unwrap();

    let err = log.append(idp_removed("org-b", "idp2", 1, 5)).await.unwrap_err();
    assert!(matches!(err, EventLogError::PositionOutOfOrder { position: 5, last: 5 }));
    assert_eq!(log.head().await, 5);
}

#[tokio::test]
async fn test_in_memory_log_fetch_since_filters_and_limits() {
    let log = InMemoryEventLog::new();
    log.append_all([
        idp_removed("org-a", "idp1", 1, 1),
        event("org-a", "org.member.added", 2, 2, json!({})),
        idp_removed("org-a", "idp3", 3, 3),
        idp_removed("org-a", "idp4", 4, 4),
    ])
    .await
    .unwrap();
    let filter = idp_template::projection().unwrap().reducers.filter();

    let events: Vec<Event> = log
        .fetch_since(&filter, 1, 2)
        .await
        .unwrap()
        .map(|e| e.unwrap())
        .collect()
        .await;

    let positions: Vec<u64> = events.iter().map(|e| e.position).collect();
    assert_eq!(positions, vec![3, 4]);
}

#[test]
fn test_runtime_error_classification() {
    assert!(!RuntimeError::Cancelled.is_fatal());
    assert!(RuntimeError::Store(StoreError::Transient(sqlx::Error::PoolTimedOut)).is_transient());
    assert!(!RuntimeError::Store(StoreError::Transient(sqlx::Error::PoolTimedOut)).is_fatal());
    assert!(RuntimeError::EventLog(EventLogError::Unavailable("down".into())).is_transient());
    assert!(RuntimeError::Store(StoreError::SchemaConflict {
        table: "t".into(),
        reason: "r".into(),
    })
    .is_fatal());
}
