//! Event log collaborator.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::RwLock;

use crate::event::{Event, EventFilter};

/// Errors reading from or appending to an event log.
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    #[error("Event log unavailable: {0}")]
    Unavailable(String),

    #[error(
        "Sequence {sequence} for aggregate {aggregate_id} in instance {instance_id} does not follow {last}"
    )]
    SequenceOutOfOrder {
        instance_id: String,
        aggregate_id: String,
        sequence: u64,
        last: u64,
    },

    #[error("Position {position} does not follow {last}")]
    PositionOutOfOrder { position: u64, last: u64 },
}

impl EventLogError {
    /// Whether retrying the same read may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, EventLogError::Unavailable(_))
    }
}

/// Lazily produced events, in increasing position order.
pub type EventStream = BoxStream<'static, Result<Event, EventLogError>>;

/// Source of events for projections.
///
/// `fetch_since` returns at most `limit` events with a position strictly
/// greater than `position`, ordered by position. Positions respect
/// per-aggregate sequence order, so reading in position order never
/// reorders one aggregate's events. Calls are restartable from any position.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn fetch_since(
        &self,
        filter: &EventFilter,
        position: u64,
        limit: usize,
    ) -> Result<EventStream, EventLogError>;
}

#[derive(Default)]
struct LogInner {
    events: Vec<Event>,
    last_sequence: HashMap<(String, String), u64>,
}

/// Event log held in memory.
///
/// Used for embedding and tests. Appends are validated the way a durable
/// log guarantees ordering: positions strictly increase across the log and
/// sequences strictly increase per aggregate.
#[derive(Default)]
pub struct InMemoryEventLog {
    inner: RwLock<LogInner>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, event: Event) -> Result<(), EventLogError> {
        let mut inner = self.inner.write().await;

        if let Some(last) = inner.events.last() {
            if event.position <= last.position {
                return Err(EventLogError::PositionOutOfOrder {
                    position: event.position,
                    last: last.position,
                });
            }
        }

        let key = (
            event.aggregate.instance_id.clone(),
            event.aggregate.id.clone(),
        );
        if let Some(&last) = inner.last_sequence.get(&key) {
            if event.sequence <= last {
                return Err(EventLogError::SequenceOutOfOrder {
                    instance_id: key.0,
                    aggregate_id: key.1,
                    sequence: event.sequence,
                    last,
                });
            }
        }

        inner.last_sequence.insert(key, event.sequence);
        inner.events.push(event);
        Ok(())
    }

    pub async fn append_all(
        &self,
        events: impl IntoIterator<Item = Event>,
    ) -> Result<(), EventLogError> {
        for event in events {
            self.append(event).await?;
        }
        Ok(())
    }

    /// Position of the newest event, 0 if empty.
    pub async fn head(&self) -> u64 {
        self.inner
            .read()
            .await
            .events
            .last()
            .map(|e| e.position)
            .unwrap_or(0)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.events.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn fetch_since(
        &self,
        filter: &EventFilter,
        position: u64,
        limit: usize,
    ) -> Result<EventStream, EventLogError> {
        let inner = self.inner.read().await;
        let start = inner.events.partition_point(|e| e.position <= position);
        let batch: Vec<Event> = inner.events[start..]
            .iter()
            .filter(|e| filter.matches(e))
            .take(limit)
            .cloned()
            .collect();

        Ok(stream::iter(batch.into_iter().map(Ok)).boxed())
    }
}
