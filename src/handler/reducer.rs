//! Reducer dispatch table.

use std::collections::HashMap;

use super::{MultiStatement, ReduceError};
use crate::event::{Event, EventFilter};

/// Pure function from one event to the statements it implies.
pub type ReduceFn = fn(&Event) -> Result<MultiStatement, ReduceError>;

/// Binds a reducer to one event type.
#[derive(Clone, Copy)]
pub struct EventReducer {
    pub event_type: &'static str,
    pub reduce: ReduceFn,
}

impl EventReducer {
    pub const fn new(event_type: &'static str, reduce: ReduceFn) -> Self {
        Self { event_type, reduce }
    }
}

/// All reducers registered for one aggregate type.
#[derive(Clone)]
pub struct AggregateReducer {
    pub aggregate_type: &'static str,
    pub reducers: Vec<EventReducer>,
}

/// Routes `(aggregate type, event type)` pairs to reducers.
///
/// Built once at projection construction. Each pair maps to at most one
/// reducer; registering a pair twice is a programming error and is rejected.
pub struct ReducerTable {
    reducers: HashMap<&'static str, HashMap<&'static str, ReduceFn>>,
}

impl ReducerTable {
    pub fn new(aggregates: Vec<AggregateReducer>) -> Result<Self, ReduceError> {
        let mut reducers: HashMap<&'static str, HashMap<&'static str, ReduceFn>> = HashMap::new();

        for aggregate in aggregates {
            let by_event = reducers.entry(aggregate.aggregate_type).or_default();
            for reducer in aggregate.reducers {
                if by_event.insert(reducer.event_type, reducer.reduce).is_some() {
                    return Err(ReduceError::DuplicateReducer {
                        aggregate_type: aggregate.aggregate_type,
                        event_type: reducer.event_type,
                    });
                }
            }
        }

        Ok(Self { reducers })
    }

    pub fn lookup(&self, aggregate_type: &str, event_type: &str) -> Option<ReduceFn> {
        self.reducers
            .get(aggregate_type)
            .and_then(|by_event| by_event.get(event_type))
            .copied()
    }

    /// Reduce `event`, or `Ok(None)` if no reducer is registered for it.
    ///
    /// Unregistered events belong to other projections sharing the same log
    /// and are not an error.
    ///
    /// Sequences are stored as BIGINT; a larger one fails here rather than
    /// in a reducer.
    pub fn reduce(&self, event: &Event) -> Result<Option<MultiStatement>, ReduceError> {
        let Some(reduce) = self.lookup(&event.aggregate.aggregate_type, &event.event_type) else {
            return Ok(None);
        };
        if i64::try_from(event.sequence).is_err() {
            return Err(ReduceError::SequenceOutOfRange {
                event_type: event.event_type.clone(),
                sequence: event.sequence,
            });
        }
        reduce(event).map(Some)
    }

    /// Filter covering every registered pair, sorted for stable output.
    pub fn filter(&self) -> EventFilter {
        let mut aggregate_types: Vec<String> =
            self.reducers.keys().map(|t| t.to_string()).collect();
        let mut event_types: Vec<String> = self
            .reducers
            .values()
            .flat_map(|by_event| by_event.keys().map(|t| t.to_string()))
            .collect();
        aggregate_types.sort();
        event_types.sort();
        event_types.dedup();

        EventFilter {
            aggregate_types,
            event_types,
        }
    }

    pub fn len(&self) -> usize {
        self.reducers.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ReducerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut pairs: Vec<(&str, &str)> = self
            .reducers
            .iter()
            .flat_map(|(aggregate, by_event)| by_event.keys().map(move |event| (*aggregate, *event)))
            .collect();
        pairs.sort();
        f.debug_struct("ReducerTable").field("reducers", &pairs).finish()
    }
}
