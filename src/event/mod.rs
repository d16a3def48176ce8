//! Event and aggregate model.
//!
//! An [`Event`] is an immutable fact read from the event log. Its payload is
//! kept as raw JSON until a reducer decodes it into the typed shape expected
//! for its event-type tag (see [`idp`]).

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::OwnerType;
use crate::handler::ReduceError;

pub mod idp;
pub mod instance;
pub mod org;

/// The stream an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Aggregate {
    /// Aggregate type, e.g. [`org::AGGREGATE_TYPE`].
    pub aggregate_type: String,
    pub id: String,
    pub instance_id: String,
    pub resource_owner: String,
}

impl Aggregate {
    pub fn new(
        aggregate_type: impl Into<String>,
        id: impl Into<String>,
        instance_id: impl Into<String>,
        resource_owner: impl Into<String>,
    ) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            id: id.into(),
            instance_id: instance_id.into(),
            resource_owner: resource_owner.into(),
        }
    }
}

/// An immutable event as stored in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub aggregate: Aggregate,
    /// Wire event-type tag, e.g. [`org::OAUTH_IDP_ADDED`].
    pub event_type: String,
    /// Strictly increasing within `(instance_id, aggregate id)`.
    pub sequence: u64,
    /// Global log position. Strictly increasing across the whole log and
    /// consistent with per-aggregate sequence order.
    pub position: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Event {
    /// Decode the payload into the shape expected for this event type.
    ///
    /// A mismatch means the stored event is corrupt and is reported as
    /// [`ReduceError::MalformedPayload`].
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ReduceError> {
        T::deserialize(&self.payload).map_err(|source| ReduceError::MalformedPayload {
            event_type: self.event_type.clone(),
            sequence: self.sequence,
            source,
        })
    }

    /// Normalize an event that exists in both an org-scoped and an
    /// instance-scoped flavor.
    ///
    /// Fails with [`ReduceError::UnexpectedEventShape`] if the event is
    /// neither `org_event` on an org aggregate nor `instance_event` on an
    /// instance aggregate.
    pub fn scoped<T: DeserializeOwned>(
        &self,
        org_event: &'static str,
        instance_event: &'static str,
    ) -> Result<Scoped<T>, ReduceError> {
        let aggregate_type = self.aggregate.aggregate_type.as_str();
        if aggregate_type == org::AGGREGATE_TYPE && self.event_type == org_event {
            return Ok(Scoped::Org(self.decode()?));
        }
        if aggregate_type == instance::AGGREGATE_TYPE && self.event_type == instance_event {
            return Ok(Scoped::Instance(self.decode()?));
        }
        Err(self.unexpected(&[org_event, instance_event]))
    }

    /// Check that this is exactly `event_type` on an `aggregate_type` aggregate.
    pub fn expect(
        &self,
        aggregate_type: &'static str,
        event_type: &'static str,
    ) -> Result<(), ReduceError> {
        if self.aggregate.aggregate_type == aggregate_type && self.event_type == event_type {
            Ok(())
        } else {
            Err(self.unexpected(&[event_type]))
        }
    }

    fn unexpected(&self, expected: &[&'static str]) -> ReduceError {
        ReduceError::UnexpectedEventShape {
            aggregate_type: self.aggregate.aggregate_type.clone(),
            event_type: self.event_type.clone(),
            expected: expected.to_vec(),
        }
    }
}

/// A payload tagged with the aggregate scope it was emitted under.
#[derive(Debug, Clone, PartialEq)]
pub enum Scoped<T> {
    Org(T),
    Instance(T),
}

impl<T> Scoped<T> {
    pub fn owner_type(&self) -> OwnerType {
        match self {
            Scoped::Org(_) => OwnerType::Org,
            Scoped::Instance(_) => OwnerType::System,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Scoped::Org(payload) | Scoped::Instance(payload) => payload,
        }
    }

    pub fn into_parts(self) -> (OwnerType, T) {
        let owner_type = self.owner_type();
        (owner_type, self.into_inner())
    }
}

/// Aggregate and event types a consumer is interested in.
///
/// Event logs may use it to skip unrelated events server-side; consumers
/// must still tolerate events outside the filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub aggregate_types: Vec<String>,
    pub event_types: Vec<String>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        self.aggregate_types.contains(&event.aggregate.aggregate_type)
            && self.event_types.contains(&event.event_type)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::event::idp::IdpRemoved;

    fn event(aggregate_type: &str, event_type: &str, payload: serde_json::Value) -> Event {
        Event {
            aggregate: Aggregate::new(aggregate_type, "agg-1", "inst-1", "owner-1"),
            event_type: event_type.to_string(),
            sequence: 7,
            position: 70,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            payload,
        }
    }

    #[test]
    fn test_scoped_org_event_maps_to_org_owner() {
        let e = event(org::AGGREGATE_TYPE, org::IDP_REMOVED, json!({ "id": "idp1" }));
        let scoped: Scoped<IdpRemoved> = e.scoped(org::IDP_REMOVED, instance::IDP_REMOVED).unwrap();
        let (owner_type, payload) = scoped.into_parts();
        assert_eq!(owner_type, OwnerType::Org);
        assert_eq!(payload.id, "idp1");
    }

    #[test]
    fn test_scoped_instance_event_maps_to_system_owner() {
        let e = event(
            instance::AGGREGATE_TYPE,
            instance::IDP_REMOVED,
            json!({ "id": "idp1" }),
        );
        let scoped: Scoped<IdpRemoved> = e.scoped(org::IDP_REMOVED, instance::IDP_REMOVED).unwrap();
        assert_eq!(scoped.owner_type(), OwnerType::System);
    }

    #[test]
    fn test_scoped_rejects_tag_on_wrong_aggregate() {
        let e = event(instance::AGGREGATE_TYPE, org::IDP_REMOVED, json!({ "id": "idp1" }));
        let err = e
            .scoped::<IdpRemoved>(org::IDP_REMOVED, instance::IDP_REMOVED)
            .unwrap_err();
        assert!(matches!(err, ReduceError::UnexpectedEventShape { .. }));
    }

    #[test]
    fn test_decode_reports_malformed_payload() {
        let e = event(org::AGGREGATE_TYPE, org::IDP_REMOVED, json!({ "id": 17 }));
        let err = e.decode::<IdpRemoved>().unwrap_err();
        match err {
            ReduceError::MalformedPayload {
                event_type,
                sequence,
                ..
            } => {
                assert_eq!(event_type, org::IDP_REMOVED);
                assert_eq!(sequence, 7);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_filter_requires_both_aggregate_and_event_type() {
        let filter = EventFilter {
            aggregate_types: vec![org::AGGREGATE_TYPE.to_string()],
            event_types: vec![org::IDP_REMOVED.to_string()],
        };
        assert!(filter.matches(&event(org::AGGREGATE_TYPE, org::IDP_REMOVED, json!({}))));
        assert!(!filter.matches(&event(org::AGGREGATE_TYPE, org::ORG_REMOVED, json!({}))));
        assert!(!filter.matches(&event("user", org::IDP_REMOVED, json!({}))));
    }
}
