//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;

use idp_projection::config::SqliteConfig;
use idp_projection::event::{instance, org, Aggregate, Event};
use idp_projection::handler::Projection;
use idp_projection::projections::idp_template::{self, TABLE};
use idp_projection::store::{Checkpoint, ProjectionStore, SqliteProjectionStore};

pub const INSTANCE: &str = "inst-1";

/// File-backed SQLite store in a temporary directory.
///
/// The directory lives as long as the returned guard.
pub async fn sqlite_store() -> (TempDir, SqliteProjectionStore) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = SqliteConfig {
        path: dir.path().join("idp.db").to_string_lossy().into_owned(),
        ..Default::default()
    };
    let store = SqliteProjectionStore::connect(&config)
        .await
        .expect("Failed to open SQLite store");
    (dir, store)
}

/// SQLite store with the IdP template schema in place.
pub async fn migrated_store() -> (TempDir, SqliteProjectionStore) {
    let (dir, store) = sqlite_store().await;
    store
        .ensure_schema(&idp_template::check())
        .await
        .expect("Failed to ensure schema");
    (dir, store)
}

pub fn projection() -> Projection {
    idp_template::projection().expect("Failed to build projection")
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Builds a well-ordered event history: positions increase globally and
/// sequences per aggregate.
#[derive(Default)]
pub struct History {
    pub events: Vec<Event>,
    sequences: HashMap<String, u64>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        aggregate_type: &str,
        aggregate_id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Event {
        let sequence = self.sequences.entry(aggregate_id.to_string()).or_default();
        *sequence += 1;
        let sequence = *sequence;
        let position = self.events.len() as u64 + 1;

        let resource_owner = if aggregate_type == instance::AGGREGATE_TYPE {
            INSTANCE
        } else {
            aggregate_id
        };

        let event = Event {
            aggregate: Aggregate::new(aggregate_type, aggregate_id, INSTANCE, resource_owner),
            event_type: event_type.to_string(),
            sequence,
            position,
            created_at: epoch() + Duration::seconds(position as i64),
            payload,
        };
        self.events.push(event.clone());
        event
    }

    pub fn org(&mut self, org_id: &str, event_type: &str, payload: serde_json::Value) -> Event {
        self.push(org::AGGREGATE_TYPE, org_id, event_type, payload)
    }

    pub fn instance(&mut self, event_type: &str, payload: serde_json::Value) -> Event {
        self.push(instance::AGGREGATE_TYPE, INSTANCE, event_type, payload)
    }
}

/// Reduce `event` and apply it together with its checkpoint.
pub async fn apply(
    store: &dyn ProjectionStore,
    projection: &Projection,
    event: &Event,
) -> idp_projection::store::Result<()> {
    let multi = projection
        .reducers
        .reduce(event)
        .expect("Reducer failed")
        .expect("No reducer registered");
    store
        .apply(
            projection.base_table(),
            &multi,
            &Checkpoint::new(projection.name, event.position),
        )
        .await
}

pub async fn apply_all(store: &dyn ProjectionStore, projection: &Projection, events: &[Event]) {
    for event in events {
        apply(store, projection, event)
            .await
            .expect("Failed to apply event");
    }
}

/// Rows keyed by `id` in the base table, or by `idp_id` in a satellite.
pub async fn count(pool: &sqlx::SqlitePool, suffix: Option<&str>, id: &str) -> i64 {
    let sql = match suffix {
        Some(suffix) => format!("SELECT COUNT(*) FROM {TABLE}_{suffix} WHERE idp_id = ?"),
        None => format!("SELECT COUNT(*) FROM {TABLE} WHERE id = ?"),
    };
    sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("Failed to count rows")
}

pub fn secret(key: &str) -> serde_json::Value {
    json!({ "cryptoType": 0, "algorithm": "aes", "keyId": key, "crypted": "c2VjcmV0" })
}

pub fn oauth_added(id: &str, client_id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": "oauth",
        "clientId": client_id,
        "clientSecret": secret("k1"),
        "authorizationEndpoint": "https://idp.example.com/authorize",
        "tokenEndpoint": "https://idp.example.com/token",
        "userEndpoint": "https://idp.example.com/userinfo",
        "scopes": ["openid"],
        "isCreationAllowed": true,
        "isLinkingAllowed": true,
    })
}
