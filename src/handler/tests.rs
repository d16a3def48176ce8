use chrono::{TimeZone, Utc};
use sea_query::{SqliteQueryBuilder, Value};
use serde_json::json;

use super::*;
use crate::event::{Aggregate, Event};

fn event(aggregate_type: &str, event_type: &str) -> Event {
    Event {
        aggregate: Aggregate::new(aggregate_type, "agg-1", "inst-1", "owner-1"),
        event_type: event_type.to_string(),
        sequence: 3,
        position: 30,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        payload: json!({}),
    }
}

fn delete_all(event: &Event) -> Result<MultiStatement, ReduceError> {
    Ok(MultiStatement::new(
        event,
        vec![Statement::Delete {
            suffix: None,
            conditions: vec![Condition::new("instance_id", event.aggregate.instance_id.as_str())],
        }],
    ))
}

fn noop(event: &Event) -> Result<MultiStatement, ReduceError> {
    Ok(MultiStatement::new(event, vec![]))
}

// ============================================================================
// ReducerTable
// ============================================================================

#[test]
fn test_reducer_table_dispatches_by_aggregate_and_event_type() {
    let table = ReducerTable::new(vec![
        AggregateReducer {
            aggregate_type: "instance",
            reducers: vec![EventReducer::new("instance.removed", delete_all)],
        },
        AggregateReducer {
            aggregate_type: "org",
            reducers: vec![EventReducer::new("org.removed", noop)],
        },
    ])
    .unwrap();

    let multi = table
        .reduce(&event("instance", "instance.removed"))
        .unwrap()
        .expect("reducer registered");
    assert_eq!(multi.statements.len(), 1);
    assert_eq!(multi.sequence, 3);
    assert_eq!(multi.position, 30);

    // Same event type on a different aggregate is not registered.
    assert!(table.reduce(&event("org", "instance.removed")).unwrap().is_none());
    assert!(table.reduce(&event("user", "user.added")).unwrap().is_none());
    assert_eq!(table.len(), 2);
}

#[test]
fn test_reducer_table_rejects_sequence_beyond_bigint() {
    let table = ReducerTable::new(vec![AggregateReducer {
        aggregate_type: "instance",
        reducers: vec![EventReducer::new("instance.removed", delete_all)],
    }])
    .unwrap();

    let mut removed = event("instance", "instance.removed");
    removed.sequence = i64::MAX as u64 + 1;
    let err = table.reduce(&removed).unwrap_err();
    assert!(matches!(
        err,
        ReduceError::SequenceOutOfRange { sequence, .. } if sequence == i64::MAX as u64 + 1
    ));

    removed.sequence = i64::MAX as u64;
    assert!(table.reduce(&removed).unwrap().is_some());

    // Unregistered events are ignored before the range check.
    let mut foreign = event("user", "user.added");
    foreign.sequence = u64::MAX;
    assert!(table.reduce(&foreign).unwrap().is_none());
}

#[test]
fn test_reducer_table_rejects_duplicate_registration() {
    let err = ReducerTable::new(vec![AggregateReducer {
        aggregate_type: "org",
        reducers: vec![
            EventReducer::new("org.idp.jwt.added", noop),
            EventReducer::new("org.idp.jwt.added", delete_all),
        ],
    }])
    .unwrap_err();

    assert!(matches!(
        err,
        ReduceError::DuplicateReducer {
            aggregate_type: "org",
            event_type: "org.idp.jwt.added",
        }
    ));
}

#[test]
fn test_reducer_table_filter_lists_registered_types() {
    let table = ReducerTable::new(vec![
        AggregateReducer {
            aggregate_type: "org",
            reducers: vec![
                EventReducer::new("org.removed", noop),
                EventReducer::new("org.idp.removed", noop),
            ],
        },
        AggregateReducer {
            aggregate_type: "instance",
            reducers: vec![EventReducer::new("instance.removed", noop)],
        },
    ])
    .unwrap();

    let filter = table.filter();
    assert_eq!(filter.aggregate_types, vec!["instance", "org"]);
    assert_eq!(
        filter.event_types,
        vec!["instance.removed", "org.idp.removed", "org.removed"]
    );
}

// ============================================================================
// Statements
// ============================================================================

#[test]
fn test_statement_table_name_appends_suffix() {
    let primary = Statement::Delete {
        suffix: None,
        conditions: vec![],
    };
    let satellite = Statement::Update {
        suffix: Some("oauth"),
        columns: vec![Column::new("client_id", "c1")],
        conditions: vec![],
    };

    assert_eq!(primary.table_name("idp_templates"), "idp_templates");
    assert_eq!(satellite.table_name("idp_templates"), "idp_templates_oauth");
    assert_eq!(
        satellite.column("client_id"),
        Some(&Value::String(Some(Box::new("c1".to_string()))))
    );
    assert_eq!(satellite.column("client_secret"), None);
}

#[test]
fn test_value_encoding_helpers() {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    assert_eq!(
        timestamp(at),
        Value::String(Some(Box::new("2024-05-01T12:00:00.000000Z".to_string())))
    );
    assert_eq!(
        string_array(&["openid".to_string(), "email".to_string()]),
        Value::String(Some(Box::new(r#"["openid","email"]"#.to_string())))
    );
    assert_eq!(
        string_array(&[]),
        Value::String(Some(Box::new("[]".to_string())))
    );
}

// ============================================================================
// Table declarations
// ============================================================================

fn satellite() -> TableSpec {
    TableSpec::suffixed(
        "oauth",
        vec![
            ColumnSpec::new("idp_id", ColumnType::Text),
            ColumnSpec::new("instance_id", ColumnType::Text),
            ColumnSpec::new("scopes", ColumnType::TextArray).nullable(),
        ],
        vec!["instance_id", "idp_id"],
    )
    .with_foreign_key(ForeignKeySpec {
        columns: vec!["instance_id", "idp_id"],
        references: vec!["instance_id", "id"],
    })
}

#[test]
fn test_create_statement_declares_cascading_foreign_key() {
    let sql = satellite()
        .create_statement("idp_templates")
        .to_string(SqliteQueryBuilder);

    assert!(sql.starts_with(r#"CREATE TABLE IF NOT EXISTS "idp_templates_oauth""#));
    assert!(sql.contains(r#"PRIMARY KEY ("instance_id", "idp_id")"#));
    assert!(sql.contains(r#"REFERENCES "idp_templates" ("instance_id", "id")"#));
    assert!(sql.contains("ON DELETE CASCADE"));
}

#[test]
fn test_index_statements_are_named_after_table() {
    let table = TableSpec::new(
        vec![
            ColumnSpec::new("id", ColumnType::Text),
            ColumnSpec::new("owner_removed", ColumnType::Bool).default(false),
        ],
        vec!["id"],
    )
    .with_index(IndexSpec::new("owner_removed", vec!["owner_removed"]));

    let sql: Vec<String> = table
        .index_statements("idp_templates")
        .iter()
        .map(|stmt| stmt.to_string(SqliteQueryBuilder))
        .collect();

    assert_eq!(sql.len(), 1);
    assert!(sql[0].contains(r#""idp_templates_owner_removed_idx""#));
    assert!(sql[0].contains("IF NOT EXISTS"));
}

#[test]
fn test_only_nullable_or_defaulted_columns_are_addable() {
    assert!(ColumnSpec::new("name", ColumnType::Text).nullable().is_addable());
    assert!(ColumnSpec::new("tls", ColumnType::Bool).default(false).is_addable());
    assert!(!ColumnSpec::new("client_id", ColumnType::Text).is_addable());
}

#[test]
fn test_multi_table_check_resolves_names() {
    let check = MultiTableCheck::new(
        "idp_templates",
        vec![
            TableSpec::new(vec![ColumnSpec::new("id", ColumnType::Text)], vec!["id"]),
            satellite(),
        ],
    );

    assert_eq!(
        check.table_names(),
        vec!["idp_templates", "idp_templates_oauth"]
    );
    assert!(check.table(Some("oauth")).is_some());
    assert!(check.table(Some("ldap")).is_none());
}
