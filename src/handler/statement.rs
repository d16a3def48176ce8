//! Single-table mutations produced by reducers.

use chrono::{DateTime, SecondsFormat, Utc};
use sea_query::Value;

use crate::event::Event;

/// Column assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: &'static str,
    pub value: Value,
}

impl Column {
    pub fn new(name: &'static str, value: impl Into<Value>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// Equality condition `name = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub name: &'static str,
    pub value: Value,
}

impl Condition {
    pub fn new(name: &'static str, value: impl Into<Value>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// One mutation against the projection's base table or one of its
/// suffixed satellite tables.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Insert a full row. Re-applying the same create overwrites the row
    /// identified by `conflict_key` instead of failing.
    Create {
        suffix: Option<&'static str>,
        columns: Vec<Column>,
        conflict_key: Vec<&'static str>,
    },
    /// Overwrite `columns` on every row matching all `conditions`.
    Update {
        suffix: Option<&'static str>,
        columns: Vec<Column>,
        conditions: Vec<Condition>,
    },
    /// Delete every row matching all `conditions`.
    Delete {
        suffix: Option<&'static str>,
        conditions: Vec<Condition>,
    },
}

impl Statement {
    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            Statement::Create { suffix, .. }
            | Statement::Update { suffix, .. }
            | Statement::Delete { suffix, .. } => *suffix,
        }
    }

    /// Name of the table this statement targets, given the projection's
    /// base table.
    pub fn table_name(&self, base: &str) -> String {
        match self.suffix() {
            Some(suffix) => format!("{base}_{suffix}"),
            None => base.to_string(),
        }
    }

    /// Look up the value assigned to `name`, if this statement assigns one.
    pub fn column(&self, name: &str) -> Option<&Value> {
        match self {
            Statement::Create { columns, .. } | Statement::Update { columns, .. } => columns
                .iter()
                .find(|column| column.name == name)
                .map(|column| &column.value),
            Statement::Delete { .. } => None,
        }
    }
}

/// Ordered, all-or-nothing group of statements produced by one event.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiStatement {
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub instance_id: String,
    pub event_type: String,
    pub sequence: u64,
    pub position: u64,
    pub statements: Vec<Statement>,
}

impl MultiStatement {
    pub fn new(event: &Event, statements: Vec<Statement>) -> Self {
        Self {
            aggregate_type: event.aggregate.aggregate_type.clone(),
            aggregate_id: event.aggregate.id.clone(),
            instance_id: event.aggregate.instance_id.clone(),
            event_type: event.event_type.clone(),
            sequence: event.sequence,
            position: event.position,
            statements,
        }
    }
}

/// Timestamps are stored as RFC 3339 text with microsecond precision so
/// that they sort lexicographically.
pub fn timestamp(at: DateTime<Utc>) -> Value {
    at.to_rfc3339_opts(SecondsFormat::Micros, true).into()
}

/// Text arrays are stored as a JSON array.
pub fn string_array(values: &[String]) -> Value {
    serde_json::Value::from(values.to_vec()).to_string().into()
}
