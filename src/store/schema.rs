//! Store-owned tables and live schema reconciliation.

use sea_query::Iden;

use super::{Result, StoreError};
use crate::handler::{ColumnSpec, ColumnType, MultiTableCheck, TableSpec};

/// Checkpoints table schema.
#[derive(Iden)]
pub enum Checkpoints {
    #[iden = "projection_checkpoints"]
    Table,
    #[iden = "projection_name"]
    ProjectionName,
    #[iden = "position"]
    Position,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// One row per projection: name → last applied log position.
pub fn checkpoint_check() -> MultiTableCheck {
    MultiTableCheck::new(
        "projection_checkpoints",
        vec![TableSpec::new(
            vec![
                ColumnSpec::new("projection_name", ColumnType::Text),
                ColumnSpec::new("position", ColumnType::Int64),
                ColumnSpec::new("updated_at", ColumnType::Timestamp),
            ],
            vec!["projection_name"],
        )],
    )
}

/// A column as reported by the database catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    pub name: String,
    pub not_null: bool,
}

/// Columns to add so that an existing `table` matches its declaration.
///
/// Only nullable or defaulted columns can be added to a table that may hold
/// rows. A missing column without a default, or a column whose nullability
/// differs from the declaration, cannot be reconciled.
pub fn plan_migration<'a>(
    table: &str,
    spec: &'a TableSpec,
    live: &[LiveColumn],
) -> Result<Vec<&'a ColumnSpec>> {
    let mut missing = Vec::new();

    for column in &spec.columns {
        match live.iter().find(|live| live.name == column.name) {
            Some(existing) if existing.not_null == column.nullable => {
                return Err(StoreError::SchemaConflict {
                    table: table.to_string(),
                    reason: format!(
                        "column {} is {} but declared {}",
                        column.name,
                        nullability(!existing.not_null),
                        nullability(column.nullable),
                    ),
                });
            }
            Some(_) => {}
            None if column.is_addable() => missing.push(column),
            None => {
                return Err(StoreError::SchemaConflict {
                    table: table.to_string(),
                    reason: format!("column {} is missing and has no default", column.name),
                });
            }
        }
    }

    Ok(missing)
}

fn nullability(nullable: bool) -> &'static str {
    if nullable {
        "nullable"
    } else {
        "not null"
    }
}
