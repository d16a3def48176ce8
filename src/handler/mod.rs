//! Generic projection handler contract.
//!
//! A projection is a named reducer table plus the tables it writes. Reducers
//! are pure: they turn one [`Event`](crate::event::Event) into a
//! [`MultiStatement`] and never touch the store themselves. The
//! [`runtime`](crate::runtime) applies the statements and advances the
//! checkpoint.

mod check;
mod error;
mod projection;
mod reducer;
mod statement;

#[cfg(test)]
mod tests;

pub use check::{ColumnSpec, ColumnType, ForeignKeySpec, IndexSpec, MultiTableCheck, TableSpec};
pub use error::ReduceError;
pub use projection::Projection;
pub use reducer::{AggregateReducer, EventReducer, ReduceFn, ReducerTable};
pub use statement::{string_array, timestamp, Column, Condition, MultiStatement, Statement};
