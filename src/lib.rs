//! IdP Projection - event-sourced read-model engine
//!
//! Turns an append-only, per-aggregate log of identity-provider events into
//! queryable relational tables. The generic engine (reducer dispatch,
//! statement composition, init-checks, checkpointed catch-up) lives in
//! [`handler`], [`store`] and [`runtime`]; [`projections`] holds the concrete
//! projections built on it.

pub mod config;
pub mod domain;
pub mod event;
pub mod handler;
pub mod projections;
pub mod runtime;
pub mod store;
pub mod utils;
