/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// SQLite (extended) result codes for busy and locked databases, and
/// Postgres SQLSTATEs for serialization failure, deadlock and lock timeout.
const TRANSIENT_CODES: &[&str] = &[
    "5", "6", "261", "262", "517", "773", "40001", "40P01", "55P03",
];

/// Errors raised by the relational store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Schema conflict on {table}: {reason}")]
    SchemaConflict { table: String, reason: String },

    #[error("Transient database error: {0}")]
    Transient(#[source] sqlx::Error),

    #[error("Database error: {0}")]
    Fatal(#[source] sqlx::Error),

    #[error("Query build error: {0}")]
    Query(#[from] sea_query::error::Error),

    #[error("Cannot decode column {column}: {reason}")]
    Decode { column: String, reason: String },

    #[error("Value {value} for column {column} exceeds the BIGINT range")]
    OutOfRange { column: String, value: u64 },

    #[error("Storage type {0} is not compiled in")]
    Unsupported(String),
}

impl StoreError {
    /// Whether retrying the same transaction may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }

    pub fn decode(column: &str, reason: impl std::fmt::Display) -> Self {
        StoreError::Decode {
            column: column.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Lock contention, pool exhaustion and I/O failures are transient.
/// Everything else, constraint violations included, points at a bug or a
/// broken schema and is fatal.
pub fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => db
            .code()
            .is_some_and(|code| TRANSIENT_CODES.contains(&code.as_ref())),
        _ => false,
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if is_transient(&err) {
            StoreError::Transient(err)
        } else {
            StoreError::Fatal(err)
        }
    }
}
