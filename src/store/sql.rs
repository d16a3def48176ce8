//! Unified SQL store implementation.
//!
//! Statements are built with sea-query and rendered per backend; a macro
//! generates the [`ProjectionStore`](super::ProjectionStore) impl for each
//! backend so that both share one body.

use std::marker::PhantomData;

use sea_query::{
    Alias, DeleteStatement, Expr, IndexCreateStatement, InsertStatement, OnConflict, Query,
    SelectStatement, SimpleExpr, TableAlterStatement, TableCreateStatement, UpdateStatement,
    Value,
};

use super::schema::Checkpoints;
use super::{Checkpoint, Result, StoreError};
use crate::handler::{Condition, Statement};

/// Trait for SQL database backends.
///
/// Abstracts over PostgreSQL and SQLite by providing the pool type, the
/// catalog query and statement rendering.
pub trait SqlDatabase: Send + Sync + 'static {
    /// The connection pool type for this database.
    type Pool: Clone + Send + Sync;

    /// Lists `(column_name TEXT, not_null BIGINT)` of the table bound as the
    /// only parameter. Returns no rows for a missing table.
    const LIVE_COLUMNS_SQL: &'static str;

    /// Run first inside a read transaction so that every query of it sees
    /// one snapshot. `None` when a plain transaction already does.
    const SNAPSHOT_READ_SQL: Option<&'static str>;

    fn build_select(stmt: SelectStatement) -> String;
    fn build_insert(stmt: InsertStatement) -> String;
    fn build_update(stmt: UpdateStatement) -> String;
    fn build_delete(stmt: DeleteStatement) -> String;
    fn build_table_create(stmt: TableCreateStatement) -> String;
    fn build_table_alter(stmt: TableAlterStatement) -> String;
    fn build_index_create(stmt: IndexCreateStatement) -> String;
}

fn where_all<'a>(conditions: &'a [Condition]) -> impl Iterator<Item = SimpleExpr> + 'a {
    conditions
        .iter()
        .map(|cond| Expr::col(Alias::new(cond.name)).eq(cond.value.clone()))
}

/// Render one statement against `base` (or its suffixed satellite).
///
/// Creates become upserts on their conflict key: re-delivering an Added
/// event overwrites the row with identical values.
pub fn render_statement<DB: SqlDatabase>(base: &str, statement: &Statement) -> Result<String> {
    let table = Alias::new(statement.table_name(base));

    match statement {
        Statement::Create {
            columns,
            conflict_key,
            ..
        } => {
            let mut stmt = Query::insert();
            stmt.into_table(table)
                .columns(columns.iter().map(|column| Alias::new(column.name)))
                .values(
                    columns
                        .iter()
                        .map(|column| SimpleExpr::Value(column.value.clone())),
                )?;

            let mut on_conflict = OnConflict::columns(conflict_key.iter().map(|key| Alias::new(*key)));
            let updates: Vec<Alias> = columns
                .iter()
                .filter(|column| !conflict_key.contains(&column.name))
                .map(|column| Alias::new(column.name))
                .collect();
            if updates.is_empty() {
                on_conflict.do_nothing();
            } else {
                on_conflict.update_columns(updates);
            }
            stmt.on_conflict(on_conflict);

            Ok(DB::build_insert(stmt))
        }
        Statement::Update {
            columns,
            conditions,
            ..
        } => {
            let mut stmt = Query::update();
            stmt.table(table).values(
                columns
                    .iter()
                    .map(|column| (Alias::new(column.name), SimpleExpr::Value(column.value.clone()))),
            );
            for cond in where_all(conditions) {
                stmt.and_where(cond);
            }
            Ok(DB::build_update(stmt))
        }
        Statement::Delete { conditions, .. } => {
            let mut stmt = Query::delete();
            stmt.from_table(table);
            for cond in where_all(conditions) {
                stmt.and_where(cond);
            }
            Ok(DB::build_delete(stmt))
        }
    }
}

fn checkpoint_upsert(checkpoint: &Checkpoint) -> Result<InsertStatement> {
    let updated_at = chrono::Utc::now().to_rfc3339();
    let position = i64::try_from(checkpoint.position).map_err(|_| StoreError::OutOfRange {
        column: "position".to_string(),
        value: checkpoint.position,
    })?;

    let mut stmt = Query::insert();
    stmt.into_table(Checkpoints::Table)
        .columns([
            Checkpoints::ProjectionName,
            Checkpoints::Position,
            Checkpoints::UpdatedAt,
        ])
        .values([
            checkpoint.projection.as_str().into(),
            Value::BigInt(Some(position)).into(),
            updated_at.into(),
        ])?
        .on_conflict(
            OnConflict::column(Checkpoints::ProjectionName)
                .update_columns([Checkpoints::Position, Checkpoints::UpdatedAt])
                .to_owned(),
        );
    Ok(stmt)
}

fn checkpoint_select(projection: &str) -> SelectStatement {
    Query::select()
        .column(Checkpoints::Position)
        .from(Checkpoints::Table)
        .and_where(Expr::col(Checkpoints::ProjectionName).eq(projection))
        .to_owned()
}

fn checkpoint_delete(projection: &str) -> DeleteStatement {
    Query::delete()
        .from_table(Checkpoints::Table)
        .and_where(Expr::col(Checkpoints::ProjectionName).eq(projection))
        .to_owned()
}

/// SQL-based projection store.
///
/// This generic implementation works with any SQL database that implements
/// the `SqlDatabase` trait (PostgreSQL, SQLite).
pub struct SqlProjectionStore<DB: SqlDatabase> {
    pool: DB::Pool,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SqlProjectionStore<DB> {
    /// Create a new SQL projection store with the given pool.
    pub fn new(pool: DB::Pool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &DB::Pool {
        &self.pool
    }
}

/// Macro to implement ProjectionStore for a specific SQL backend.
macro_rules! impl_projection_store {
    ($db_type:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        impl SqlProjectionStore<$db_type> {
            async fn live_columns(
                &self,
                table: &str,
            ) -> crate::store::Result<Vec<crate::store::schema::LiveColumn>> {
                use sqlx::Row;

                let rows = sqlx::query(<$db_type>::LIVE_COLUMNS_SQL)
                    .bind(table)
                    .fetch_all(&self.pool)
                    .await?;

                rows.iter()
                    .map(|row| -> crate::store::Result<crate::store::schema::LiveColumn> {
                        Ok(crate::store::schema::LiveColumn {
                            name: row.try_get("column_name")?,
                            not_null: row.try_get::<i64, _>("not_null")? != 0,
                        })
                    })
                    .collect()
            }

            async fn ensure_tables(
                &self,
                check: &crate::handler::MultiTableCheck,
            ) -> crate::store::Result<()> {
                use tracing::{debug, info};

                use crate::store::schema::plan_migration;

                for table in &check.tables {
                    let name = table.name(check.base_table);
                    let live = self.live_columns(&name).await?;

                    if live.is_empty() {
                        let sql = <$db_type>::build_table_create(
                            table.create_statement(check.base_table),
                        );
                        sqlx::query(&sql).execute(&self.pool).await?;
                        info!(table = %name, "Created projection table");
                    } else {
                        for column in plan_migration(&name, table, &live)? {
                            let sql = <$db_type>::build_table_alter(
                                table.add_column_statement(check.base_table, column),
                            );
                            sqlx::query(&sql).execute(&self.pool).await?;
                            info!(table = %name, column = column.name, "Added projection column");
                        }
                        debug!(table = %name, "Projection table up to date");
                    }

                    let indexes: Vec<String> = table
                        .index_statements(check.base_table)
                        .into_iter()
                        .map(<$db_type>::build_index_create)
                        .collect();
                    for sql in &indexes {
                        sqlx::query(sql).execute(&self.pool).await?;
                    }
                }

                Ok(())
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::store::ProjectionStore for SqlProjectionStore<$db_type> {
            async fn ensure_schema(
                &self,
                check: &crate::handler::MultiTableCheck,
            ) -> crate::store::Result<()> {
                self.ensure_tables(&crate::store::schema::checkpoint_check())
                    .await?;
                self.ensure_tables(check).await
            }

            async fn load_checkpoint(
                &self,
                projection: &str,
            ) -> crate::store::Result<Checkpoint> {
                use sqlx::Row;

                let sql = <$db_type>::build_select(checkpoint_select(projection));
                let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;

                let position = match row {
                    Some(row) => {
                        let position: i64 = row.try_get("position")?;
                        u64::try_from(position)
                            .map_err(|e| StoreError::decode("position", e))?
                    }
                    None => 0,
                };
                Ok(Checkpoint::new(projection, position))
            }

            async fn apply(
                &self,
                base_table: &str,
                multi: &crate::handler::MultiStatement,
                checkpoint: &Checkpoint,
            ) -> crate::store::Result<()> {
                let mut statements = multi
                    .statements
                    .iter()
                    .map(|statement| render_statement::<$db_type>(base_table, statement))
                    .collect::<crate::store::Result<Vec<_>>>()?;
                statements.push(<$db_type>::build_insert(checkpoint_upsert(checkpoint)?));

                // Dropping the transaction without commit rolls it back, which
                // also covers cancellation of this future.
                let mut tx = self.pool.begin().await?;
                for sql in &statements {
                    sqlx::query(sql).execute(&mut *tx).await?;
                }
                tx.commit().await?;
                Ok(())
            }

            async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> crate::store::Result<()> {
                let sql = <$db_type>::build_insert(checkpoint_upsert(checkpoint)?);
                sqlx::query(&sql).execute(&self.pool).await?;
                Ok(())
            }

            async fn reset(
                &self,
                check: &crate::handler::MultiTableCheck,
                projection: &str,
            ) -> crate::store::Result<()> {
                // Satellites first; the base table last.
                let mut statements: Vec<String> = check
                    .tables
                    .iter()
                    .rev()
                    .map(|table| {
                        <$db_type>::build_delete(
                            Query::delete()
                                .from_table(Alias::new(table.name(check.base_table)))
                                .to_owned(),
                        )
                    })
                    .collect();
                statements.push(<$db_type>::build_delete(checkpoint_delete(projection)));

                let mut tx = self.pool.begin().await?;
                for sql in &statements {
                    sqlx::query(sql).execute(&mut *tx).await?;
                }
                tx.commit().await?;

                tracing::info!(projection, "Reset projection");
                Ok(())
            }
        }
    };
}

impl_projection_store!(postgres::Postgres, "postgres");
impl_projection_store!(sqlite::Sqlite, "sqlite");

#[cfg(feature = "postgres")]
pub mod postgres {
    //! PostgreSQL database backend.

    use sea_query::PostgresQueryBuilder;
    use sqlx::postgres::PgPoolOptions;
    use sqlx::PgPool;

    use crate::config::PostgresConfig;
    use crate::store::Result;

    /// PostgreSQL database marker type.
    pub struct Postgres;

    impl super::SqlDatabase for Postgres {
        type Pool = PgPool;

        const LIVE_COLUMNS_SQL: &'static str = "SELECT column_name::text AS column_name, \
             CAST(CASE WHEN is_nullable = 'NO' THEN 1 ELSE 0 END AS BIGINT) AS not_null \
             FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1";

        // READ COMMITTED takes a new snapshot per statement.
        const SNAPSHOT_READ_SQL: Option<&'static str> =
            Some("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY");

        fn build_select(stmt: sea_query::SelectStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_insert(stmt: sea_query::InsertStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_update(stmt: sea_query::UpdateStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_delete(stmt: sea_query::DeleteStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_table_create(stmt: sea_query::TableCreateStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_table_alter(stmt: sea_query::TableAlterStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_index_create(stmt: sea_query::IndexCreateStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }
    }

    /// PostgreSQL projection store.
    pub type PostgresProjectionStore = super::SqlProjectionStore<Postgres>;

    impl PostgresProjectionStore {
        pub async fn connect(config: &PostgresConfig) -> Result<Self> {
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(&config.uri)
                .await?;
            Ok(Self::new(pool))
        }
    }
}

#[cfg(feature = "sqlite")]
pub mod sqlite {
    //! SQLite database backend.

    use std::time::Duration;

    use sea_query::SqliteQueryBuilder;
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
    use sqlx::SqlitePool;

    use crate::config::SqliteConfig;
    use crate::store::Result;

    /// SQLite database marker type.
    pub struct Sqlite;

    impl super::SqlDatabase for Sqlite {
        type Pool = SqlitePool;

        const LIVE_COLUMNS_SQL: &'static str =
            r#"SELECT name AS column_name, "notnull" AS not_null FROM pragma_table_info(?)"#;

        // A deferred transaction keeps the snapshot of its first read.
        const SNAPSHOT_READ_SQL: Option<&'static str> = None;

        fn build_select(stmt: sea_query::SelectStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_insert(stmt: sea_query::InsertStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_update(stmt: sea_query::UpdateStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_delete(stmt: sea_query::DeleteStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_table_create(stmt: sea_query::TableCreateStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_table_alter(stmt: sea_query::TableAlterStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_index_create(stmt: sea_query::IndexCreateStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }
    }

    /// SQLite projection store.
    pub type SqliteProjectionStore = super::SqlProjectionStore<Sqlite>;

    impl SqliteProjectionStore {
        /// Open (creating if missing) the database file at `config.path`.
        ///
        /// Foreign keys are enforced on every pooled connection; satellite
        /// rows rely on them to cascade.
        pub async fn connect(config: &SqliteConfig) -> Result<Self> {
            let opts = SqliteConnectOptions::new()
                .filename(&config.path)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
                .foreign_keys(true)
                .create_if_missing(true);

            let pool = SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .connect_with(opts)
                .await?;

            Ok(Self::new(pool))
        }
    }
}

#[cfg(test)]
mod tests {
    use sea_query::Value;

    use super::*;
    use crate::handler::Column;

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_create_renders_as_upsert() {
        let statement = Statement::Create {
            suffix: Some("oauth"),
            columns: vec![
                Column::new("idp_id", "idp1"),
                Column::new("instance_id", "inst-1"),
                Column::new("client_id", "c1"),
            ],
            conflict_key: vec!["instance_id", "idp_id"],
        };

        let sql = render_statement::<sqlite::Sqlite>("idp_templates", &statement).unwrap();
        assert!(sql.starts_with(r#"INSERT INTO "idp_templates_oauth""#));
        assert!(sql.contains(r#"ON CONFLICT ("instance_id", "idp_id") DO UPDATE SET"#));
        assert!(sql.contains(r#""client_id" = "excluded"."client_id""#));
    }

    #[test]
    fn test_checkpoint_position_beyond_bigint_is_rejected() {
        let err = checkpoint_upsert(&Checkpoint::new("idp_templates", u64::MAX)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::OutOfRange { ref column, value } if column == "position" && value == u64::MAX
        ));
        assert!(!err.is_transient());

        assert!(checkpoint_upsert(&Checkpoint::new("idp_templates", i64::MAX as u64)).is_ok());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_update_and_delete_render_conditions() {
        let update = Statement::Update {
            suffix: None,
            columns: vec![Column::new("owner_removed", true)],
            conditions: vec![
                Condition::new("instance_id", "inst-1"),
                Condition::new("resource_owner", "org-1"),
            ],
        };
        let sql = render_statement::<sqlite::Sqlite>("idp_templates", &update).unwrap();
        assert!(sql.starts_with(r#"UPDATE "idp_templates" SET "owner_removed" = "#));
        assert!(sql.contains(r#""instance_id" = 'inst-1' AND "resource_owner" = 'org-1'"#));

        let delete = Statement::Delete {
            suffix: None,
            conditions: vec![Condition::new("instance_id", Value::from("inst-1"))],
        };
        let sql = render_statement::<sqlite::Sqlite>("idp_templates", &delete).unwrap();
        assert_eq!(
            sql,
            r#"DELETE FROM "idp_templates" WHERE "instance_id" = 'inst-1'"#
        );
    }
}
