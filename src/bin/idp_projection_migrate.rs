//! idp-projection-migrate: schema init-check for the IdP template projection
//!
//! Connects to the configured store, creates missing tables and indexes,
//! adds missing nullable columns, and fails if a live table conflicts with
//! the declared layout. Run before starting catch-up.
//!
//! ## Usage
//! ```text
//! idp-projection-migrate [CONFIG_PATH]
//! ```
//!
//! ## Configuration
//! - IDP_PROJECTION_CONFIG: YAML config file
//! - IDP_PROJECTION__STORAGE__TYPE: "sqlite" or "postgres" (default: sqlite)
//! - IDP_PROJECTION_LOG: tracing filter (default: info)

use std::process::ExitCode;

use backon::Retryable;
use tracing::{error, info, warn};

use idp_projection::config::Config;
use idp_projection::projections::idp_template;
use idp_projection::store::{init_store, StoreError};
use idp_projection::utils::bootstrap::init_tracing;
use idp_projection::utils::retry::connection_backoff;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let path = std::env::args().nth(1);
    let config = match Config::load(path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(storage = ?config.storage.storage_type, "starting idp-projection-migrate");

    let store = match (|| init_store(&config.storage))
        .retry(connection_backoff())
        .when(StoreError::is_transient)
        .notify(|err: &StoreError, delay| {
            warn!(error = %err, retry_in = ?delay, "store not reachable, retrying");
        })
        .await
    {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "failed to connect to store");
            return ExitCode::FAILURE;
        }
    };

    let check = idp_template::check();
    match store.ensure_schema(&check).await {
        Ok(()) => {
            info!(tables = ?check.table_names(), "schema up to date");
            ExitCode::SUCCESS
        }
        Err(e @ StoreError::SchemaConflict { .. }) => {
            error!(error = %e, "live schema conflicts with declaration");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "schema init-check failed");
            ExitCode::FAILURE
        }
    }
}
