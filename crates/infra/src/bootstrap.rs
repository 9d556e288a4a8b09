//! Startup sequence shared by the server and the admin CLI.

use thiserror::Error;
use tracing::{info, warn};

use crate::config::Settings;
use crate::db::{RetryPolicy, connect_with_retry};
use crate::migrations::{MigrationError, Migrator};
use crate::repository::Store;
use crate::seed::{SeedError, ensure_first_superuser};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database unreachable: {0}")]
    Connect(#[source] sqlx::Error),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Seed(#[from] SeedError),
}

pub fn retry_policy(settings: &Settings) -> RetryPolicy {
    RetryPolicy {
        max_tries: settings.db_connect_max_tries,
        wait: settings.db_connect_wait,
    }
}

/// Pick the store (Postgres when configured, in-memory otherwise), bring the
/// schema up to date and make sure the first superuser exists.
pub async fn prepare_store(settings: &Settings) -> Result<Store, BootstrapError> {
    let store = match &settings.database_url {
        Some(url) => {
            let pool = connect_with_retry(url, retry_policy(settings))
                .await
                .map_err(BootstrapError::Connect)?;
            let applied = Migrator::new(pool.clone()).migrate().await?;
            if !applied.is_empty() {
                info!(?applied, "applied migrations");
            }
            Store::postgres(pool)
        }
        None => {
            warn!("DATABASE_URL not set; using the in-memory store (data is lost on exit)");
            Store::in_memory()
        }
    };

    ensure_first_superuser(
        &store,
        &settings.first_superuser,
        &settings.first_superuser_password,
    )
    .await?;

    Ok(store)
}
