//! PostgreSQL adapters.
//!
//! - `PostgresDocumentLedger` - transactional document and relation storage
//! - `connect` - builds the pool and applies embedded migrations

mod ledger;

pub use ledger::PostgresDocumentLedger;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::domain::document::DocumentError;

/// Opens a connection pool and, if configured, runs the embedded migrations.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DocumentError> {
    tracing::info!(
        url = %config.masked_url(),
        max_connections = config.max_connections,
        run_migrations = config.run_migrations,
        "connecting to document ledger database"
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(config.idle_timeout())
        .max_lifetime(config.max_lifetime())
        .connect(&config.url)
        .await
        .map_err(|e| DocumentError::storage(format!("failed to connect: {}", e)))?;

    if config.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DocumentError::storage(format!("migration failed: {}", e)))?;
        tracing::info!("document ledger migrations applied");
    }

    Ok(pool)
}
