//! Database migrations using diesel_migrations.
//!
//! Embeds migrations at compile time and runs them in a blocking task so
//! the async callers never hold a sync connection across an await.

use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use super::StoreError;

pub const SQLITE_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");

/// Run pending migrations for a database URL or bare file path.
pub async fn run_migrations(database_url: &str) -> Result<(), StoreError> {
    // Strip sqlite: prefix if present - diesel expects just the file path
    let url = database_url
        .strip_prefix("sqlite:")
        .unwrap_or(database_url)
        .to_string();

    tokio::task::spawn_blocking(move || {
        let mut conn = diesel::SqliteConnection::establish(&url)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let applied = conn
            .run_pending_migrations(SQLITE_MIGRATIONS)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        for migration in &applied {
            info!("Applied migration: {}", migration);
        }

        Ok(())
    })
    .await
    .map_err(|e| StoreError::Connection(format!("migration task panicked: {e}")))?
}
