//! SQLite store.
//!
//! Statements with `RETURNING` are run with `fetch_all`: the SQLite driver
//! only finishes the implicit transaction once the statement is stepped to
//! completion, and a write left open is invisible to other pooled connections.

pub mod access_keys;
pub mod backups;
pub mod pool;
pub mod schema;
pub mod users;

use sqlx::SqlitePool;
use std::path::Path;

pub use pool::create_pool;

/// Database handle type (a cheaply cloneable pool shared across handlers)
pub type Db = SqlitePool;

/// Open or create the SQLite database at the given path
///
/// Creates all required tables on first run.
pub async fn open_database(path: impl AsRef<Path>, max_connections: u32) -> Result<Db, sqlx::Error> {
    let path = path.as_ref();
    tracing::info!("Opening database at: {:?}", path);

    // Create parent directory if it doesn't exist
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                tracing::error!("Failed to create database directory: {}", e);
                sqlx::Error::Io(e)
            })?;
        }
    }

    let pool = create_pool(path, max_connections).await?;

    for statement in schema::statements() {
        sqlx::query(statement).execute(&pool).await?;
    }

    tracing::info!("Database initialized successfully");

    Ok(pool)
}

/// Whether a store error is a UNIQUE constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
