//! New-tab sync server library
//!
//! Exports the application state, router and building blocks for the binary
//! and the integration tests.

pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod policy;
pub mod reconciler;
pub mod routes;
pub mod security;

pub use config::{Cli, Config};
pub use db::{open_database, Db};
pub use error::{AppError, Result};
pub use logging::LogDirectory;
pub use routes::router;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: Config,
    pub logs: LogDirectory,
}

impl AppState {
    pub fn new(db: Db, config: Config, logs: LogDirectory) -> Self {
        Self { db, config, logs }
    }
}
