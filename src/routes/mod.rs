pub mod backups;
pub mod health;
pub mod keys;
pub mod logs;
pub mod session;
pub mod sync;
pub mod sync_records;
pub mod users;
pub mod validation;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::{ServeDir, ServeFile},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::Config;
use crate::constants::MAX_REQUEST_BODY_BYTES;
use crate::AppState;

pub use health::health_check;
pub use validation::timestamp_to_rfc3339;

/// `{"data": ...}` envelope used by listing and detail responses
#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

impl<T> Data<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// `{"message": ...}` body for actions without a result
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

impl Message {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins = if config.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}

/// Build the application router with every endpoint, the web front end and
/// the middleware layers
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/login", post(session::login))
        .route("/me", get(session::me))
        .route("/change-password", post(session::change_password))
        .route("/keys", get(keys::list_keys).post(keys::create_key))
        .route("/keys/:id", axum::routing::delete(keys::delete_key))
        .route("/keys/:id/expire", post(keys::expire_key))
        .route("/backups", get(backups::list_backups))
        .route(
            "/backups/:id",
            get(backups::get_backup).delete(backups::delete_backup),
        )
        .route("/backups/:id/download", get(backups::download_backup))
        .route("/sync/list", get(sync::sync_list))
        .route("/sync/download/:id", get(sync::sync_download))
        .route("/sync/upload", post(sync::sync_upload))
        .route("/sync-records", get(sync_records::list_records))
        .route("/sync-records/stats", get(sync_records::record_stats))
        .route("/sync-records/clean", post(sync_records::clean_records))
        .route(
            "/sync-records/:id",
            axum::routing::delete(sync_records::delete_record),
        )
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/logs", get(logs::list_logs))
        .route("/logs/clean", post(logs::clean_logs));

    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let cors = cors_layer(&state.config);
    let static_dir = PathBuf::from(&state.config.static_dir);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .route_service("/favicon.ico", ServeFile::new(static_dir.join("favicon.ico")))
        .nest_service("/static", ServeDir::new(&static_dir))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TimeoutLayer::new(timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}
