use axum::{extract::State, Json};
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::gate::AdminUser;
use crate::logging::LogFileInfo;
use crate::routes::{validation::JsonBody, Data};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CleanLogsRequest {
    /// Delete logs dated more than this many days ago; 0 keeps only today's
    pub days: u32,
}

#[derive(Debug, Serialize)]
pub struct CleanLogsResponse {
    pub message: &'static str,
    pub deleted: usize,
}

pub async fn list_logs(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Data<Vec<LogFileInfo>>>> {
    let logs = state.logs.clone();
    let files = tokio::task::spawn_blocking(move || logs.list_files()).await??;
    Ok(Json(Data::new(files)))
}

pub async fn clean_logs(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(payload): JsonBody<CleanLogsRequest>,
) -> Result<Json<CleanLogsResponse>> {
    let logs = state.logs.clone();
    let today = Local::now().date_naive();
    let deleted = tokio::task::spawn_blocking(move || logs.clean(payload.days, today)).await??;

    tracing::info!(
        "Admin {} cleaned {} log files (days: {})",
        admin.username,
        deleted,
        payload.days
    );

    Ok(Json(CleanLogsResponse {
        message: "Log files cleaned",
        deleted,
    }))
}
