use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::gate::{AdminUser, SessionUser};
use crate::ledger;
use crate::models::{SyncRecordView, SyncStats};
use crate::policy::scope_for;
use crate::routes::{
    validation::{JsonBody, RecordId},
    Data, Message,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CleanRequest {
    /// Age threshold in days; 0 removes everything
    pub days: u32,
}

#[derive(Debug, Serialize)]
pub struct CleanResponse {
    pub message: &'static str,
    pub deleted: u64,
}

pub async fn list_records(
    State(state): State<AppState>,
    SessionUser(identity): SessionUser,
) -> Result<Json<Data<Vec<SyncRecordView>>>> {
    let rows = ledger::list(&state.db, scope_for(&identity)).await?;
    Ok(Json(Data::new(rows.into_iter().map(Into::into).collect())))
}

pub async fn record_stats(
    State(state): State<AppState>,
    SessionUser(_): SessionUser,
) -> Result<Json<SyncStats>> {
    Ok(Json(ledger::stats(&state.db).await?))
}

pub async fn clean_records(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(payload): JsonBody<CleanRequest>,
) -> Result<Json<CleanResponse>> {
    let deleted = ledger::clean(&state.db, payload.days, Utc::now().timestamp()).await?;

    tracing::info!(
        "Admin {} cleaned {} sync records (days: {})",
        admin.username,
        deleted,
        payload.days
    );

    Ok(Json(CleanResponse {
        message: "Sync records cleaned",
        deleted,
    }))
}

pub async fn delete_record(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    RecordId(id): RecordId,
) -> Result<Json<Message>> {
    ledger::delete(&state.db, id).await?;
    tracing::info!("Admin {} deleted sync record {}", admin.username, id);
    Ok(Json(Message::new("Sync record deleted")))
}
