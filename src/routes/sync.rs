use axum::{extract::State, Json};
use chrono::Utc;

use crate::error::Result;
use crate::gate::DeviceKey;
use crate::models::{BackupSummary, ExportEnvelope};
use crate::reconciler::{self, UploadReceipt, UploadRequest};
use crate::routes::{validation::JsonBody, validation::RecordId, Data};
use crate::AppState;

pub async fn sync_list(
    State(state): State<AppState>,
    DeviceKey(device): DeviceKey,
) -> Result<Json<Data<Vec<BackupSummary>>>> {
    let backups = reconciler::list(&state.db, &device).await?;
    Ok(Json(Data::new(backups)))
}

pub async fn sync_download(
    State(state): State<AppState>,
    DeviceKey(device): DeviceKey,
    RecordId(id): RecordId,
) -> Result<Json<ExportEnvelope>> {
    let envelope = reconciler::download(&state.db, &device, id, Utc::now().timestamp()).await?;
    Ok(Json(envelope))
}

pub async fn sync_upload(
    State(state): State<AppState>,
    DeviceKey(device): DeviceKey,
    JsonBody(payload): JsonBody<UploadRequest>,
) -> Result<Json<UploadReceipt>> {
    let receipt = reconciler::upload(&state.db, &device, payload, Utc::now().timestamp()).await?;
    Ok(Json(receipt))
}
