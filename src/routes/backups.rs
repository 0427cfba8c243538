//! Backup management for logged-in users.
//!
//! These endpoints never touch sync counters or the ledger; only device
//! transfers through `/api/sync` do.

use axum::{extract::State, Json};

use crate::db::backups;
use crate::error::{AppError, Result};
use crate::gate::{Identity, SessionUser};
use crate::models::{Backup, BackupDetail, BackupSummary, ExportEnvelope};
use crate::policy::{authorize_owner_or, scope_for};
use crate::routes::{validation::RecordId, Data, Message};
use crate::AppState;

/// Load a backup the caller may see; a foreign backup looks missing
async fn visible_backup(state: &AppState, identity: &Identity, id: i64) -> Result<Backup> {
    let backup = backups::find_by_id(&state.db, id)
        .await?
        .ok_or(AppError::BackupNotFound)?;
    authorize_owner_or(identity, backup.user_id, AppError::BackupNotFound)?;
    Ok(backup)
}

pub async fn list_backups(
    State(state): State<AppState>,
    SessionUser(identity): SessionUser,
) -> Result<Json<Data<Vec<BackupSummary>>>> {
    let rows = backups::list(&state.db, scope_for(&identity)).await?;
    Ok(Json(Data::new(rows.into_iter().map(Into::into).collect())))
}

pub async fn get_backup(
    State(state): State<AppState>,
    SessionUser(identity): SessionUser,
    RecordId(id): RecordId,
) -> Result<Json<Data<BackupDetail>>> {
    let backup = visible_backup(&state, &identity, id).await?;
    Ok(Json(Data::new(backup.detail()?)))
}

pub async fn delete_backup(
    State(state): State<AppState>,
    SessionUser(identity): SessionUser,
    RecordId(id): RecordId,
) -> Result<Json<Message>> {
    let backup = visible_backup(&state, &identity, id).await?;

    if !backups::delete(&state.db, backup.id).await? {
        return Err(AppError::BackupNotFound);
    }

    tracing::info!(
        "User {} deleted backup '{}' of user {}",
        identity.username,
        backup.name,
        backup.user_id
    );
    Ok(Json(Message::new("Backup deleted")))
}

/// Export envelope for a browser download
pub async fn download_backup(
    State(state): State<AppState>,
    SessionUser(identity): SessionUser,
    RecordId(id): RecordId,
) -> Result<Json<ExportEnvelope>> {
    let backup = visible_backup(&state, &identity, id).await?;
    Ok(Json(backup.export()?))
}
