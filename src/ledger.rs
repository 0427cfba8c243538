//! Sync ledger: an append-only audit trail of device uploads and downloads.

use crate::constants::SECONDS_PER_DAY;
use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::{NewSyncRecord, SyncRecordRow, SyncStats};
use crate::policy::Scope;

/// Append one ledger row stamped `now`
pub async fn record(db: &Db, entry: &NewSyncRecord<'_>, now: i64) -> Result<i64> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO sync_records \
             (backup_name, trans_type, access_key_id, access_key, user_id, created_at) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(entry.backup_name)
    .bind(entry.kind.as_str())
    .bind(entry.access_key_id)
    .bind(entry.access_key)
    .bind(entry.user_id)
    .bind(now)
    .fetch_all(db)
    .await?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(id)
}

/// Append a ledger row as a secondary effect of a sync
///
/// The primary write has already succeeded, so a failure here is logged
/// rather than returned.
pub async fn record_after_sync(db: &Db, entry: &NewSyncRecord<'_>, now: i64) {
    if let Err(e) = record(db, entry, now).await {
        tracing::error!(
            "Failed to record {} of backup '{}' for user {}: {}",
            entry.kind.as_str(),
            entry.backup_name,
            entry.user_id,
            e
        );
    }
}

/// Ledger rows in scope, most recent first
pub async fn list(db: &Db, scope: Scope) -> Result<Vec<SyncRecordRow>> {
    let owner = scope.owner_filter();
    let rows = sqlx::query_as::<_, SyncRecordRow>(
        "SELECT r.id, r.backup_name, r.trans_type, r.access_key_id, r.access_key, \
                r.user_id, u.username, r.created_at \
         FROM sync_records r LEFT JOIN users u ON u.id = r.user_id \
         WHERE (? IS NULL OR r.user_id = ?) \
         ORDER BY r.created_at DESC, r.id DESC",
    )
    .bind(owner)
    .bind(owner)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Delete rows older than `days` days; `days == 0` deletes every row
///
/// Returns the number of rows removed.
pub async fn clean(db: &Db, days: u32, now: i64) -> Result<u64> {
    let result = if days == 0 {
        sqlx::query("DELETE FROM sync_records").execute(db).await?
    } else {
        let cutoff = now - i64::from(days) * SECONDS_PER_DAY;
        sqlx::query("DELETE FROM sync_records WHERE created_at < ?")
            .bind(cutoff)
            .execute(db)
            .await?
    };
    Ok(result.rows_affected())
}

pub async fn delete(db: &Db, id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM sync_records WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::SyncRecordNotFound);
    }
    Ok(())
}

/// Global counters, not scoped to any owner
pub async fn stats(db: &Db) -> Result<SyncStats> {
    let stats = sqlx::query_as::<_, SyncStats>(
        "SELECT COUNT(*) AS total, \
                COALESCE(SUM(CASE WHEN trans_type = 'upload' THEN 1 ELSE 0 END), 0) AS uploads, \
                COALESCE(SUM(CASE WHEN trans_type = 'download' THEN 1 ELSE 0 END), 0) AS downloads \
         FROM sync_records",
    )
    .fetch_one(db)
    .await?;
    Ok(stats)
}
