use crate::db::{is_unique_violation, Db};
use crate::error::{AppError, Result};
use crate::models::{Backup, BackupSummaryRow};
use crate::policy::Scope;

const BACKUP_COLUMNS: &str =
    "id, user_id, name, data, size, sync_count, passwords_encrypted, created_at, updated_at";

/// Metadata of every backup in scope, payload excluded
pub async fn list(db: &Db, scope: Scope) -> Result<Vec<BackupSummaryRow>> {
    let owner = scope.owner_filter();
    let rows = sqlx::query_as::<_, BackupSummaryRow>(
        "SELECT b.id, b.user_id, u.username, b.name, b.size, b.sync_count, \
                b.passwords_encrypted, b.created_at, b.updated_at \
         FROM backups b LEFT JOIN users u ON u.id = b.user_id \
         WHERE (? IS NULL OR b.user_id = ?) \
         ORDER BY b.updated_at DESC, b.id DESC",
    )
    .bind(owner)
    .bind(owner)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find_by_id(db: &Db, id: i64) -> Result<Option<Backup>> {
    let backup = sqlx::query_as::<_, Backup>(&format!(
        "SELECT {} FROM backups WHERE id = ?",
        BACKUP_COLUMNS
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(backup)
}

/// Existence and ownership in one query: a foreign id is indistinguishable
/// from a missing one
pub async fn find_owned(db: &Db, id: i64, user_id: i64) -> Result<Option<Backup>> {
    let backup = sqlx::query_as::<_, Backup>(&format!(
        "SELECT {} FROM backups WHERE id = ? AND user_id = ?",
        BACKUP_COLUMNS
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(backup)
}

/// Replace the payload of the caller's backup named `name`
///
/// Returns the backup id, or `None` when the caller has no backup by that name.
pub async fn replace_payload(
    db: &Db,
    user_id: i64,
    name: &str,
    data: &str,
    passwords_encrypted: bool,
    now: i64,
) -> Result<Option<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        "UPDATE backups SET \
             data = ?, size = ?, sync_count = sync_count + 1, \
             passwords_encrypted = ?, updated_at = ? \
         WHERE user_id = ? AND name = ? RETURNING id",
    )
    .bind(data)
    .bind(data.len() as i64)
    .bind(passwords_encrypted)
    .bind(now)
    .bind(user_id)
    .bind(name)
    .fetch_all(db)
    .await?;
    Ok(ids.into_iter().next())
}

/// Create a backup; creation counts as its first sync
///
/// A name the caller already uses surfaces as `BackupNameTaken`, which is what
/// the losing side of two racing first uploads sees.
pub async fn insert(
    db: &Db,
    user_id: i64,
    name: &str,
    data: &str,
    passwords_encrypted: bool,
    now: i64,
) -> Result<i64> {
    let result = sqlx::query_scalar::<_, i64>(
        "INSERT INTO backups \
             (user_id, name, data, size, sync_count, passwords_encrypted, created_at, updated_at) \
         VALUES (?, ?, ?, ?, 1, ?, ?, ?) RETURNING id",
    )
    .bind(user_id)
    .bind(name)
    .bind(data)
    .bind(data.len() as i64)
    .bind(passwords_encrypted)
    .bind(now)
    .bind(now)
    .fetch_all(db)
    .await;

    match result {
        Ok(ids) => ids
            .into_iter()
            .next()
            .ok_or_else(|| sqlx::Error::RowNotFound.into()),
        Err(e) if is_unique_violation(&e) => Err(AppError::BackupNameTaken),
        Err(e) => Err(e.into()),
    }
}

pub async fn increment_sync_count(db: &Db, id: i64) -> Result<()> {
    sqlx::query("UPDATE backups SET sync_count = sync_count + 1 WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn delete(db: &Db, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM backups WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}
