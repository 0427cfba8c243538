use crate::constants::MAX_KEY_GENERATION_ATTEMPTS;
use crate::db::{is_unique_violation, Db};
use crate::error::{AppError, Result};
use crate::models::{AccessKey, AccessKeyRow};
use crate::policy::Scope;
use crate::security::{digest_secret, generate_access_key};

const KEY_COLUMNS: &str =
    "id, user_id, access_key, secret_digest, created_at, expires_at, is_expired";

/// A stored key together with the one-time plaintext secret
#[derive(Debug, Clone)]
pub struct NewAccessKey {
    pub key: AccessKey,
    pub secret_key: String,
}

/// Generate and store a new key pair for `user_id`
///
/// The public identifier is drawn again if it collides with an existing one.
/// A `user_id` with no user row stores nothing and yields `UserNotFound`.
pub async fn issue(
    db: &Db,
    user_id: i64,
    expires_at: Option<i64>,
    app_secret_key: &str,
    now: i64,
) -> Result<NewAccessKey> {
    for attempt in 1..=MAX_KEY_GENERATION_ATTEMPTS {
        let (access_key, secret_key) = generate_access_key();
        let secret_digest = digest_secret(&secret_key, app_secret_key)?;

        let result = sqlx::query_as::<_, AccessKey>(&format!(
            "INSERT INTO access_keys (user_id, access_key, secret_digest, created_at, expires_at, is_expired) \
             SELECT ?, ?, ?, ?, ?, 0 WHERE EXISTS (SELECT 1 FROM users WHERE id = ?) \
             RETURNING {}",
            KEY_COLUMNS
        ))
        .bind(user_id)
        .bind(&access_key)
        .bind(&secret_digest)
        .bind(now)
        .bind(expires_at)
        .bind(user_id)
        .fetch_all(db)
        .await;

        match result {
            Ok(rows) => {
                let key = rows.into_iter().next().ok_or(AppError::UserNotFound)?;
                return Ok(NewAccessKey { key, secret_key });
            }
            Err(e) if is_unique_violation(&e) => {
                tracing::warn!("Access key collision on attempt {}, regenerating", attempt);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(AppError::KeyGenerationExhausted)
}

/// Look a key up by its public identifier, with the owner's username
pub async fn find_by_access_key(db: &Db, access_key: &str) -> Result<Option<(AccessKey, String)>> {
    let row = sqlx::query_as::<_, (i64, i64, String, String, i64, Option<i64>, bool, String)>(
        "SELECT k.id, k.user_id, k.access_key, k.secret_digest, k.created_at, k.expires_at, \
                k.is_expired, u.username \
         FROM access_keys k JOIN users u ON u.id = k.user_id \
         WHERE k.access_key = ?",
    )
    .bind(access_key)
    .fetch_optional(db)
    .await?;

    Ok(row.map(
        |(id, user_id, access_key, secret_digest, created_at, expires_at, is_expired, username)| {
            let key = AccessKey {
                id,
                user_id,
                access_key,
                secret_digest,
                created_at,
                expires_at,
                is_expired,
            };
            (key, username)
        },
    ))
}

pub async fn find_by_id(db: &Db, id: i64) -> Result<Option<AccessKey>> {
    let key = sqlx::query_as::<_, AccessKey>(&format!(
        "SELECT {} FROM access_keys WHERE id = ?",
        KEY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(key)
}

pub async fn list(db: &Db, scope: Scope) -> Result<Vec<AccessKeyRow>> {
    let owner = scope.owner_filter();
    let rows = sqlx::query_as::<_, AccessKeyRow>(
        "SELECT k.id, k.user_id, u.username, k.access_key, k.created_at, k.expires_at, k.is_expired \
         FROM access_keys k JOIN users u ON u.id = k.user_id \
         WHERE (? IS NULL OR k.user_id = ?) \
         ORDER BY k.id",
    )
    .bind(owner)
    .bind(owner)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn delete(db: &Db, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM access_keys WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Revoke a key without deleting it
pub async fn mark_expired(db: &Db, id: i64) -> Result<bool> {
    let result = sqlx::query("UPDATE access_keys SET is_expired = 1 WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}
