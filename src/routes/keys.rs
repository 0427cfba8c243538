use axum::{body::Bytes, extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_KEY_EXPIRE_DAYS, SECONDS_PER_DAY};
use crate::db::access_keys;
use crate::error::{AppError, Result};
use crate::gate::{Denial, SessionUser};
use crate::models::{AccessKeyView, IssuedAccessKey};
use crate::policy::{authorize_owner, scope_for};
use crate::routes::{timestamp_to_rfc3339, validation::RecordId, Data, Message};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    /// Days until the key expires; 0 never expires
    pub expire_days: u32,
}

#[derive(Debug, Serialize)]
pub struct CreateKeyResponse {
    pub message: &'static str,
    pub data: IssuedAccessKey,
}

/// Expiry requested by a create-key body; a missing or unreadable body
/// falls back to the default lifetime
fn requested_expire_days(body: &[u8]) -> u32 {
    serde_json::from_slice::<CreateKeyRequest>(body)
        .map(|req| req.expire_days)
        .unwrap_or(DEFAULT_KEY_EXPIRE_DAYS)
}

fn expires_at(expire_days: u32, now: i64) -> Option<i64> {
    match expire_days {
        0 => None,
        days => Some(now + i64::from(days) * SECONDS_PER_DAY),
    }
}

/// Own keys, or every key for an admin; secrets are never listed
pub async fn list_keys(
    State(state): State<AppState>,
    SessionUser(identity): SessionUser,
) -> Result<Json<Data<Vec<AccessKeyView>>>> {
    let rows = access_keys::list(&state.db, scope_for(&identity)).await?;
    Ok(Json(Data::new(rows.into_iter().map(Into::into).collect())))
}

/// Issue a key pair for the caller; the secret appears only in this response
pub async fn create_key(
    State(state): State<AppState>,
    SessionUser(identity): SessionUser,
    body: Bytes,
) -> Result<Json<CreateKeyResponse>> {
    let now = Utc::now().timestamp();
    let expire_days = requested_expire_days(&body);

    let issued = access_keys::issue(
        &state.db,
        identity.user_id,
        expires_at(expire_days, now),
        &state.config.app_secret_key,
        now,
    )
    .await
    .map_err(|e| match e {
        // The token outlived its user
        AppError::UserNotFound => AppError::Denied(Denial::InvalidToken),
        e => e,
    })?;

    tracing::info!(
        "User {} created access key {} (expires in {} days)",
        identity.username,
        issued.key.access_key,
        expire_days
    );

    Ok(Json(CreateKeyResponse {
        message: "Access key created",
        data: IssuedAccessKey {
            id: issued.key.id,
            access_key: issued.key.access_key,
            secret_key: issued.secret_key,
            created_at: timestamp_to_rfc3339(issued.key.created_at),
            expires_at: issued.key.expires_at.map(timestamp_to_rfc3339),
        },
    }))
}

pub async fn delete_key(
    State(state): State<AppState>,
    SessionUser(identity): SessionUser,
    RecordId(id): RecordId,
) -> Result<Json<Message>> {
    let key = access_keys::find_by_id(&state.db, id)
        .await?
        .ok_or(AppError::AccessKeyNotFound)?;
    authorize_owner(&identity, key.user_id)?;

    if !access_keys::delete(&state.db, id).await? {
        return Err(AppError::AccessKeyNotFound);
    }

    tracing::info!("User {} deleted access key {}", identity.username, key.access_key);
    Ok(Json(Message::new("Access key deleted")))
}

/// Revoke a key while keeping it listed
pub async fn expire_key(
    State(state): State<AppState>,
    SessionUser(identity): SessionUser,
    RecordId(id): RecordId,
) -> Result<Json<Message>> {
    let key = access_keys::find_by_id(&state.db, id)
        .await?
        .ok_or(AppError::AccessKeyNotFound)?;
    authorize_owner(&identity, key.user_id)?;

    if !access_keys::mark_expired(&state.db, id).await? {
        return Err(AppError::AccessKeyNotFound);
    }

    tracing::info!("User {} expired access key {}", identity.username, key.access_key);
    Ok(Json(Message::new("Access key expired")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_expire_days() {
        assert_eq!(requested_expire_days(b""), DEFAULT_KEY_EXPIRE_DAYS);
        assert_eq!(requested_expire_days(b"{}"), DEFAULT_KEY_EXPIRE_DAYS);
        assert_eq!(requested_expire_days(br#"{"expire_days": -1}"#), DEFAULT_KEY_EXPIRE_DAYS);
        assert_eq!(requested_expire_days(br#"{"expire_days": 7}"#), 7);
        assert_eq!(requested_expire_days(br#"{"expire_days": 0}"#), 0);
    }

    #[test]
    fn test_expires_at() {
        assert_eq!(expires_at(0, 1_000), None);
        assert_eq!(expires_at(2, 1_000), Some(1_000 + 2 * SECONDS_PER_DAY));
    }
}
