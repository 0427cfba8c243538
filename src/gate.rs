//! Authorization gate.
//!
//! Each protected request runs a fixed pipeline: extract credentials,
//! authenticate them into an identity, then check role. Every stage is a plain
//! function returning `Result<_, Denial>`; the axum extractors at the bottom
//! only wire those stages to request headers, so a failed stage rejects the
//! request before any handler code runs.
//!
//! The two credential schemes are not interchangeable: a session token never
//! satisfies the access-key gate and an access-key pair never satisfies the
//! session gate.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use chrono::Utc;

use crate::constants::{ACCESS_KEY_HEADER, SECRET_KEY_HEADER};
use crate::db::{access_keys, Db};
use crate::error::AppError;
use crate::security::{verify_access_key, verify_session_token, AccessKeyError};
use crate::AppState;

/// Identity injected by the session gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
}

/// Identity injected by the access-key gate, bound to the key that was used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub user_id: i64,
    pub username: String,
    pub access_key_id: i64,
    pub access_key: String,
}

/// Why the gate refused a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("Missing authorization header")]
    MissingToken,
    #[error("Authorization header must use the Bearer scheme")]
    MalformedAuthorization,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Missing access key credentials")]
    MissingAccessKey,
    #[error("{0}")]
    AccessKey(#[from] AccessKeyError),
    #[error("Admin privileges required")]
    AdminRequired,
    #[error("Not permitted to access this resource")]
    NotOwner,
}

impl Denial {
    /// Authenticated but not allowed, as opposed to not authenticated
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Denial::AdminRequired | Denial::NotOwner)
    }
}

// =============================================================================
// Pipeline stages
// =============================================================================

/// Extract the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, Denial> {
    let value = headers.get(AUTHORIZATION).ok_or(Denial::MissingToken)?;
    let value = value.to_str().map_err(|_| Denial::MalformedAuthorization)?;

    match value.split_once(' ') {
        Some(("Bearer", token)) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(Denial::MalformedAuthorization),
    }
}

/// Extract the (public identifier, secret) pair from their two headers
pub fn access_key_pair(headers: &HeaderMap) -> Result<(&str, &str), Denial> {
    fn read<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    match (
        read(headers, ACCESS_KEY_HEADER),
        read(headers, SECRET_KEY_HEADER),
    ) {
        (Some(access_key), Some(secret_key)) => Ok((access_key, secret_key)),
        _ => Err(Denial::MissingAccessKey),
    }
}

/// Session gate: verify the bearer token into an identity
pub fn authenticate_session(headers: &HeaderMap, secret: &str) -> Result<Identity, Denial> {
    let token = bearer_token(headers)?;
    let claims = verify_session_token(token, secret).map_err(|e| {
        tracing::debug!("Rejected session token: {}", e);
        Denial::InvalidToken
    })?;

    Ok(Identity {
        user_id: claims.user_id,
        username: claims.username,
        is_admin: claims.is_admin,
    })
}

/// Access-key gate: look the key up and verify secret and expiry
pub async fn authenticate_device(
    db: &Db,
    access_key: &str,
    secret_key: &str,
    app_secret_key: &str,
    now: i64,
) -> Result<DeviceIdentity, AppError> {
    let (key, username) = access_keys::find_by_access_key(db, access_key)
        .await?
        .ok_or(Denial::AccessKey(AccessKeyError::NotFound))?;

    if let Err(e) = verify_access_key(&key, secret_key, app_secret_key, now) {
        tracing::warn!("Access key {} rejected: {}", key.access_key, e);
        return Err(Denial::AccessKey(e).into());
    }

    Ok(DeviceIdentity {
        user_id: key.user_id,
        username,
        access_key_id: key.id,
        access_key: key.access_key,
    })
}

/// Admin gate: only meaningful on an identity the session gate produced
pub fn require_admin(identity: Identity) -> Result<Identity, Denial> {
    if identity.is_admin {
        Ok(identity)
    } else {
        Err(Denial::AdminRequired)
    }
}

// =============================================================================
// Extractors
// =============================================================================

/// Any logged-in user
#[derive(Debug, Clone)]
pub struct SessionUser(pub Identity);

/// A logged-in administrator
#[derive(Debug, Clone)]
pub struct AdminUser(pub Identity);

/// A device authenticated by access key pair
#[derive(Debug, Clone)]
pub struct DeviceKey(pub DeviceIdentity);

#[axum::async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let identity = authenticate_session(&parts.headers, &state.config.app_secret_key)?;
        Ok(SessionUser(identity))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let SessionUser(identity) = SessionUser::from_request_parts(parts, state).await?;
        let username = identity.username.clone();
        let identity = require_admin(identity).map_err(|denial| {
            tracing::warn!(
                "User {} denied admin operation {} {}",
                username,
                parts.method,
                parts.uri.path()
            );
            denial
        })?;
        Ok(AdminUser(identity))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for DeviceKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let (access_key, secret_key) = access_key_pair(&parts.headers)?;
        let device = authenticate_device(
            &state.db,
            access_key,
            secret_key,
            &state.config.app_secret_key,
            Utc::now().timestamp(),
        )
        .await?;
        Ok(DeviceKey(device))
    }
}
