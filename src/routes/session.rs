use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::constants::{ERR_PASSWORD_REQUIRED, ERR_WRONG_OLD_PASSWORD};
use crate::db::users;
use crate::error::{AppError, Result};
use crate::gate::SessionUser;
use crate::models::UserProfile;
use crate::routes::{validation::JsonBody, Message};
use crate::security::{hash_password_blocking, issue_session_token, verify_password_blocking};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
    pub need_change_pwd: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Exchange username and password for a session token
///
/// Unknown users and wrong passwords get the same 401.
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let user = users::find_by_username(&state.db, payload.username.trim()).await?;

    let Some(user) = user else {
        tracing::warn!("Login attempt for unknown user {}", payload.username);
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password_blocking(payload.password, user.password_hash.clone()).await? {
        tracing::warn!("Wrong password for user {}", user.username);
        return Err(AppError::InvalidCredentials);
    }

    let token = issue_session_token(
        &user,
        &state.config.app_secret_key,
        state.config.token_ttl_hours,
        Utc::now().timestamp(),
    )?;

    tracing::info!("User {} logged in", user.username);

    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        username: user.username,
        is_admin: user.is_admin,
        need_change_pwd: user.need_change_pwd,
    }))
}

/// Profile of the logged-in user
pub async fn me(
    State(state): State<AppState>,
    SessionUser(identity): SessionUser,
) -> Result<Json<UserProfile>> {
    let user = users::find_by_id(&state.db, identity.user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;
    Ok(Json(user.into()))
}

/// Change the caller's own password and clear the forced-change flag
pub async fn change_password(
    State(state): State<AppState>,
    SessionUser(identity): SessionUser,
    JsonBody(payload): JsonBody<ChangePasswordRequest>,
) -> Result<Json<Message>> {
    if payload.new_password.is_empty() {
        return Err(AppError::InvalidInput(ERR_PASSWORD_REQUIRED.to_string()));
    }

    let user = users::find_by_id(&state.db, identity.user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    if !verify_password_blocking(payload.old_password, user.password_hash).await? {
        return Err(AppError::InvalidInput(ERR_WRONG_OLD_PASSWORD.to_string()));
    }

    let hash = hash_password_blocking(payload.new_password).await?;
    if !users::set_password(&state.db, user.id, &hash, false, Utc::now().timestamp()).await? {
        return Err(AppError::UserNotFound);
    }

    tracing::info!("User {} changed their password", user.username);

    Ok(Json(Message::new("Password changed")))
}
