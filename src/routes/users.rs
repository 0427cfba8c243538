//! Admin-only user management.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::constants::{ERR_INVALID_USERNAME, ERR_PASSWORD_REQUIRED};
use crate::db::users;
use crate::error::{AppError, Result};
use crate::gate::AdminUser;
use crate::models::{User, UserProfile};
use crate::routes::{
    validation::{JsonBody, RecordId},
    Data, Message,
};
use crate::security::hash_password_blocking;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    /// New password; absent or empty keeps the current one
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub is_admin: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub message: &'static str,
    pub data: UserProfile,
}

pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Data<Vec<UserProfile>>>> {
    let users = users::list(&state.db).await?;
    Ok(Json(Data::new(users.into_iter().map(Into::into).collect())))
}

/// Create a user; a taken username is a 409
pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(payload): JsonBody<CreateUserRequest>,
) -> Result<Json<UserResponse>> {
    if !User::validate_username(&payload.username) {
        return Err(AppError::InvalidInput(ERR_INVALID_USERNAME.to_string()));
    }
    if payload.password.is_empty() {
        return Err(AppError::InvalidInput(ERR_PASSWORD_REQUIRED.to_string()));
    }

    let hash = hash_password_blocking(payload.password).await?;
    let user = users::insert(
        &state.db,
        &payload.username,
        &hash,
        payload.is_admin,
        false,
        Utc::now().timestamp(),
    )
    .await?;

    tracing::info!(
        "Admin {} created user {} (admin: {})",
        admin.username,
        user.username,
        user.is_admin
    );

    Ok(Json(UserResponse {
        message: "User created",
        data: user.into(),
    }))
}

pub async fn get_user(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    RecordId(id): RecordId,
) -> Result<Json<Data<UserProfile>>> {
    let user = users::find_by_id(&state.db, id)
        .await?
        .ok_or(AppError::UserNotFound)?;
    Ok(Json(Data::new(user.into())))
}

/// Reset a user's password and/or role
pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    RecordId(id): RecordId,
    JsonBody(payload): JsonBody<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    let hash = match payload.password.filter(|p| !p.is_empty()) {
        Some(password) => Some(hash_password_blocking(password).await?),
        None => None,
    };

    let user = users::update(
        &state.db,
        id,
        hash.as_deref(),
        payload.is_admin,
        Utc::now().timestamp(),
    )
    .await?
    .ok_or(AppError::UserNotFound)?;

    tracing::info!(
        "Admin {} updated user {} (password reset: {}, admin: {})",
        admin.username,
        user.username,
        hash.is_some(),
        user.is_admin
    );

    Ok(Json(UserResponse {
        message: "User updated",
        data: user.into(),
    }))
}

/// Delete a user with no backups and no access keys left
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    RecordId(id): RecordId,
) -> Result<Json<Message>> {
    users::delete(&state.db, id).await?;
    tracing::info!("Admin {} deleted user {}", admin.username, id);
    Ok(Json(Message::new("User deleted")))
}
