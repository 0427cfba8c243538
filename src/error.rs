use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::gate::Denial;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    Denied(#[from] Denial),

    #[error("User not found")]
    UserNotFound,

    #[error("Backup not found")]
    BackupNotFound,

    #[error("Access key not found")]
    AccessKeyNotFound,

    #[error("Sync record not found")]
    SyncRecordNotFound,

    #[error("Username already exists")]
    UserAlreadyExists,

    #[error("Backup name already exists")]
    BackupNameTaken,

    #[error("{0}")]
    UserHasDependents(&'static str),

    #[error("Could not allocate a unique access key")]
    KeyGenerationExhausted,
}

impl AppError {
    fn internal(&self) -> Option<&'static str> {
        match self {
            AppError::Database(_) => Some("Database error"),
            AppError::Serialization(_) => Some("Serialization error"),
            AppError::Token(_) => Some("Token error"),
            AppError::PasswordHash(_) => Some("Password hashing error"),
            AppError::Io(_) => Some("I/O error"),
            AppError::TaskJoin(_) => Some("Task join error"),
            AppError::KeyGenerationExhausted => Some("Key generation error"),
            _ => None,
        }
    }
}

/// Implement IntoResponse to convert AppError into HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(kind) = self.internal() {
            tracing::error!("{}: {:?}", kind, self);
            let body = Json(json!({ "error": "Internal server error" }));
            return (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
        }

        let status = match &self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Denied(denial) if denial.is_forbidden() => StatusCode::FORBIDDEN,
            AppError::Denied(_) => StatusCode::UNAUTHORIZED,
            AppError::UserNotFound
            | AppError::BackupNotFound
            | AppError::AccessKeyNotFound
            | AppError::SyncRecordNotFound => StatusCode::NOT_FOUND,
            AppError::UserAlreadyExists
            | AppError::BackupNameTaken
            | AppError::UserHasDependents(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::PayloadTooLarge => "Backup size exceeds maximum allowed".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Result type alias for application results
pub type Result<T> = std::result::Result<T, AppError>;
