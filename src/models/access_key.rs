use serde::Serialize;

use crate::routes::timestamp_to_rfc3339;

/// Access key row as stored in SQLite
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessKey {
    pub id: i64,
    pub user_id: i64,
    /// Public identifier sent in the `x-access-key` header
    pub access_key: String,
    /// HMAC digest of the secret; the secret itself is shown once at creation
    pub secret_digest: String,
    pub created_at: i64,
    /// `None` means the key never expires naturally
    pub expires_at: Option<i64>,
    /// Manual revocation flag, independent of `expires_at`
    pub is_expired: bool,
}

/// Access key joined with its owner's username, as listed to users
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessKeyRow {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub access_key: String,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub is_expired: bool,
}

/// Access key model for API responses
#[derive(Debug, Clone, Serialize)]
pub struct AccessKeyView {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub access_key: String,
    pub created_at: String,
    pub expires_at: Option<String>,
    pub is_expired: bool,
}

impl From<AccessKeyRow> for AccessKeyView {
    fn from(row: AccessKeyRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            username: row.username,
            access_key: row.access_key,
            created_at: timestamp_to_rfc3339(row.created_at),
            expires_at: row.expires_at.map(timestamp_to_rfc3339),
            is_expired: row.is_expired,
        }
    }
}

/// Freshly created key pair; the only response that carries the secret
#[derive(Debug, Clone, Serialize)]
pub struct IssuedAccessKey {
    pub id: i64,
    pub access_key: String,
    pub secret_key: String,
    pub created_at: String,
    pub expires_at: Option<String>,
}
