use serde::{Deserialize, Serialize};

use crate::constants::MAX_USERNAME_LEN;
use crate::routes::timestamp_to_rfc3339;

/// User row as stored in SQLite
/// Timestamps are Unix seconds for compact, comparable storage
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Argon2id PHC string, never the password itself
    pub password_hash: String,
    pub is_admin: bool,
    pub need_change_pwd: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// User model for API responses (credential redacted)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
    pub need_change_pwd: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            is_admin: user.is_admin,
            need_change_pwd: user.need_change_pwd,
            created_at: timestamp_to_rfc3339(user.created_at),
            updated_at: timestamp_to_rfc3339(user.updated_at),
        }
    }
}

impl User {
    /// Usernames are 1..=50 printable characters without surrounding whitespace
    pub fn validate_username(username: &str) -> bool {
        !username.is_empty()
            && username.chars().count() <= MAX_USERNAME_LEN
            && username.trim() == username
            && !username.chars().any(char::is_control)
    }
}
