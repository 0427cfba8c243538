use serde::Serialize;
use serde_json::Value;

use crate::constants::{EXPORT_VERSION, MAX_BACKUP_NAME_LEN};
use crate::routes::timestamp_to_rfc3339;

/// Backup row as stored in SQLite
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Backup {
    pub id: i64,
    pub user_id: i64,
    /// Unique per owner, not globally
    pub name: String,
    /// Payload re-encoded as compact JSON text
    pub data: String,
    /// Byte length of `data`
    pub size: i64,
    pub sync_count: i64,
    /// Whether the client encrypted the password entries inside `data`
    pub passwords_encrypted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Backup metadata row (no payload) joined with the owner's name
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BackupSummaryRow {
    pub id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub name: String,
    pub size: i64,
    pub sync_count: i64,
    pub passwords_encrypted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Backup metadata for listings; the payload is never included
#[derive(Debug, Clone, Serialize)]
pub struct BackupSummary {
    pub id: i64,
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub name: String,
    pub size: i64,
    pub sync_count: i64,
    pub passwords_encrypted: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<BackupSummaryRow> for BackupSummary {
    fn from(row: BackupSummaryRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            username: row.username,
            name: row.name,
            size: row.size,
            sync_count: row.sync_count,
            passwords_encrypted: row.passwords_encrypted,
            created_at: timestamp_to_rfc3339(row.created_at),
            updated_at: timestamp_to_rfc3339(row.updated_at),
        }
    }
}

/// Single backup with its decoded payload
#[derive(Debug, Clone, Serialize)]
pub struct BackupDetail {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub size: i64,
    pub sync_count: i64,
    pub passwords_encrypted: bool,
    pub created_at: String,
    pub updated_at: String,
    pub data: Value,
}

/// Full export format shared by the web download and device sync
#[derive(Debug, Clone, Serialize)]
pub struct ExportEnvelope {
    pub version: &'static str,
    #[serde(rename = "exportDate")]
    pub export_date: String,
    #[serde(rename = "passwordsEncrypted")]
    pub passwords_encrypted: bool,
    pub data: Value,
}

impl Backup {
    /// Names are non-empty once trimmed and at most 255 characters
    pub fn validate_name(name: &str) -> bool {
        let trimmed = name.trim();
        !trimmed.is_empty() && trimmed.chars().count() <= MAX_BACKUP_NAME_LEN
    }

    /// Decode the stored payload
    pub fn payload(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.data)
    }

    /// Build the export envelope; `exportDate` is the last-modified time
    pub fn export(&self) -> serde_json::Result<ExportEnvelope> {
        Ok(ExportEnvelope {
            version: EXPORT_VERSION,
            export_date: timestamp_to_rfc3339(self.updated_at),
            passwords_encrypted: self.passwords_encrypted,
            data: self.payload()?,
        })
    }

    pub fn detail(&self) -> serde_json::Result<BackupDetail> {
        Ok(BackupDetail {
            id: self.id,
            user_id: self.user_id,
            name: self.name.clone(),
            size: self.size,
            sync_count: self.sync_count,
            passwords_encrypted: self.passwords_encrypted,
            created_at: timestamp_to_rfc3339(self.created_at),
            updated_at: timestamp_to_rfc3339(self.updated_at),
            data: self.payload()?,
        })
    }
}
