use serde::{Deserialize, Serialize};

use crate::routes::timestamp_to_rfc3339;

/// Direction of a sync transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Upload,
    Download,
}

impl TransferKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferKind::Upload => "upload",
            TransferKind::Download => "download",
        }
    }
}

/// Ledger entry about to be appended
#[derive(Debug, Clone)]
pub struct NewSyncRecord<'a> {
    pub backup_name: &'a str,
    pub kind: TransferKind,
    pub access_key_id: i64,
    pub access_key: &'a str,
    pub user_id: i64,
}

/// Ledger row joined with the acting user's name
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncRecordRow {
    pub id: i64,
    pub backup_name: String,
    pub trans_type: String,
    pub access_key_id: i64,
    pub access_key: String,
    pub user_id: i64,
    /// `None` once the acting user has been deleted
    pub username: Option<String>,
    pub created_at: i64,
}

/// Sync record model for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SyncRecordView {
    pub id: i64,
    pub backup_name: String,
    pub trans_type: String,
    pub access_key_id: i64,
    pub access_key: String,
    pub user_id: i64,
    pub username: Option<String>,
    pub created_at: String,
}

impl From<SyncRecordRow> for SyncRecordView {
    fn from(row: SyncRecordRow) -> Self {
        Self {
            id: row.id,
            backup_name: row.backup_name,
            trans_type: row.trans_type,
            access_key_id: row.access_key_id,
            access_key: row.access_key,
            user_id: row.user_id,
            username: row.username,
            created_at: timestamp_to_rfc3339(row.created_at),
        }
    }
}

/// Global ledger counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SyncStats {
    pub total: i64,
    pub uploads: i64,
    pub downloads: i64,
}
