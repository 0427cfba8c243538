//! Backup reconciler: the device sync protocol.
//!
//! Devices authenticate with an access key pair and see only their owner's
//! backups. An upload is reconciled on `(owner, name)`: an existing backup is
//! replaced in place, otherwise a new one is created. Every successful
//! transfer bumps the backup's sync counter and lands in the ledger.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{
    ERR_BACKUP_DATA_REQUIRED, ERR_INVALID_BACKUP_NAME, MAX_BACKUP_SIZE_BYTES,
    WARN_BACKUP_SIZE_BYTES,
};
use crate::db::{backups, Db};
use crate::error::{AppError, Result};
use crate::gate::DeviceIdentity;
use crate::ledger;
use crate::models::{Backup, BackupSummary, ExportEnvelope, NewSyncRecord, TransferKind};
use crate::policy::Scope;

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub name: String,
    /// Any JSON value except `null`
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(rename = "passwordsEncrypted", default)]
    pub passwords_encrypted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub outcome: UploadOutcome,
    #[serde(rename = "backupId")]
    pub backup_id: i64,
    pub message: &'static str,
}

/// Re-encode a payload compactly so its size does not depend on how the
/// client formatted the request
pub fn encode_payload(data: &Value) -> Result<String> {
    let encoded = serde_json::to_string(data)?;

    if encoded.len() > MAX_BACKUP_SIZE_BYTES {
        tracing::warn!(
            "Payload too large: {} bytes (max: {})",
            encoded.len(),
            MAX_BACKUP_SIZE_BYTES
        );
        return Err(AppError::PayloadTooLarge);
    }

    Ok(encoded)
}

/// The device owner's backups, metadata only
pub async fn list(db: &Db, device: &DeviceIdentity) -> Result<Vec<BackupSummary>> {
    let rows = backups::list(db, Scope::Owner(device.user_id)).await?;
    Ok(rows.into_iter().map(BackupSummary::from).collect())
}

/// Fetch a backup's export envelope and count the transfer
pub async fn download(
    db: &Db,
    device: &DeviceIdentity,
    backup_id: i64,
    now: i64,
) -> Result<ExportEnvelope> {
    let backup = backups::find_owned(db, backup_id, device.user_id)
        .await?
        .ok_or(AppError::BackupNotFound)?;

    // Decode before any side effect so a corrupt row leaves no trace
    let envelope = backup.export()?;

    backups::increment_sync_count(db, backup.id).await?;
    ledger::record_after_sync(db, &sync_entry(device, &backup.name, TransferKind::Download), now)
        .await;

    tracing::info!(
        "[sync] user {} with key {} downloaded backup '{}'",
        device.username,
        device.access_key,
        backup.name
    );

    Ok(envelope)
}

/// Create or replace the device owner's backup named in the request
pub async fn upload(
    db: &Db,
    device: &DeviceIdentity,
    request: UploadRequest,
    now: i64,
) -> Result<UploadReceipt> {
    let name = request.name.trim();
    if !Backup::validate_name(name) {
        return Err(AppError::InvalidInput(ERR_INVALID_BACKUP_NAME.to_string()));
    }

    let data = request
        .data
        .ok_or_else(|| AppError::InvalidInput(ERR_BACKUP_DATA_REQUIRED.to_string()))?;
    let encoded = encode_payload(&data)?;

    if encoded.len() > WARN_BACKUP_SIZE_BYTES {
        tracing::info!(
            "Large backup '{}' from user {}: {} bytes",
            name,
            device.username,
            encoded.len()
        );
    }

    let updated = backups::replace_payload(
        db,
        device.user_id,
        name,
        &encoded,
        request.passwords_encrypted,
        now,
    )
    .await?;

    let (outcome, backup_id) = match updated {
        Some(id) => (UploadOutcome::Updated, id),
        None => {
            let id = backups::insert(
                db,
                device.user_id,
                name,
                &encoded,
                request.passwords_encrypted,
                now,
            )
            .await?;
            (UploadOutcome::Created, id)
        }
    };

    ledger::record_after_sync(db, &sync_entry(device, name, TransferKind::Upload), now).await;

    let (verb, message) = match outcome {
        UploadOutcome::Created => ("created", "Backup created"),
        UploadOutcome::Updated => ("updated", "Backup updated"),
    };
    tracing::info!(
        "[sync] user {} with key {} {} backup '{}' ({} bytes)",
        device.username,
        device.access_key,
        verb,
        name,
        encoded.len()
    );

    Ok(UploadReceipt {
        outcome,
        backup_id,
        message,
    })
}

fn sync_entry<'a>(
    device: &'a DeviceIdentity,
    backup_name: &'a str,
    kind: TransferKind,
) -> NewSyncRecord<'a> {
    NewSyncRecord {
        backup_name,
        kind,
        access_key_id: device.access_key_id,
        access_key: &device.access_key,
        user_id: device.user_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{access_keys, test_support::test_db, users};
    use serde_json::json;

    const NOW: i64 = 1_760_000_000;

    async fn device(db: &Db, username: &str) -> DeviceIdentity {
        let user = users::insert(db, username, "hash", false, false, NOW).await.unwrap();
        let issued = access_keys::issue(db, user.id, None, "secret", NOW).await.unwrap();
        DeviceIdentity {
            user_id: user.id,
            username: user.username,
            access_key_id: issued.key.id,
            access_key: issued.key.access_key,
        }
    }

    fn request(name: &str, data: Value) -> UploadRequest {
        UploadRequest {
            name: name.to_string(),
            data: Some(data),
            passwords_encrypted: true,
        }
    }

    async fn ledger_rows(db: &Db) -> Vec<(String, i64)> {
        ledger::list(db, Scope::All)
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.trans_type, r.access_key_id))
            .collect()
    }

    #[tokio::test]
    async fn test_first_upload_creates() {
        let (_dir, db) = test_db().await;
        let device = device(&db, "alice").await;

        let receipt = upload(&db, &device, request("laptop", json!({"a": 1})), NOW)
            .await
            .unwrap();

        assert_eq!(receipt.outcome, UploadOutcome::Created);
        let backup = backups::find_by_id(&db, receipt.backup_id).await.unwrap().unwrap();
        assert_eq!(backup.sync_count, 1);
        assert_eq!(backup.user_id, device.user_id);
        assert_eq!(ledger_rows(&db).await, vec![("upload".to_string(), device.access_key_id)]);
    }

    #[tokio::test]
    async fn test_second_upload_updates_same_backup() {
        let (_dir, db) = test_db().await;
        let device = device(&db, "alice").await;

        let first = upload(&db, &device, request("laptop", json!({"v": 1})), NOW)
            .await
            .unwrap();
        let mut second_request = request("laptop", json!({"v": 2, "extra": [true]}));
        second_request.passwords_encrypted = false;
        let second = upload(&db, &device, second_request, NOW + 60).await.unwrap();

        assert_eq!(second.outcome, UploadOutcome::Updated);
        assert_eq!(second.backup_id, first.backup_id);

        let backup = backups::find_by_id(&db, first.backup_id).await.unwrap().unwrap();
        assert_eq!(backup.sync_count, 2);
        assert!(!backup.passwords_encrypted);
        assert_eq!(backup.payload().unwrap(), json!({"v": 2, "extra": [true]}));
        assert_eq!(backup.updated_at, NOW + 60);
        assert_eq!(ledger_rows(&db).await.len(), 2);
    }

    #[tokio::test]
    async fn test_same_name_different_owners_are_separate() {
        let (_dir, db) = test_db().await;
        let alice = device(&db, "alice").await;
        let bob = device(&db, "bob").await;

        let a = upload(&db, &alice, request("laptop", json!(1)), NOW).await.unwrap();
        let b = upload(&db, &bob, request("laptop", json!(2)), NOW).await.unwrap();

        assert_eq!(b.outcome, UploadOutcome::Created);
        assert_ne!(a.backup_id, b.backup_id);

        let alices = backups::find_by_id(&db, a.backup_id).await.unwrap().unwrap();
        assert_eq!(alices.payload().unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_size_ignores_request_formatting() {
        let (_dir, db) = test_db().await;
        let device = device(&db, "alice").await;

        let data: Value = serde_json::from_str("{ \"a\" :   [ 1 ,  2 ] }").unwrap();
        let receipt = upload(&db, &device, request("laptop", data), NOW).await.unwrap();

        let backup = backups::find_by_id(&db, receipt.backup_id).await.unwrap().unwrap();
        assert_eq!(backup.data, r#"{"a":[1,2]}"#);
        assert_eq!(backup.size, 11);
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let (_dir, db) = test_db().await;
        let device = device(&db, "alice").await;

        let blank = upload(&db, &device, request("  ", json!({})), NOW).await;
        assert!(matches!(blank, Err(AppError::InvalidInput(_))));

        let missing = UploadRequest {
            name: "laptop".to_string(),
            data: None,
            passwords_encrypted: false,
        };
        assert!(matches!(
            upload(&db, &device, missing, NOW).await,
            Err(AppError::InvalidInput(_))
        ));

        let huge = json!("x".repeat(MAX_BACKUP_SIZE_BYTES));
        assert!(matches!(
            upload(&db, &device, request("laptop", huge), NOW).await,
            Err(AppError::PayloadTooLarge)
        ));

        assert!(ledger_rows(&db).await.is_empty());
    }

    #[tokio::test]
    async fn test_download_counts_and_records() {
        let (_dir, db) = test_db().await;
        let device = device(&db, "alice").await;
        let payload = json!({
            "partitions": [{"id": 1, "name": "Work", "isPrivate": false}],
            "settings": {"bgType": "gradient", "iconSize": 64},
            "passwords": [{"id": 1_700_000_000_000i64, "password": "enc:abc"}],
            "nested": [[null, 1.5, "s"], {}]
        });
        let receipt = upload(&db, &device, request("laptop", payload.clone()), NOW)
            .await
            .unwrap();

        let envelope = download(&db, &device, receipt.backup_id, NOW + 5).await.unwrap();

        assert_eq!(envelope.data, payload);
        assert!(envelope.passwords_encrypted);
        let backup = backups::find_by_id(&db, receipt.backup_id).await.unwrap().unwrap();
        assert_eq!(backup.sync_count, 2);

        let rows = ledger_rows(&db).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], ("download".to_string(), device.access_key_id));
    }

    #[tokio::test]
    async fn test_download_foreign_backup_is_not_found() {
        let (_dir, db) = test_db().await;
        let alice = device(&db, "alice").await;
        let bob = device(&db, "bob").await;
        let receipt = upload(&db, &alice, request("laptop", json!({})), NOW).await.unwrap();

        let foreign = download(&db, &bob, receipt.backup_id, NOW).await;
        assert!(matches!(foreign, Err(AppError::BackupNotFound)));

        let missing = download(&db, &alice, receipt.backup_id + 100, NOW).await;
        assert!(matches!(missing, Err(AppError::BackupNotFound)));

        let backup = backups::find_by_id(&db, receipt.backup_id).await.unwrap().unwrap();
        assert_eq!(backup.sync_count, 1);
    }

    #[tokio::test]
    async fn test_list_only_own_backups() {
        let (_dir, db) = test_db().await;
        let alice = device(&db, "alice").await;
        let bob = device(&db, "bob").await;
        upload(&db, &alice, request("laptop", json!({})), NOW).await.unwrap();
        upload(&db, &bob, request("desktop", json!({})), NOW).await.unwrap();

        let listed = list(&db, &alice).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "laptop");
    }
}
