pub mod access_key;
pub mod backup;
pub mod sync_record;
pub mod user;

pub use access_key::{AccessKey, AccessKeyRow, AccessKeyView, IssuedAccessKey};
pub use backup::{Backup, BackupDetail, BackupSummary, BackupSummaryRow, ExportEnvelope};
pub use sync_record::{NewSyncRecord, SyncRecordRow, SyncRecordView, SyncStats, TransferKind};
pub use user::{User, UserProfile};
