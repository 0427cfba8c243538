/// Maximum serialized backup payload in bytes (5MB)
/// A typical new-tab export with icons is well under 1MB
pub const MAX_BACKUP_SIZE_BYTES: usize = 5_242_880;

/// Warning threshold for large backups (1MB)
/// Log when backups exceed this size for monitoring
pub const WARN_BACKUP_SIZE_BYTES: usize = 1_048_576;

/// Request body limit; leaves room for JSON framing around the payload
pub const MAX_REQUEST_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Maximum length of a backup name
pub const MAX_BACKUP_NAME_LEN: usize = 255;

/// Maximum length of a username
pub const MAX_USERNAME_LEN: usize = 50;

/// Version tag written into every export envelope
pub const EXPORT_VERSION: &str = "2.1";

/// Expiry applied to new access keys when the request carries no body
pub const DEFAULT_KEY_EXPIRE_DAYS: u32 = 30;

/// Length of the random part of a public access key identifier
pub const ACCESS_KEY_LEN: usize = 20;

/// Prefix of every public access key identifier
pub const ACCESS_KEY_PREFIX: &str = "AK";

/// Length of an access key secret
pub const SECRET_KEY_LEN: usize = 40;

/// Attempts at inserting a freshly generated access key before giving up
pub const MAX_KEY_GENERATION_ATTEMPTS: usize = 3;

/// Username of the administrator generated on first start
pub const BOOTSTRAP_ADMIN_USERNAME: &str = "master";

/// Length of the generated administrator password
pub const BOOTSTRAP_PASSWORD_LEN: usize = 12;

pub const SECONDS_PER_DAY: i64 = 86_400;

// =============================================================================
// Request headers
// =============================================================================

/// Header carrying the public access key identifier
pub const ACCESS_KEY_HEADER: &str = "x-access-key";

/// Header carrying the access key secret
pub const SECRET_KEY_HEADER: &str = "x-secret-key";

// =============================================================================
// Error Messages
// =============================================================================

pub const ERR_WRONG_OLD_PASSWORD: &str = "Old password is incorrect";

pub const ERR_INVALID_BACKUP_NAME: &str = "Backup name must be 1-255 characters";

pub const ERR_BACKUP_DATA_REQUIRED: &str = "Backup data is required";

pub const ERR_INVALID_ID: &str = "Invalid id";

pub const ERR_INVALID_USERNAME: &str = "Username must be 1-50 characters without surrounding whitespace";

pub const ERR_PASSWORD_REQUIRED: &str = "Password is required";
