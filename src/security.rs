use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::constants::{ACCESS_KEY_LEN, ACCESS_KEY_PREFIX, SECRET_KEY_LEN};
use crate::error::{AppError, Result};
use crate::models::{AccessKey, User};

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Password Hashing
// =============================================================================

/// Hash a password with Argon2id and a fresh random salt
///
/// Returns the PHC-formatted hash string that is stored on the user row.
/// This is CPU bound; callers on the async runtime run it via `spawn_blocking`.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::PasswordHash(e.to_string()))
}

/// Verify a password against a stored PHC hash
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed = match PasswordHash::new(password_hash) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("Stored password hash is malformed: {}", e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// `hash_password` on the blocking pool
pub async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

/// `verify_password` on the blocking pool
pub async fn verify_password_blocking(password: String, password_hash: String) -> Result<bool> {
    let verified =
        tokio::task::spawn_blocking(move || verify_password(&password, &password_hash)).await?;
    Ok(verified)
}

// =============================================================================
// Session Tokens
// =============================================================================

/// Claims carried by an interactive session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Issue a signed HS256 session token for a user
///
/// There is no refresh: once `exp` passes the user logs in again.
pub fn issue_session_token(
    user: &User,
    secret: &str,
    ttl_hours: i64,
    now: i64,
) -> Result<String> {
    let claims = SessionClaims {
        user_id: user.id,
        username: user.username.clone(),
        is_admin: user.is_admin,
        iat: now,
        exp: now + ttl_hours * 3600,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify a session token's signature and expiry
///
/// Every failure (malformed, expired, bad signature) collapses into one error;
/// callers only need to know the token is unusable.
pub fn verify_session_token(
    token: &str,
    secret: &str,
) -> std::result::Result<SessionClaims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);

    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

// =============================================================================
// Access Keys
// =============================================================================

/// Why an access key pair was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessKeyError {
    #[error("Access key not found")]
    NotFound,
    #[error("Secret key does not match")]
    SecretMismatch,
    #[error("Access key has expired")]
    Expired,
}

/// Generate random alphanumeric string of the given length
pub fn generate_random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate a new (public identifier, secret) pair
///
/// Uniqueness of the identifier is enforced by the store; the caller retries
/// on a constraint violation.
pub fn generate_access_key() -> (String, String) {
    let access_key = format!(
        "{}{}",
        ACCESS_KEY_PREFIX,
        generate_random_string(ACCESS_KEY_LEN).to_uppercase()
    );
    let secret_key = generate_random_string(SECRET_KEY_LEN);
    (access_key, secret_key)
}

/// Digest of an access key secret, the only form of it the store keeps
///
/// `digest = hex(HMAC-SHA256(app_secret_key, secret))`
pub fn digest_secret(secret: &str, app_secret_key: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(app_secret_key.as_bytes())
        .map_err(|e| AppError::PasswordHash(e.to_string()))?;
    mac.update(secret.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a presented secret against a stored key
///
/// The secret is checked before expiry: without the secret an expired key
/// reports a mismatch.
pub fn verify_access_key(
    key: &AccessKey,
    secret: &str,
    app_secret_key: &str,
    now: i64,
) -> std::result::Result<(), AccessKeyError> {
    if !verify_hmac(secret, &key.secret_digest, app_secret_key) {
        return Err(AccessKeyError::SecretMismatch);
    }

    if key.is_expired || key.expires_at.is_some_and(|expires_at| now > expires_at) {
        return Err(AccessKeyError::Expired);
    }

    Ok(())
}

/// Verify HMAC-SHA256 signature
///
/// # Arguments
/// * `data` - The data that was signed
/// * `signature` - The hex-encoded HMAC signature
/// * `secret` - The shared secret key (from environment)
///
/// The comparison runs in constant time.
pub fn verify_hmac(data: &str, signature: &str, secret: &str) -> bool {
    // Create HMAC instance with secret key
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            tracing::error!("Failed to create HMAC instance");
            return false;
        }
    };

    mac.update(data.as_bytes());

    let sig_bytes = match hex::decode(signature) {
        Ok(bytes) => bytes,
        Err(_) => {
            tracing::warn!("Invalid hex signature format");
            return false;
        }
    };

    mac.verify_slice(&sig_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key";

    fn user(is_admin: bool) -> User {
        User {
            id: 7,
            username: "alice".to_string(),
            password_hash: String::new(),
            is_admin,
            need_change_pwd: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn key(secret: &str, expires_at: Option<i64>, is_expired: bool) -> AccessKey {
        AccessKey {
            id: 1,
            user_id: 7,
            access_key: "AKTEST".to_string(),
            secret_digest: digest_secret(secret, SECRET).unwrap(),
            created_at: 0,
            expires_at,
            is_expired,
        }
    }

    // =========================================================================
    // Password Tests
    // =========================================================================

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();

        assert_ne!(hash, "correct horse");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn test_hash_password_is_salted() {
        let first = hash_password("same").unwrap();
        let second = hash_password("same").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_password_malformed_hash() {
        assert!(!verify_password("anything", "plaintext-password"));
    }

    // =========================================================================
    // Session Token Tests
    // =========================================================================

    #[test]
    fn test_session_token_round_trip() {
        let now = chrono::Utc::now().timestamp();
        let token = issue_session_token(&user(true), SECRET, 24, now).unwrap();

        let claims = verify_session_token(&token, SECRET).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.username, "alice");
        assert!(claims.is_admin);
        assert_eq!(claims.exp, now + 24 * 3600);
    }

    #[test]
    fn test_session_token_wrong_secret() {
        let now = chrono::Utc::now().timestamp();
        let token = issue_session_token(&user(false), SECRET, 24, now).unwrap();

        assert!(verify_session_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_session_token_expired() {
        let issued = chrono::Utc::now().timestamp() - 48 * 3600;
        let token = issue_session_token(&user(false), SECRET, 24, issued).unwrap();

        assert!(verify_session_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_session_token_malformed() {
        assert!(verify_session_token("not-a-token", SECRET).is_err());
        assert!(verify_session_token("", SECRET).is_err());
    }

    // =========================================================================
    // Access Key Tests
    // =========================================================================

    #[test]
    fn test_generate_access_key_shape() {
        let (access_key, secret_key) = generate_access_key();

        assert!(access_key.starts_with(ACCESS_KEY_PREFIX));
        assert_eq!(access_key.len(), ACCESS_KEY_PREFIX.len() + ACCESS_KEY_LEN);
        assert_eq!(secret_key.len(), SECRET_KEY_LEN);
        assert!(secret_key.chars().all(|c| c.is_ascii_alphanumeric()));

        let (other, _) = generate_access_key();
        assert_ne!(access_key, other);
    }

    #[test]
    fn test_verify_access_key_valid() {
        let now = 1_000_000;
        assert_eq!(verify_access_key(&key("s3cret", None, false), "s3cret", SECRET, now), Ok(()));
        assert_eq!(
            verify_access_key(&key("s3cret", Some(now + 10), false), "s3cret", SECRET, now),
            Ok(())
        );
    }

    #[test]
    fn test_verify_access_key_secret_mismatch() {
        let result = verify_access_key(&key("s3cret", None, false), "guess", SECRET, 0);
        assert_eq!(result, Err(AccessKeyError::SecretMismatch));
    }

    #[test]
    fn test_verify_access_key_natural_expiry() {
        let now = 1_000_000;
        let result = verify_access_key(&key("s3cret", Some(now - 1), false), "s3cret", SECRET, now);
        assert_eq!(result, Err(AccessKeyError::Expired));
    }

    #[test]
    fn test_verify_access_key_revoked() {
        let result = verify_access_key(&key("s3cret", None, true), "s3cret", SECRET, 0);
        assert_eq!(result, Err(AccessKeyError::Expired));
    }

    #[test]
    fn test_digest_secret_depends_on_app_secret() {
        let a = digest_secret("s3cret", "one").unwrap();
        let b = digest_secret("s3cret", "two").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }

    // =========================================================================
    // HMAC Tests
    // =========================================================================

    #[test]
    fn test_verify_hmac_valid() {
        let data = "test data";

        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(data.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        assert!(verify_hmac(data, &signature, SECRET));
    }

    #[test]
    fn test_verify_hmac_invalid_signature() {
        assert!(!verify_hmac("test data", &"0".repeat(64), SECRET));
        assert!(!verify_hmac("test data", "not-hex", SECRET));
    }
}
