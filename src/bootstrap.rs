//! Startup provisioning of the administrator account.

use crate::config::Config;
use crate::constants::{BOOTSTRAP_ADMIN_USERNAME, BOOTSTRAP_PASSWORD_LEN};
use crate::db::{users, Db};
use crate::error::{AppError, Result};
use crate::security::{generate_random_string, hash_password_blocking};

/// What `ensure_admin` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisioned {
    /// The configured administrator was created or reset
    Configured(String),
    /// A first administrator was generated with a one-time password
    Generated { username: String, password: String },
    /// Users already exist and no administrator was configured
    Unchanged,
}

/// Make sure an administrator can log in
///
/// Configured credentials always win: the account is created, or its password
/// is reset and it is promoted. Without them, an empty database gets a
/// `master` account with a random password that must be changed on first login.
pub async fn ensure_admin(db: &Db, config: &Config, now: i64) -> Result<Provisioned> {
    if let Some((username, password)) = config.admin_credentials() {
        let hash = hash_password_blocking(password.to_string()).await?;
        users::upsert_admin(db, username, &hash, now).await?;
        tracing::info!("Administrator '{}' provisioned from configuration", username);
        return Ok(Provisioned::Configured(username.to_string()));
    }

    if users::count(db).await? > 0 {
        return Ok(Provisioned::Unchanged);
    }

    let password = generate_random_string(BOOTSTRAP_PASSWORD_LEN);
    let hash = hash_password_blocking(password.clone()).await?;
    match users::insert(db, BOOTSTRAP_ADMIN_USERNAME, &hash, true, true, now).await {
        Ok(_) => {}
        // Another instance won the race for the empty database
        Err(AppError::UserAlreadyExists) => return Ok(Provisioned::Unchanged),
        Err(e) => return Err(e),
    }

    tracing::warn!(
        "Created administrator '{}' with password '{}'; change it after the first login",
        BOOTSTRAP_ADMIN_USERNAME,
        password
    );

    Ok(Provisioned::Generated {
        username: BOOTSTRAP_ADMIN_USERNAME.to_string(),
        password,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_db;
    use crate::security::verify_password;

    const NOW: i64 = 1_760_000_000;

    fn config(admin: Option<(&str, &str)>) -> Config {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            database_path: String::new(),
            database_max_connections: 2,
            allowed_origins: vec!["*".to_string()],
            environment: "test".to_string(),
            app_secret_key: "secret".to_string(),
            token_ttl_hours: 24,
            request_timeout_secs: 30,
            admin_username: admin.map(|(u, _)| u.to_string()),
            admin_password: admin.map(|(_, p)| p.to_string()),
            log_dir: String::new(),
            log_keep_days: 3,
            static_dir: String::new(),
        }
    }

    #[tokio::test]
    async fn test_empty_database_gets_master() {
        let (_dir, db) = test_db().await;

        let outcome = ensure_admin(&db, &config(None), NOW).await.unwrap();
        let (username, password) = match outcome {
            Provisioned::Generated { username, password } => (username, password),
            other => panic!("expected a generated administrator, got {:?}", other),
        };
        assert_eq!(username, "master");
        assert_eq!(password.len(), BOOTSTRAP_PASSWORD_LEN);

        let user = users::find_by_username(&db, "master").await.unwrap().unwrap();
        assert!(user.is_admin);
        assert!(user.need_change_pwd);
        assert!(verify_password(&password, &user.password_hash));
    }

    #[tokio::test]
    async fn test_existing_users_are_left_alone() {
        let (_dir, db) = test_db().await;
        users::insert(&db, "alice", "hash", false, false, NOW).await.unwrap();

        assert_eq!(
            ensure_admin(&db, &config(None), NOW).await.unwrap(),
            Provisioned::Unchanged
        );
        assert!(users::find_by_username(&db, "master").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_configured_admin_is_reset() {
        let (_dir, db) = test_db().await;
        users::insert(&db, "root", "old-hash", false, true, NOW).await.unwrap();

        let outcome = ensure_admin(&db, &config(Some(("root", "hunter22"))), NOW + 10)
            .await
            .unwrap();
        assert_eq!(outcome, Provisioned::Configured("root".to_string()));

        let user = users::find_by_username(&db, "root").await.unwrap().unwrap();
        assert!(user.is_admin);
        assert!(!user.need_change_pwd);
        assert!(verify_password("hunter22", &user.password_hash));
        assert_eq!(users::count(&db).await.unwrap(), 1);
    }
}
