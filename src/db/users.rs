use crate::db::{is_unique_violation, Db};
use crate::error::{AppError, Result};
use crate::models::User;

const USER_COLUMNS: &str =
    "id, username, password_hash, is_admin, need_change_pwd, created_at, updated_at";

pub async fn find_by_id(db: &Db, id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE id = ?",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

pub async fn find_by_username(db: &Db, username: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

pub async fn list(db: &Db) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users ORDER BY id",
        USER_COLUMNS
    ))
    .fetch_all(db)
    .await?;
    Ok(users)
}

pub async fn count(db: &Db) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(db)
        .await?;
    Ok(count)
}

/// Insert a user; a taken username is reported as `UserAlreadyExists`
pub async fn insert(
    db: &Db,
    username: &str,
    password_hash: &str,
    is_admin: bool,
    need_change_pwd: bool,
    now: i64,
) -> Result<User> {
    let result = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (username, password_hash, is_admin, need_change_pwd, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING {}",
        USER_COLUMNS
    ))
    .bind(username)
    .bind(password_hash)
    .bind(is_admin)
    .bind(need_change_pwd)
    .bind(now)
    .bind(now)
    .fetch_all(db)
    .await;

    match result {
        Ok(rows) => rows
            .into_iter()
            .next()
            .ok_or_else(|| sqlx::Error::RowNotFound.into()),
        Err(e) if is_unique_violation(&e) => Err(AppError::UserAlreadyExists),
        Err(e) => Err(e.into()),
    }
}

/// Replace the password hash and set the force-change flag
pub async fn set_password(
    db: &Db,
    id: i64,
    password_hash: &str,
    need_change_pwd: bool,
    now: i64,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE users SET password_hash = ?, need_change_pwd = ?, updated_at = ? WHERE id = ?",
    )
    .bind(password_hash)
    .bind(need_change_pwd)
    .bind(now)
    .bind(id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Apply an admin edit; `None` fields keep their current value
pub async fn update(
    db: &Db,
    id: i64,
    password_hash: Option<&str>,
    is_admin: Option<bool>,
    now: i64,
) -> Result<Option<User>> {
    let rows = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET \
             password_hash = COALESCE(?, password_hash), \
             is_admin = COALESCE(?, is_admin), \
             updated_at = ? \
         WHERE id = ? RETURNING {}",
        USER_COLUMNS
    ))
    .bind(password_hash)
    .bind(is_admin)
    .bind(now)
    .bind(id)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().next())
}

/// Create the named administrator or reset its password and role
pub async fn upsert_admin(db: &Db, username: &str, password_hash: &str, now: i64) -> Result<()> {
    sqlx::query(
        "INSERT INTO users (username, password_hash, is_admin, need_change_pwd, created_at, updated_at) \
         VALUES (?, ?, 1, 0, ?, ?) \
         ON CONFLICT (username) DO UPDATE SET \
             password_hash = excluded.password_hash, \
             is_admin = 1, \
             need_change_pwd = 0, \
             updated_at = excluded.updated_at",
    )
    .bind(username)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;
    Ok(())
}

/// Delete a user that owns no backups and no access keys
///
/// Dependents are never cascaded: the caller must remove backups and keys
/// first. Ledger rows are kept and list without a username afterwards.
pub async fn delete(db: &Db, id: i64) -> Result<()> {
    if find_by_id(db, id).await?.is_none() {
        return Err(AppError::UserNotFound);
    }

    let backups = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM backups WHERE user_id = ?")
        .bind(id)
        .fetch_one(db)
        .await?;
    if backups > 0 {
        return Err(AppError::UserHasDependents(
            "User still owns backups, delete them first",
        ));
    }

    let keys = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM access_keys WHERE user_id = ?")
        .bind(id)
        .fetch_one(db)
        .await?;
    if keys > 0 {
        return Err(AppError::UserHasDependents(
            "User still owns access keys, delete them first",
        ));
    }

    // Re-check inside the write so a key or backup created since the counts
    // above still blocks the delete.
    let deleted = sqlx::query(
        "DELETE FROM users WHERE id = ? \
         AND NOT EXISTS (SELECT 1 FROM backups WHERE user_id = ?) \
         AND NOT EXISTS (SELECT 1 FROM access_keys WHERE user_id = ?)",
    )
    .bind(id)
    .bind(id)
    .bind(id)
    .execute(db)
    .await?
    .rows_affected();

    if deleted == 0 {
        return Err(AppError::UserHasDependents(
            "User still owns backups or access keys",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_db;
    use crate::ledger;
    use crate::models::{NewSyncRecord, TransferKind};
    use crate::policy::Scope;

    #[tokio::test]
    async fn test_insert_rejects_duplicate_username() {
        let (_dir, db) = test_db().await;

        insert(&db, "alice", "hash", false, false, 100).await.unwrap();
        let result = insert(&db, "alice", "hash", true, false, 100).await;

        assert!(matches!(result, Err(AppError::UserAlreadyExists)));
        assert_eq!(count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_keeps_unset_fields() {
        let (_dir, db) = test_db().await;
        let user = insert(&db, "alice", "old-hash", false, false, 100).await.unwrap();

        let updated = update(&db, user.id, None, Some(true), 200)
            .await
            .unwrap()
            .unwrap();
        assert!(updated.is_admin);
        assert_eq!(updated.password_hash, "old-hash");
        assert_eq!(updated.updated_at, 200);

        let updated = update(&db, user.id, Some("new-hash"), None, 300)
            .await
            .unwrap()
            .unwrap();
        assert!(updated.is_admin);
        assert_eq!(updated.password_hash, "new-hash");

        assert!(update(&db, 999, None, None, 300).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_admin_resets_existing_user() {
        let (_dir, db) = test_db().await;
        insert(&db, "root", "old", false, true, 100).await.unwrap();

        upsert_admin(&db, "root", "new", 200).await.unwrap();

        let user = find_by_username(&db, "root").await.unwrap().unwrap();
        assert!(user.is_admin);
        assert!(!user.need_change_pwd);
        assert_eq!(user.password_hash, "new");
        assert_eq!(count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_blocked_by_backup() {
        let (_dir, db) = test_db().await;
        let user = insert(&db, "alice", "hash", false, false, 100).await.unwrap();
        sqlx::query(
            "INSERT INTO backups (user_id, name, data, size, sync_count, created_at, updated_at) \
             VALUES (?, 'laptop', '{}', 2, 1, 100, 100)",
        )
        .bind(user.id)
        .execute(&db)
        .await
        .unwrap();

        let result = delete(&db, user.id).await;
        match result {
            Err(AppError::UserHasDependents(msg)) => assert!(msg.contains("backups")),
            other => panic!("expected dependents error, got {:?}", other),
        }
        assert!(find_by_id(&db, user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_blocked_by_access_key() {
        let (_dir, db) = test_db().await;
        let user = insert(&db, "alice", "hash", false, false, 100).await.unwrap();
        sqlx::query(
            "INSERT INTO access_keys (user_id, access_key, secret_digest, created_at) \
             VALUES (?, 'AKONE', 'digest', 100)",
        )
        .bind(user.id)
        .execute(&db)
        .await
        .unwrap();

        let result = delete(&db, user.id).await;
        match result {
            Err(AppError::UserHasDependents(msg)) => assert!(msg.contains("access keys")),
            other => panic!("expected dependents error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_without_dependents() {
        let (_dir, db) = test_db().await;
        let user = insert(&db, "alice", "hash", false, false, 100).await.unwrap();

        delete(&db, user.id).await.unwrap();

        assert!(find_by_id(&db, user.id).await.unwrap().is_none());
        assert!(matches!(delete(&db, user.id).await, Err(AppError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_delete_keeps_ledger_rows() {
        let (_dir, db) = test_db().await;
        let user = insert(&db, "alice", "hash", false, false, 100).await.unwrap();
        let entry = NewSyncRecord {
            backup_name: "laptop",
            kind: TransferKind::Upload,
            access_key_id: 1,
            access_key: "AKGONE",
            user_id: user.id,
        };
        ledger::record(&db, &entry, 100).await.unwrap();

        delete(&db, user.id).await.unwrap();

        let rows = ledger::list(&db, Scope::All).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, user.id);
        assert!(rows[0].username.is_none());
    }

    #[tokio::test]
    async fn test_writes_are_visible_to_other_connections() {
        let (_dir, db) = test_db().await;

        for i in 0..40 {
            let username = format!("user-{}", i);
            let user = insert(&db, &username, "hash", false, false, 100).await.unwrap();
            assert!(
                find_by_username(&db, &username).await.unwrap().is_some(),
                "insert of {} not visible",
                username
            );

            update(&db, user.id, Some("new-hash"), None, 200).await.unwrap();
            let reread = find_by_id(&db, user.id).await.unwrap().unwrap();
            assert_eq!(reread.password_hash, "new-hash");
        }
    }
}
