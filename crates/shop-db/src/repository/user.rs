//! # User Repository
//!
//! Staff and business accounts. Credentials are stored as argon2 hashes and
//! never leave this module; every read maps rows into [`UserAccount`].
//!
//! ## Row Shape
//! ```text
//! kind      staff_role  biz_role   business_id     → AccountRole
//! ────────  ──────────  ─────────  ──────────────    ─────────────────────────
//! staff     owner       NULL       NULL              Staff { owner }
//! business  NULL        employee   b-1               Business { employee, b-1 }
//! ```
//! A table CHECK keeps the two shapes exclusive.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::credentials::hash_password;
use crate::error::{DbError, DbResult};
use shop_core::{AccountRole, BusinessRole, CoreError, NewUser, StaffRole, UserAccount, UserPatch};

/// Raw `users` row without the credential column.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    kind: String,
    staff_role: Option<StaffRole>,
    biz_role: Option<BusinessRole>,
    business_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserAccount {
    type Error = DbError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let account = match (row.kind.as_str(), row.staff_role, row.biz_role, row.business_id) {
            ("staff", Some(role), None, None) => AccountRole::Staff { role },
            ("business", None, Some(role), Some(business_id)) => {
                AccountRole::Business { role, business_id }
            }
            _ => {
                return Err(DbError::Corrupt(format!(
                    "user {} has an inconsistent role shape",
                    row.id
                )))
            }
        };

        Ok(UserAccount {
            id: row.id,
            username: row.username,
            account,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Column values for an [`AccountRole`].
struct RoleColumns<'a> {
    kind: &'static str,
    staff_role: Option<StaffRole>,
    biz_role: Option<BusinessRole>,
    business_id: Option<&'a str>,
}

impl<'a> From<&'a AccountRole> for RoleColumns<'a> {
    fn from(account: &'a AccountRole) -> Self {
        match account {
            AccountRole::Staff { role } => RoleColumns {
                kind: "staff",
                staff_role: Some(*role),
                biz_role: None,
                business_id: None,
            },
            AccountRole::Business { role, business_id } => RoleColumns {
                kind: "business",
                staff_role: None,
                biz_role: Some(*role),
                business_id: Some(business_id),
            },
        }
    }
}

const SELECT_USER: &str = r#"
    SELECT id, username, kind, staff_role, biz_role, business_id, created_at, updated_at
    FROM users
"#;

/// Repository for user account operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    pub async fn list(&self) -> DbResult<Vec<UserAccount>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} ORDER BY username"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(UserAccount::try_from).collect()
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<UserAccount>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserAccount::try_from).transpose()
    }

    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<UserAccount>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE username = ?1"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserAccount::try_from).transpose()
    }

    /// Stored credential hash, for the external login service.
    pub async fn password_hash(&self, username: &str) -> DbResult<Option<String>> {
        let hash = sqlx::query_scalar("SELECT password_hash FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(hash)
    }

    /// Creates an account in a single INSERT. Input must already be validated.
    ///
    /// ## Errors
    /// - `NotFound` when a business account names a missing business
    /// - `Conflict` when the username is taken
    pub async fn insert(&self, new: &NewUser) -> DbResult<UserAccount> {
        let password_hash = hash_password(&new.password)?;
        let username = new.username.trim();
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        debug!(username = %username, "Inserting user");

        let cols = RoleColumns::from(&new.account);
        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, password_hash, kind, staff_role, biz_role,
                business_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&id)
        .bind(username)
        .bind(&password_hash)
        .bind(cols.kind)
        .bind(cols.staff_role)
        .bind(cols.biz_role)
        .bind(cols.business_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(e.into(), username, cols.business_id))?;

        info!(id = %id, username = %username, "User created");

        Ok(UserAccount {
            id,
            username: username.to_string(),
            account: new.account.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Replaces the credential and/or the role of an account.
    pub async fn update(&self, id: &str, patch: &UserPatch) -> DbResult<UserAccount> {
        let password_hash = patch.password.as_deref().map(hash_password).transpose()?;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE users SET updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        if let Some(hash) = &password_hash {
            sqlx::query("UPDATE users SET password_hash = ?2 WHERE id = ?1")
                .bind(id)
                .bind(hash)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(account) = &patch.account {
            ensure_business_exists(&mut tx, account).await?;
            let cols = RoleColumns::from(account);
            sqlx::query(
                r#"
                UPDATE users
                SET kind = ?2, staff_role = ?3, biz_role = ?4, business_id = ?5
                WHERE id = ?1
                "#,
            )
            .bind(id)
            .bind(cols.kind)
            .bind(cols.staff_role)
            .bind(cols.biz_role)
            .bind(cols.business_id)
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE id = ?1"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(id = %id, "User updated");
        UserAccount::try_from(row)
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        info!(id = %id, "User deleted");
        Ok(())
    }
}

async fn ensure_business_exists(conn: &mut SqliteConnection, account: &AccountRole) -> DbResult<()> {
    if let AccountRole::Business { business_id, .. } = account {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM businesses WHERE id = ?1")
            .bind(business_id)
            .fetch_optional(&mut *conn)
            .await?;
        if exists.is_none() {
            return Err(DbError::not_found("Business", business_id.as_str()));
        }
    }
    Ok(())
}

fn insert_error(err: DbError, username: &str, business_id: Option<&str>) -> DbError {
    match (err, business_id) {
        (DbError::UniqueViolation { .. }, _) => DbError::domain(CoreError::Conflict(format!(
            "username '{}' is already taken",
            username
        ))),
        (DbError::ForeignKeyViolation { .. }, Some(business_id)) => {
            DbError::not_found("Business", business_id)
        }
        (other, _) => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::verify_password;
    use crate::repository::test_support::{seed_business, setup};

    fn staff(username: &str, role: StaffRole) -> NewUser {
        NewUser {
            username: username.to_string(),
            password: "1234".to_string(),
            account: AccountRole::Staff { role },
        }
    }

    #[tokio::test]
    async fn test_insert_hashes_password() {
        let db = setup().await;
        let repo = db.users();

        let created = repo.insert(&staff("admin", StaffRole::Owner)).await.unwrap();
        let fetched = repo.get_by_username("admin").await.unwrap().unwrap();
        let hash = repo.password_hash("admin").await.unwrap().unwrap();

        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.account, AccountRole::Staff { role: StaffRole::Owner });
        assert_ne!(hash, "1234");
        assert!(verify_password("1234", &hash));
    }

    #[tokio::test]
    async fn test_duplicate_username_is_conflict() {
        let db = setup().await;
        let repo = db.users();
        repo.insert(&staff("mara", StaffRole::Hr)).await.unwrap();

        let err = repo.insert(&staff("mara", StaffRole::Viewer)).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_business_account_requires_business() {
        let db = setup().await;
        let repo = db.users();

        let orphan = NewUser {
            username: "lee".to_string(),
            password: "secret".to_string(),
            account: AccountRole::Business {
                role: BusinessRole::Employee,
                business_id: "missing".to_string(),
            },
        };
        assert!(matches!(repo.insert(&orphan).await, Err(DbError::NotFound { .. })));

        let business = seed_business(&db, 5).await;
        let user = NewUser {
            account: AccountRole::Business {
                role: BusinessRole::Employee,
                business_id: business.id.clone(),
            },
            ..orphan
        };
        let created = repo.insert(&user).await.unwrap();
        assert_eq!(created.account, user.account);
    }

    #[tokio::test]
    async fn test_update_role_and_password() {
        let db = setup().await;
        let repo = db.users();
        let created = repo.insert(&staff("ola", StaffRole::Viewer)).await.unwrap();

        let patch = UserPatch {
            password: Some("new-pass".to_string()),
            account: Some(AccountRole::Staff { role: StaffRole::Orders }),
        };
        let updated = repo.update(&created.id, &patch).await.unwrap();

        assert_eq!(updated.account, AccountRole::Staff { role: StaffRole::Orders });
        let hash = repo.password_hash("ola").await.unwrap().unwrap();
        assert!(verify_password("new-pass", &hash));

        repo.delete(&created.id).await.unwrap();
        assert!(repo.get_by_id(&created.id).await.unwrap().is_none());
    }
}
