use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;

use super::membership::DEFAULT_MEMBER_LEVEL;
use super::repo_types::{NewUser, ProfileChanges, User};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone, \
     membership_id, member_level, points, created_at, updated_at, deleted_at";

const EMAIL_ACTIVE_KEY: &str = "users_email_active_key";
const MEMBERSHIP_ID_ACTIVE_KEY: &str = "users_membership_id_active_key";

#[derive(Debug, Error)]
pub enum CreateUserError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("membership id already allocated")]
    DuplicateMembershipId,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for CreateUserError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                match db_err.constraint() {
                    Some(EMAIL_ACTIVE_KEY) => return CreateUserError::DuplicateEmail,
                    Some(MEMBERSHIP_ID_ACTIVE_KEY) => {
                        return CreateUserError::DuplicateMembershipId
                    }
                    _ => {}
                }
            }
        }
        CreateUserError::Other(anyhow::Error::new(e).context("insert user"))
    }
}

/// Persistence seam for the single `users` table. Every lookup ignores
/// soft-deleted rows.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn create(&self, new_user: NewUser) -> Result<User, CreateUserError>;
    /// Returns `None` when no active user has this id.
    async fn update_profile(
        &self,
        id: i64,
        changes: &ProfileChanges,
    ) -> anyhow::Result<Option<User>>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, CreateUserError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users
                (email, password_hash, first_name, last_name, phone, membership_id, member_level, points)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.phone)
        .bind(&new_user.membership_id)
        .bind(DEFAULT_MEMBER_LEVEL)
        .fetch_one(&self.db)
        .await?;
        debug!(user_id = user.id, "user row inserted");
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: i64,
        changes: &ProfileChanges,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET first_name = COALESCE($2, first_name),
                   last_name  = COALESCE($3, last_name),
                   phone      = COALESCE($4, phone),
                   updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.first_name.as_deref())
        .bind(changes.last_name.as_deref())
        .bind(changes.phone.as_deref())
        .fetch_optional(&self.db)
        .await
        .context("update user profile")?;
        Ok(user)
    }
}
