//! In-process `UserStore` used by the unit and router tests. Mirrors the
//! partial unique indexes and the soft-delete filter of the Postgres schema.

use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::membership::DEFAULT_MEMBER_LEVEL;
use super::repo::{CreateUserError, UserStore};
use super::repo_types::{NewUser, ProfileChanges, User};

#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row, soft-deleted ones included.
    pub fn all_rows(&self) -> Vec<User> {
        self.rows.lock().unwrap().clone()
    }

    pub fn soft_delete(&self, id: i64) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|u| u.id == id) {
            row.deleted_at = Some(OffsetDateTime::now_utc());
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|u| u.id == id && u.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|u| u.email == email && u.deleted_at.is_none())
            .cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, CreateUserError> {
        let mut rows = self.rows.lock().unwrap();
        let active = || rows.iter().filter(|u| u.deleted_at.is_none());
        if active().any(|u| u.email == new_user.email) {
            return Err(CreateUserError::DuplicateEmail);
        }
        if active().any(|u| u.membership_id == new_user.membership_id) {
            return Err(CreateUserError::DuplicateMembershipId);
        }

        let now = OffsetDateTime::now_utc();
        let user = User {
            id: rows.len() as i64 + 1,
            email: new_user.email,
            password_hash: new_user.password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            phone: new_user.phone,
            membership_id: new_user.membership_id,
            member_level: DEFAULT_MEMBER_LEVEL.into(),
            points: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: i64,
        changes: &ProfileChanges,
    ) -> anyhow::Result<Option<User>> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows
            .iter_mut()
            .find(|u| u.id == id && u.deleted_at.is_none())
        else {
            return Ok(None);
        };
        if let Some(v) = &changes.first_name {
            row.first_name = v.clone();
        }
        if let Some(v) = &changes.last_name {
            row.last_name = v.clone();
        }
        if let Some(v) = &changes.phone {
            row.phone = v.clone();
        }
        row.updated_at = OffsetDateTime::now_utc();
        Ok(Some(row.clone()))
    }
}
