//! In-memory directory backend using DashMap.
//!
//! Intended for development setups and for testing resolution logic without
//! a live database.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{DirectoryError, RecipientDirectory, UserRole, UserStatus};

#[derive(Debug, Clone)]
struct UserRecord {
    role: UserRole,
    status: UserStatus,
    categories: HashSet<String>,
}

/// In-memory user directory.
#[derive(Default)]
pub struct MemoryDirectory {
    users: DashMap<String, UserRecord>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user.
    pub fn add_user(&self, user_id: impl Into<String>, role: UserRole, status: UserStatus) {
        self.users.insert(
            user_id.into(),
            UserRecord {
                role,
                status,
                categories: HashSet::new(),
            },
        );
    }

    /// Assign work categories to a registered user.
    pub fn set_categories(&self, user_id: &str, categories: &[&str]) {
        if let Some(mut record) = self.users.get_mut(user_id) {
            record.categories = categories.iter().map(|c| c.to_string()).collect();
        }
    }
}

#[async_trait]
impl RecipientDirectory for MemoryDirectory {
    async fn list_users(
        &self,
        role: UserRole,
        status: UserStatus,
    ) -> Result<Vec<String>, DirectoryError> {
        Ok(self
            .users
            .iter()
            .filter(|entry| entry.role == role && entry.status == status)
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn list_technicians_by_categories(
        &self,
        category_ids: &[String],
    ) -> Result<Vec<String>, DirectoryError> {
        Ok(self
            .users
            .iter()
            .filter(|entry| {
                entry.role == UserRole::Technician
                    && entry.status == UserStatus::Active
                    && category_ids.iter().any(|c| entry.categories.contains(c))
            })
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn filter_known_users(
        &self,
        user_ids: &[String],
    ) -> Result<Vec<String>, DirectoryError> {
        Ok(user_ids
            .iter()
            .filter(|id| self.users.contains_key(*id))
            .cloned()
            .collect())
    }
}
