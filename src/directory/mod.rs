//! Recipient resolution: expanding a notification target into a deduplicated
//! recipient set.
//!
//! The user directory is owned by the storage layer; the resolver only reads
//! it through the [`RecipientDirectory`] trait, which keeps the coordinator
//! testable without a live store.

mod memory_backend;
mod postgres_backend;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;

use crate::config::StorageConfig;
use crate::error::DispatchError;
use crate::notification::NotificationTarget;

pub use memory_backend::MemoryDirectory;
pub use postgres_backend::PostgresDirectory;

/// Errors that can occur during directory lookups.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Technician,
    Client,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Technician => "technician",
            UserRole::Client => "client",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Disabled,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Disabled => "disabled",
        }
    }
}

/// Read-only view of the user directory.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Users of a role filtered by account status.
    async fn list_users(
        &self,
        role: UserRole,
        status: UserStatus,
    ) -> Result<Vec<String>, DirectoryError>;

    /// Active technicians whose work-category set intersects `category_ids`.
    async fn list_technicians_by_categories(
        &self,
        category_ids: &[String],
    ) -> Result<Vec<String>, DirectoryError>;

    /// The subset of `user_ids` that exist in the directory.
    async fn filter_known_users(&self, user_ids: &[String])
        -> Result<Vec<String>, DirectoryError>;
}

/// Expands a [`NotificationTarget`] into recipient ids.
pub struct RecipientResolver {
    directory: Arc<dyn RecipientDirectory>,
}

impl RecipientResolver {
    pub fn new(directory: Arc<dyn RecipientDirectory>) -> Self {
        Self { directory }
    }

    /// Expand a target into a deduplicated recipient set.
    ///
    /// Zero matches for a well-formed query is a legitimate empty result, not
    /// an error; only malformed input (an empty id list) fails.
    #[tracing::instrument(
        name = "resolver.resolve",
        skip(self, target),
        fields(target = target.kind())
    )]
    pub async fn resolve(&self, target: &NotificationTarget) -> Result<Vec<String>, DispatchError> {
        let recipients = match target {
            NotificationTarget::Individual(user_id) => vec![user_id.clone()],
            NotificationTarget::Role(role) => {
                dedup(self.directory.list_users(*role, UserStatus::Active).await?)
            }
            NotificationTarget::Categories(ids) => {
                if ids.is_empty() {
                    return Err(DispatchError::InvalidTarget(
                        "category id list is empty".to_string(),
                    ));
                }
                dedup(self.directory.list_technicians_by_categories(ids).await?)
            }
            NotificationTarget::Users(ids) => {
                if ids.is_empty() {
                    return Err(DispatchError::InvalidTarget(
                        "explicit id list is empty".to_string(),
                    ));
                }
                let unique = dedup(ids.clone());
                self.directory.filter_known_users(&unique).await?
            }
        };

        tracing::debug!(count = recipients.len(), "Resolved recipients");
        Ok(recipients)
    }
}

/// Deduplicate preserving first occurrence.
fn dedup(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// Create a directory backend based on configuration.
pub fn create_recipient_directory(
    config: &StorageConfig,
    pool: Option<PgPool>,
) -> Arc<dyn RecipientDirectory> {
    match config.backend.as_str() {
        "postgres" => {
            if let Some(pool) = pool {
                tracing::info!(backend = "postgres", "Creating Postgres directory");
                Arc::new(PostgresDirectory::new(pool))
            } else {
                tracing::warn!(
                    "Postgres directory requested but no pool provided, falling back to memory"
                );
                Arc::new(MemoryDirectory::new())
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory directory");
            Arc::new(MemoryDirectory::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_directory() -> Arc<MemoryDirectory> {
        let directory = Arc::new(MemoryDirectory::new());
        directory.add_user("tech-1", UserRole::Technician, UserStatus::Active);
        directory.add_user("tech-2", UserRole::Technician, UserStatus::Active);
        directory.add_user("tech-3", UserRole::Technician, UserStatus::Disabled);
        directory.add_user("client-1", UserRole::Client, UserStatus::Active);
        directory.set_categories("tech-1", &["plumbing", "electrical"]);
        directory.set_categories("tech-2", &["painting"]);
        directory
    }

    #[tokio::test]
    async fn test_individual_passthrough() {
        let resolver = RecipientResolver::new(seeded_directory());
        let target = NotificationTarget::Individual("anyone".to_string());

        let recipients = resolver.resolve(&target).await.unwrap();
        assert_eq!(recipients, vec!["anyone".to_string()]);
    }

    #[tokio::test]
    async fn test_role_excludes_inactive() {
        let resolver = RecipientResolver::new(seeded_directory());
        let target = NotificationTarget::Role(UserRole::Technician);

        let mut recipients = resolver.resolve(&target).await.unwrap();
        recipients.sort();
        assert_eq!(recipients, vec!["tech-1".to_string(), "tech-2".to_string()]);
    }

    #[tokio::test]
    async fn test_categories_intersection() {
        let resolver = RecipientResolver::new(seeded_directory());
        let target = NotificationTarget::Categories(vec![
            "electrical".to_string(),
            "carpentry".to_string(),
        ]);

        let recipients = resolver.resolve(&target).await.unwrap();
        assert_eq!(recipients, vec!["tech-1".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_category_list_is_invalid() {
        let resolver = RecipientResolver::new(seeded_directory());
        let target = NotificationTarget::Categories(vec![]);

        let result = resolver.resolve(&target).await;
        assert!(matches!(result, Err(DispatchError::InvalidTarget(_))));
    }

    #[tokio::test]
    async fn test_explicit_ids_deduplicated_subset() {
        let resolver = RecipientResolver::new(seeded_directory());
        let target = NotificationTarget::Users(vec![
            "tech-1".to_string(),
            "tech-1".to_string(),
            "client-1".to_string(),
            "ghost".to_string(),
        ]);

        let recipients = resolver.resolve(&target).await.unwrap();

        // No duplicates, and a subset of the input
        assert_eq!(recipients.len(), 2);
        assert!(recipients.contains(&"tech-1".to_string()));
        assert!(recipients.contains(&"client-1".to_string()));
    }

    #[tokio::test]
    async fn test_empty_explicit_ids_is_invalid() {
        let resolver = RecipientResolver::new(seeded_directory());
        let target = NotificationTarget::Users(vec![]);

        let result = resolver.resolve(&target).await;
        assert!(matches!(result, Err(DispatchError::InvalidTarget(_))));
    }

    #[tokio::test]
    async fn test_zero_matches_is_empty_not_error() {
        let resolver = RecipientResolver::new(seeded_directory());
        let target = NotificationTarget::Categories(vec!["masonry".to_string()]);

        let recipients = resolver.resolve(&target).await.unwrap();
        assert!(recipients.is_empty());
    }

    #[test]
    fn test_dedup_preserves_order() {
        let ids = vec![
            "b".to_string(),
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
        ];
        assert_eq!(dedup(ids), vec!["b", "a", "c"]);
    }
}
