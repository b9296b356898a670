//! Backend traits for notification persistence and token lookup.
//!
//! The storage layer is an external collaborator; these traits are the only
//! surface the dispatch core touches. Implementations must be thread-safe
//! (`Send + Sync`) as they are shared across concurrent workers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::types::{NewNotification, Notification};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("notification not found: {0}")]
    NotFound(Uuid),

    #[error("stored status is not recognized: {0}")]
    InvalidStatus(String),

    #[error("write timed out")]
    Timeout,
}

/// A registered delivery token. Many tokens per user are allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushToken {
    pub user_id: String,
    pub token: String,
}

/// Backend trait for notification row persistence.
///
/// `insert` is idempotent on [`NewNotification::dispatch_key`]: replaying an
/// insert whose key already has a row returns that row unchanged. This is what
/// makes retry paths safe against duplicate rows.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist one row and return it with its assigned identifier.
    ///
    /// The identifier comes directly from the write operation, never from a
    /// secondary content lookup.
    async fn insert(&self, new: &NewNotification) -> Result<Notification, StoreError>;

    /// Persist a batch atomically: either every row lands or none do.
    async fn insert_many(&self, batch: &[NewNotification]) -> Result<Vec<Notification>, StoreError>;

    /// Transition a row `unread -> read`, setting `read_at` on the first call.
    ///
    /// Idempotent: an already-read row is returned unchanged with no error.
    /// Statuses owned by other workflows (`offered`, `rejected`) are preserved,
    /// never overwritten.
    async fn mark_read(&self, id: Uuid) -> Result<Notification, StoreError>;

    /// Fetch a row by id.
    async fn get(&self, id: Uuid) -> Result<Option<Notification>, StoreError>;
}

/// Backend trait for delivery-token lookup.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// All registered tokens for the given users, in no particular order.
    async fn list_tokens(&self, user_ids: &[String]) -> Result<Vec<PushToken>, StoreError>;
}
