//! In-memory notification store using DashMap.
//!
//! Rows are lost on restart; intended for development setups and for testing
//! the dispatch pipeline without a live database.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::store::{NotificationStore, PushToken, StoreError, TokenStore};
use super::types::{NewNotification, Notification, NotificationStatus};

/// In-memory notification and token store.
#[derive(Default)]
pub struct MemoryNotificationStore {
    /// Rows by id
    rows: DashMap<Uuid, Notification>,
    /// Dispatch key -> row id, for idempotent replays
    keys: DashMap<Uuid, Uuid>,
    /// Registered delivery tokens per user
    tokens: DashMap<String, Vec<String>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a delivery token for a user.
    pub fn register_token(&self, user_id: impl Into<String>, token: impl Into<String>) {
        self.tokens.entry(user_id.into()).or_default().push(token.into());
    }

    /// Number of persisted rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Snapshot of every persisted row, in no particular order.
    pub fn all_rows(&self) -> Vec<Notification> {
        self.rows.iter().map(|entry| entry.value().clone()).collect()
    }

    fn materialize(&self, new: &NewNotification) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            recipient_id: new.recipient_id.clone(),
            service_id: new.service_id,
            title: new.title.clone(),
            body: new.body.clone(),
            data: new.data.clone(),
            status: new.status,
            created_at: Utc::now(),
            read_at: None,
        }
    }

    fn insert_row(&self, new: &NewNotification) -> Notification {
        if let Some(existing_id) = self.keys.get(&new.dispatch_key) {
            if let Some(existing) = self.rows.get(existing_id.value()) {
                return existing.value().clone();
            }
        }

        let row = self.materialize(new);
        self.keys.insert(new.dispatch_key, row.id);
        self.rows.insert(row.id, row.clone());
        row
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert(&self, new: &NewNotification) -> Result<Notification, StoreError> {
        Ok(self.insert_row(new))
    }

    async fn insert_many(&self, batch: &[NewNotification]) -> Result<Vec<Notification>, StoreError> {
        // Memory inserts cannot partially fail, so the batch is trivially atomic.
        Ok(batch.iter().map(|new| self.insert_row(new)).collect())
    }

    async fn mark_read(&self, id: Uuid) -> Result<Notification, StoreError> {
        let mut entry = self.rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if entry.status == NotificationStatus::Unread {
            entry.status = NotificationStatus::Read;
            entry.read_at = Some(Utc::now());
        }

        Ok(entry.value().clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>, StoreError> {
        Ok(self.rows.get(&id).map(|r| r.value().clone()))
    }
}

#[async_trait]
impl TokenStore for MemoryNotificationStore {
    async fn list_tokens(&self, user_ids: &[String]) -> Result<Vec<PushToken>, StoreError> {
        let mut tokens = Vec::new();
        for user_id in user_ids {
            if let Some(registered) = self.tokens.get(user_id) {
                for token in registered.iter() {
                    tokens.push(PushToken {
                        user_id: user_id.clone(),
                        token: token.clone(),
                    });
                }
            }
        }
        Ok(tokens)
    }
}
