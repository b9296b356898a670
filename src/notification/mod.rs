//! Notification data model, persistence backends, and the writer.
//!
//! # Store Backend Architecture
//!
//! Persistence goes through the [`NotificationStore`] and [`TokenStore`]
//! traits so the dispatch pipeline never talks to a concrete database:
//!
//! - `PostgresNotificationStore`: sqlx-backed store (default)
//! - `MemoryNotificationStore`: DashMap-backed store for development and tests
//!
//! Use [`create_notification_store`] to pick the backend from configuration.

mod memory_store;
mod postgres_store;
mod store;
mod types;
mod writer;

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorageConfig;

pub use memory_store::MemoryNotificationStore;
pub use postgres_store::PostgresNotificationStore;
pub use store::{NotificationStore, PushToken, StoreError, TokenStore};
pub use types::{
    DeliveryChannel, DeliveryOutcome, NewNotification, Notification, NotificationStatus,
    NotificationTarget, PushMessage,
};
pub use writer::{BatchWrite, NotificationWriter};

/// Create the notification and token store handles based on configuration.
///
/// Returns the appropriate backend for the `storage.backend` setting:
/// - `"postgres"`: sqlx-backed store (requires a pool)
/// - `"memory"` (or anything else): in-memory store
pub fn create_notification_store(
    config: &StorageConfig,
    pool: Option<PgPool>,
) -> (Arc<dyn NotificationStore>, Arc<dyn TokenStore>) {
    match config.backend.as_str() {
        "postgres" => {
            if let Some(pool) = pool {
                tracing::info!(backend = "postgres", "Creating Postgres notification store");
                let store = Arc::new(PostgresNotificationStore::new(pool));
                (store.clone(), store)
            } else {
                tracing::warn!(
                    "Postgres store requested but no pool provided, falling back to memory"
                );
                let store = Arc::new(MemoryNotificationStore::new());
                (store.clone(), store)
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory notification store");
            let store = Arc::new(MemoryNotificationStore::new());
            (store.clone(), store)
        }
    }
}
