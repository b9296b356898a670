//! Primary-channel procedure client.
//!
//! The primary channel delegates to a server-side `send_notification`
//! procedure that records and dispatches in one call. The call is opaque:
//! success or failure is all it reports.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::notification::{NotificationStatus, PushMessage};

/// Errors that can occur on a primary-channel call.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("call timed out after {0:?}")]
    Timeout(Duration),
}

/// The server-side persist-and-deliver trigger.
#[async_trait]
pub trait PrimaryChannel: Send + Sync {
    async fn send_notification(
        &self,
        recipient_id: &str,
        service_id: Option<Uuid>,
        status: NotificationStatus,
        message: &PushMessage,
    ) -> Result<(), RpcError>;
}

/// Invokes the `send_notification` stored procedure through sqlx.
pub struct PostgresPrimaryChannel {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresPrimaryChannel {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl PrimaryChannel for PostgresPrimaryChannel {
    async fn send_notification(
        &self,
        recipient_id: &str,
        service_id: Option<Uuid>,
        status: NotificationStatus,
        message: &PushMessage,
    ) -> Result<(), RpcError> {
        let call = sqlx::query("SELECT send_notification($1, $2, $3, $4, $5, $6)")
            .bind(recipient_id)
            .bind(service_id)
            .bind(status.as_str())
            .bind(&message.title)
            .bind(&message.body)
            .bind(&message.data)
            .execute(&self.pool);

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(RpcError::Database(e)),
            Err(_) => Err(RpcError::Timeout(self.timeout)),
        }
    }
}
