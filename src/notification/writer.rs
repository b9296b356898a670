//! Notification writer: durable persistence with per-recipient isolation.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::timeout;
use uuid::Uuid;

use crate::metrics::{ROWS_WRITTEN_TOTAL, WRITE_FAILURES_TOTAL};

use super::store::{NotificationStore, StoreError};
use super::types::{NewNotification, Notification};

/// Maximum concurrent per-recipient writes when a batch degrades
const MAX_CONCURRENT_WRITES: usize = 16;

/// Result of a batch write.
///
/// Per-recipient isolation: one recipient's failure never blocks another's
/// row. A non-empty `failed` list identifies exactly which recipients were
/// not persisted.
#[derive(Debug, Default)]
pub struct BatchWrite {
    pub written: Vec<Notification>,
    /// (recipient_id, error) for rows that could not be persisted
    pub failed: Vec<(String, String)>,
}

impl BatchWrite {
    /// Nothing landed at all.
    pub fn is_total_failure(&self) -> bool {
        self.written.is_empty() && !self.failed.is_empty()
    }
}

/// Persists notification rows through the configured store backend.
pub struct NotificationWriter {
    store: Arc<dyn NotificationStore>,
    write_timeout: Duration,
}

impl NotificationWriter {
    pub fn new(store: Arc<dyn NotificationStore>, write_timeout: Duration) -> Self {
        Self {
            store,
            write_timeout,
        }
    }

    /// Persist one row, bounded by the per-call write timeout.
    pub async fn write_one(&self, new: &NewNotification) -> Result<Notification, StoreError> {
        let result = match timeout(self.write_timeout, self.store.insert(new)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout),
        };

        match &result {
            Ok(row) => {
                ROWS_WRITTEN_TOTAL.inc();
                tracing::debug!(
                    recipient_id = %new.recipient_id,
                    notification_id = %row.id,
                    "Notification row persisted"
                );
            }
            Err(e) => {
                WRITE_FAILURES_TOTAL.inc();
                tracing::warn!(
                    recipient_id = %new.recipient_id,
                    error = %e,
                    "Notification row write failed"
                );
            }
        }

        result
    }

    /// Persist a batch.
    ///
    /// The atomic multi-row insert is an optimization; when it fails the
    /// writer degrades to per-recipient writes so successes are not lost.
    pub async fn write_batch(&self, batch: &[NewNotification]) -> BatchWrite {
        if batch.is_empty() {
            return BatchWrite::default();
        }

        match timeout(self.write_timeout, self.store.insert_many(batch)).await {
            Ok(Ok(rows)) => {
                ROWS_WRITTEN_TOTAL.inc_by(rows.len() as u64);
                tracing::debug!(rows = rows.len(), "Batch persisted atomically");
                return BatchWrite {
                    written: rows,
                    failed: Vec::new(),
                };
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    rows = batch.len(),
                    "Atomic batch insert failed, degrading to per-recipient writes"
                );
            }
            Err(_) => {
                tracing::warn!(
                    rows = batch.len(),
                    "Atomic batch insert timed out, degrading to per-recipient writes"
                );
            }
        }

        self.write_individually(batch).await
    }

    /// Per-recipient writes with bounded parallelism.
    async fn write_individually(&self, batch: &[NewNotification]) -> BatchWrite {
        let mut futures = FuturesUnordered::new();
        let mut result = BatchWrite::default();
        let mut pending = 0;
        let mut iter = batch.iter();

        loop {
            while pending < MAX_CONCURRENT_WRITES {
                match iter.next() {
                    Some(new) => {
                        futures.push(async move {
                            (new.recipient_id.clone(), self.write_one(new).await)
                        });
                        pending += 1;
                    }
                    None => break,
                }
            }

            match futures.next().await {
                Some((_, Ok(row))) => {
                    pending -= 1;
                    result.written.push(row);
                }
                Some((recipient_id, Err(e))) => {
                    pending -= 1;
                    result.failed.push((recipient_id, e.to_string()));
                }
                None => break,
            }
        }

        result
    }

    /// Idempotent `unread -> read` transition.
    pub async fn mark_read(&self, id: Uuid) -> Result<Notification, StoreError> {
        match timeout(self.write_timeout, self.store.mark_read(id)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout),
        }
    }
}
