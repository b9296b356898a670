//! Dispatch coordination: orchestrates resolver, writer, and dispatcher for
//! single and bulk sends.

use std::collections::HashMap;

use futures::stream::{FuturesUnordered, StreamExt};
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::directory::RecipientResolver;
use crate::error::DispatchError;
use crate::metrics::{BULK_RECIPIENTS, DISPATCH_REQUESTS_TOTAL, FALLBACK_TOTAL};
use crate::notification::{
    DeliveryChannel, DeliveryOutcome, NewNotification, Notification, NotificationTarget,
    NotificationWriter, PushMessage, StoreError,
};
use crate::push::{BackoffConfig, ExponentialBackoff, PushDispatcher};

use super::report::{DispatchReport, RecipientOutcome};
use super::CancelHandle;

/// Orchestrates resolve -> persist -> deliver and aggregates the outcomes.
pub struct DispatchCoordinator {
    resolver: RecipientResolver,
    writer: NotificationWriter,
    dispatcher: PushDispatcher,
    config: DispatchConfig,
}

impl DispatchCoordinator {
    pub fn new(
        resolver: RecipientResolver,
        writer: NotificationWriter,
        dispatcher: PushDispatcher,
        config: DispatchConfig,
    ) -> Self {
        Self {
            resolver,
            writer,
            dispatcher,
            config,
        }
    }

    /// Send to one recipient: persist the row, attempt the primary channel,
    /// fall back to the direct gateway path when the primary fails outright.
    #[tracing::instrument(
        name = "coordinator.send_one",
        skip(self, message),
        fields(recipient_id = %recipient_id)
    )]
    pub async fn send_one(
        &self,
        recipient_id: &str,
        message: &PushMessage,
        service_id: Option<Uuid>,
    ) -> RecipientOutcome {
        DISPATCH_REQUESTS_TOTAL.with_label_values(&["single"]).inc();
        let new = NewNotification::from_message(recipient_id, message, service_id);
        self.send_one_inner(new, message, false).await
    }

    /// Bulk send: resolve the target, bulk-write rows, one batched gateway
    /// call; degrade to per-recipient sends when a batch step fails outright.
    pub async fn send_bulk(
        &self,
        target: &NotificationTarget,
        message: &PushMessage,
        service_id: Option<Uuid>,
    ) -> Result<DispatchReport, DispatchError> {
        self.send_bulk_cancellable(target, message, service_id, &CancelHandle::new())
            .await
    }

    #[tracing::instrument(
        name = "coordinator.send_bulk",
        skip_all,
        fields(target = target.kind())
    )]
    pub async fn send_bulk_cancellable(
        &self,
        target: &NotificationTarget,
        message: &PushMessage,
        service_id: Option<Uuid>,
        cancel: &CancelHandle,
    ) -> Result<DispatchReport, DispatchError> {
        DISPATCH_REQUESTS_TOTAL.with_label_values(&["bulk"]).inc();

        // Only resolution failures abort the call: InvalidTarget out of the
        // resolver, ResolutionEmpty here. Everything past this point is
        // collected into the report.
        let recipients = self.resolver.resolve(target).await?;
        if recipients.is_empty() {
            return Err(DispatchError::ResolutionEmpty);
        }
        BULK_RECIPIENTS.observe(recipients.len() as f64);

        let batch: Vec<NewNotification> = recipients
            .iter()
            .map(|r| NewNotification::from_message(r, message, service_id))
            .collect();

        let write = self.writer.write_batch(&batch).await;

        if write.is_total_failure() {
            tracing::warn!(
                recipients = batch.len(),
                "Bulk write failed outright, degrading to sequential sends"
            );
            return Ok(self.drive_individually(batch, message, cancel, false).await);
        }

        // Single batched gateway call across every persisted recipient.
        let written_ids: Vec<String> = write
            .written
            .iter()
            .map(|n| n.recipient_id.clone())
            .collect();

        match self.dispatcher.deliver_direct(&written_ids, message).await {
            Ok(deliveries) => {
                let mut by_recipient: HashMap<String, DeliveryOutcome> = deliveries
                    .into_iter()
                    .map(|d| (d.recipient_id.clone(), d))
                    .collect();

                let mut outcomes = Vec::with_capacity(batch.len());
                for row in &write.written {
                    let mut outcome = RecipientOutcome::persisted(&row.recipient_id, row.id);
                    if let Some(delivery) = by_recipient.remove(&row.recipient_id) {
                        outcome = outcome.with_delivery(delivery);
                    }
                    outcomes.push(outcome);
                }
                for (recipient_id, error) in write.failed {
                    outcomes.push(RecipientOutcome::write_failed(recipient_id, error));
                }

                Ok(DispatchReport::from_outcomes(outcomes))
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    recipients = written_ids.len(),
                    "Batched gateway call degraded, re-driving recipients individually"
                );
                // Rows already exist; the dispatch keys are reused so the
                // re-drive writes nothing twice.
                Ok(self.drive_individually(batch, message, cancel, true).await)
            }
        }
    }

    /// Idempotent `unread -> read` transition for a persisted notification.
    pub async fn mark_read(&self, id: Uuid) -> Result<Notification, StoreError> {
        self.writer.mark_read(id).await
    }

    /// One recipient's full write + two-tier delivery sequence.
    ///
    /// The row write completes (or fails) before any delivery attempt is
    /// reported. The dispatch key makes the write idempotent, so re-drives
    /// after a degraded batch reuse the existing row. `pace_retry` inserts a
    /// jittered backoff delay before the fallback attempt.
    async fn send_one_inner(
        &self,
        new: NewNotification,
        message: &PushMessage,
        pace_retry: bool,
    ) -> RecipientOutcome {
        let recipient_id = new.recipient_id.clone();

        let row = match self.writer.write_one(&new).await {
            Ok(row) => row,
            Err(e) => {
                return RecipientOutcome::write_failed(recipient_id, e.to_string());
            }
        };

        let outcome = RecipientOutcome::persisted(&recipient_id, row.id);

        match self
            .dispatcher
            .deliver_primary(&recipient_id, new.service_id, message)
            .await
        {
            Ok(()) => outcome.with_delivery(DeliveryOutcome::delivered(
                &recipient_id,
                DeliveryChannel::Primary,
            )),
            Err(e) => {
                FALLBACK_TOTAL.inc();
                tracing::warn!(
                    recipient_id = %recipient_id,
                    error = %e,
                    "Primary channel failed, engaging fallback"
                );

                if pace_retry {
                    let mut backoff =
                        ExponentialBackoff::with_config(BackoffConfig::from(&self.config));
                    tokio::time::sleep(backoff.next_delay()).await;
                }

                let delivery = match self
                    .dispatcher
                    .deliver_direct(std::slice::from_ref(&recipient_id), message)
                    .await
                {
                    Ok(mut outcomes) if !outcomes.is_empty() => outcomes.remove(0),
                    Ok(_) => DeliveryOutcome::failed(
                        &recipient_id,
                        DeliveryChannel::Fallback,
                        "gateway returned no outcome",
                    ),
                    Err(e) => DeliveryOutcome::failed(
                        &recipient_id,
                        DeliveryChannel::Fallback,
                        e.to_string(),
                    ),
                };

                outcome.with_delivery(delivery)
            }
        }
    }

    /// Sequential send-one path over a bounded worker pool; never aborts on
    /// an individual failure. Outcomes arrive in completion order — there is
    /// no ordering guarantee between recipients.
    async fn drive_individually(
        &self,
        batch: Vec<NewNotification>,
        message: &PushMessage,
        cancel: &CancelHandle,
        pace_retry: bool,
    ) -> DispatchReport {
        let cap = self.config.max_concurrency.max(1);
        let mut futures = FuturesUnordered::new();
        let mut outcomes = Vec::with_capacity(batch.len());
        let mut pending = 0;
        let mut cancelled = false;
        let mut iter = batch.into_iter();

        loop {
            // Top up the pool; stop admitting work once cancelled, but let
            // in-flight sends finish.
            while pending < cap && !cancelled {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break;
                }
                match iter.next() {
                    Some(new) => {
                        futures.push(self.send_one_inner(new, message, pace_retry));
                        pending += 1;
                    }
                    None => break,
                }
            }

            match futures.next().await {
                Some(outcome) => {
                    pending -= 1;
                    outcomes.push(outcome);
                }
                None => break,
            }
        }

        let mut report = DispatchReport::from_outcomes(outcomes);
        if cancelled {
            tracing::warn!(
                collected = report.succeeded.len() + report.errors.len(),
                "Bulk send cancelled, returning partial result"
            );
            report.incomplete = true;
        }
        report
    }
}
