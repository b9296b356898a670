//! Two-tier push delivery.
//!
//! The dispatcher owns the channel decision: the primary channel is one
//! opaque server-side call; the fallback channel performs the steps
//! explicitly (token lookup, one batched gateway call).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use uuid::Uuid;

use crate::error::DispatchError;
use crate::metrics::{DELIVERIES_TOTAL, DELIVERY_FAILURES_TOTAL, TOKENS_MISSING_TOTAL};
use crate::notification::{
    DeliveryChannel, DeliveryOutcome, NotificationStatus, PushMessage, TokenStore,
};

use super::gateway::{PushGateway, PushRequest, TicketStatus};
use super::rpc::{PrimaryChannel, RpcError};

/// Converts (recipient, token) sets and a message into delivery attempts.
pub struct PushDispatcher {
    tokens: Arc<dyn TokenStore>,
    gateway: Arc<dyn PushGateway>,
    primary: Arc<dyn PrimaryChannel>,
}

impl PushDispatcher {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        gateway: Arc<dyn PushGateway>,
        primary: Arc<dyn PrimaryChannel>,
    ) -> Self {
        Self {
            tokens,
            gateway,
            primary,
        }
    }

    /// Primary channel: one opaque server-side call.
    #[tracing::instrument(
        name = "dispatcher.deliver_primary",
        skip(self, message),
        fields(recipient_id = %recipient_id)
    )]
    pub async fn deliver_primary(
        &self,
        recipient_id: &str,
        service_id: Option<Uuid>,
        message: &PushMessage,
    ) -> Result<(), RpcError> {
        match self
            .primary
            .send_notification(recipient_id, service_id, NotificationStatus::Unread, message)
            .await
        {
            Ok(()) => {
                DELIVERIES_TOTAL.with_label_values(&["primary"]).inc();
                tracing::debug!("Primary channel delivery succeeded");
                Ok(())
            }
            Err(e) => {
                DELIVERY_FAILURES_TOTAL.with_label_values(&["primary"]).inc();
                tracing::warn!(error = %e, "Primary channel delivery failed");
                Err(e)
            }
        }
    }

    /// Fallback channel: explicit token lookup plus one batched gateway call.
    ///
    /// Returns one outcome per recipient. Per-token rejections and missing
    /// tokens are warnings on the outcome, not call failures; a hard gateway
    /// failure (5xx or timeout) surfaces as an error so the caller can degrade.
    #[tracing::instrument(
        name = "dispatcher.deliver_direct",
        skip(self, recipients, message),
        fields(recipients = recipients.len())
    )]
    pub async fn deliver_direct(
        &self,
        recipients: &[String],
        message: &PushMessage,
    ) -> Result<Vec<DeliveryOutcome>, DispatchError> {
        let tokens = self
            .tokens
            .list_tokens(recipients)
            .await
            .map_err(|e| DispatchError::Delivery(format!("token lookup failed: {e}")))?;

        if tokens.is_empty() {
            tracing::warn!("no delivery tokens for any recipient in batch");
            TOKENS_MISSING_TOTAL.inc_by(recipients.len() as u64);
            return Ok(recipients.iter().map(|r| no_token_outcome(r)).collect());
        }

        let owners: Vec<String> = tokens.iter().map(|t| t.user_id.clone()).collect();
        let request = PushRequest {
            tokens: tokens.into_iter().map(|t| t.token).collect(),
            message: message.clone(),
        };

        let response = self.gateway.send(&request).await?;

        for error in &response.errors {
            tracing::warn!(error = %error, "Push gateway reported a request-level error");
        }

        // Fold per-token tickets back onto their owners. Tickets align with
        // the request's token order; a short ticket list means the batch was
        // accepted, so unticketed tokens count as reached.
        let mut reached: HashSet<&str> = HashSet::new();
        let mut rejected: HashMap<&str, String> = HashMap::new();
        let token_owners: HashSet<&str> = owners.iter().map(String::as_str).collect();

        for (i, owner) in owners.iter().enumerate() {
            match response.tickets.get(i) {
                Some(ticket) if ticket.status == TicketStatus::Ok => {
                    reached.insert(owner);
                }
                Some(ticket) => {
                    rejected.entry(owner).or_insert_with(|| {
                        ticket
                            .message
                            .clone()
                            .unwrap_or_else(|| "token rejected by gateway".to_string())
                    });
                }
                None => {
                    reached.insert(owner);
                }
            }
        }

        let outcomes = recipients
            .iter()
            .map(|recipient| {
                if !token_owners.contains(recipient.as_str()) {
                    TOKENS_MISSING_TOTAL.inc();
                    no_token_outcome(recipient)
                } else if reached.contains(recipient.as_str()) {
                    DELIVERIES_TOTAL.with_label_values(&["fallback"]).inc();
                    DeliveryOutcome::delivered(recipient, DeliveryChannel::Fallback)
                } else {
                    let reason = rejected
                        .get(recipient.as_str())
                        .cloned()
                        .unwrap_or_else(|| "token rejected by gateway".to_string());
                    DELIVERY_FAILURES_TOTAL.with_label_values(&["fallback"]).inc();
                    DeliveryOutcome::failed(recipient, DeliveryChannel::Fallback, reason)
                }
            })
            .collect();

        Ok(outcomes)
    }
}

fn no_token_outcome(recipient: &str) -> DeliveryOutcome {
    tracing::warn!(recipient_id = %recipient, "no delivery tokens");
    DeliveryOutcome::failed(recipient, DeliveryChannel::Fallback, "no delivery tokens")
}
