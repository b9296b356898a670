//! Push gateway client.
//!
//! The gateway is a single HTTP endpoint taking `{tokens, message}` and
//! answering `{tickets, errors}`. It is treated as unreliable and possibly
//! slow, so every call carries its own timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::metrics::{GATEWAY_CALLS_TOTAL, GATEWAY_DEGRADED_TOTAL, GATEWAY_LATENCY};
use crate::notification::PushMessage;

/// Errors that can occur on a gateway call.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway call timed out")]
    Timeout,

    #[error("gateway returned server error {0}")]
    ServerError(u16),
}

/// Outbound batch request: every token in one call.
#[derive(Debug, Clone, Serialize)]
pub struct PushRequest {
    pub tokens: Vec<String>,
    pub message: PushMessage,
}

/// Per-token receipt, aligned with the request's token order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushTicket {
    pub status: TicketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushResponse {
    #[serde(default)]
    pub tickets: Vec<PushTicket>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Client for the external push gateway.
///
/// A non-5xx response is a success even when individual tokens were rejected;
/// per-token rejections surface as tickets, not as call failures.
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send(&self, request: &PushRequest) -> Result<PushResponse, GatewayError>;
}

/// HTTP gateway client backed by reqwest.
pub struct HttpPushGateway {
    client: reqwest::Client,
    url: String,
}

impl HttpPushGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl PushGateway for HttpPushGateway {
    #[tracing::instrument(
        name = "gateway.send",
        skip(self, request),
        fields(tokens = request.tokens.len())
    )]
    async fn send(&self, request: &PushRequest) -> Result<PushResponse, GatewayError> {
        GATEWAY_CALLS_TOTAL.inc();
        let _timer = GATEWAY_LATENCY.start_timer();

        let response = match self.client.post(&self.url).json(request).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                GATEWAY_DEGRADED_TOTAL.inc();
                tracing::warn!(url = %self.url, "Push gateway call timed out");
                return Err(GatewayError::Timeout);
            }
            Err(e) => {
                GATEWAY_DEGRADED_TOTAL.inc();
                tracing::warn!(url = %self.url, error = %e, "Push gateway call failed");
                return Err(GatewayError::Http(e));
            }
        };

        let status = response.status();
        if status.is_server_error() {
            GATEWAY_DEGRADED_TOTAL.inc();
            tracing::warn!(status = status.as_u16(), "Push gateway returned server error");
            return Err(GatewayError::ServerError(status.as_u16()));
        }

        match response.json::<PushResponse>().await {
            Ok(parsed) => {
                tracing::debug!(
                    tickets = parsed.tickets.len(),
                    errors = parsed.errors.len(),
                    "Push gateway call completed"
                );
                Ok(parsed)
            }
            Err(e) => {
                // Non-5xx means the batch was accepted; keep the parse problem
                // visible as a request-level error.
                tracing::warn!(status = status.as_u16(), error = %e, "Unparseable gateway response");
                Ok(PushResponse {
                    tickets: Vec::new(),
                    errors: vec![format!("unparseable gateway response (status {status})")],
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = PushRequest {
            tokens: vec!["tok-1".to_string(), "tok-2".to_string()],
            message: PushMessage::new("Job assigned", "Check your queue")
                .with_data(serde_json::json!({"job_id": "42"})),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["tokens"][1], "tok-2");
        assert_eq!(json["message"]["title"], "Job assigned");
        assert_eq!(json["message"]["data"]["job_id"], "42");
    }

    #[test]
    fn test_response_parsing_with_defaults() {
        let response: PushResponse = serde_json::from_str("{}").unwrap();
        assert!(response.tickets.is_empty());
        assert!(response.errors.is_empty());

        let response: PushResponse = serde_json::from_str(
            r#"{"tickets": [{"status": "ok"}, {"status": "error", "message": "not registered"}],
                "errors": ["one token was malformed"]}"#,
        )
        .unwrap();
        assert_eq!(response.tickets.len(), 2);
        assert_eq!(response.tickets[0].status, TicketStatus::Ok);
        assert_eq!(
            response.tickets[1].message.as_deref(),
            Some("not registered")
        );
        assert_eq!(response.errors.len(), 1);
    }
}
