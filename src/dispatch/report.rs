//! Per-recipient outcome classification and the aggregate dispatch report.

use serde::Serialize;
use uuid::Uuid;

use crate::notification::DeliveryOutcome;

/// Which stage a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Persistence,
    Delivery,
}

/// One recipient's failure entry in the report.
#[derive(Debug, Clone, Serialize)]
pub struct RecipientFailure {
    pub recipient_id: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Everything that happened to a single recipient during a dispatch call.
#[derive(Debug, Clone, Serialize)]
pub struct RecipientOutcome {
    pub recipient_id: String,
    /// Persisted row id, when the write succeeded
    pub notification_id: Option<Uuid>,
    /// Why the write failed, when it did
    pub persistence_error: Option<String>,
    /// The push attempt, when one was made
    pub delivery: Option<DeliveryOutcome>,
}

impl RecipientOutcome {
    pub fn persisted(recipient_id: impl Into<String>, notification_id: Uuid) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            notification_id: Some(notification_id),
            persistence_error: None,
            delivery: None,
        }
    }

    pub fn write_failed(recipient_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            notification_id: None,
            persistence_error: Some(error.into()),
            delivery: None,
        }
    }

    pub fn with_delivery(mut self, outcome: DeliveryOutcome) -> Self {
        self.delivery = Some(outcome);
        self
    }
}

/// Aggregate result of a dispatch call.
///
/// `succeeded` lists recipients whose rows were persisted; delivery problems
/// are reported separately as `kind = delivery` entries, so persistence and
/// delivery outcomes never mask each other. A report is returned normally
/// even when every delivery attempt failed — only resolution failures abort
/// the call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub succeeded: Vec<String>,
    pub errors: Vec<RecipientFailure>,
    /// Set when the batch was cancelled before every recipient was attempted
    pub incomplete: bool,
}

impl DispatchReport {
    /// Merge per-recipient outcomes into one report.
    pub fn from_outcomes(outcomes: Vec<RecipientOutcome>) -> Self {
        let mut report = DispatchReport::default();

        for outcome in outcomes {
            if let Some(error) = outcome.persistence_error {
                report.errors.push(RecipientFailure {
                    recipient_id: outcome.recipient_id.clone(),
                    kind: FailureKind::Persistence,
                    message: error,
                });
            }
            if outcome.notification_id.is_some() {
                report.succeeded.push(outcome.recipient_id.clone());
            }
            if let Some(delivery) = outcome.delivery {
                if let Some(error) = delivery.error {
                    report.errors.push(RecipientFailure {
                        recipient_id: outcome.recipient_id,
                        kind: FailureKind::Delivery,
                        message: error,
                    });
                }
            }
        }

        report
    }

    /// Recipients whose rows were not persisted, for retry.
    pub fn failed_recipients(&self) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.kind == FailureKind::Persistence)
            .map(|e| e.recipient_id.as_str())
            .collect()
    }

    /// Human-readable "X succeeded, Y failed" summary for the dashboard.
    pub fn summary(&self) -> String {
        format!(
            "{} succeeded, {} failed",
            self.succeeded.len(),
            self.errors.len()
        )
    }
}
