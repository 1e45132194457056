use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery channels supported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Email => write!(f, "email"),
            Channel::Sms => write!(f, "sms"),
        }
    }
}

/// Lifecycle state of a notification.
///
/// Forward-only: `queued` and `retry` rows are picked up by the dispatcher,
/// `sent_to_provider` and `temporary_failure` rows by the reconciler. The three
/// terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    /// Enqueued, waiting for the dispatcher.
    Queued,
    /// Accepted by the provider, delivery outcome not yet known.
    SentToProvider,
    /// Provider confirmed delivery. Terminal.
    Sent,
    /// Transport-level failure at send time, retryable pending backoff.
    TemporaryFailure,
    /// Backoff window elapsed, eligible for re-dispatch.
    Retry,
    /// Permanently failed: rejected request, provider-reported permanent
    /// failure, or maximum retry time exceeded. Terminal.
    Failed,
    /// Provider reported a status string unknown to this system. Terminal,
    /// flagged for operator investigation.
    UnrecognizedProviderStatus,
}

impl NotificationStatus {
    /// Whether this status admits no further automated transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NotificationStatus::Sent
                | NotificationStatus::Failed
                | NotificationStatus::UnrecognizedProviderStatus
        )
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationStatus::Queued => write!(f, "queued"),
            NotificationStatus::SentToProvider => write!(f, "sent_to_provider"),
            NotificationStatus::Sent => write!(f, "sent"),
            NotificationStatus::TemporaryFailure => write!(f, "temporary_failure"),
            NotificationStatus::Retry => write!(f, "retry"),
            NotificationStatus::Failed => write!(f, "failed"),
            NotificationStatus::UnrecognizedProviderStatus => {
                write!(f, "unrecognized_provider_status")
            }
        }
    }
}

/// A queued outbound notification.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub channel: Channel,
    pub status: NotificationStatus,
    pub template_id: Uuid,
    pub recipient: String,
    /// Template personalisation, name → value.
    pub merge_fields: serde_json::Value,
    /// Caller's domain correlation, opaque to this system.
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub correlation_id: Option<String>,
    /// Set once the provider accepts the send; cleared on transport failure.
    pub provider_notification_id: Option<String>,
    /// Last raw status string reported by the provider.
    pub provider_status: Option<String>,
    pub provider_status_updated_at: Option<DateTime<Utc>>,
    /// Enqueue time. Anchors the absolute retry deadline.
    pub requested_on: DateTime<Utc>,
    /// Most recent dispatch attempt or retry decision. Drives the relative
    /// backoff clock; null means "not yet due".
    pub last_send_attempt_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub last_failed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    /// Set once the provider confirms final delivery.
    pub sent_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Whether the dispatcher may pick this row up.
    pub fn is_dispatch_eligible(&self) -> bool {
        matches!(
            self.status,
            NotificationStatus::Queued | NotificationStatus::Retry
        )
    }

    /// Whether the reconciler may pick this row up.
    pub fn is_reconcile_eligible(&self) -> bool {
        matches!(
            self.status,
            NotificationStatus::SentToProvider | NotificationStatus::TemporaryFailure
        )
    }
}
