pub mod client;
pub mod status;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use client::HttpProviderGateway;
pub use status::{DeliveryOutcome, classify};

/// Failure reported by, or while reaching, the delivery provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The provider answered with a non-success HTTP status.
    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The provider could not be reached or its response was unusable.
    #[error("provider request failed: {0}")]
    Transport(String),
}

impl ProviderError {
    /// Whether this failure is a non-transient caller/config error.
    ///
    /// 403 means rejected credentials, 400 a malformed request; retrying
    /// either cannot succeed. Everything else is treated as transient.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ProviderError::Api {
                status: 400 | 403,
                ..
            }
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Transport(e.to_string())
    }
}

/// Live delivery status of a previously accepted notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Raw provider status string; see [`status::classify`].
    pub status: String,
    /// Delivery timestamp, when the provider reports one.
    pub sent_at: Option<DateTime<Utc>>,
}

/// A provider-side message template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub required_fields: Vec<String>,
}

/// Outbound surface of the delivery provider.
///
/// The engines are generic over this trait so they can run against a
/// recording stub in tests; [`HttpProviderGateway`] is the production
/// implementation.
pub trait ProviderGateway: Send + Sync {
    /// Submit an email send. Returns the provider's notification id.
    fn send_email(
        &self,
        template_id: Uuid,
        recipient: &str,
        merge_fields: &serde_json::Value,
        reference: Option<&str>,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;

    /// Submit an SMS send. Returns the provider's notification id.
    fn send_sms(
        &self,
        template_id: Uuid,
        recipient: &str,
        merge_fields: &serde_json::Value,
        reference: Option<&str>,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;

    /// Query the live delivery status of an accepted notification.
    fn notification_status(
        &self,
        provider_id: &str,
    ) -> impl Future<Output = Result<StatusResponse, ProviderError>> + Send;

    /// Fetch a template definition.
    fn template(
        &self,
        template_id: Uuid,
    ) -> impl Future<Output = Result<Template, ProviderError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_400_and_403_are_permanent() {
        let bad_request = ProviderError::Api {
            status: 400,
            message: "missing personalisation".to_string(),
        };
        let forbidden = ProviderError::Api {
            status: 403,
            message: "invalid api key".to_string(),
        };
        assert!(bad_request.is_permanent());
        assert!(forbidden.is_permanent());
    }

    #[test]
    fn test_other_failures_are_transient() {
        let server_error = ProviderError::Api {
            status: 500,
            message: "internal".to_string(),
        };
        let rate_limited = ProviderError::Api {
            status: 429,
            message: "too many requests".to_string(),
        };
        let network = ProviderError::Transport("connection refused".to_string());
        assert!(!server_error.is_permanent());
        assert!(!rate_limited.is_permanent());
        assert!(!network.is_permanent());
    }
}
