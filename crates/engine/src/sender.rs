//! Sender strategy — how outbound sends are addressed.
//!
//! Production sends to the recipient recorded on the notification. Test mode
//! fans a single notification out to a configured per-channel allow-list so
//! nothing ever reaches a real recipient from a non-production environment;
//! an empty allow-list falls back to the real recipient so test mode never
//! silently drops a send.

use thiserror::Error;

use courier_common::config::{AppConfig, SenderMode};
use courier_common::types::{Channel, Notification};
use courier_gateway::{ProviderError, ProviderGateway};

/// Failure of one strategy-level send.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// The notification was routed down the wrong channel path. A caller
    /// error: never retried, and the provider is never contacted.
    #[error("channel mismatch: this path sends {expected}, notification is {actual}")]
    ChannelMismatch { expected: Channel, actual: Channel },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl SendError {
    /// Whether retrying this send can never succeed.
    pub fn is_permanent(&self) -> bool {
        match self {
            SendError::ChannelMismatch { .. } => true,
            SendError::Provider(e) => e.is_permanent(),
        }
    }
}

/// Recipient-addressing strategy, chosen once at startup.
#[derive(Debug, Clone)]
pub enum SenderStrategy {
    /// Send to `notification.recipient` unchanged.
    Production,
    /// Substitute the per-channel allow-lists for the real recipient.
    Test {
        email_allow_list: Vec<String>,
        sms_allow_list: Vec<String>,
    },
}

impl SenderStrategy {
    pub fn from_config(config: &AppConfig) -> Self {
        match config.sender_mode {
            SenderMode::Production => SenderStrategy::Production,
            SenderMode::Test => SenderStrategy::Test {
                email_allow_list: config.test_email_recipients.clone(),
                sms_allow_list: config.test_sms_recipients.clone(),
            },
        }
    }

    /// Send a notification down its channel's path. Returns the provider
    /// notification id of the last call made.
    pub async fn send<G: ProviderGateway>(
        &self,
        gateway: &G,
        notification: &Notification,
    ) -> Result<String, SendError> {
        match notification.channel {
            Channel::Email => self.send_email(gateway, notification).await,
            Channel::Sms => self.send_sms(gateway, notification).await,
        }
    }

    /// Email path. Fails fast, without contacting the provider, when handed a
    /// non-email notification.
    pub async fn send_email<G: ProviderGateway>(
        &self,
        gateway: &G,
        notification: &Notification,
    ) -> Result<String, SendError> {
        if notification.channel != Channel::Email {
            return Err(SendError::ChannelMismatch {
                expected: Channel::Email,
                actual: notification.channel,
            });
        }

        // Fan-out reports the result of the last call only.
        let mut result: Result<String, ProviderError> =
            Err(ProviderError::Transport("no recipients resolved".to_string()));
        for recipient in self.recipients(Channel::Email, &notification.recipient) {
            result = gateway
                .send_email(
                    notification.template_id,
                    recipient,
                    &notification.merge_fields,
                    notification.reference_id.as_deref(),
                )
                .await;
            if let Err(e) = &result {
                tracing::warn!(
                    notification_id = %notification.id,
                    error = %e,
                    "Email send attempt failed"
                );
            }
        }
        Ok(result?)
    }

    /// SMS path; mirror of the email path.
    pub async fn send_sms<G: ProviderGateway>(
        &self,
        gateway: &G,
        notification: &Notification,
    ) -> Result<String, SendError> {
        if notification.channel != Channel::Sms {
            return Err(SendError::ChannelMismatch {
                expected: Channel::Sms,
                actual: notification.channel,
            });
        }

        let mut result: Result<String, ProviderError> =
            Err(ProviderError::Transport("no recipients resolved".to_string()));
        for recipient in self.recipients(Channel::Sms, &notification.recipient) {
            result = gateway
                .send_sms(
                    notification.template_id,
                    recipient,
                    &notification.merge_fields,
                    notification.reference_id.as_deref(),
                )
                .await;
            if let Err(e) = &result {
                tracing::warn!(
                    notification_id = %notification.id,
                    error = %e,
                    "SMS send attempt failed"
                );
            }
        }
        Ok(result?)
    }

    /// Resolve who actually receives this send. Never empty: test mode with
    /// no allow-list configured falls back to the original recipient.
    fn recipients<'a>(&'a self, channel: Channel, original: &'a str) -> Vec<&'a str> {
        let allow_list: &[String] = match (self, channel) {
            (SenderStrategy::Test { email_allow_list, .. }, Channel::Email) => email_allow_list,
            (SenderStrategy::Test { sms_allow_list, .. }, Channel::Sms) => sms_allow_list,
            (SenderStrategy::Production, _) => &[],
        };

        if allow_list.is_empty() {
            vec![original]
        } else {
            allow_list.iter().map(String::as_str).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;
    use uuid::Uuid;

    use courier_gateway::{StatusResponse, Template};

    /// Gateway stub that records recipients and succeeds every call.
    #[derive(Default)]
    struct RecordingGateway {
        email_recipients: Mutex<Vec<String>>,
        sms_recipients: Mutex<Vec<String>>,
    }

    impl ProviderGateway for RecordingGateway {
        async fn send_email(
            &self,
            _template_id: Uuid,
            recipient: &str,
            _merge_fields: &serde_json::Value,
            _reference: Option<&str>,
        ) -> Result<String, ProviderError> {
            let mut calls = self.email_recipients.lock().unwrap();
            calls.push(recipient.to_string());
            Ok(format!("provider-{}", calls.len()))
        }

        async fn send_sms(
            &self,
            _template_id: Uuid,
            recipient: &str,
            _merge_fields: &serde_json::Value,
            _reference: Option<&str>,
        ) -> Result<String, ProviderError> {
            let mut calls = self.sms_recipients.lock().unwrap();
            calls.push(recipient.to_string());
            Ok(format!("provider-{}", calls.len()))
        }

        async fn notification_status(
            &self,
            _provider_id: &str,
        ) -> Result<StatusResponse, ProviderError> {
            Ok(StatusResponse {
                status: "delivered".to_string(),
                sent_at: None,
            })
        }

        async fn template(&self, template_id: Uuid) -> Result<Template, ProviderError> {
            Ok(Template {
                id: template_id,
                kind: "email".to_string(),
                required_fields: vec![],
            })
        }
    }

    fn make_notification(channel: Channel, recipient: &str) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            channel,
            status: courier_common::types::NotificationStatus::Queued,
            template_id: Uuid::new_v4(),
            recipient: recipient.to_string(),
            merge_fields: serde_json::json!({"name": "Sam"}),
            reference_id: None,
            reference_type: None,
            correlation_id: None,
            provider_notification_id: None,
            provider_status: None,
            provider_status_updated_at: None,
            requested_on: Utc::now(),
            last_send_attempt_at: None,
            retry_count: 0,
            last_failed_at: None,
            failure_reason: None,
            sent_at: None,
        }
    }

    #[tokio::test]
    async fn test_production_sends_to_real_recipient() {
        let gateway = RecordingGateway::default();
        let strategy = SenderStrategy::Production;
        let n = make_notification(Channel::Email, "real@example.org");

        strategy.send(&gateway, &n).await.unwrap();

        let calls = gateway.email_recipients.lock().unwrap();
        assert_eq!(*calls, vec!["real@example.org".to_string()]);
    }

    #[tokio::test]
    async fn test_test_mode_fans_out_and_skips_real_recipient() {
        let gateway = RecordingGateway::default();
        let strategy = SenderStrategy::Test {
            email_allow_list: vec!["qa1@example.org".to_string(), "qa2@example.org".to_string()],
            sms_allow_list: vec![],
        };
        let n = make_notification(Channel::Email, "real@example.org");

        let id = strategy.send(&gateway, &n).await.unwrap();

        let calls = gateway.email_recipients.lock().unwrap();
        assert_eq!(
            *calls,
            vec!["qa1@example.org".to_string(), "qa2@example.org".to_string()]
        );
        assert!(!calls.contains(&"real@example.org".to_string()));
        // Result of the last call is reported.
        assert_eq!(id, "provider-2");
    }

    #[tokio::test]
    async fn test_test_mode_empty_allow_list_falls_back() {
        let gateway = RecordingGateway::default();
        let strategy = SenderStrategy::Test {
            email_allow_list: vec![],
            sms_allow_list: vec![],
        };
        let n = make_notification(Channel::Email, "real@example.org");

        strategy.send(&gateway, &n).await.unwrap();

        let calls = gateway.email_recipients.lock().unwrap();
        assert_eq!(*calls, vec!["real@example.org".to_string()]);
    }

    #[tokio::test]
    async fn test_sms_path_uses_sms_allow_list() {
        let gateway = RecordingGateway::default();
        let strategy = SenderStrategy::Test {
            email_allow_list: vec!["qa@example.org".to_string()],
            sms_allow_list: vec!["+447700900001".to_string()],
        };
        let n = make_notification(Channel::Sms, "+447700900999");

        strategy.send(&gateway, &n).await.unwrap();

        assert!(gateway.email_recipients.lock().unwrap().is_empty());
        assert_eq!(
            *gateway.sms_recipients.lock().unwrap(),
            vec!["+447700900001".to_string()]
        );
    }

    #[tokio::test]
    async fn test_channel_mismatch_fails_without_provider_call() {
        let gateway = RecordingGateway::default();
        let strategy = SenderStrategy::Production;
        let sms = make_notification(Channel::Sms, "+447700900999");

        let err = strategy.send_email(&gateway, &sms).await.unwrap_err();
        assert!(matches!(err, SendError::ChannelMismatch { .. }));
        assert!(err.is_permanent());

        let email = make_notification(Channel::Email, "real@example.org");
        let err = strategy.send_sms(&gateway, &email).await.unwrap_err();
        assert!(matches!(err, SendError::ChannelMismatch { .. }));

        assert!(gateway.email_recipients.lock().unwrap().is_empty());
        assert!(gateway.sms_recipients.lock().unwrap().is_empty());
    }
}
