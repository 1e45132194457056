//! Dispatch engine — submits send-eligible notifications to the provider.
//!
//! Runs a fixed-delay loop; each cycle is guarded by a Redis lease lock so
//! only one instance across the fleet dispatches at a time. Within a cycle,
//! `queued` rows are processed oldest-request-first, then `retry` rows the
//! same way; each notification is committed individually so one failure never
//! blocks the rest of the page.

use std::time::Duration;

use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use sqlx::PgPool;

use courier_common::config::AppConfig;
use courier_common::types::{Notification, NotificationStatus};
use courier_gateway::ProviderGateway;

use crate::lock::JobLock;
use crate::sender::{SendError, SenderStrategy};
use crate::store::NotificationStore;

const DISPATCH_LOCK: &str = "dispatch";

pub struct DispatchEngine<G> {
    pool: PgPool,
    redis: ConnectionManager,
    gateway: G,
    strategy: SenderStrategy,
    interval: Duration,
    page_size: i64,
    lock_lease_secs: u64,
}

impl<G: ProviderGateway> DispatchEngine<G> {
    pub fn new(
        pool: PgPool,
        redis: ConnectionManager,
        gateway: G,
        strategy: SenderStrategy,
        config: &AppConfig,
    ) -> Self {
        Self {
            pool,
            redis,
            gateway,
            strategy,
            interval: Duration::from_secs(config.dispatch_interval_secs),
            page_size: config.page_size,
            lock_lease_secs: config.lock_lease_secs,
        }
    }

    /// Fixed-delay dispatch loop. Runs until the task is cancelled.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            page_size = self.page_size,
            "Dispatch engine started"
        );

        loop {
            if let Err(e) = self.run_cycle().await {
                tracing::error!(error = %e, "Dispatch cycle failed");
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One lock-guarded cycle. A cycle that loses the lock race is skipped
    /// silently; the lock is released on every exit path.
    pub async fn run_cycle(&mut self) -> anyhow::Result<()> {
        let Some(token) =
            JobLock::acquire(&mut self.redis, DISPATCH_LOCK, self.lock_lease_secs).await?
        else {
            return Ok(());
        };

        let result =
            dispatch_page(&self.pool, &self.gateway, &self.strategy, self.page_size).await;
        JobLock::release(&mut self.redis, DISPATCH_LOCK, &token).await?;
        result
    }
}

/// Process one dispatch page: `queued` rows first, then `retry` rows, each
/// set ordered by `requested_on` ascending. One persisted update per
/// notification; a failure on one row is logged and the page continues.
pub async fn dispatch_page<G: ProviderGateway>(
    pool: &PgPool,
    gateway: &G,
    strategy: &SenderStrategy,
    page_size: i64,
) -> anyhow::Result<()> {
    let mut processed = 0usize;

    for status in [NotificationStatus::Queued, NotificationStatus::Retry] {
        let batch = NotificationStore::find_by_status(pool, status, page_size).await?;
        for mut notification in batch {
            match dispatch_one(pool, gateway, strategy, &mut notification).await {
                Ok(()) => processed += 1,
                Err(e) => tracing::error!(
                    notification_id = %notification.id,
                    error = %e,
                    "Failed to dispatch notification"
                ),
            }
        }
    }

    if processed > 0 {
        tracing::info!(processed, "Dispatch cycle complete");
    }

    Ok(())
}

/// Send one notification and persist the resulting transition.
async fn dispatch_one<G: ProviderGateway>(
    pool: &PgPool,
    gateway: &G,
    strategy: &SenderStrategy,
    notification: &mut Notification,
) -> anyhow::Result<()> {
    let now = Utc::now();
    notification.last_send_attempt_at = Some(now);

    let result = strategy.send(gateway, notification).await;
    apply_send_result(notification, result, now);

    NotificationStore::update(pool, notification).await?;
    Ok(())
}

/// Fold the immediate provider response into the notification.
///
/// Acceptance moves the row to `sent_to_provider`. A permanent rejection
/// (bad credentials or malformed request) is terminal; everything else is a
/// temporary failure awaiting the retry policy. Either failure clears the
/// provider id.
pub fn apply_send_result(
    notification: &mut Notification,
    result: Result<String, SendError>,
    now: DateTime<Utc>,
) {
    match result {
        Ok(provider_id) => {
            notification.status = NotificationStatus::SentToProvider;
            notification.provider_notification_id = Some(provider_id);
            notification.failure_reason = None;
        }
        Err(e) => {
            notification.provider_notification_id = None;
            notification.failure_reason = Some(e.to_string());
            notification.last_failed_at = Some(now);
            notification.status = if e.is_permanent() {
                NotificationStatus::Failed
            } else {
                NotificationStatus::TemporaryFailure
            };

            tracing::warn!(
                notification_id = %notification.id,
                permanent = e.is_permanent(),
                error = %e,
                "Send attempt failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_common::types::Channel;
    use courier_gateway::ProviderError;
    use uuid::Uuid;

    fn make_notification(status: NotificationStatus) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            channel: Channel::Email,
            status,
            template_id: Uuid::new_v4(),
            recipient: "someone@example.org".to_string(),
            merge_fields: serde_json::json!({}),
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
            failure_reason: Some("previous failure".to_string()),
            sent_at: None,
        }
    }

    #[test]
    fn test_acceptance_moves_to_sent_to_provider() {
        let mut n = make_notification(NotificationStatus::Queued);
        apply_send_result(&mut n, Ok("abc-123".to_string()), Utc::now());

        assert_eq!(n.status, NotificationStatus::SentToProvider);
        assert_eq!(n.provider_notification_id.as_deref(), Some("abc-123"));
        assert!(n.failure_reason.is_none());
    }

    #[test]
    fn test_rejected_credentials_are_terminal() {
        let mut n = make_notification(NotificationStatus::Queued);
        let err = SendError::Provider(ProviderError::Api {
            status: 403,
            message: "invalid api key".to_string(),
        });
        let now = Utc::now();
        apply_send_result(&mut n, Err(err), now);

        assert_eq!(n.status, NotificationStatus::Failed);
        assert!(n.provider_notification_id.is_none());
        assert!(n.failure_reason.as_deref().unwrap().contains("invalid api key"));
        assert_eq!(n.last_failed_at, Some(now));
    }

    #[test]
    fn test_malformed_request_is_terminal() {
        let mut n = make_notification(NotificationStatus::Queued);
        let err = SendError::Provider(ProviderError::Api {
            status: 400,
            message: "missing personalisation".to_string(),
        });
        apply_send_result(&mut n, Err(err), Utc::now());

        assert_eq!(n.status, NotificationStatus::Failed);
        assert!(n.provider_notification_id.is_none());
    }

    #[test]
    fn test_server_error_is_temporary() {
        let mut n = make_notification(NotificationStatus::Queued);
        let err = SendError::Provider(ProviderError::Api {
            status: 500,
            message: "internal".to_string(),
        });
        apply_send_result(&mut n, Err(err), Utc::now());

        assert_eq!(n.status, NotificationStatus::TemporaryFailure);
        assert!(n.provider_notification_id.is_none());
        assert!(n.failure_reason.is_some());
    }

    #[test]
    fn test_network_failure_is_temporary() {
        let mut n = make_notification(NotificationStatus::Retry);
        let err = SendError::Provider(ProviderError::Transport(
            "connection refused".to_string(),
        ));
        apply_send_result(&mut n, Err(err), Utc::now());

        assert_eq!(n.status, NotificationStatus::TemporaryFailure);
    }

    #[test]
    fn test_channel_mismatch_is_terminal() {
        let mut n = make_notification(NotificationStatus::Queued);
        let err = SendError::ChannelMismatch {
            expected: Channel::Email,
            actual: Channel::Sms,
        };
        apply_send_result(&mut n, Err(err), Utc::now());

        assert_eq!(n.status, NotificationStatus::Failed);
    }
}
