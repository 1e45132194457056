//! Status reconciliation engine — resolves in-flight notifications.
//!
//! Polls the provider for the live delivery status of everything in
//! `sent_to_provider`, and routes `temporary_failure` rows (locally detected
//! transport failures, nothing to ask the provider about) straight to the
//! retry policy. Runs on its own cadence under its own lock, independent of
//! the dispatcher.

use std::time::Duration;

use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use sqlx::PgPool;

use courier_common::config::AppConfig;
use courier_common::types::{Notification, NotificationStatus};
use courier_gateway::{DeliveryOutcome, ProviderGateway, StatusResponse, classify};

use crate::lock::JobLock;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::store::NotificationStore;

const RECONCILE_LOCK: &str = "reconcile";

/// The statuses the reconciler owns. Disjoint from the dispatcher's set.
const RECONCILE_STATUSES: [NotificationStatus; 2] = [
    NotificationStatus::SentToProvider,
    NotificationStatus::TemporaryFailure,
];

pub struct ReconciliationEngine<G> {
    pool: PgPool,
    redis: ConnectionManager,
    gateway: G,
    policy: RetryPolicy,
    interval: Duration,
    page_size: i64,
    lock_lease_secs: u64,
}

impl<G: ProviderGateway> ReconciliationEngine<G> {
    pub fn new(pool: PgPool, redis: ConnectionManager, gateway: G, config: &AppConfig) -> Self {
        Self {
            pool,
            redis,
            gateway,
            policy: RetryPolicy::new(config.reconcile_interval_secs),
            interval: Duration::from_secs(config.reconcile_interval_secs),
            page_size: config.page_size,
            lock_lease_secs: config.lock_lease_secs,
        }
    }

    /// Fixed-delay reconciliation loop. Runs until the task is cancelled.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            page_size = self.page_size,
            "Reconciliation engine started"
        );

        loop {
            if let Err(e) = self.run_cycle().await {
                tracing::error!(error = %e, "Reconciliation cycle failed");
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One lock-guarded cycle; skipped silently on lock contention.
    pub async fn run_cycle(&mut self) -> anyhow::Result<()> {
        let Some(token) =
            JobLock::acquire(&mut self.redis, RECONCILE_LOCK, self.lock_lease_secs).await?
        else {
            return Ok(());
        };

        let result =
            reconcile_page(&self.pool, &self.gateway, &self.policy, self.page_size).await;
        JobLock::release(&mut self.redis, RECONCILE_LOCK, &token).await?;
        result
    }
}

/// Process one reconciliation page. No ordering is guaranteed across rows;
/// each row is committed individually and a failure on one never blocks the
/// rest.
pub async fn reconcile_page<G: ProviderGateway>(
    pool: &PgPool,
    gateway: &G,
    policy: &RetryPolicy,
    page_size: i64,
) -> anyhow::Result<()> {
    let batch = NotificationStore::find_by_statuses(pool, &RECONCILE_STATUSES, page_size).await?;

    for mut notification in batch {
        if let Err(e) = reconcile_one(pool, gateway, policy, &mut notification).await {
            tracing::error!(
                notification_id = %notification.id,
                error = %e,
                "Failed to reconcile notification"
            );
        }
    }

    Ok(())
}

/// Advance one notification and persist the resulting transition.
async fn reconcile_one<G: ProviderGateway>(
    pool: &PgPool,
    gateway: &G,
    policy: &RetryPolicy,
    notification: &mut Notification,
) -> anyhow::Result<()> {
    let now = Utc::now();

    match notification.status {
        NotificationStatus::SentToProvider => {
            let Some(provider_id) = notification.provider_notification_id.clone() else {
                // Acceptance always records the provider id; a row here
                // without one has been tampered with or corrupted.
                tracing::warn!(
                    notification_id = %notification.id,
                    "In-flight notification has no provider id, skipping"
                );
                return Ok(());
            };

            match gateway.notification_status(&provider_id).await {
                Err(e) => {
                    // Leave the status alone; the next poll retries the query.
                    notification.failure_reason = Some(e.to_string());
                    notification.last_failed_at = Some(now);
                    tracing::warn!(
                        notification_id = %notification.id,
                        error = %e,
                        "Provider status query failed"
                    );
                }
                Ok(response) => apply_status_response(policy, notification, &response, now),
            }
        }
        NotificationStatus::TemporaryFailure => {
            apply_retry_policy(policy, notification, now);
        }
        other => {
            // The fetch filter makes this unreachable.
            tracing::debug!(
                notification_id = %notification.id,
                status = %other,
                "Skipping notification not owned by the reconciler"
            );
            return Ok(());
        }
    }

    NotificationStore::update(pool, notification).await?;
    Ok(())
}

/// Fold a successful provider status query into the notification.
///
/// The raw status and query time are always recorded and the failure fields
/// cleared; the state transition then follows the status classification.
pub fn apply_status_response(
    policy: &RetryPolicy,
    notification: &mut Notification,
    response: &StatusResponse,
    now: DateTime<Utc>,
) {
    notification.provider_status = Some(response.status.clone());
    notification.provider_status_updated_at = Some(now);
    notification.failure_reason = None;
    notification.last_failed_at = None;

    match classify(&response.status) {
        DeliveryOutcome::Unrecognized => {
            notification.status = NotificationStatus::UnrecognizedProviderStatus;
            tracing::error!(
                notification_id = %notification.id,
                provider_status = %response.status,
                "Provider reported an unrecognized status"
            );
        }
        DeliveryOutcome::PermanentFailure => {
            notification.status = NotificationStatus::Failed;
            notification.failure_reason =
                Some("permanent failure reported by provider".to_string());
            notification.last_failed_at = Some(now);
        }
        DeliveryOutcome::TemporaryFailure => {
            apply_retry_policy(policy, notification, now);
        }
        DeliveryOutcome::Delivered => {
            notification.status = NotificationStatus::Sent;
            notification.sent_at = response.sent_at.or(Some(now));
            tracing::info!(
                notification_id = %notification.id,
                "Notification delivered"
            );
        }
        DeliveryOutcome::InFlight => {
            // Status and timestamp refreshed above; nothing else to do.
        }
    }
}

/// Apply the retry policy to a retryable notification.
///
/// The absolute ceiling abandons the row permanently; an elapsed backoff
/// window promotes it to `retry` (consuming a retry cycle and restarting the
/// backoff clock); otherwise the row is left waiting.
pub fn apply_retry_policy(
    policy: &RetryPolicy,
    notification: &mut Notification,
    now: DateTime<Utc>,
) {
    match policy.evaluate(notification, now) {
        RetryDecision::Abandon => {
            notification.status = NotificationStatus::Failed;
            notification.failure_reason = Some("maximum retry time exceeded".to_string());
            notification.last_failed_at = Some(now);
            tracing::warn!(
                notification_id = %notification.id,
                retry_count = notification.retry_count,
                "Maximum retry time exceeded, abandoning"
            );
        }
        RetryDecision::Due => {
            notification.status = NotificationStatus::Retry;
            notification.retry_count += 1;
            notification.last_send_attempt_at = Some(now);
        }
        RetryDecision::NotDue => {}
    }
}
