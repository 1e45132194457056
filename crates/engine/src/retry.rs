//! Retry scheduling policy.
//!
//! Two independent checks, both pure functions of the clock:
//! an absolute ceiling (a notification is abandoned once 72 hours have passed
//! since it was requested, whatever its backoff state) and a relative backoff
//! (successive retries wait `poll_interval × 2^(n−1)`, doubling each cycle).
//! The ceiling is checked first and wins.

use chrono::{DateTime, Duration, Utc};

use courier_common::types::Notification;

/// Absolute ceiling on retrying, measured from `requested_on`.
const MAX_RETRY_HOURS: i64 = 72;

/// Clamp on the doubling exponent. The 72h ceiling is reached long before
/// this with any realistic poll interval; the clamp only guards overflow.
const MAX_BACKOFF_EXPONENT: i32 = 20;

/// What the retry policy decided for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Maximum retry time exceeded; abandon permanently.
    Abandon,
    /// Backoff window elapsed; eligible for re-dispatch.
    Due,
    /// Still inside the backoff window; leave unchanged.
    NotDue,
}

/// Pure backoff and max-retry-time policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    poll_interval: Duration,
}

impl RetryPolicy {
    /// `poll_interval_secs` is the base of the backoff schedule — in practice
    /// the reconciliation cycle interval.
    pub fn new(poll_interval_secs: u64) -> Self {
        Self {
            poll_interval: Duration::seconds(poll_interval_secs as i64),
        }
    }

    /// Evaluate both checks for a notification.
    pub fn evaluate(&self, notification: &Notification, now: DateTime<Utc>) -> RetryDecision {
        if self.has_reached_max_retry_time(notification.requested_on, now) {
            return RetryDecision::Abandon;
        }
        if self.has_reached_next_retry_time(
            notification.last_send_attempt_at,
            notification.retry_count,
            now,
        ) {
            RetryDecision::Due
        } else {
            RetryDecision::NotDue
        }
    }

    /// True exactly when `now >= requested_on + 72h`. The boundary instant
    /// counts as reached.
    pub fn has_reached_max_retry_time(
        &self,
        requested_on: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        now >= requested_on + Duration::hours(MAX_RETRY_HOURS)
    }

    /// Wait before the next retry: `poll_interval × 2^max(0, retry_count − 1)`.
    ///
    /// retry_count 0 or 1 → one poll interval, 2 → two, 3 → four, doubling
    /// each cycle.
    pub fn retry_offset(&self, retry_count: i32) -> Duration {
        let exponent = retry_count.saturating_sub(1).clamp(0, MAX_BACKOFF_EXPONENT);
        self.poll_interval * 2i32.pow(exponent as u32)
    }

    /// True once `last_send_attempt_at + offset` has been reached (closed
    /// comparison). A null attempt time means the notification was never
    /// attempted; that is a caller/ops anomaly, reported as "not reached".
    pub fn has_reached_next_retry_time(
        &self,
        last_send_attempt_at: Option<DateTime<Utc>>,
        retry_count: i32,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(last_attempt) = last_send_attempt_at else {
            tracing::warn!(
                retry_count,
                "No send attempt recorded; treating next retry time as not reached"
            );
            return false;
        };
        now >= last_attempt + self.retry_offset(retry_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_common::types::{Channel, NotificationStatus};
    use uuid::Uuid;

    fn make_notification(
        requested_on: DateTime<Utc>,
        last_send_attempt_at: Option<DateTime<Utc>>,
        retry_count: i32,
    ) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            channel: Channel::Email,
            status: NotificationStatus::TemporaryFailure,
            template_id: Uuid::new_v4(),
            recipient: "someone@example.org".to_string(),
            merge_fields: serde_json::json!({}),
            reference_id: None,
            reference_type: None,
            correlation_id: None,
            provider_notification_id: None,
            provider_status: None,
            provider_status_updated_at: None,
            requested_on,
            last_send_attempt_at,
            retry_count,
            last_failed_at: None,
            failure_reason: None,
            sent_at: None,
        }
    }

    #[test]
    fn test_retry_offset_doubles_per_cycle() {
        let policy = RetryPolicy::new(10);
        assert_eq!(policy.retry_offset(0), Duration::seconds(10));
        assert_eq!(policy.retry_offset(1), Duration::seconds(10));
        assert_eq!(policy.retry_offset(2), Duration::seconds(20));
        assert_eq!(policy.retry_offset(3), Duration::seconds(40));
        assert_eq!(policy.retry_offset(4), Duration::seconds(80));
        assert_eq!(policy.retry_offset(8), Duration::seconds(1280));
    }

    #[test]
    fn test_retry_offset_negative_count_treated_as_zero() {
        let policy = RetryPolicy::new(10);
        assert_eq!(policy.retry_offset(-3), Duration::seconds(10));
    }

    #[test]
    fn test_next_retry_time_false_without_attempt() {
        let policy = RetryPolicy::new(10);
        // Regardless of retry_count, a null attempt time is never due.
        assert!(!policy.has_reached_next_retry_time(None, 0, Utc::now()));
        assert!(!policy.has_reached_next_retry_time(None, 50, Utc::now()));
    }

    #[test]
    fn test_next_retry_time_closed_boundary() {
        let policy = RetryPolicy::new(10);
        let now = Utc::now();
        let attempt = now - Duration::seconds(20);

        // retry_count 2 → offset 20s; exactly at the boundary counts.
        assert!(policy.has_reached_next_retry_time(Some(attempt), 2, now));
        // One second earlier is still waiting.
        assert!(!policy.has_reached_next_retry_time(
            Some(attempt),
            2,
            now - Duration::seconds(1)
        ));
    }

    #[test]
    fn test_max_retry_time_closed_boundary() {
        let policy = RetryPolicy::new(10);
        let requested_on = Utc::now() - Duration::hours(72);

        assert!(policy.has_reached_max_retry_time(requested_on, Utc::now()));
        assert!(policy.has_reached_max_retry_time(requested_on, requested_on + Duration::hours(72)));
        assert!(!policy.has_reached_max_retry_time(
            requested_on,
            requested_on + Duration::hours(72) - Duration::seconds(1)
        ));
    }

    #[test]
    fn test_evaluate_ceiling_wins_over_backoff() {
        let policy = RetryPolicy::new(10);
        let now = Utc::now();
        // Both past the ceiling and past the backoff window: ceiling wins.
        let n = make_notification(now - Duration::hours(73), Some(now - Duration::hours(1)), 1);
        assert_eq!(policy.evaluate(&n, now), RetryDecision::Abandon);
    }

    #[test]
    fn test_evaluate_due_and_not_due() {
        let policy = RetryPolicy::new(10);
        let now = Utc::now();

        let due = make_notification(now - Duration::hours(1), Some(now - Duration::seconds(30)), 1);
        assert_eq!(policy.evaluate(&due, now), RetryDecision::Due);

        let waiting =
            make_notification(now - Duration::hours(1), Some(now - Duration::seconds(5)), 3);
        assert_eq!(policy.evaluate(&waiting, now), RetryDecision::NotDue);
    }

    #[test]
    fn test_evaluate_never_attempted_is_not_due() {
        let policy = RetryPolicy::new(10);
        let now = Utc::now();
        let n = make_notification(now - Duration::hours(1), None, 4);
        assert_eq!(policy.evaluate(&n, now), RetryDecision::NotDue);
    }

    #[test]
    fn test_large_retry_count_does_not_overflow() {
        let policy = RetryPolicy::new(60);
        let offset = policy.retry_offset(i32::MAX);
        assert!(offset > Duration::zero());
    }
}
