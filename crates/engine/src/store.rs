//! Notification store — data access for the `notifications` table.
//!
//! The engines never cache rows across cycles: every mutation is a full
//! update-by-id, committed per notification, so last-writer-wins at the
//! storage layer is the only write semantics in play.

use sqlx::PgPool;
use uuid::Uuid;

use courier_common::error::AppError;
use courier_common::types::{Notification, NotificationStatus};

pub struct NotificationStore;

impl NotificationStore {
    /// Insert a freshly enqueued notification.
    pub async fn insert(pool: &PgPool, n: &Notification) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, channel, status, template_id, recipient, merge_fields,
                reference_id, reference_type, correlation_id,
                provider_notification_id, provider_status, provider_status_updated_at,
                requested_on, last_send_attempt_at, retry_count,
                last_failed_at, failure_reason, sent_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(n.id)
        .bind(n.channel.to_string())
        .bind(n.status.to_string())
        .bind(n.template_id)
        .bind(&n.recipient)
        .bind(&n.merge_fields)
        .bind(&n.reference_id)
        .bind(&n.reference_type)
        .bind(&n.correlation_id)
        .bind(&n.provider_notification_id)
        .bind(&n.provider_status)
        .bind(n.provider_status_updated_at)
        .bind(n.requested_on)
        .bind(n.last_send_attempt_at)
        .bind(n.retry_count)
        .bind(n.last_failed_at)
        .bind(&n.failure_reason)
        .bind(n.sent_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Persist the current state of a notification by id.
    pub async fn update(pool: &PgPool, n: &Notification) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE notifications SET
                status = $2,
                recipient = $3,
                provider_notification_id = $4,
                provider_status = $5,
                provider_status_updated_at = $6,
                last_send_attempt_at = $7,
                retry_count = $8,
                last_failed_at = $9,
                failure_reason = $10,
                sent_at = $11
            WHERE id = $1
            "#,
        )
        .bind(n.id)
        .bind(n.status.to_string())
        .bind(&n.recipient)
        .bind(&n.provider_notification_id)
        .bind(&n.provider_status)
        .bind(n.provider_status_updated_at)
        .bind(n.last_send_attempt_at)
        .bind(n.retry_count)
        .bind(n.last_failed_at)
        .bind(&n.failure_reason)
        .bind(n.sent_at)
        .execute(pool)
        .await?;

        tracing::debug!(
            notification_id = %n.id,
            status = %n.status,
            "Notification updated"
        );

        Ok(())
    }

    /// Get a single notification by id.
    pub async fn get(pool: &PgPool, id: Uuid) -> Result<Notification, AppError> {
        let n: Notification = sqlx::query_as("SELECT * FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))?;

        Ok(n)
    }

    /// Fetch up to `limit` notifications in one status, oldest request first.
    ///
    /// Ordering is strictly by `requested_on`; `last_send_attempt_at` plays
    /// no part in dispatch order.
    pub async fn find_by_status(
        pool: &PgPool,
        status: NotificationStatus,
        limit: i64,
    ) -> Result<Vec<Notification>, AppError> {
        let rows: Vec<Notification> = sqlx::query_as(
            r#"
            SELECT * FROM notifications
            WHERE status = $1
            ORDER BY requested_on ASC
            LIMIT $2
            "#,
        )
        .bind(status.to_string())
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Fetch up to `limit` notifications whose status is in `statuses`.
    /// No ordering is guaranteed.
    pub async fn find_by_statuses(
        pool: &PgPool,
        statuses: &[NotificationStatus],
        limit: i64,
    ) -> Result<Vec<Notification>, AppError> {
        let status_strings: Vec<String> = statuses.iter().map(ToString::to_string).collect();

        let rows: Vec<Notification> = sqlx::query_as(
            r#"
            SELECT * FROM notifications
            WHERE status = ANY($1)
            LIMIT $2
            "#,
        )
        .bind(&status_strings)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }
}
