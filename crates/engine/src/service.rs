//! Enqueue service — the caller-facing entry point into the queue.
//!
//! Inserts a `queued` row and returns immediately; the provider is never
//! contacted here. Everything after the insert belongs to the engines.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use courier_common::error::AppError;
use courier_common::types::{Channel, Notification, NotificationStatus};

use crate::store::NotificationStore;

pub struct NotificationService;

/// Parameters for enqueueing a notification.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct EnqueueParams {
    pub channel: Channel,
    pub template_id: Uuid,
    pub recipient: String,
    pub merge_fields: Option<serde_json::Value>,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub correlation_id: Option<String>,
}

impl NotificationService {
    /// Enqueue a notification for dispatch.
    pub async fn enqueue(pool: &PgPool, params: &EnqueueParams) -> Result<Notification, AppError> {
        if params.recipient.trim().is_empty() {
            return Err(AppError::Validation("recipient must not be empty".to_string()));
        }

        let notification = Notification {
            id: Uuid::new_v4(),
            channel: params.channel,
            status: NotificationStatus::Queued,
            template_id: params.template_id,
            recipient: params.recipient.clone(),
            merge_fields: params
                .merge_fields
                .clone()
                .unwrap_or(serde_json::json!({})),
            reference_id: params.reference_id.clone(),
            reference_type: params.reference_type.clone(),
            correlation_id: params.correlation_id.clone(),
            provider_notification_id: None,
            provider_status: None,
            provider_status_updated_at: None,
            requested_on: Utc::now(),
            last_send_attempt_at: None,
            retry_count: 0,
            last_failed_at: None,
            failure_reason: None,
            sent_at: None,
        };

        NotificationStore::insert(pool, &notification).await?;

        tracing::info!(
            notification_id = %notification.id,
            channel = %notification.channel,
            template_id = %notification.template_id,
            correlation_id = notification.correlation_id.as_deref().unwrap_or(""),
            "Notification enqueued"
        );

        Ok(notification)
    }
}
