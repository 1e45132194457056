//! Notification enqueue and inspection routes.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use courier_common::error::AppError;
use courier_common::types::Notification;
use courier_engine::service::{EnqueueParams, NotificationService};
use courier_engine::store::NotificationStore;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", post(enqueue_notification))
        .route("/api/notifications/{id}", get(get_notification))
}

/// POST /api/notifications — Enqueue a notification for dispatch.
///
/// Returns immediately with the stored `queued` row; the provider is only
/// contacted later by the dispatch engine.
async fn enqueue_notification(
    State(state): State<AppState>,
    Json(params): Json<EnqueueParams>,
) -> Result<Json<Notification>, AppError> {
    let notification = NotificationService::enqueue(&state.pool, &params).await?;
    Ok(Json(notification))
}

/// GET /api/notifications/:id — Inspect a notification's current state.
async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    let notification = NotificationStore::get(&state.pool, id).await?;
    Ok(Json(notification))
}
