//! Provider template passthrough.
//!
//! Lets operators verify a template id against the provider before enqueueing
//! notifications that reference it.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use courier_common::error::AppError;
use courier_gateway::{ProviderError, ProviderGateway, Template};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/templates/{id}", get(get_template))
}

/// GET /api/templates/:id — Fetch a template definition from the provider.
async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Template>, AppError> {
    let template = state.gateway.template(id).await.map_err(|e| match e {
        ProviderError::Api { status: 404, .. } => {
            AppError::NotFound(format!("Template {} not found", id))
        }
        other => AppError::Provider(other.to_string()),
    })?;

    Ok(Json(template))
}
