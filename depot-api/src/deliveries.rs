use axum::{
    extract::{Path, Query, State},
    routing::post,
    Json, Router,
};
use depot_core::Delivery;
use depot_logistics::{DispatchOutcome, SyncReport};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SyncParams {
    pub limit: Option<i64>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/deliveries/{id}/dispatch", post(dispatch))
        .route("/v1/deliveries/{id}/cancel", post(cancel_delivery))
        .route("/v1/deliveries/status-sync", post(status_sync))
}

/// POST /v1/deliveries/{id}/dispatch
///
/// A provider rejection is still `200`; `success` and the delivery's
/// `error_text` carry the outcome.
async fn dispatch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DispatchOutcome>, AppError> {
    Ok(Json(state.services.reconciler.dispatch(id).await?))
}

/// POST /v1/deliveries/{id}/cancel
async fn cancel_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, AppError> {
    Ok(Json(state.services.deliveries.cancel_delivery(id).await?))
}

/// POST /v1/deliveries/status-sync
async fn status_sync(
    State(state): State<AppState>,
    Query(params): Query<SyncParams>,
) -> Result<Json<SyncReport>, AppError> {
    let limit = params.limit.unwrap_or(state.batch_limit);
    if limit <= 0 {
        return Err(AppError::ValidationError("limit must be positive".to_string()));
    }
    Ok(Json(state.services.status_sync.sync(limit).await?))
}
