use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post, put},
    Json, Router,
};
use depot_core::{Cargo, ProviderId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Either `{"provider_id": "CDEK"}` to attach to that provider's open cargo,
/// or `{"cargo_id": <id | null>}` to move to a given cargo or detach.
#[derive(Debug, Deserialize)]
pub struct AssignCargoRequest {
    pub provider_id: Option<ProviderId>,
    #[serde(default, deserialize_with = "explicit_option")]
    pub cargo_id: Option<Option<Uuid>>,
}

/// Tells `"cargo_id": null` apart from a missing field.
fn explicit_option<'de, D>(deserializer: D) -> Result<Option<Option<Uuid>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<Uuid>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssignmentResponse {
    pub shipment_id: Uuid,
    pub cargo_id: Option<Uuid>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/cargo/{id}/cancel", post(cancel_cargo))
        .route("/v1/cargo/{id}/courier-call", post(create_courier_call).delete(cancel_courier_call))
        .route("/v1/cargo/{id}/recalculate", post(recalculate))
        .route("/v1/shipments/{id}/cargo", put(assign_cargo))
        .route("/v1/shipments/{id}", delete(delete_shipment))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/cargo/{id}/cancel
async fn cancel_cargo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Cargo>, AppError> {
    Ok(Json(state.services.lifecycle.cancel_cargo(id).await?))
}

/// POST /v1/cargo/{id}/courier-call
async fn create_courier_call(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Cargo>, AppError> {
    Ok(Json(state.services.scheduler.create_courier_call(id).await?))
}

/// DELETE /v1/cargo/{id}/courier-call
async fn cancel_courier_call(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Cargo>, AppError> {
    Ok(Json(state.services.scheduler.cancel_courier_call(id).await?))
}

/// POST /v1/cargo/{id}/recalculate
async fn recalculate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Cargo>, AppError> {
    Ok(Json(state.services.lifecycle.recalculate(id).await?))
}

/// PUT /v1/shipments/{id}/cargo
async fn assign_cargo(
    State(state): State<AppState>,
    Path(shipment_id): Path<Uuid>,
    Json(req): Json<AssignCargoRequest>,
) -> Result<Json<AssignmentResponse>, AppError> {
    let lifecycle = &state.services.lifecycle;
    let cargo_id = match (req.provider_id, req.cargo_id) {
        (Some(provider), None) => Some(lifecycle.attach_to_cargo(shipment_id, provider).await?.id),
        (None, Some(target)) => lifecycle.reassign_shipment(shipment_id, target).await?.cargo_id,
        _ => {
            return Err(AppError::ValidationError(
                "exactly one of provider_id or cargo_id is required".to_string(),
            ))
        }
    };

    Ok(Json(AssignmentResponse { shipment_id, cargo_id }))
}

/// DELETE /v1/shipments/{id}
async fn delete_shipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.services.lifecycle.delete_shipment(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
