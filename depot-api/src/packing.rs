use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use depot_core::ShipmentPackage;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddPackageRequest {
    pub width: f64,
    pub height: f64,
    pub length: f64,
    #[serde(default)]
    pub wrapper_weight: f64,
}

#[derive(Debug, Deserialize)]
pub struct PutItemRequest {
    pub basket_item_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct RemoveItemParams {
    pub quantity: u32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/shipments/{id}/packages", post(add_package))
        .route("/v1/shipments/{id}/packages/{package_id}/items", post(put_item))
        .route(
            "/v1/shipments/{id}/packages/{package_id}/items/{basket_item_id}",
            delete(remove_item),
        )
}

/// POST /v1/shipments/{id}/packages
async fn add_package(
    State(state): State<AppState>,
    Path(shipment_id): Path<Uuid>,
    Json(req): Json<AddPackageRequest>,
) -> Result<(StatusCode, Json<ShipmentPackage>), AppError> {
    let package = state
        .services
        .packing
        .add_package(shipment_id, req.width, req.height, req.length, req.wrapper_weight)
        .await?;
    Ok((StatusCode::CREATED, Json(package)))
}

/// POST /v1/shipments/{id}/packages/{package_id}/items
async fn put_item(
    State(state): State<AppState>,
    Path((shipment_id, package_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<PutItemRequest>,
) -> Result<Json<ShipmentPackage>, AppError> {
    let package = state
        .services
        .packing
        .put_item(shipment_id, package_id, req.basket_item_id, req.quantity)
        .await?;
    Ok(Json(package))
}

/// DELETE /v1/shipments/{id}/packages/{package_id}/items/{basket_item_id}?quantity=N
async fn remove_item(
    State(state): State<AppState>,
    Path((shipment_id, package_id, basket_item_id)): Path<(Uuid, Uuid, Uuid)>,
    Query(params): Query<RemoveItemParams>,
) -> Result<Json<ShipmentPackage>, AppError> {
    let package = state
        .services
        .packing
        .remove_item(shipment_id, package_id, basket_item_id, params.quantity)
        .await?;
    Ok(Json(package))
}
