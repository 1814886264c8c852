use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod cargo;
pub mod deliveries;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod packing;
pub mod state;

pub use state::{AppState, AuthConfig, Services};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::USER_AGENT]);

    let operator = Router::new()
        .merge(cargo::routes())
        .merge(deliveries::routes())
        .merge(packing::routes())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::operator_auth_middleware,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .merge(operator)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn render_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => {
            let content_type = [(header::CONTENT_TYPE, "text/plain; version=0.0.4")];
            (StatusCode::OK, content_type, body).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to render metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
