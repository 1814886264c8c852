use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

pub const OPERATOR_ROLES: [&str; 2] = ["LOGISTICS", "ADMIN"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OperatorClaims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// Bearer JWT signed with the shared secret; only logistics staff and admins pass.
pub async fn operator_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<OperatorClaims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    if !OPERATOR_ROLES.contains(&token_data.claims.role.as_str()) {
        return Err(StatusCode::FORBIDDEN);
    }

    tracing::debug!(operator = %token_data.claims.sub, "operator authenticated");
    req.extensions_mut().insert(token_data.claims);

    Ok(next.run(req).await)
}
