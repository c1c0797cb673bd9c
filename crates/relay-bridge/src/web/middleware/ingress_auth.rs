use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::config::ingress_token::constant_time_eq;
use crate::web::AppState;

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}

/// Host ingress auth middleware. Validates the bearer token with
/// constant-time comparison.
pub async fn ingress_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(auth_header) = auth_header else {
        return Err(unauthorized("Missing Authorization header"));
    };

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return Err(unauthorized("Invalid Authorization header"));
    };

    if token.is_empty() || !constant_time_eq(token.trim(), &state.ingress_token) {
        return Err(unauthorized("Invalid token"));
    }

    Ok(next.run(req).await)
}
