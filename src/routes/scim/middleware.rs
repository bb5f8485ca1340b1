//! SCIM Authorization Middleware
//!
//! Runs the configured [`AuthorizationGate`](crate::auth::AuthorizationGate)
//! before any SCIM handler. Rejections are RFC 7644 error responses.

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::AppState;

/// SCIM authorization middleware.
pub async fn scim_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if let Err(e) = state.gate.authorize(authorization).await {
        return e.into_response();
    }

    next.run(request).await
}
