use axum::response::{IntoResponse, Response};

use crate::scim::ScimErrorResponse;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No usable `Authorization: Bearer` header
    #[error("Missing or invalid Authorization header. Expected: Bearer <token>")]
    MissingCredentials,

    /// A bearer token was presented but is not accepted (generic, prevents enumeration)
    #[error("Invalid SCIM bearer token")]
    InvalidCredentials,
}

impl From<AuthError> for ScimErrorResponse {
    fn from(e: AuthError) -> Self {
        ScimErrorResponse::unauthorized(e.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ScimErrorResponse::from(self).into_response()
    }
}
