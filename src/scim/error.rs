//! SCIM 2.0 Error Types
//!
//! This module defines SCIM-specific error responses per RFC 7644 Section 3.12.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::types::SCHEMA_ERROR;

/// Detail sent to clients for every internal error; the cause is only logged.
pub const INTERNAL_ERROR_DETAIL: &str =
    "Unexpected processing error, please check the input parameters";

/// SCIM error response per RFC 7644.
///
/// All SCIM errors are returned in this format with appropriate HTTP status codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimErrorResponse {
    /// SCIM schema URIs (always contains the Error schema)
    pub schemas: Vec<String>,

    /// HTTP status code as a string (e.g., "400", "404")
    pub status: String,

    /// SCIM-specific error type (optional, per RFC 7644)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scim_type: Option<ScimErrorType>,

    /// Human-readable error detail
    pub detail: String,
}

impl ScimErrorResponse {
    fn new(
        status: StatusCode,
        scim_type: Option<ScimErrorType>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            schemas: vec![SCHEMA_ERROR.to_string()],
            status: status.as_u16().to_string(),
            scim_type,
            detail: detail.into(),
        }
    }

    /// Invalid JSON syntax error (400)
    pub fn invalid_syntax(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            Some(ScimErrorType::InvalidSyntax),
            detail,
        )
    }

    /// Invalid attribute value (400)
    pub fn invalid_value(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            Some(ScimErrorType::InvalidValue),
            detail,
        )
    }

    /// Authentication required (401)
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, None, detail)
    }

    /// Resource not found (404)
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, None, detail)
    }

    /// Uniqueness constraint violation (409)
    pub fn uniqueness(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            Some(ScimErrorType::Uniqueness),
            detail,
        )
    }

    /// Internal server error (500)
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, None, detail)
    }

    /// Operation not implemented (501)
    pub fn not_implemented(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_IMPLEMENTED, None, detail)
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status.parse().unwrap_or(500))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ScimErrorResponse {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

/// SCIM error types per RFC 7644 Section 3.12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScimErrorType {
    /// Request body has invalid JSON syntax
    InvalidSyntax,

    /// Uniqueness constraint violated (e.g., duplicate userName)
    Uniqueness,

    /// Attribute value is invalid or a required attribute is missing
    InvalidValue,
}

impl std::fmt::Display for ScimErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScimErrorType::InvalidSyntax => write!(f, "invalidSyntax"),
            ScimErrorType::Uniqueness => write!(f, "uniqueness"),
            ScimErrorType::InvalidValue => write!(f, "invalidValue"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
