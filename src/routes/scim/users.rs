//! SCIM 2.0 User Resource Endpoints
//!
//! - POST /Users: Create user
//! - GET /Users: List users
//! - GET /Users/{id}: Get user by ID
//! - PUT /Users/{id}: Update user (merge)
//! - PATCH /Users/{id}: Not implemented (501)
//! - DELETE /Users/{id}: Delete user
//! - POST /Users/Search: Find one user by attribute value

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderValue, Request, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use validator::Validate;

use crate::{
    AppState,
    scim::{ScimErrorResponse, ScimListParams, ScimSearchRequest, ScimUser},
};

// =============================================================================
// Custom Response Type for SCIM Content-Type
// =============================================================================

/// SCIM JSON response with correct Content-Type, status code and an optional
/// `Location` header.
pub struct ScimJsonWithStatus<T> {
    body: T,
    status: StatusCode,
    location: Option<String>,
}

impl<T: Serialize> ScimJsonWithStatus<T> {
    pub fn ok(body: T) -> Self {
        Self {
            body,
            status: StatusCode::OK,
            location: None,
        }
    }

    pub fn created(body: T) -> Self {
        Self {
            body,
            status: StatusCode::CREATED,
            location: None,
        }
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }
}

impl<T: Serialize> IntoResponse for ScimJsonWithStatus<T> {
    fn into_response(self) -> Response {
        let body = match serde_json::to_vec(&self.body) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Failed to serialize SCIM response: {}", e);
                return ScimErrorResponse::internal("Failed to serialize response")
                    .into_response();
            }
        };

        let mut response = (
            self.status,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/scim+json"),
            )],
            body,
        )
            .into_response();

        if let Some(location) = self.location
            && let Ok(value) = HeaderValue::from_str(&location)
        {
            response.headers_mut().insert(header::LOCATION, value);
        }

        response
    }
}

/// Respond with a user resource, copying `meta.location` into the header.
fn user_response(user: ScimUser, status: StatusCode) -> Response {
    let location = user.meta.as_ref().and_then(|m| m.location.clone());
    let response = if status == StatusCode::CREATED {
        ScimJsonWithStatus::created(user)
    } else {
        ScimJsonWithStatus::ok(user)
    };
    response.with_location(location).into_response()
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Extract the external base URL (`scheme://host`) from the request.
fn get_base_url(request: &Request<Body>) -> String {
    let scheme = request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("https");

    let host = request
        .headers()
        .get("x-forwarded-host")
        .or_else(|| request.headers().get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    format!("{}://{}", scheme, host)
}

/// Read and parse a JSON request body.
async fn parse_body<T: DeserializeOwned>(
    request: Request<Body>,
    limit: usize,
) -> Result<T, ScimErrorResponse> {
    let bytes = axum::body::to_bytes(request.into_body(), limit)
        .await
        .map_err(|e| {
            ScimErrorResponse::invalid_syntax(format!("Failed to read request body: {}", e))
        })?;

    serde_json::from_slice(&bytes)
        .map_err(|e| ScimErrorResponse::invalid_syntax(format!("Invalid JSON: {}", e)))
}

// =============================================================================
// User Endpoints
// =============================================================================

/// List all users.
///
/// `GET /scim/v2/Users`
///
/// `filter`, `sortBy` and `sortOrder` are accepted but not applied.
#[tracing::instrument(name = "scim.users.list", skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<ScimListParams>,
    request: Request<Body>,
) -> Response {
    let base_url = get_base_url(&request);

    match state.services.users.list_users(&params, &base_url).await {
        Ok(response) => ScimJsonWithStatus::ok(response).into_response(),
        Err(e) => ScimErrorResponse::from(e).into_response(),
    }
}

/// Create a new user.
///
/// `POST /scim/v2/Users`
///
/// Returns 201 Created with the stored resource and its `Location`.
#[tracing::instrument(name = "scim.users.create", skip_all, fields(id = tracing::field::Empty))]
pub async fn create_user(State(state): State<AppState>, request: Request<Body>) -> Response {
    let base_url = get_base_url(&request);
    let scim_user: ScimUser =
        match parse_body(request, state.config.server.body_limit_bytes).await {
            Ok(u) => u,
            Err(e) => return e.into_response(),
        };

    match state.services.users.create_user(&scim_user, &base_url).await {
        Ok(created) => user_response(created, StatusCode::CREATED),
        Err(e) => ScimErrorResponse::from(e).into_response(),
    }
}

/// Get a user by ID.
///
/// `GET /scim/v2/Users/{id}`
#[tracing::instrument(name = "scim.users.get", skip_all, fields(%id))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Request<Body>,
) -> Response {
    let base_url = get_base_url(&request);

    match state.services.users.get_user(&id, &base_url).await {
        Ok(user) => user_response(user, StatusCode::OK),
        Err(e) => ScimErrorResponse::from(e).into_response(),
    }
}

/// Update a user.
///
/// `PUT /scim/v2/Users/{id}`
///
/// Attributes missing from the body keep their stored values; `groups`, when
/// present, replaces the user's group membership.
#[tracing::instrument(name = "scim.users.replace", skip_all, fields(%id))]
pub async fn replace_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Request<Body>,
) -> Response {
    let base_url = get_base_url(&request);
    let scim_user: ScimUser =
        match parse_body(request, state.config.server.body_limit_bytes).await {
            Ok(u) => u,
            Err(e) => return e.into_response(),
        };

    match state
        .services
        .users
        .replace_user(&id, &scim_user, &base_url)
        .await
    {
        Ok(updated) => user_response(updated, StatusCode::OK),
        Err(e) => ScimErrorResponse::from(e).into_response(),
    }
}

/// Partially update a user.
///
/// `PATCH /scim/v2/Users/{id}`
#[tracing::instrument(name = "scim.users.patch", skip_all, fields(%id))]
pub async fn patch_user(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.services.users.patch_user(&id).await {
        Ok(user) => user_response(user, StatusCode::OK),
        Err(e) => ScimErrorResponse::from(e).into_response(),
    }
}

/// Delete a user.
///
/// `DELETE /scim/v2/Users/{id}`
///
/// Returns 200 OK with no body once the user has left every group and the
/// entry is gone.
#[tracing::instrument(name = "scim.users.delete", skip_all, fields(%id))]
pub async fn delete_user(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.services.users.delete_user(&id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => ScimErrorResponse::from(e).into_response(),
    }
}

/// Find a single user by attribute value.
///
/// `POST /scim/v2/Users/Search` with `{"attribute": "...", "value": "..."}`
#[tracing::instrument(
    name = "scim.users.search",
    skip_all,
    fields(attribute = tracing::field::Empty)
)]
pub async fn search_users(State(state): State<AppState>, request: Request<Body>) -> Response {
    let base_url = get_base_url(&request);
    let search: ScimSearchRequest =
        match parse_body(request, state.config.server.body_limit_bytes).await {
            Ok(s) => s,
            Err(e) => return e.into_response(),
        };

    if let Err(e) = search.validate() {
        return ScimErrorResponse::invalid_value(format!("Invalid search request: {}", e))
            .into_response();
    }

    tracing::Span::current().record("attribute", search.attribute.as_str());

    match state.services.users.search_users(&search, &base_url).await {
        Ok(user) => user_response(user, StatusCode::OK),
        Err(e) => ScimErrorResponse::from(e).into_response(),
    }
}
