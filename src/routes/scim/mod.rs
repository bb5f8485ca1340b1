//! SCIM 2.0 Protocol Routes
//!
//! The User resource of RFC 7644, served under `/scim/v2/`:
//!
//! - `GET/POST /scim/v2/Users` - List/create users
//! - `GET/PUT/PATCH/DELETE /scim/v2/Users/{id}` - User operations
//! - `POST /scim/v2/Users/Search` - Single-attribute lookup

pub mod middleware;
pub mod users;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

/// Build the SCIM routes.
///
/// Returns a router configured for `/scim/v2/` endpoints with the
/// authorization middleware applied.
pub fn scim_routes(state: AppState) -> Router<AppState> {
    Router::new().nest("/v2", scim_v2_routes(state))
}

fn scim_v2_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/Users", get(users::list_users).post(users::create_user))
        .route("/Users/Search", post(users::search_users))
        .route(
            "/Users/{id}",
            get(users::get_user)
                .put(users::replace_user)
                .patch(users::patch_user)
                .delete(users::delete_user),
        )
        // Authorization runs before every SCIM handler
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::scim_auth_middleware,
        ))
}
