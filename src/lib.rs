//! SCIM 2.0 User endpoint over a hierarchical directory store.
//!
//! Users are stored as person entries addressed by distinguished names; a
//! user's group memberships are mirrored in each group's member list and kept
//! consistent by [`services::MembershipSynchronizer`].

pub mod auth;
pub mod config;
pub mod directory;
pub mod observability;
pub mod routes;
pub mod scim;
pub mod services;

#[cfg(test)]
mod tests;

use std::{collections::BTreeSet, sync::Arc};

use axum::{Router, http::StatusCode};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    auth::{AuthorizationGate, BearerTokenGate},
    config::ServiceConfig,
    directory::{
        DirectoryError, DirectoryResult, DirectoryStore, GroupEntry, MemoryDirectory,
        TimedDirectory,
    },
    services::{IdentifierGenerator, Services},
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub services: Services,
    pub gate: Arc<dyn AuthorizationGate>,
}

impl AppState {
    /// Wire the services and the authorization gate over `store`.
    pub fn new(config: ServiceConfig, store: Arc<dyn DirectoryStore>) -> Self {
        let services = Services::new(store, &config.directory);
        let gate = Arc::new(BearerTokenGate::from_config(&config.auth));
        Self {
            config: Arc::new(config),
            services,
            gate,
        }
    }
}

/// Build the in-memory directory with the configured groups, behind the
/// per-call timeout.
pub async fn build_directory(config: &ServiceConfig) -> DirectoryResult<Arc<dyn DirectoryStore>> {
    let memory: Arc<dyn DirectoryStore> = Arc::new(MemoryDirectory::new());
    let identifiers = IdentifierGenerator::new(memory.clone(), &config.directory);

    for group in &config.directory.groups {
        let dn = identifiers.group_dn_for(&group.id);
        match memory
            .insert_group(GroupEntry {
                dn: dn.clone(),
                inum: group.id.clone(),
                display_name: group.display_name.clone(),
                members: BTreeSet::new(),
            })
            .await
        {
            Ok(()) => tracing::debug!(group = %group.id, %dn, "Seeded directory group"),
            Err(DirectoryError::Conflict(_)) => {
                tracing::warn!(group = %group.id, "Directory group already present, not seeded")
            }
            Err(e) => return Err(e),
        }
    }

    Ok(Arc::new(TimedDirectory::new(
        memory,
        config.directory.operation_timeout(),
    )))
}

/// Build the HTTP application.
pub fn build_app(config: &ServiceConfig, state: AppState) -> Router {
    Router::new()
        .nest("/scim", routes::scim_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.server.timeout(),
        ))
        .with_state(state)
}
