mod identifiers;
pub mod mapper;
mod membership;
mod provisioning;

use std::sync::Arc;

pub use identifiers::{IdentifierError, IdentifierGenerator, inum_from_dn};
pub use mapper::MappingError;
pub use membership::{MembershipSynchronizer, PartialSyncFailure, SyncError, SyncReport};
pub use provisioning::{
    ProvisioningError, ProvisioningResult, UserProvisioningService, user_location,
};

use crate::{config::DirectoryConfig, directory::DirectoryStore};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: UserProvisioningService,
}

impl Services {
    pub fn new(store: Arc<dyn DirectoryStore>, config: &DirectoryConfig) -> Self {
        let identifiers = IdentifierGenerator::new(store.clone(), config);
        let membership = MembershipSynchronizer::new(store.clone());
        Self {
            users: UserProvisioningService::new(store, identifiers, membership),
        }
    }
}
