//! SCIM 2.0 User Provisioning Service
//!
//! Orchestrates the User lifecycle on top of the directory: map the request,
//! assign identity on create, store the entry, synchronize group membership
//! and map the stored entry back for the response.

use std::{collections::BTreeSet, sync::Arc};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error};

use super::{
    identifiers::{IdentifierError, IdentifierGenerator, inum_from_dn},
    mapper::{self, MappingError},
    membership::{MembershipSynchronizer, SyncError},
};
use crate::{
    directory::{DirectoryError, DirectoryStore, PersonEntry},
    scim::{
        INTERNAL_ERROR_DETAIL, ScimErrorResponse, ScimListParams, ScimListResponse,
        ScimSearchRequest, ScimUser,
    },
};

/// SCIM provisioning error types
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("User '{0}' not found")]
    UserNotFound(String),

    #[error("No user with {attribute} '{value}'")]
    NoMatch { attribute: String, value: String },

    #[error("User with userName '{0}' already exists")]
    DuplicateUserName(String),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Identifier(IdentifierError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("PATCH is not supported for Users")]
    NotImplemented,
}

impl From<IdentifierError> for ProvisioningError {
    fn from(e: IdentifierError) -> Self {
        match e {
            IdentifierError::AliasConflict(username) => {
                ProvisioningError::DuplicateUserName(username)
            }
            IdentifierError::Directory(e) => ProvisioningError::Directory(e),
            other => ProvisioningError::Identifier(other),
        }
    }
}

impl From<ProvisioningError> for ScimErrorResponse {
    fn from(e: ProvisioningError) -> Self {
        match e {
            ProvisioningError::UserNotFound(_) | ProvisioningError::NoMatch { .. } => {
                ScimErrorResponse::not_found(e.to_string())
            }
            ProvisioningError::DuplicateUserName(_) => ScimErrorResponse::uniqueness(e.to_string()),
            ProvisioningError::Mapping(e) => ScimErrorResponse::invalid_value(e.to_string()),
            ProvisioningError::Sync(SyncError::UnknownGroup(id)) => {
                ScimErrorResponse::invalid_value(format!("Group '{}' does not exist", id))
            }
            ProvisioningError::Sync(SyncError::Partial(failure)) => {
                let id = inum_from_dn(&failure.member).unwrap_or(failure.member.as_str());
                error!(
                    %id,
                    member = %failure.member,
                    error = %failure,
                    "Group membership left partially synchronized"
                );
                ScimErrorResponse::internal(format!(
                    "{}; user '{}', groups updated: [{}], groups pending: [{}]",
                    INTERNAL_ERROR_DETAIL,
                    id,
                    failure.applied.join(", "),
                    failure.pending.join(", ")
                ))
            }
            ProvisioningError::Directory(DirectoryError::NotFound) => {
                ScimErrorResponse::not_found("User not found")
            }
            ProvisioningError::Directory(DirectoryError::Conflict(msg)) => {
                ScimErrorResponse::uniqueness(msg)
            }
            ProvisioningError::NotImplemented => ScimErrorResponse::not_implemented(e.to_string()),
            other => {
                error!(error = %other, "SCIM provisioning failed");
                ScimErrorResponse::internal(INTERNAL_ERROR_DETAIL)
            }
        }
    }
}

/// Result type for SCIM provisioning operations
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

/// Location of a User resource under `base_url`.
pub fn user_location(base_url: &str, id: &str) -> String {
    format!("{}/scim/v2/Users/{}", base_url.trim_end_matches('/'), id)
}

/// SCIM User Provisioning Service
///
/// Every handle is injected at construction; the service holds no state of
/// its own between requests.
#[derive(Clone)]
pub struct UserProvisioningService {
    store: Arc<dyn DirectoryStore>,
    identifiers: IdentifierGenerator,
    membership: MembershipSynchronizer,
}

impl UserProvisioningService {
    pub fn new(
        store: Arc<dyn DirectoryStore>,
        identifiers: IdentifierGenerator,
        membership: MembershipSynchronizer,
    ) -> Self {
        Self {
            store,
            identifiers,
            membership,
        }
    }

    /// List every user.
    ///
    /// The filter is handed to the store untouched; sorting is not applied.
    pub async fn list_users(
        &self,
        params: &ScimListParams,
        base_url: &str,
    ) -> ProvisioningResult<ScimListResponse<ScimUser>> {
        let entries = self.store.list_persons(params.filter.as_deref()).await?;

        let mut users = Vec::with_capacity(entries.len());
        for entry in &entries {
            users.push(self.render(entry, base_url).await?);
        }

        Ok(ScimListResponse::new(users))
    }

    /// Get a user by id (inum).
    pub async fn get_user(&self, id: &str, base_url: &str) -> ProvisioningResult<ScimUser> {
        let entry = self.fetch(id).await?;
        self.render(&entry, base_url).await
    }

    /// Create a new user.
    pub async fn create_user(
        &self,
        resource: &ScimUser,
        base_url: &str,
    ) -> ProvisioningResult<ScimUser> {
        let mut entry = mapper::to_directory_entry(resource, None)?;
        let desired = self.desired_groups(resource);

        if self.store.find_person("uid", &entry.uid).await?.is_some() {
            return Err(ProvisioningError::DuplicateUserName(entry.uid));
        }

        // Unknown groups are rejected before anything is written.
        if let Some(groups) = &desired {
            let group_dns: Vec<String> = groups.iter().cloned().collect();
            self.membership.ensure_groups_exist(&group_dns).await?;
        }

        let inum = self.identifiers.new_inum().await?;
        tracing::Span::current().record("id", inum.as_str());
        entry.iname = self.identifiers.new_alias(&entry.uid).await?;
        entry.dn = self.identifiers.distinguished_name_for(&inum);
        entry.inum = inum;

        let now = Utc::now();
        entry.created = Some(now);
        entry.last_modified = Some(now);

        self.store.insert_person(entry.clone()).await?;

        if let Some(groups) = desired.filter(|g| !g.is_empty()) {
            self.membership.reconcile(&mut entry, &groups).await?;
        }

        debug!(
            inum = %entry.inum,
            user_name = %entry.uid,
            groups = entry.member_of.len(),
            "SCIM user created"
        );

        self.render(&entry, base_url).await
    }

    /// Update a user (merge via PUT).
    ///
    /// Attributes absent from `resource` keep their stored values. When
    /// `resource` carries `groups`, that list becomes the full membership.
    pub async fn replace_user(
        &self,
        id: &str,
        resource: &ScimUser,
        base_url: &str,
    ) -> ProvisioningResult<ScimUser> {
        let existing = self.fetch(id).await?;
        let mut merged = mapper::to_directory_entry(resource, Some(&existing))?;

        if !merged.uid.eq_ignore_ascii_case(&existing.uid)
            && let Some(holder) = self.store.find_person("uid", &merged.uid).await?
            && holder.inum != existing.inum
        {
            return Err(ProvisioningError::DuplicateUserName(merged.uid));
        }

        merged.last_modified = Some(Utc::now());

        match self.desired_groups(resource) {
            Some(groups) if groups != existing.member_of => {
                self.membership.reconcile(&mut merged, &groups).await?;
            }
            _ => self.store.replace_person(merged.clone()).await?,
        }

        debug!(inum = %merged.inum, user_name = %merged.uid, "SCIM user updated");

        self.render(&merged, base_url).await
    }

    /// Delete a user, removing it from every group first.
    ///
    /// If any group cannot be updated the entry is left in place.
    pub async fn delete_user(&self, id: &str) -> ProvisioningResult<()> {
        let existing = self.fetch(id).await?;

        if !existing.member_of.is_empty() {
            self.membership.remove_from_all_groups(&existing).await?;
        }

        self.store.delete_person(&existing.inum).await?;

        debug!(inum = %existing.inum, user_name = %existing.uid, "SCIM user deleted");
        Ok(())
    }

    /// Find the first user whose attribute matches the requested value.
    pub async fn search_users(
        &self,
        request: &ScimSearchRequest,
        base_url: &str,
    ) -> ProvisioningResult<ScimUser> {
        let attribute = mapper::directory_attribute_for(&request.attribute);

        let entry = self
            .store
            .find_person(attribute, &request.value)
            .await?
            .ok_or_else(|| ProvisioningError::NoMatch {
                attribute: request.attribute.clone(),
                value: request.value.clone(),
            })?;

        self.render(&entry, base_url).await
    }

    /// Partial modification is not supported.
    pub async fn patch_user(&self, _id: &str) -> ProvisioningResult<ScimUser> {
        Err(ProvisioningError::NotImplemented)
    }

    async fn fetch(&self, id: &str) -> ProvisioningResult<PersonEntry> {
        self.store
            .get_person(id)
            .await?
            .ok_or_else(|| ProvisioningError::UserNotFound(id.to_string()))
    }

    fn desired_groups(&self, resource: &ScimUser) -> Option<BTreeSet<String>> {
        resource.group_ids().map(|ids| {
            ids.into_iter()
                .map(|id| self.identifiers.group_dn_for(id))
                .collect()
        })
    }

    /// Map an entry to its resource with group labels and location filled in.
    async fn render(&self, entry: &PersonEntry, base_url: &str) -> ProvisioningResult<ScimUser> {
        let mut user = mapper::to_resource(entry);

        // `to_resource` emits one reference per memberOf value, in order.
        if let Some(groups) = user.groups.as_mut() {
            for (group_ref, dn) in groups.iter_mut().zip(&entry.member_of) {
                group_ref.display = self
                    .store
                    .get_group(dn)
                    .await?
                    .and_then(|group| group.display_name);
            }
        }

        let location = user_location(base_url, &entry.inum);
        user.meta = user.meta.map(|meta| meta.with_location(location));

        Ok(user)
    }
}
