//! Directory entry store.
//!
//! The store is an attribute directory addressed by distinguished names, in
//! the shape of an LDAP tree: people under `ou=people`, groups under
//! `ou=groups`. It offers single-entry operations only; there is no way to
//! write several entries atomically, which is why group membership is
//! maintained by [`crate::services::MembershipSynchronizer`].

mod entry;
mod error;
mod memory;
#[cfg(test)]
pub(crate) mod testing;
mod timed;

use async_trait::async_trait;
pub use entry::*;
pub use error::{DirectoryError, DirectoryResult};
pub use memory::MemoryDirectory;
pub use timed::TimedDirectory;

/// Contract of the backing directory.
///
/// Lookups return `Ok(None)` for missing entries; writes report a missing
/// target as [`DirectoryError::NotFound`] and a uniqueness violation as
/// [`DirectoryError::Conflict`].
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Get a person by inum.
    async fn get_person(&self, inum: &str) -> DirectoryResult<Option<PersonEntry>>;

    /// Find the first person (in inum order) having `attribute = value`.
    async fn find_person(&self, attribute: &str, value: &str)
    -> DirectoryResult<Option<PersonEntry>>;

    /// List persons, ordered by inum.
    ///
    /// Backends may ignore `filter`; this one is only ever passed through.
    async fn list_persons(&self, filter: Option<&str>) -> DirectoryResult<Vec<PersonEntry>>;

    /// Insert a new person.
    ///
    /// # Errors
    /// Returns [`DirectoryError::Conflict`] if the inum, iname or uid is taken.
    async fn insert_person(&self, entry: PersonEntry) -> DirectoryResult<()>;

    /// Replace an existing person, keyed by inum.
    async fn replace_person(&self, entry: PersonEntry) -> DirectoryResult<()>;

    /// Delete a person by inum.
    async fn delete_person(&self, inum: &str) -> DirectoryResult<()>;

    /// Get a group by distinguished name.
    async fn get_group(&self, dn: &str) -> DirectoryResult<Option<GroupEntry>>;

    /// Insert a new group.
    async fn insert_group(&self, group: GroupEntry) -> DirectoryResult<()>;

    /// Add one value to a group's member list.
    ///
    /// Returns `false` if the member was already present.
    async fn add_group_member(&self, group_dn: &str, member_dn: &str) -> DirectoryResult<bool>;

    /// Remove one value from a group's member list.
    ///
    /// Returns `false` if the member was not present.
    async fn remove_group_member(&self, group_dn: &str, member_dn: &str)
    -> DirectoryResult<bool>;
}
