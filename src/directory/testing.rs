//! Store doubles for tests.

use std::{
    collections::BTreeSet,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;

use super::{
    DirectoryError, DirectoryResult, DirectoryStore, GroupEntry, MemoryDirectory, PersonEntry,
};

/// A [`MemoryDirectory`] whose group and person writes can be made to fail.
///
/// Every member-list write attempt is recorded (group DN, in call order),
/// including the ones that fail.
#[derive(Default)]
pub struct FlakyDirectory {
    pub inner: MemoryDirectory,
    failing_groups: Mutex<BTreeSet<String>>,
    fail_replace: AtomicBool,
    group_writes: Mutex<Vec<String>>,
}

impl FlakyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_group(&self, group_dn: &str) {
        self.failing_groups
            .lock()
            .unwrap()
            .insert(group_dn.to_string());
    }

    pub fn heal_group(&self, group_dn: &str) {
        self.failing_groups.lock().unwrap().remove(group_dn);
    }

    pub fn fail_replace(&self, fail: bool) {
        self.fail_replace.store(fail, Ordering::SeqCst);
    }

    pub fn group_writes(&self) -> Vec<String> {
        self.group_writes.lock().unwrap().clone()
    }

    fn record(&self, group_dn: &str) -> DirectoryResult<()> {
        self.group_writes.lock().unwrap().push(group_dn.to_string());
        if self.failing_groups.lock().unwrap().contains(group_dn) {
            return Err(DirectoryError::Unavailable(format!(
                "write to {} refused",
                group_dn
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for FlakyDirectory {
    async fn get_person(&self, inum: &str) -> DirectoryResult<Option<PersonEntry>> {
        self.inner.get_person(inum).await
    }

    async fn find_person(
        &self,
        attribute: &str,
        value: &str,
    ) -> DirectoryResult<Option<PersonEntry>> {
        self.inner.find_person(attribute, value).await
    }

    async fn list_persons(&self, filter: Option<&str>) -> DirectoryResult<Vec<PersonEntry>> {
        self.inner.list_persons(filter).await
    }

    async fn insert_person(&self, entry: PersonEntry) -> DirectoryResult<()> {
        self.inner.insert_person(entry).await
    }

    async fn replace_person(&self, entry: PersonEntry) -> DirectoryResult<()> {
        if self.fail_replace.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("replace refused".to_string()));
        }
        self.inner.replace_person(entry).await
    }

    async fn delete_person(&self, inum: &str) -> DirectoryResult<()> {
        self.inner.delete_person(inum).await
    }

    async fn get_group(&self, dn: &str) -> DirectoryResult<Option<GroupEntry>> {
        self.inner.get_group(dn).await
    }

    async fn insert_group(&self, group: GroupEntry) -> DirectoryResult<()> {
        self.inner.insert_group(group).await
    }

    async fn add_group_member(&self, group_dn: &str, member_dn: &str) -> DirectoryResult<bool> {
        self.record(group_dn)?;
        self.inner.add_group_member(group_dn, member_dn).await
    }

    async fn remove_group_member(
        &self,
        group_dn: &str,
        member_dn: &str,
    ) -> DirectoryResult<bool> {
        self.record(group_dn)?;
        self.inner.remove_group_member(group_dn, member_dn).await
    }
}
