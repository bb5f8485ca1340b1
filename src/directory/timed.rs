use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;

use super::{
    DirectoryStore, GroupEntry, PersonEntry,
    error::{DirectoryError, DirectoryResult},
};

/// Decorator that bounds every directory call with a timeout.
///
/// A call that exceeds the limit fails with [`DirectoryError::Timeout`]; it
/// is not retried. The underlying operation may still complete on the store
/// side after the caller has given up.
pub struct TimedDirectory {
    inner: Arc<dyn DirectoryStore>,
    timeout: Duration,
}

impl TimedDirectory {
    pub fn new(inner: Arc<dyn DirectoryStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = DirectoryResult<T>>,
    ) -> DirectoryResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation = op, timeout = ?self.timeout, "Directory call timed out");
                Err(DirectoryError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl DirectoryStore for TimedDirectory {
    async fn get_person(&self, inum: &str) -> DirectoryResult<Option<PersonEntry>> {
        self.bounded("get_person", self.inner.get_person(inum)).await
    }

    async fn find_person(
        &self,
        attribute: &str,
        value: &str,
    ) -> DirectoryResult<Option<PersonEntry>> {
        self.bounded("find_person", self.inner.find_person(attribute, value))
            .await
    }

    async fn list_persons(&self, filter: Option<&str>) -> DirectoryResult<Vec<PersonEntry>> {
        self.bounded("list_persons", self.inner.list_persons(filter))
            .await
    }

    async fn insert_person(&self, entry: PersonEntry) -> DirectoryResult<()> {
        self.bounded("insert_person", self.inner.insert_person(entry))
            .await
    }

    async fn replace_person(&self, entry: PersonEntry) -> DirectoryResult<()> {
        self.bounded("replace_person", self.inner.replace_person(entry))
            .await
    }

    async fn delete_person(&self, inum: &str) -> DirectoryResult<()> {
        self.bounded("delete_person", self.inner.delete_person(inum))
            .await
    }

    async fn get_group(&self, dn: &str) -> DirectoryResult<Option<GroupEntry>> {
        self.bounded("get_group", self.inner.get_group(dn)).await
    }

    async fn insert_group(&self, group: GroupEntry) -> DirectoryResult<()> {
        self.bounded("insert_group", self.inner.insert_group(group))
            .await
    }

    async fn add_group_member(&self, group_dn: &str, member_dn: &str) -> DirectoryResult<bool> {
        self.bounded(
            "add_group_member",
            self.inner.add_group_member(group_dn, member_dn),
        )
        .await
    }

    async fn remove_group_member(
        &self,
        group_dn: &str,
        member_dn: &str,
    ) -> DirectoryResult<bool> {
        self.bounded(
            "remove_group_member",
            self.inner.remove_group_member(group_dn, member_dn),
        )
        .await
    }
}
