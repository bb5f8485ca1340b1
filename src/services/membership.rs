//! Group membership synchronization.
//!
//! A person's `memberOf` values and each group's member list describe the same
//! relation from both ends. The directory cannot write both ends atomically,
//! so the synchronizer writes them one entry at a time in a fixed order:
//! groups first, lexicographically by group identifier, and the person entry
//! last. A failure stops the sequence and reports how far it got; nothing
//! already written is undone.

use std::{collections::BTreeSet, fmt, sync::Arc};

use thiserror::Error;
use tracing::{debug, warn};

use super::identifiers::inum_from_dn;
use crate::directory::{DirectoryError, DirectoryStore, PersonEntry};

/// Membership writes that were applied by a successful synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Identifiers of groups the person was added to
    pub added: Vec<String>,
    /// Identifiers of groups the person was removed from
    pub removed: Vec<String>,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// A synchronization that stopped part way.
///
/// `member` is the DN of the person being synchronized. `applied` lists the groups whose member lists were written; `pending` the
/// groups that were not, starting with the one whose write failed. When every
/// group was written but the person entry itself was not, `pending` is empty.
#[derive(Debug, Error)]
#[error(
    "membership of {member} partially synchronized (updated: [{}], pending: [{}]): {source}",
    .applied.join(", "),
    .pending.join(", ")
)]
pub struct PartialSyncFailure {
    pub member: String,
    pub applied: Vec<String>,
    pub pending: Vec<String>,
    pub source: DirectoryError,
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// A group to add the person to does not exist; nothing was written.
    #[error("group '{0}' does not exist")]
    UnknownGroup(String),

    #[error(transparent)]
    Partial(#[from] PartialSyncFailure),

    /// A lookup failed before any write.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Add,
    Remove,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Add => write!(f, "add"),
            Change::Remove => write!(f, "remove"),
        }
    }
}

struct GroupWrite {
    group_id: String,
    group_dn: String,
    change: Change,
}

impl GroupWrite {
    fn new(group_dn: &str, change: Change) -> Self {
        Self {
            group_id: group_label(group_dn).to_string(),
            group_dn: group_dn.to_string(),
            change,
        }
    }
}

/// Keeps `memberOf` and group member lists symmetric.
#[derive(Clone)]
pub struct MembershipSynchronizer {
    store: Arc<dyn DirectoryStore>,
}

impl MembershipSynchronizer {
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self { store }
    }

    /// Fail with [`SyncError::UnknownGroup`] on the first of `group_dns`
    /// that has no group entry.
    pub async fn ensure_groups_exist(&self, group_dns: &[String]) -> SyncResult<()> {
        for dn in group_dns {
            if self.store.get_group(dn).await?.is_none() {
                return Err(SyncError::UnknownGroup(group_label(dn).to_string()));
            }
        }
        Ok(())
    }

    /// Bring `entry`'s membership to `desired` (a set of group DNs).
    ///
    /// Group member lists are written first; on success `entry.member_of` is
    /// set to `desired` and the whole entry is persisted with one replace,
    /// so any other pending attribute changes on `entry` land with it.
    /// Calling it again with the same `desired` set writes no group.
    pub async fn reconcile(
        &self,
        entry: &mut PersonEntry,
        desired: &BTreeSet<String>,
    ) -> SyncResult<SyncReport> {
        let mut writes: Vec<GroupWrite> = desired
            .difference(&entry.member_of)
            .map(|dn| GroupWrite::new(dn, Change::Add))
            .chain(
                entry
                    .member_of
                    .difference(desired)
                    .map(|dn| GroupWrite::new(dn, Change::Remove)),
            )
            .collect();

        let additions: Vec<String> = writes
            .iter()
            .filter(|w| w.change == Change::Add)
            .map(|w| w.group_dn.clone())
            .collect();
        self.ensure_groups_exist(&additions).await?;

        writes.sort_by(|a, b| a.group_id.cmp(&b.group_id));

        let report = self.apply(&entry.dn, &writes).await?;

        entry.member_of = desired.clone();
        if let Err(source) = self.store.replace_person(entry.clone()).await {
            return Err(PartialSyncFailure {
                member: entry.dn.clone(),
                applied: writes.iter().map(|w| w.group_id.clone()).collect(),
                pending: Vec::new(),
                source,
            }
            .into());
        }

        debug!(
            dn = %entry.dn,
            added = report.added.len(),
            removed = report.removed.len(),
            "Group membership synchronized"
        );
        Ok(report)
    }

    /// Remove `entry`'s DN from every group in its `memberOf`.
    ///
    /// The entry itself is not written; callers delete it afterwards.
    pub async fn remove_from_all_groups(&self, entry: &PersonEntry) -> SyncResult<SyncReport> {
        let mut writes: Vec<GroupWrite> = entry
            .member_of
            .iter()
            .map(|dn| GroupWrite::new(dn, Change::Remove))
            .collect();
        writes.sort_by(|a, b| a.group_id.cmp(&b.group_id));

        let report = self.apply(&entry.dn, &writes).await?;
        debug!(dn = %entry.dn, removed = report.removed.len(), "Removed from all groups");
        Ok(report)
    }

    async fn apply(
        &self,
        member_dn: &str,
        writes: &[GroupWrite],
    ) -> Result<SyncReport, PartialSyncFailure> {
        let mut report = SyncReport::default();

        for (i, write) in writes.iter().enumerate() {
            let result = match write.change {
                Change::Add => self.store.add_group_member(&write.group_dn, member_dn).await,
                Change::Remove => {
                    match self
                        .store
                        .remove_group_member(&write.group_dn, member_dn)
                        .await
                    {
                        Err(DirectoryError::NotFound) => {
                            warn!(
                                group = %write.group_id,
                                member = %member_dn,
                                "Group no longer exists, treating removal as done"
                            );
                            Ok(false)
                        }
                        other => other,
                    }
                }
            };

            match result {
                Ok(_) => {
                    debug!(
                        group = %write.group_id,
                        member = %member_dn,
                        change = %write.change,
                        "Group member list updated"
                    );
                    match write.change {
                        Change::Add => report.added.push(write.group_id.clone()),
                        Change::Remove => report.removed.push(write.group_id.clone()),
                    }
                }
                Err(source) => {
                    return Err(PartialSyncFailure {
                        member: member_dn.to_string(),
                        applied: writes[..i].iter().map(|w| w.group_id.clone()).collect(),
                        pending: writes[i..].iter().map(|w| w.group_id.clone()).collect(),
                        source,
                    });
                }
            }
        }

        Ok(report)
    }
}

/// Group identifier used for ordering and reporting.
fn group_label(dn: &str) -> &str {
    inum_from_dn(dn).unwrap_or(dn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{GroupEntry, MemoryDirectory, testing::FlakyDirectory};

    const ALICE_DN: &str = "inum=A,ou=people,o=@!1111,o=gluu";

    fn group_dn(id: &str) -> String {
        format!("inum={},ou=groups,o=@!1111,o=gluu", id)
    }

    async fn seed(store: &dyn DirectoryStore, groups: &[&str]) -> PersonEntry {
        for id in groups {
            store
                .insert_group(GroupEntry {
                    dn: group_dn(id),
                    inum: id.to_string(),
                    display_name: Some(id.to_lowercase()),
                    members: BTreeSet::new(),
                })
                .await
                .unwrap();
        }
        let alice = PersonEntry {
            dn: ALICE_DN.to_string(),
            inum: "A".to_string(),
            iname: "@!example*person*alice".to_string(),
            uid: "alice".to_string(),
            ..Default::default()
        };
        store.insert_person(alice.clone()).await.unwrap();
        alice
    }

    fn desired(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|id| group_dn(id)).collect()
    }

    async fn members(store: &dyn DirectoryStore, id: &str) -> BTreeSet<String> {
        store.get_group(&group_dn(id)).await.unwrap().unwrap().members
    }

    #[tokio::test]
    async fn test_reconcile_adds_both_ends() {
        let store = Arc::new(MemoryDirectory::new());
        let mut alice = seed(store.as_ref(), &["G1", "G2"]).await;
        let sync = MembershipSynchronizer::new(store.clone());

        let report = sync
            .reconcile(&mut alice, &desired(&["G1", "G2"]))
            .await
            .unwrap();

        assert_eq!(report.added, vec!["G1", "G2"]);
        assert!(members(store.as_ref(), "G1").await.contains(ALICE_DN));
        assert!(members(store.as_ref(), "G2").await.contains(ALICE_DN));

        let stored = store.get_person("A").await.unwrap().unwrap();
        assert_eq!(stored.member_of, desired(&["G1", "G2"]));
    }

    #[tokio::test]
    async fn test_reconcile_removes_dropped_groups() {
        let store = Arc::new(MemoryDirectory::new());
        let mut alice = seed(store.as_ref(), &["G1", "G2"]).await;
        let sync = MembershipSynchronizer::new(store.clone());
        sync.reconcile(&mut alice, &desired(&["G1", "G2"]))
            .await
            .unwrap();

        let report = sync
            .reconcile(&mut alice, &desired(&["G2"]))
            .await
            .unwrap();

        assert_eq!(report.removed, vec!["G1"]);
        assert!(report.added.is_empty());
        assert!(members(store.as_ref(), "G1").await.is_empty());
        assert!(members(store.as_ref(), "G2").await.contains(ALICE_DN));
        assert_eq!(alice.member_of, desired(&["G2"]));
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let store = Arc::new(FlakyDirectory::new());
        let mut alice = seed(store.as_ref(), &["G1"]).await;
        let sync = MembershipSynchronizer::new(store.clone());

        sync.reconcile(&mut alice, &desired(&["G1"])).await.unwrap();
        let writes_after_first = store.group_writes().len();
        let second = sync.reconcile(&mut alice, &desired(&["G1"])).await.unwrap();

        assert!(second.is_empty());
        assert_eq!(store.group_writes().len(), writes_after_first);
        assert_eq!(members(store.as_ref(), "G1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_writes_follow_group_identifier_order() {
        let store = Arc::new(FlakyDirectory::new());
        let mut alice = seed(store.as_ref(), &["G1", "G2", "G3"]).await;
        let sync = MembershipSynchronizer::new(store.clone());
        sync.reconcile(&mut alice, &desired(&["G2"])).await.unwrap();

        // Removal of G2 sits between the additions of G1 and G3.
        sync.reconcile(&mut alice, &desired(&["G3", "G1"]))
            .await
            .unwrap();

        assert_eq!(
            store.group_writes(),
            vec![group_dn("G2"), group_dn("G1"), group_dn("G2"), group_dn("G3")]
        );
    }

    #[tokio::test]
    async fn test_unknown_group_writes_nothing() {
        let store = Arc::new(FlakyDirectory::new());
        let mut alice = seed(store.as_ref(), &["G1"]).await;
        let sync = MembershipSynchronizer::new(store.clone());

        let result = sync.reconcile(&mut alice, &desired(&["G1", "NOPE"])).await;

        assert!(matches!(result, Err(SyncError::UnknownGroup(id)) if id == "NOPE"));
        assert!(store.group_writes().is_empty());
        assert!(alice.member_of.is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_reports_applied_and_pending() {
        let store = Arc::new(FlakyDirectory::new());
        let mut alice = seed(store.as_ref(), &["G1", "G2", "G3"]).await;
        let sync = MembershipSynchronizer::new(store.clone());
        store.fail_group(&group_dn("G2"));

        let err = sync
            .reconcile(&mut alice, &desired(&["G1", "G2", "G3"]))
            .await
            .unwrap_err();

        let SyncError::Partial(failure) = err else {
            panic!("expected partial failure");
        };
        assert_eq!(failure.member, ALICE_DN);
        assert_eq!(failure.applied, vec!["G1"]);
        assert_eq!(failure.pending, vec!["G2", "G3"]);
        assert!(failure.to_string().contains("pending: [G2, G3]"));
        assert!(failure.to_string().contains(ALICE_DN));

        // No rollback, and the person entry was not written.
        assert!(members(store.as_ref(), "G1").await.contains(ALICE_DN));
        assert!(members(store.as_ref(), "G3").await.is_empty());
        let stored = store.get_person("A").await.unwrap().unwrap();
        assert!(stored.member_of.is_empty());
    }

    #[tokio::test]
    async fn test_retry_after_partial_failure_converges() {
        let store = Arc::new(FlakyDirectory::new());
        let mut alice = seed(store.as_ref(), &["G1", "G2"]).await;
        let sync = MembershipSynchronizer::new(store.clone());
        store.fail_group(&group_dn("G2"));
        let _ = sync.reconcile(&mut alice, &desired(&["G1", "G2"])).await;

        store.heal_group(&group_dn("G2"));
        sync.reconcile(&mut alice, &desired(&["G1", "G2"]))
            .await
            .unwrap();

        assert_eq!(members(store.as_ref(), "G1").await.len(), 1);
        assert!(members(store.as_ref(), "G2").await.contains(ALICE_DN));
    }

    #[tokio::test]
    async fn test_entry_write_failure_after_groups() {
        let store = Arc::new(FlakyDirectory::new());
        let mut alice = seed(store.as_ref(), &["G1"]).await;
        let sync = MembershipSynchronizer::new(store.clone());
        store.fail_replace(true);

        let err = sync
            .reconcile(&mut alice, &desired(&["G1"]))
            .await
            .unwrap_err();

        let SyncError::Partial(failure) = err else {
            panic!("expected partial failure");
        };
        assert_eq!(failure.applied, vec!["G1"]);
        assert!(failure.pending.is_empty());
    }

    #[tokio::test]
    async fn test_remove_from_all_groups() {
        let store = Arc::new(MemoryDirectory::new());
        let mut alice = seed(store.as_ref(), &["G1", "G2"]).await;
        let sync = MembershipSynchronizer::new(store.clone());
        sync.reconcile(&mut alice, &desired(&["G1", "G2"]))
            .await
            .unwrap();

        let report = sync.remove_from_all_groups(&alice).await.unwrap();

        assert_eq!(report.removed, vec!["G1", "G2"]);
        assert!(members(store.as_ref(), "G1").await.is_empty());
        assert!(members(store.as_ref(), "G2").await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_from_missing_group_counts_as_done() {
        let store = Arc::new(MemoryDirectory::new());
        let mut alice = seed(store.as_ref(), &["G1"]).await;
        alice.member_of.insert(group_dn("G1"));
        alice.member_of.insert(group_dn("GONE"));
        let sync = MembershipSynchronizer::new(store.clone());

        let report = sync.remove_from_all_groups(&alice).await.unwrap();
        assert_eq!(report.removed, vec!["G1", "GONE"]);
    }
}
