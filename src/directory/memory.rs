use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};

use super::{
    DirectoryStore, GroupEntry, PersonEntry,
    error::{DirectoryError, DirectoryResult},
};

/// In-memory directory using DashMap for concurrent access.
///
/// Person entries are keyed by inum, with secondary indexes on `uid` and
/// `iname` so the uniqueness checks are claimed atomically through the map
/// entry API rather than by scanning. Locks are always taken in the order
/// person map, then index. Each group's member list is modified
/// in place under the group's shard lock, giving add/remove-value the same
/// per-entry atomicity an LDAP modify has.
///
/// **WARNING**: state lives in process memory only and is lost on restart.
pub struct MemoryDirectory {
    persons: DashMap<String, PersonEntry>,
    /// Lower-cased uid -> inum
    uids: DashMap<String, String>,
    /// Lower-cased iname -> inum
    inames: DashMap<String, String>,
    groups: DashMap<String, GroupEntry>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self {
            persons: DashMap::new(),
            uids: DashMap::new(),
            inames: DashMap::new(),
            groups: DashMap::new(),
        }
    }

    /// Claim `key` in a secondary index for `inum`.
    fn claim(
        index: &DashMap<String, String>,
        attribute: &str,
        key: &str,
        inum: &str,
    ) -> DirectoryResult<()> {
        match index.entry(key.to_lowercase()) {
            Entry::Occupied(existing) if existing.get() != inum => Err(DirectoryError::Conflict(
                format!("{} '{}' is already in use", attribute, key),
            )),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(inum.to_string());
                Ok(())
            }
        }
    }

    fn release(index: &DashMap<String, String>, key: &str, inum: &str) {
        index.remove_if(&key.to_lowercase(), |_, owner| owner == inum);
    }

    /// Move an index key from `old` to `new` for `inum`.
    fn rekey(
        index: &DashMap<String, String>,
        attribute: &str,
        old: &str,
        new: &str,
        inum: &str,
    ) -> DirectoryResult<()> {
        if old.eq_ignore_ascii_case(new) {
            return Ok(());
        }
        Self::claim(index, attribute, new, inum)?;
        Self::release(index, old, inum);
        Ok(())
    }
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectory {
    async fn get_person(&self, inum: &str) -> DirectoryResult<Option<PersonEntry>> {
        Ok(self.persons.get(inum).map(|e| e.value().clone()))
    }

    async fn find_person(
        &self,
        attribute: &str,
        value: &str,
    ) -> DirectoryResult<Option<PersonEntry>> {
        Ok(self
            .persons
            .iter()
            .filter(|e| e.value().matches(attribute, value))
            .map(|e| e.value().clone())
            .min_by(|a, b| a.inum.cmp(&b.inum)))
    }

    async fn list_persons(&self, _filter: Option<&str>) -> DirectoryResult<Vec<PersonEntry>> {
        let mut entries: Vec<PersonEntry> =
            self.persons.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.inum.cmp(&b.inum));
        Ok(entries)
    }

    async fn insert_person(&self, entry: PersonEntry) -> DirectoryResult<()> {
        let inum = entry.inum.clone();

        match self.persons.entry(inum.clone()) {
            Entry::Occupied(_) => Err(DirectoryError::Conflict(format!(
                "inum '{}' is already in use",
                inum
            ))),
            Entry::Vacant(slot) => {
                Self::claim(&self.uids, "uid", &entry.uid, &inum)?;
                if let Err(e) = Self::claim(&self.inames, "iname", &entry.iname, &inum) {
                    Self::release(&self.uids, &entry.uid, &inum);
                    return Err(e);
                }
                slot.insert(entry);
                Ok(())
            }
        }
    }

    async fn replace_person(&self, entry: PersonEntry) -> DirectoryResult<()> {
        let mut stored = self
            .persons
            .get_mut(&entry.inum)
            .ok_or(DirectoryError::NotFound)?;

        Self::rekey(&self.uids, "uid", &stored.uid, &entry.uid, &entry.inum)?;
        if let Err(e) = Self::rekey(
            &self.inames,
            "iname",
            &stored.iname,
            &entry.iname,
            &entry.inum,
        ) {
            // Undo the uid move so the indexes keep pointing at the stored entry.
            let _ = Self::rekey(&self.uids, "uid", &entry.uid, &stored.uid, &entry.inum);
            return Err(e);
        }

        *stored = entry;
        Ok(())
    }

    async fn delete_person(&self, inum: &str) -> DirectoryResult<()> {
        let (_, removed) = self.persons.remove(inum).ok_or(DirectoryError::NotFound)?;
        Self::release(&self.uids, &removed.uid, inum);
        Self::release(&self.inames, &removed.iname, inum);
        Ok(())
    }

    async fn get_group(&self, dn: &str) -> DirectoryResult<Option<GroupEntry>> {
        Ok(self.groups.get(dn).map(|g| g.value().clone()))
    }

    async fn insert_group(&self, group: GroupEntry) -> DirectoryResult<()> {
        match self.groups.entry(group.dn.clone()) {
            Entry::Occupied(_) => Err(DirectoryError::Conflict(format!(
                "group '{}' already exists",
                group.dn
            ))),
            Entry::Vacant(slot) => {
                slot.insert(group);
                Ok(())
            }
        }
    }

    async fn add_group_member(&self, group_dn: &str, member_dn: &str) -> DirectoryResult<bool> {
        let mut group = self
            .groups
            .get_mut(group_dn)
            .ok_or(DirectoryError::NotFound)?;
        Ok(group.members.insert(member_dn.to_string()))
    }

    async fn remove_group_member(
        &self,
        group_dn: &str,
        member_dn: &str,
    ) -> DirectoryResult<bool> {
        let mut group = self
            .groups
            .get_mut(group_dn)
            .ok_or(DirectoryError::NotFound)?;
        Ok(group.members.remove(member_dn))
    }
}
