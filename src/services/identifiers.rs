//! Identifier generation for new person entries.
//!
//! Every person gets three identity values exactly once, at creation:
//!
//! - `inum`: `<org inum>!0000!XXXX.XXXX.XXXX.XXXX`, random upper-case hex
//! - `dn`: `inum=<inum>,ou=people,o=<org inum>,<base dn>`
//! - `iname`: `<org iname>*person*<username>`
//!
//! None of them are ever recomputed; the DN is a pure function of the inum.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::{
    config::DirectoryConfig,
    directory::{DirectoryError, DirectoryStore},
};

/// Candidates probed before giving up on finding a free inum.
const MAX_INUM_ATTEMPTS: usize = 10;

/// Type code for person entries inside an organization's inum space.
const PERSON_TYPE: &str = "0000";

#[derive(Debug, Error)]
pub enum IdentifierError {
    #[error("userName '{0}' already has an alias")]
    AliasConflict(String),

    #[error("no free inum found after {0} attempts")]
    Exhausted(usize),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

pub type IdentifierResult<T> = Result<T, IdentifierError>;

/// Generates inums, aliases and distinguished names.
#[derive(Clone)]
pub struct IdentifierGenerator {
    store: Arc<dyn DirectoryStore>,
    org_inum: String,
    org_iname: String,
    people_base: String,
    groups_base: String,
}

impl IdentifierGenerator {
    pub fn new(store: Arc<dyn DirectoryStore>, config: &DirectoryConfig) -> Self {
        let org_base = format!("o={},{}", config.org_inum, config.base_dn);
        Self {
            store,
            org_inum: config.org_inum.clone(),
            org_iname: config.org_iname.clone(),
            people_base: format!("ou=people,{}", org_base),
            groups_base: format!("ou=groups,{}", org_base),
        }
    }

    /// Generate an inum not currently used by any person.
    ///
    /// The store remains the authority on uniqueness: a candidate that wins
    /// the probe but loses a race is rejected by the insert as a conflict.
    pub async fn new_inum(&self) -> IdentifierResult<String> {
        for _ in 0..MAX_INUM_ATTEMPTS {
            let candidate = self.inum_candidate();
            if self.store.get_person(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            debug!(inum = %candidate, "Generated inum already taken, retrying");
        }
        Err(IdentifierError::Exhausted(MAX_INUM_ATTEMPTS))
    }

    fn inum_candidate(&self) -> String {
        let hex = Uuid::new_v4().simple().to_string().to_uppercase();
        format!(
            "{}!{}!{}.{}.{}.{}",
            self.org_inum,
            PERSON_TYPE,
            &hex[0..4],
            &hex[4..8],
            &hex[8..12],
            &hex[12..16]
        )
    }

    /// Distinguished name of the person with `inum`.
    pub fn distinguished_name_for(&self, inum: &str) -> String {
        format!("inum={},{}", inum, self.people_base)
    }

    /// Distinguished name of the group with identifier `group_id`.
    pub fn group_dn_for(&self, group_id: &str) -> String {
        format!("inum={},{}", group_id, self.groups_base)
    }

    /// Derive the alias for `username`, failing if it is already taken.
    pub async fn new_alias(&self, username: &str) -> IdentifierResult<String> {
        let alias = format!("{}*person*{}", self.org_iname, username);
        if self.store.find_person("iname", &alias).await?.is_some() {
            return Err(IdentifierError::AliasConflict(username.to_string()));
        }
        Ok(alias)
    }
}

/// Value of the leading `inum=` RDN of a distinguished name.
pub fn inum_from_dn(dn: &str) -> Option<&str> {
    let rdn = dn.split(',').next()?;
    let (attribute, value) = rdn.split_once('=')?;
    attribute
        .trim()
        .eq_ignore_ascii_case("inum")
        .then(|| value.trim())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{MemoryDirectory, PersonEntry};

    fn config() -> DirectoryConfig {
        DirectoryConfig {
            base_dn: "o=gluu".to_string(),
            org_inum: "@!1111".to_string(),
            org_iname: "@!example".to_string(),
            ..Default::default()
        }
    }

    fn generator(store: Arc<MemoryDirectory>) -> IdentifierGenerator {
        IdentifierGenerator::new(store, &config())
    }

    #[tokio::test]
    async fn test_new_inum_format() {
        let ids = generator(Arc::new(MemoryDirectory::new()));
        let inum = ids.new_inum().await.unwrap();

        let re = regex::Regex::new(r"^@!1111!0000![0-9A-F]{4}\.[0-9A-F]{4}\.[0-9A-F]{4}\.[0-9A-F]{4}$")
            .unwrap();
        assert!(re.is_match(&inum), "unexpected inum {inum}");
    }

    #[tokio::test]
    async fn test_new_inum_is_not_reused() {
        let ids = generator(Arc::new(MemoryDirectory::new()));
        let a = ids.new_inum().await.unwrap();
        let b = ids.new_inum().await.unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_distinguished_names() {
        let ids = generator(Arc::new(MemoryDirectory::new()));
        assert_eq!(
            ids.distinguished_name_for("@!1111!0000!AB12.CD34"),
            "inum=@!1111!0000!AB12.CD34,ou=people,o=@!1111,o=gluu"
        );
        assert_eq!(
            ids.group_dn_for("@!1111!0003!ENG0"),
            "inum=@!1111!0003!ENG0,ou=groups,o=@!1111,o=gluu"
        );
        // Pure: same inum, same DN.
        assert_eq!(
            ids.distinguished_name_for("X"),
            ids.distinguished_name_for("X")
        );
    }

    #[test]
    fn test_inum_from_dn() {
        assert_eq!(
            inum_from_dn("inum=@!1111!0003!ENG0,ou=groups,o=@!1111,o=gluu"),
            Some("@!1111!0003!ENG0")
        );
        assert_eq!(inum_from_dn("INUM = abc ,ou=groups"), Some("abc"));
        assert_eq!(inum_from_dn("cn=admins,ou=groups"), None);
        assert_eq!(inum_from_dn("inum=,ou=groups"), None);
        assert_eq!(inum_from_dn(""), None);
    }

    #[tokio::test]
    async fn test_new_alias_and_conflict() {
        let store = Arc::new(MemoryDirectory::new());
        let ids = generator(store.clone());

        let alias = ids.new_alias("alice").await.unwrap();
        assert_eq!(alias, "@!example*person*alice");

        store
            .insert_person(PersonEntry {
                dn: ids.distinguished_name_for("A"),
                inum: "A".to_string(),
                iname: alias,
                uid: "alice".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let conflict = ids.new_alias("alice").await;
        assert!(matches!(conflict, Err(IdentifierError::AliasConflict(u)) if u == "alice"));
    }
}
