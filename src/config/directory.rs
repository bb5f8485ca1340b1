use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Directory layout and client settings.
///
/// The layout values determine every generated identifier: person inums are
/// `<org_inum>!0000!...`, person DNs live under
/// `ou=people,o=<org_inum>,<base_dn>` and aliases start with `<org_iname>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoryConfig {
    /// Root DN of the directory tree.
    #[serde(default = "default_base_dn")]
    pub base_dn: String,

    /// Inum of the owning organization.
    #[serde(default = "default_org_inum")]
    pub org_inum: String,

    /// Iname of the owning organization.
    #[serde(default = "default_org_iname")]
    pub org_iname: String,

    /// Timeout applied to every directory call, in milliseconds.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// Groups created in the directory at startup.
    #[serde(default)]
    pub groups: Vec<SeedGroupConfig>,
}

impl DirectoryConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub(super) fn validate(&self) -> Result<(), String> {
        if self.base_dn.trim().is_empty() {
            return Err("directory.base_dn must not be empty".into());
        }
        if self.org_inum.trim().is_empty() || self.org_iname.trim().is_empty() {
            return Err("directory.org_inum and directory.org_iname must not be empty".into());
        }
        if self.operation_timeout_ms == 0 {
            return Err("directory.operation_timeout_ms must be greater than 0".into());
        }

        let mut seen = std::collections::HashSet::new();
        for group in &self.groups {
            if group.id.trim().is_empty() {
                return Err("directory.groups[].id must not be empty".into());
            }
            if !seen.insert(group.id.as_str()) {
                return Err(format!("directory group '{}' is declared twice", group.id));
            }
        }
        Ok(())
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_dn: default_base_dn(),
            org_inum: default_org_inum(),
            org_iname: default_org_iname(),
            operation_timeout_ms: default_operation_timeout_ms(),
            groups: Vec::new(),
        }
    }
}

/// A group seeded at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedGroupConfig {
    /// Group inum, as referenced by `groups[].value`.
    pub id: String,

    #[serde(default)]
    pub display_name: Option<String>,
}

fn default_base_dn() -> String {
    "o=gluu".to_string()
}

fn default_org_inum() -> String {
    "@!1111".to_string()
}

fn default_org_iname() -> String {
    "@!example".to_string()
}

fn default_operation_timeout_ms() -> u64 {
    5000
}
