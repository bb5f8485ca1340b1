use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Authentication configuration for the SCIM endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// When false, every request is let through without a credential.
    /// Defaults to true once an `[auth]` section is present.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bearer tokens accepted on `Authorization: Bearer <token>`.
    #[serde(default)]
    pub bearer_tokens: Vec<String>,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.bearer_tokens.is_empty() {
            return Err(ConfigError::Validation(
                "auth.enabled requires at least one entry in auth.bearer_tokens".into(),
            ));
        }
        if self.bearer_tokens.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "auth.bearer_tokens must not contain empty tokens".into(),
            ));
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bearer_tokens: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}
