//! Configuration module for the SCIM service.
//!
//! The service is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax. Every section is
//! optional.
//!
//! # Example
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [directory]
//! base_dn = "o=gluu"
//! org_inum = "@!1111"
//! org_iname = "@!example"
//!
//! [[directory.groups]]
//! id = "@!1111!0003!ENG0"
//! display_name = "engineers"
//!
//! [auth]
//! bearer_tokens = ["${SCIM_TOKEN}"]
//! ```

mod auth;
mod directory;
mod observability;
mod server;

use std::path::Path;

pub use auth::*;
pub use directory::*;
pub use observability::*;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
pub use server::*;

/// Root configuration for the SCIM service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Directory layout, client timeout and seed groups.
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Bearer token authentication.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Observability configuration (logging).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: ServiceConfig = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate().map_err(ConfigError::Validation)?;
        self.directory.validate().map_err(ConfigError::Validation)?;
        self.auth.validate()?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

static ENV_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// Expand environment variables in the format `${VAR_NAME}`.
/// Variables after a `#` on the same line are left alone.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');
        let mut last_end = 0;

        for cap in ENV_VAR.captures_iter(line) {
            let Some(whole) = cap.get(0) else { continue };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            result.push_str(&value);

            last_end = whole.end();
        }

        result.push_str(&line[last_end..]);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ServiceConfig::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.directory.org_inum, "@!1111");
        assert!(!config.auth.enabled);
        assert_eq!(config.observability.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_full_config() {
        let config = ServiceConfig::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9090
            timeout_secs = 10

            [directory]
            base_dn = "o=acme"
            org_inum = "@!2222"
            org_iname = "@!acme"
            operation_timeout_ms = 250

            [[directory.groups]]
            id = "@!2222!0003!ENG0"
            display_name = "engineers"

            [[directory.groups]]
            id = "@!2222!0003!OPS0"

            [auth]
            enabled = true
            bearer_tokens = ["secret-1", "secret-2"]

            [observability.logging]
            level = "debug"
            format = "json"
            filter = "tower_http=debug"
        "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert!(config.server.host.is_loopback());
        assert_eq!(config.directory.base_dn, "o=acme");
        assert_eq!(config.directory.groups.len(), 2);
        assert_eq!(
            config.directory.groups[0].display_name.as_deref(),
            Some("engineers")
        );
        assert!(config.directory.groups[1].display_name.is_none());
        assert_eq!(config.auth.bearer_tokens.len(), 2);
        assert_eq!(config.observability.logging.level, LogLevel::Debug);
        assert_eq!(config.observability.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result = ServiceConfig::from_str(
            r#"
            [directory]
            base = "o=gluu"
        "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_auth_enabled_without_tokens_rejected() {
        let result = ServiceConfig::from_str(
            r#"
            [auth]
            enabled = true
        "#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    #[serial]
    fn test_env_var_expansion() {
        temp_env::with_var("TEST_SCIM_TOKEN", Some("tok-secret"), || {
            let result = expand_env_vars("bearer_tokens = [\"${TEST_SCIM_TOKEN}\"]").unwrap();
            assert_eq!(result, "bearer_tokens = [\"tok-secret\"]");
        });
    }

    #[test]
    fn test_env_var_in_comment_ignored() {
        let result = expand_env_vars("# token = \"${NONEXISTENT_VAR}\"").unwrap();
        assert_eq!(result, "# token = \"${NONEXISTENT_VAR}\"");
    }

    #[test]
    #[serial]
    fn test_missing_env_var() {
        temp_env::with_var_unset("DEFINITELY_UNSET_SCIM_VAR", || {
            let result = expand_env_vars("token = \"${DEFINITELY_UNSET_SCIM_VAR}\"");
            assert!(
                matches!(result, Err(ConfigError::EnvVarNotFound(v)) if v == "DEFINITELY_UNSET_SCIM_VAR")
            );
        });
    }

    #[test]
    #[serial]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [server]
            port = 7070

            [auth]
            bearer_tokens = ["${{TEST_SCIM_FILE_TOKEN}}"]
            "#
        )
        .unwrap();

        temp_env::with_var("TEST_SCIM_FILE_TOKEN", Some("from-env"), || {
            let config = ServiceConfig::from_file(file.path()).unwrap();
            assert_eq!(config.server.port, 7070);
            assert!(config.auth.enabled);
            assert_eq!(config.auth.bearer_tokens, vec!["from-env"]);
        });
    }

    #[test]
    fn test_from_missing_file() {
        let result = ServiceConfig::from_file("/nonexistent/scim.toml");
        assert!(matches!(result, Err(ConfigError::Io(_, _))));
    }
}
