//! Request authorization for the SCIM endpoints.
//!
//! The gate sees only the raw `Authorization` header value and decides
//! whether the request may proceed; nothing past the gate inspects the
//! credential.

mod error;

use async_trait::async_trait;
pub use error::AuthError;
use subtle::ConstantTimeEq;

use crate::config::AuthConfig;

/// Decides whether a request may proceed.
#[async_trait]
pub trait AuthorizationGate: Send + Sync {
    /// `authorization` is the `Authorization` header value, if any.
    async fn authorize(&self, authorization: Option<&str>) -> Result<(), AuthError>;
}

/// Static bearer tokens from configuration.
pub struct BearerTokenGate {
    enabled: bool,
    tokens: Vec<String>,
}

impl BearerTokenGate {
    pub fn new(enabled: bool, tokens: Vec<String>) -> Self {
        Self { enabled, tokens }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.enabled, config.bearer_tokens.clone())
    }

    /// Whether `candidate` equals one of the configured tokens.
    ///
    /// Every configured token is compared in constant time.
    fn accepts(&self, candidate: &str) -> bool {
        self.tokens.iter().fold(false, |found, token| {
            let equal: bool = token.as_bytes().ct_eq(candidate.as_bytes()).into();
            found | equal
        })
    }
}

#[async_trait]
impl AuthorizationGate for BearerTokenGate {
    async fn authorize(&self, authorization: Option<&str>) -> Result<(), AuthError> {
        if !self.enabled {
            return Ok(());
        }

        let token = authorization
            .and_then(extract_bearer_token)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingCredentials)?;

        if self.accepts(token) {
            Ok(())
        } else {
            tracing::debug!("SCIM authentication failed: invalid token");
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value.
///
/// The scheme is matched case-insensitively.
pub fn extract_bearer_token(header_value: &str) -> Option<&str> {
    let scheme = header_value.get(..7)?;
    if scheme.eq_ignore_ascii_case("Bearer ") {
        Some(header_value[7..].trim())
    } else {
        None
    }
}
