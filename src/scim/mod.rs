//! SCIM 2.0 Protocol Types
//!
//! Wire representation of the User resource and the SCIM protocol envelopes.
//!
//! ## RFC References
//!
//! - RFC 7643: SCIM Core Schema
//! - RFC 7644: SCIM Protocol
//!
//! ## Module Structure
//!
//! - [`types`]: User resource and protocol types
//! - [`error`]: SCIM-specific error responses per RFC 7644

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;
