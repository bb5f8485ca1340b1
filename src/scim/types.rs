//! SCIM 2.0 Resource and Protocol Types
//!
//! This module defines the wire shape of the User resource and the protocol
//! envelopes (ListResponse, search request) per RFC 7643/7644.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

// =============================================================================
// Schema URIs
// =============================================================================

/// SCIM Core User schema URI
pub const SCHEMA_USER: &str = "urn:ietf:params:scim:schemas:core:2.0:User";

/// SCIM ListResponse schema URI
pub const SCHEMA_LIST_RESPONSE: &str = "urn:ietf:params:scim:api:messages:2.0:ListResponse";

/// SCIM Error schema URI
pub const SCHEMA_ERROR: &str = "urn:ietf:params:scim:api:messages:2.0:Error";

// =============================================================================
// Resource Metadata
// =============================================================================

/// Resource metadata.
///
/// Contains server-assigned metadata about the resource lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimMeta {
    /// The resource type ("User")
    pub resource_type: String,

    /// When the resource was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    /// When the resource was last modified
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,

    /// The URI of the resource
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ScimMeta {
    /// Create metadata for a User resource
    pub fn user(created: Option<DateTime<Utc>>, last_modified: Option<DateTime<Utc>>) -> Self {
        Self {
            resource_type: "User".to_string(),
            created,
            last_modified,
            location: None,
        }
    }

    /// Set the location URI
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

// =============================================================================
// User Resource (RFC 7643)
// =============================================================================

/// SCIM User resource.
///
/// Optional attributes that are absent in a request are `None`, which is what
/// lets an update overlay only the attributes the client actually sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimUser {
    /// SCIM schema URIs for this resource
    #[serde(default = "default_user_schemas")]
    pub schemas: Vec<String>,

    /// Server-assigned unique identifier (the entry's inum)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Client-assigned identifier for correlation with the IdP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    /// Unique login name; required on create
    #[serde(default)]
    pub user_name: String,

    /// Write-only: accepted on create and update, never returned
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// User's name components
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<ScimName>,

    /// Display name shown in UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// Whether the user is active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,

    /// Email addresses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emails: Option<Vec<ScimEmail>>,

    /// Phone numbers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_numbers: Option<Vec<ScimPhoneNumber>>,

    /// Groups the user belongs to.
    ///
    /// On update, `None` leaves membership untouched while `Some` (even an
    /// empty list) is the complete desired membership.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<ScimGroupRef>>,

    /// Resource metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ScimMeta>,

    /// Extension schemas and any other members, carried through untouched
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

fn default_user_schemas() -> Vec<String> {
    vec![SCHEMA_USER.to_string()]
}

impl ScimUser {
    /// Create a new SCIM user with only a userName
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            ..Default::default()
        }
    }

    /// Group identifiers referenced by this resource, if groups were sent.
    pub fn group_ids(&self) -> Option<Vec<&str>> {
        self.groups
            .as_ref()
            .map(|groups| groups.iter().map(|g| g.value.as_str()).collect())
    }
}

impl Default for ScimUser {
    fn default() -> Self {
        Self {
            schemas: default_user_schemas(),
            id: None,
            external_id: None,
            user_name: String::new(),
            password: None,
            name: None,
            display_name: None,
            nick_name: None,
            title: None,
            user_type: None,
            preferred_language: None,
            locale: None,
            timezone: None,
            active: None,
            emails: None,
            phone_numbers: None,
            groups: None,
            meta: None,
            extensions: BTreeMap::new(),
        }
    }
}

/// User's name components
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimName {
    /// Full formatted name (read-only, derived from given and family name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,

    /// Family name (last name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    /// Given name (first name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    /// Middle name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,

    /// Honorific prefix (e.g., "Dr.", "Mr.")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub honorific_prefix: Option<String>,

    /// Honorific suffix (e.g., "PhD", "Jr.")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub honorific_suffix: Option<String>,
}

impl ScimName {
    /// Create a name from given and family names
    pub fn from_names(given: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            given_name: Some(given.into()),
            family_name: Some(family.into()),
            ..Default::default()
        }
    }
}

/// Email address with type and primary flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimEmail {
    /// Email address value
    pub value: String,

    /// Email type (e.g., "work", "home")
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "type")]
    pub email_type: Option<String>,

    /// Whether this is the primary email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
}

impl ScimEmail {
    /// Create a primary work email
    pub fn work_primary(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            email_type: Some("work".to_string()),
            primary: Some(true),
        }
    }
}

/// Phone number with type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimPhoneNumber {
    /// Phone number value
    pub value: String,

    /// Phone type (e.g., "work", "mobile", "home")
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "type")]
    pub phone_type: Option<String>,
}

/// Reference to a group the user belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimGroupRef {
    /// Group identifier (the group's inum)
    pub value: String,

    /// URI reference to the group
    #[serde(rename = "$ref")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_uri: Option<String>,

    /// Display name of the group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl ScimGroupRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ref_uri: None,
            display: None,
        }
    }
}

// =============================================================================
// Protocol Types (RFC 7644)
// =============================================================================

/// SCIM list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimListResponse<T> {
    /// SCIM schema URIs
    pub schemas: Vec<String>,

    /// Total number of results available
    pub total_results: u32,

    /// Number of results returned in this response
    pub items_per_page: u32,

    /// 1-based index of the first result in this response
    pub start_index: u32,

    /// The list of resources
    #[serde(rename = "Resources")]
    pub resources: Vec<T>,
}

impl<T> ScimListResponse<T> {
    /// Create a list response holding every result
    pub fn new(resources: Vec<T>) -> Self {
        let total = resources.len() as u32;
        Self {
            schemas: vec![SCHEMA_LIST_RESPONSE.to_string()],
            total_results: total,
            items_per_page: total,
            start_index: 1,
            resources,
        }
    }
}

/// Query parameters for list operations.
///
/// Accepted for client compatibility; no filtering or sorting is applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimListParams {
    /// SCIM filter expression
    pub filter: Option<String>,

    /// Attribute to sort by
    pub sort_by: Option<String>,

    /// Sort order ("ascending" or "descending")
    pub sort_order: Option<String>,
}

/// Body of `POST /Users/Search`: a single attribute equality match.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScimSearchRequest {
    /// SCIM or directory attribute name (e.g. "userName", "mail")
    #[validate(length(min = 1, max = 255))]
    pub attribute: String,

    /// Value to match, compared case-insensitively
    #[validate(length(max = 2048))]
    pub value: String,
}

// =============================================================================
// Tests
// =============================================================================
