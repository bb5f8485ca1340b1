//! Directory entry shapes.
//!
//! A [`PersonEntry`] is the stored form of a SCIM user: a flat attribute set
//! keyed by its distinguished name. A [`GroupEntry`] carries the member-list
//! attribute that mirrors each person's `memberOf` values.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A person entry (`ou=people`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonEntry {
    /// Distinguished name, derived from `inum` at creation
    pub dn: String,
    /// System-generated unique identifier
    pub inum: String,
    /// Human-readable alias derived from the username at creation
    pub iname: String,
    /// Login name (SCIM `userName`)
    pub uid: String,
    /// `userPassword`; never mapped back to a resource
    pub user_password: Option<String>,
    pub external_id: Option<String>,
    pub given_name: Option<String>,
    /// Surname (`sn`)
    pub family_name: Option<String>,
    pub middle_name: Option<String>,
    pub honorific_prefix: Option<String>,
    pub honorific_suffix: Option<String>,
    /// Common name (`cn`), always derived from given and family name
    pub common_name: Option<String>,
    pub display_name: Option<String>,
    pub nickname: Option<String>,
    pub title: Option<String>,
    pub user_type: Option<String>,
    pub preferred_language: Option<String>,
    pub locale: Option<String>,
    /// IANA time zone (`zoneinfo`)
    pub timezone: Option<String>,
    pub active: Option<bool>,
    /// Multi-valued `mail`
    #[serde(default)]
    pub mail: Vec<MailValue>,
    /// Multi-valued `telephoneNumber`
    #[serde(default)]
    pub telephone_numbers: Vec<PhoneValue>,
    /// Distinguished names of the groups this person belongs to
    #[serde(default)]
    pub member_of: BTreeSet<String>,
    /// Extension attributes stored verbatim
    #[serde(default)]
    pub extensions: BTreeMap<String, Value>,
    pub created: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One `mail` value with its SCIM qualifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailValue {
    pub value: String,
    pub kind: Option<String>,
    pub primary: Option<bool>,
}

/// One `telephoneNumber` value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneValue {
    pub value: String,
    pub kind: Option<String>,
}

impl PersonEntry {
    /// Values of a directory attribute, looked up by its (case-insensitive) name.
    ///
    /// Names that are not part of the person schema are resolved against the
    /// extension attributes, where only scalar values are matchable.
    pub fn attribute_values(&self, name: &str) -> Vec<String> {
        let single = |v: &Option<String>| v.iter().cloned().collect::<Vec<_>>();

        match name.to_ascii_lowercase().as_str() {
            "dn" => vec![self.dn.clone()],
            "inum" => vec![self.inum.clone()],
            "iname" => vec![self.iname.clone()],
            "uid" => vec![self.uid.clone()],
            "externalid" => single(&self.external_id),
            "givenname" => single(&self.given_name),
            "sn" => single(&self.family_name),
            "middlename" => single(&self.middle_name),
            "honorificprefix" => single(&self.honorific_prefix),
            "honorificsuffix" => single(&self.honorific_suffix),
            "cn" => single(&self.common_name),
            "displayname" => single(&self.display_name),
            "nickname" => single(&self.nickname),
            "title" => single(&self.title),
            "usertype" => single(&self.user_type),
            "preferredlanguage" => single(&self.preferred_language),
            "locale" => single(&self.locale),
            "zoneinfo" => single(&self.timezone),
            "active" => self.active.iter().map(|a| a.to_string()).collect(),
            "mail" => self.mail.iter().map(|m| m.value.clone()).collect(),
            "telephonenumber" => self
                .telephone_numbers
                .iter()
                .map(|p| p.value.clone())
                .collect(),
            "memberof" => self.member_of.iter().cloned().collect(),
            _ => match self.extensions.get(name) {
                Some(Value::String(s)) => vec![s.clone()],
                Some(Value::Bool(b)) => vec![b.to_string()],
                Some(Value::Number(n)) => vec![n.to_string()],
                _ => Vec::new(),
            },
        }
    }

    /// Whether any value of `attribute` equals `value`, ignoring ASCII case.
    pub fn matches(&self, attribute: &str, value: &str) -> bool {
        self.attribute_values(attribute)
            .iter()
            .any(|v| v.eq_ignore_ascii_case(value))
    }
}

/// A group entry (`ou=groups`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEntry {
    pub dn: String,
    pub inum: String,
    pub display_name: Option<String>,
    /// Distinguished names of member persons
    #[serde(default)]
    pub members: BTreeSet<String>,
}
