//! Translation between the SCIM User resource and a directory person entry.
//!
//! The mapper never touches identity (`dn`, `inum`, `iname`), the `memberOf`
//! attribute or the timestamps: identity is assigned by the
//! [`IdentifierGenerator`](super::IdentifierGenerator), membership is written
//! by the [`MembershipSynchronizer`](super::MembershipSynchronizer) and the
//! timestamps by the provisioning service.

use thiserror::Error;

use super::identifiers::inum_from_dn;
use crate::{
    directory::{MailValue, PersonEntry, PhoneValue},
    scim::{
        SCHEMA_USER, ScimEmail, ScimGroupRef, ScimMeta, ScimName, ScimPhoneNumber, ScimUser,
    },
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("userName is required")]
    MissingUserName,

    #[error("{0}")]
    InvalidValue(String),
}

/// Convert a resource to a person entry.
///
/// Without `existing` this builds a new entry with identity fields unset.
/// With `existing` it starts from a copy of that entry and overlays every
/// attribute present on `resource`; identity, membership and timestamps of
/// `existing` are kept as they are. The common name is recomputed either way.
pub fn to_directory_entry(
    resource: &ScimUser,
    existing: Option<&PersonEntry>,
) -> Result<PersonEntry, MappingError> {
    validate(resource)?;

    let mut entry = match existing {
        Some(existing) => existing.clone(),
        None => {
            if resource.user_name.trim().is_empty() {
                return Err(MappingError::MissingUserName);
            }
            PersonEntry::default()
        }
    };

    overlay(&mut entry, resource);
    entry.common_name = common_name(entry.given_name.as_deref(), entry.family_name.as_deref());

    Ok(entry)
}

fn validate(resource: &ScimUser) -> Result<(), MappingError> {
    for (i, email) in resource.emails.iter().flatten().enumerate() {
        if email.value.trim().is_empty() {
            return Err(MappingError::InvalidValue(format!(
                "emails[{}].value must not be empty",
                i
            )));
        }
    }
    for (i, phone) in resource.phone_numbers.iter().flatten().enumerate() {
        if phone.value.trim().is_empty() {
            return Err(MappingError::InvalidValue(format!(
                "phoneNumbers[{}].value must not be empty",
                i
            )));
        }
    }
    for (i, group) in resource.groups.iter().flatten().enumerate() {
        if group.value.trim().is_empty() {
            return Err(MappingError::InvalidValue(format!(
                "groups[{}].value must not be empty",
                i
            )));
        }
    }
    Ok(())
}

fn overlay(entry: &mut PersonEntry, resource: &ScimUser) {
    fn set(target: &mut Option<String>, value: &Option<String>) {
        if value.is_some() {
            target.clone_from(value);
        }
    }

    if !resource.user_name.trim().is_empty() {
        entry.uid.clone_from(&resource.user_name);
    }

    set(&mut entry.external_id, &resource.external_id);
    set(&mut entry.user_password, &resource.password);
    if let Some(name) = &resource.name {
        set(&mut entry.given_name, &name.given_name);
        set(&mut entry.family_name, &name.family_name);
        set(&mut entry.middle_name, &name.middle_name);
        set(&mut entry.honorific_prefix, &name.honorific_prefix);
        set(&mut entry.honorific_suffix, &name.honorific_suffix);
    }
    set(&mut entry.display_name, &resource.display_name);
    set(&mut entry.nickname, &resource.nick_name);
    set(&mut entry.title, &resource.title);
    set(&mut entry.user_type, &resource.user_type);
    set(&mut entry.preferred_language, &resource.preferred_language);
    set(&mut entry.locale, &resource.locale);
    set(&mut entry.timezone, &resource.timezone);

    if resource.active.is_some() {
        entry.active = resource.active;
    }

    if let Some(emails) = &resource.emails {
        entry.mail = emails
            .iter()
            .map(|e| MailValue {
                value: e.value.clone(),
                kind: e.email_type.clone(),
                primary: e.primary,
            })
            .collect();
    }

    if let Some(phones) = &resource.phone_numbers {
        entry.telephone_numbers = phones
            .iter()
            .map(|p| PhoneValue {
                value: p.value.clone(),
                kind: p.phone_type.clone(),
            })
            .collect();
    }

    for (key, value) in &resource.extensions {
        entry.extensions.insert(key.clone(), value.clone());
    }
}

/// Common name derived from given and family name: the non-blank parts
/// joined by a single space.
pub fn common_name(given: Option<&str>, family: Option<&str>) -> Option<String> {
    let parts: Vec<&str> = [given, family]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    (!parts.is_empty()).then(|| parts.join(" "))
}

/// Convert a person entry to its resource representation.
///
/// Group references carry the group identifier only; display labels need a
/// directory lookup and are filled in by the provisioning service.
pub fn to_resource(entry: &PersonEntry) -> ScimUser {
    let has_name = entry.given_name.is_some()
        || entry.family_name.is_some()
        || entry.middle_name.is_some()
        || entry.honorific_prefix.is_some()
        || entry.honorific_suffix.is_some();

    let name = has_name.then(|| ScimName {
        formatted: entry.common_name.clone(),
        family_name: entry.family_name.clone(),
        given_name: entry.given_name.clone(),
        middle_name: entry.middle_name.clone(),
        honorific_prefix: entry.honorific_prefix.clone(),
        honorific_suffix: entry.honorific_suffix.clone(),
    });

    let emails = (!entry.mail.is_empty()).then(|| {
        entry
            .mail
            .iter()
            .map(|m| ScimEmail {
                value: m.value.clone(),
                email_type: m.kind.clone(),
                primary: m.primary,
            })
            .collect()
    });

    let phone_numbers = (!entry.telephone_numbers.is_empty()).then(|| {
        entry
            .telephone_numbers
            .iter()
            .map(|p| ScimPhoneNumber {
                value: p.value.clone(),
                phone_type: p.kind.clone(),
            })
            .collect()
    });

    let groups = (!entry.member_of.is_empty()).then(|| {
        entry
            .member_of
            .iter()
            .map(|dn| ScimGroupRef::new(inum_from_dn(dn).unwrap_or(dn.as_str())))
            .collect()
    });

    let mut schemas = vec![SCHEMA_USER.to_string()];
    schemas.extend(
        entry
            .extensions
            .keys()
            .filter(|k| k.starts_with("urn:"))
            .cloned(),
    );

    ScimUser {
        schemas,
        id: (!entry.inum.is_empty()).then(|| entry.inum.clone()),
        external_id: entry.external_id.clone(),
        user_name: entry.uid.clone(),
        password: None,
        name,
        display_name: entry.display_name.clone(),
        nick_name: entry.nickname.clone(),
        title: entry.title.clone(),
        user_type: entry.user_type.clone(),
        preferred_language: entry.preferred_language.clone(),
        locale: entry.locale.clone(),
        timezone: entry.timezone.clone(),
        active: entry.active,
        emails,
        phone_numbers,
        groups,
        meta: Some(ScimMeta::user(entry.created, entry.last_modified)),
        extensions: entry.extensions.clone(),
    }
}

/// Directory attribute searched for a SCIM attribute name.
///
/// SCIM names are matched case-insensitively; anything unrecognised is
/// taken to be a directory attribute name already.
pub fn directory_attribute_for(name: &str) -> &str {
    match name.to_ascii_lowercase().as_str() {
        "id" => "inum",
        "username" => "uid",
        "externalid" => "externalId",
        "name.givenname" | "givenname" => "givenName",
        "name.familyname" | "familyname" => "sn",
        "name.middlename" => "middleName",
        "name.honorificprefix" => "honorificPrefix",
        "name.honorificsuffix" => "honorificSuffix",
        "name" | "name.formatted" => "cn",
        "displayname" => "displayName",
        "nickname" => "nickname",
        "usertype" => "userType",
        "preferredlanguage" => "preferredLanguage",
        "timezone" => "zoneinfo",
        "emails" | "emails.value" => "mail",
        "phonenumbers" | "phonenumbers.value" => "telephoneNumber",
        "groups" | "groups.value" => "memberOf",
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn stored_alice() -> PersonEntry {
        let now = Utc::now();
        PersonEntry {
            dn: "inum=@!1111!0000!AAAA,ou=people,o=@!1111,o=gluu".to_string(),
            inum: "@!1111!0000!AAAA".to_string(),
            iname: "@!example*person*alice".to_string(),
            uid: "alice".to_string(),
            external_id: Some("hr-1001".to_string()),
            given_name: Some("Alice".to_string()),
            family_name: Some("Liddell".to_string()),
            common_name: Some("Alice Liddell".to_string()),
            display_name: Some("Alice L.".to_string()),
            title: Some("Engineer".to_string()),
            active: Some(true),
            mail: vec![MailValue {
                value: "alice@example.com".to_string(),
                kind: Some("work".to_string()),
                primary: Some(true),
            }],
            telephone_numbers: vec![PhoneValue {
                value: "+1 555 0100".to_string(),
                kind: Some("mobile".to_string()),
            }],
            member_of: ["inum=G1,ou=groups,o=@!1111,o=gluu".to_string()].into(),
            extensions: BTreeMap::from([(
                "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User".to_string(),
                json!({"employeeNumber": "42"}),
            )]),
            created: Some(now),
            last_modified: Some(now),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_mode_requires_user_name() {
        let resource = ScimUser {
            display_name: Some("Nobody".to_string()),
            ..Default::default()
        };
        assert_eq!(
            to_directory_entry(&resource, None),
            Err(MappingError::MissingUserName)
        );
        assert_eq!(
            to_directory_entry(&ScimUser::new("   "), None),
            Err(MappingError::MissingUserName)
        );
    }

    #[test]
    fn test_create_mode_leaves_identity_unset() {
        let resource = ScimUser {
            id: Some("client-chosen".to_string()),
            name: Some(ScimName::from_names("Alice", "Liddell")),
            groups: Some(vec![ScimGroupRef::new("G1")]),
            ..ScimUser::new("alice")
        };

        let entry = to_directory_entry(&resource, None).unwrap();
        assert!(entry.inum.is_empty());
        assert!(entry.dn.is_empty());
        assert!(entry.iname.is_empty());
        assert!(entry.member_of.is_empty());
        assert_eq!(entry.uid, "alice");
        assert_eq!(entry.common_name.as_deref(), Some("Alice Liddell"));
    }

    #[test]
    fn test_password_is_stored_but_never_returned() {
        let resource: ScimUser =
            serde_json::from_value(json!({"userName": "bob", "password": "hunter2"})).unwrap();
        assert!(resource.extensions.is_empty());

        let entry = to_directory_entry(&resource, None).unwrap();
        assert_eq!(entry.user_password.as_deref(), Some("hunter2"));

        let rendered = serde_json::to_value(to_resource(&entry)).unwrap();
        assert!(rendered.get("password").is_none());
        assert_eq!(rendered["userName"], "bob");

        // An update without a password keeps the stored one.
        let merged = to_directory_entry(&ScimUser::new("bob"), Some(&entry)).unwrap();
        assert_eq!(merged.user_password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_merge_mode_preserves_identity() {
        let existing = stored_alice();
        let resource = ScimUser {
            id: Some("something-else".to_string()),
            title: Some("Manager".to_string()),
            groups: Some(vec![]),
            ..ScimUser::new("alice2")
        };

        let merged = to_directory_entry(&resource, Some(&existing)).unwrap();
        assert_eq!(merged.dn, existing.dn);
        assert_eq!(merged.inum, existing.inum);
        assert_eq!(merged.iname, existing.iname);
        assert_eq!(merged.member_of, existing.member_of);
        assert_eq!(merged.created, existing.created);
        assert_eq!(merged.uid, "alice2");
        assert_eq!(merged.title.as_deref(), Some("Manager"));
    }

    #[test]
    fn test_merge_mode_keeps_absent_attributes() {
        let existing = stored_alice();
        let resource = ScimUser {
            display_name: Some("Alice".to_string()),
            ..Default::default()
        };

        let merged = to_directory_entry(&resource, Some(&existing)).unwrap();
        assert_eq!(merged.uid, "alice");
        assert_eq!(merged.display_name.as_deref(), Some("Alice"));
        assert_eq!(merged.external_id, existing.external_id);
        assert_eq!(merged.mail, existing.mail);
        assert_eq!(merged.telephone_numbers, existing.telephone_numbers);
        assert_eq!(merged.extensions, existing.extensions);
    }

    #[test]
    fn test_merge_mode_recomputes_common_name() {
        let existing = stored_alice();
        let resource = ScimUser {
            name: Some(ScimName {
                family_name: Some("Hargreaves".to_string()),
                formatted: Some("ignored".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let merged = to_directory_entry(&resource, Some(&existing)).unwrap();
        assert_eq!(merged.given_name.as_deref(), Some("Alice"));
        assert_eq!(merged.common_name.as_deref(), Some("Alice Hargreaves"));
    }

    #[test]
    fn test_merge_replaces_multi_valued_attributes_when_present() {
        let existing = stored_alice();
        let resource = ScimUser {
            emails: Some(vec![]),
            ..Default::default()
        };

        let merged = to_directory_entry(&resource, Some(&existing)).unwrap();
        assert!(merged.mail.is_empty());
        assert_eq!(merged.telephone_numbers, existing.telephone_numbers);
    }

    #[test]
    fn test_blank_multi_valued_values_are_rejected() {
        let resource = ScimUser {
            emails: Some(vec![ScimEmail::work_primary(" ")]),
            ..ScimUser::new("alice")
        };
        assert!(matches!(
            to_directory_entry(&resource, None),
            Err(MappingError::InvalidValue(msg)) if msg.contains("emails[0]")
        ));

        let resource = ScimUser {
            groups: Some(vec![ScimGroupRef::new("")]),
            ..ScimUser::new("alice")
        };
        assert!(matches!(
            to_directory_entry(&resource, None),
            Err(MappingError::InvalidValue(msg)) if msg.contains("groups[0]")
        ));
    }

    #[rstest]
    #[case(Some("Alice"), Some("Liddell"), Some("Alice Liddell"))]
    #[case(Some("Alice"), None, Some("Alice"))]
    #[case(None, Some("Liddell"), Some("Liddell"))]
    #[case(Some("  "), Some("Liddell"), Some("Liddell"))]
    #[case(None, None, None)]
    fn test_common_name(
        #[case] given: Option<&str>,
        #[case] family: Option<&str>,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(common_name(given, family).as_deref(), expected);
    }

    #[test]
    fn test_to_resource_maps_absent_attributes_to_absent_fields() {
        let entry = PersonEntry {
            inum: "X".to_string(),
            uid: "bare".to_string(),
            ..Default::default()
        };

        let resource = to_resource(&entry);
        assert_eq!(resource.id.as_deref(), Some("X"));
        assert_eq!(resource.user_name, "bare");
        assert!(resource.name.is_none());
        assert!(resource.emails.is_none());
        assert!(resource.phone_numbers.is_none());
        assert!(resource.groups.is_none());
        assert!(resource.active.is_none());
        assert_eq!(resource.schemas, vec![SCHEMA_USER.to_string()]);
    }

    #[test]
    fn test_to_resource_group_references() {
        let resource = to_resource(&stored_alice());
        let groups = resource.groups.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].value, "G1");
        assert_eq!(
            resource.schemas,
            vec![
                SCHEMA_USER.to_string(),
                "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User".to_string()
            ]
        );
    }

    #[test]
    fn test_round_trip_through_create_mode() {
        let mut entry = stored_alice();
        entry.member_of.clear();
        let original = to_resource(&entry);

        let remapped = to_resource(&to_directory_entry(&original, None).unwrap());

        // Identity and metadata are server-assigned and not carried by create mode.
        let strip = |mut r: ScimUser| {
            r.id = None;
            r.meta = None;
            r
        };
        assert_eq!(strip(remapped), strip(original));
    }

    #[test]
    fn test_round_trip_through_merge_mode() {
        let entry = stored_alice();
        let original = to_resource(&entry);

        let remapped = to_resource(&to_directory_entry(&original, Some(&entry)).unwrap());
        assert_eq!(remapped, original);
    }

    #[rstest]
    #[case("userName", "uid")]
    #[case("USERNAME", "uid")]
    #[case("id", "inum")]
    #[case("name.familyName", "sn")]
    #[case("emails.value", "mail")]
    #[case("timezone", "zoneinfo")]
    #[case("uid", "uid")]
    #[case("mail", "mail")]
    #[case("customAttr", "customAttr")]
    fn test_directory_attribute_for(#[case] scim: &str, #[case] directory: &str) {
        assert_eq!(directory_attribute_for(scim), directory);
    }
}
