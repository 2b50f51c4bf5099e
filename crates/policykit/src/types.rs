//! Core types shared by the remote client, the engine and the synchronizer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Kind of policy, as tagged by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyType {
    /// Global session (sign-on) policy.
    OktaSignOn,
    /// Password policy.
    Password,
    /// Authenticator enrollment policy.
    MfaEnroll,
    /// Authentication (app sign-on) policy, Identity Engine only.
    AccessPolicy,
    /// Identity provider routing rules.
    IdpDiscovery,
    /// User profile enrollment policy.
    ProfileEnrollment,
    /// Post-authentication session policy.
    PostAuthSession,
    /// Entity risk policy.
    EntityRisk,
}

impl PolicyType {
    /// Wire name of this policy type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OktaSignOn => "OKTA_SIGN_ON",
            Self::Password => "PASSWORD",
            Self::MfaEnroll => "MFA_ENROLL",
            Self::AccessPolicy => "ACCESS_POLICY",
            Self::IdpDiscovery => "IDP_DISCOVERY",
            Self::ProfileEnrollment => "PROFILE_ENROLLMENT",
            Self::PostAuthSession => "POST_AUTH_SESSION",
            Self::EntityRisk => "ENTITY_RISK",
        }
    }

    /// All known policy types.
    pub fn all() -> &'static [PolicyType] {
        &[
            Self::OktaSignOn,
            Self::Password,
            Self::MfaEnroll,
            Self::AccessPolicy,
            Self::IdpDiscovery,
            Self::ProfileEnrollment,
            Self::PostAuthSession,
            Self::EntityRisk,
        ]
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_").to_ascii_uppercase();
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown policy type: {s}"))
    }
}

/// Policy status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyStatus {
    /// The policy is evaluated.
    #[default]
    Active,
    /// The policy exists but is not evaluated.
    Inactive,
    /// A status this tool does not manage.
    #[serde(other)]
    Unknown,
}

impl PolicyStatus {
    /// Wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            _ => Err(format!("invalid status {s:?}, expected ACTIVE or INACTIVE")),
        }
    }
}

/// Group inclusion part of a people condition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupCondition {
    /// Group identifiers the policy applies to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
}

/// People condition of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PeopleCondition {
    /// Group membership restriction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<GroupCondition>,
}

/// Conditions attached to a policy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PolicyConditions {
    /// People condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub people: Option<PeopleCondition>,
}

impl PolicyConditions {
    /// Build a condition restricting the policy to the given groups.
    pub fn including_groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            people: Some(PeopleCondition {
                groups: Some(GroupCondition {
                    include: groups.into_iter().map(Into::into).collect(),
                }),
            }),
        }
    }

    /// Included group ids, if the condition carries a non-empty inclusion list.
    pub fn included_groups(&self) -> Option<BTreeSet<String>> {
        let include = &self.people.as_ref()?.groups.as_ref()?.include;
        if include.is_empty() {
            None
        } else {
            Some(include.iter().cloned().collect())
        }
    }
}

/// A policy as stored by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Server-assigned identifier.
    pub id: String,
    /// Policy name.
    pub name: String,
    /// Policy description.
    #[serde(default)]
    pub description: Option<String>,
    /// Current status.
    #[serde(default)]
    pub status: PolicyStatus,
    /// Evaluation order among policies of the same type.
    #[serde(default)]
    pub priority: Option<u32>,
    /// Whether this is the built-in default policy of its type.
    #[serde(default)]
    pub system: bool,
    /// Policy type.
    #[serde(rename = "type")]
    pub policy_type: PolicyType,
    /// Policy conditions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<PolicyConditions>,
}

impl Policy {
    /// Included group ids carried by the remote conditions, if any.
    pub fn included_groups(&self) -> Option<BTreeSet<String>> {
        self.conditions.as_ref()?.included_groups()
    }
}

/// Body of a create or update call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTemplate {
    /// Policy name.
    pub name: String,
    /// Policy description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Requested status.
    pub status: PolicyStatus,
    /// Requested priority; omitted to let the server decide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    /// Policy type.
    #[serde(rename = "type")]
    pub policy_type: PolicyType,
    /// Conditions; omitted when no group restriction is declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<PolicyConditions>,
}

/// A group returned by a group search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Group identifier.
    pub id: String,
    /// Group display name.
    pub name: String,
}

/// Opaque continuation token for a listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    /// Wrap a raw continuation token (a URL for the HTTP backend).
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page, in listing order.
    pub items: Vec<T>,
    /// Cursor for the next page, if there is one.
    pub next: Option<Cursor>,
}

impl<T> Page<T> {
    /// A page with no continuation.
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    /// Whether more pages follow.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_policy_type_parse() {
        assert_eq!("PASSWORD".parse::<PolicyType>(), Ok(PolicyType::Password));
        assert_eq!("okta-sign-on".parse::<PolicyType>(), Ok(PolicyType::OktaSignOn));
        assert_eq!(" mfa_enroll ".parse::<PolicyType>(), Ok(PolicyType::MfaEnroll));
        assert!("SOMETHING".parse::<PolicyType>().is_err());
    }

    #[test]
    fn test_policy_type_all_round_trips_through_as_str() {
        for t in PolicyType::all() {
            assert_eq!(t.as_str().parse::<PolicyType>(), Ok(*t));
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("active".parse::<PolicyStatus>(), Ok(PolicyStatus::Active));
        assert_eq!("INACTIVE".parse::<PolicyStatus>(), Ok(PolicyStatus::Inactive));
        assert!("DELETED".parse::<PolicyStatus>().is_err());
        assert_eq!(PolicyStatus::default(), PolicyStatus::Active);
    }

    #[test]
    fn test_unknown_remote_status_deserializes() {
        let status: PolicyStatus = serde_json::from_value(json!("DRAFT")).unwrap();
        assert_eq!(status, PolicyStatus::Unknown);
    }

    #[test]
    fn test_policy_deserialize_from_wire() {
        let policy: Policy = serde_json::from_value(json!({
            "id": "00p1",
            "name": "Default Policy",
            "description": "The default policy",
            "status": "ACTIVE",
            "priority": 1,
            "system": true,
            "type": "PASSWORD",
            "conditions": {"people": {"groups": {"include": ["00g1"]}}},
            "_links": {}
        }))
        .unwrap();

        assert_eq!(policy.id, "00p1");
        assert!(policy.system);
        assert_eq!(policy.priority, Some(1));
        assert_eq!(policy.policy_type, PolicyType::Password);
        assert_eq!(
            policy.included_groups(),
            Some(BTreeSet::from(["00g1".to_string()]))
        );
    }

    #[test]
    fn test_policy_deserialize_minimal() {
        let policy: Policy = serde_json::from_value(json!({
            "id": "00p2",
            "name": "Minimal",
            "type": "OKTA_SIGN_ON"
        }))
        .unwrap();

        assert!(!policy.system);
        assert_eq!(policy.priority, None);
        assert_eq!(policy.description, None);
        assert_eq!(policy.included_groups(), None);
    }

    #[test]
    fn test_empty_include_is_no_restriction() {
        let conditions = PolicyConditions::including_groups(Vec::<String>::new());
        assert_eq!(conditions.included_groups(), None);
        assert_eq!(PolicyConditions::default().included_groups(), None);
    }

    #[test]
    fn test_template_omits_absent_fields() {
        let template = PolicyTemplate {
            name: "MFA-Strict".to_string(),
            description: None,
            status: PolicyStatus::Active,
            priority: None,
            policy_type: PolicyType::MfaEnroll,
            conditions: None,
        };
        let value = serde_json::to_value(&template).unwrap();
        assert_eq!(
            value,
            json!({"name": "MFA-Strict", "status": "ACTIVE", "type": "MFA_ENROLL"})
        );
    }

    #[test]
    fn test_page_has_next() {
        let page = Page {
            items: vec![1, 2],
            next: Some(Cursor::new("https://example.okta.com/api/v1/policies?after=2")),
        };
        assert!(page.has_next());
        assert!(!Page::last(vec![3]).has_next());
    }
}
