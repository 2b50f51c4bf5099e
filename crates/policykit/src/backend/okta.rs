//! HTTP backend for the Okta management API.
//!
//! Blocking `ureq` agent, `SSWS` token auth, `Link` header pagination.
//!
//! # Example
//!
//! ```no_run
//! use policykit::backend::okta::OktaBackend;
//! use policykit::backend::PolicyApi;
//! use policykit::{CancelToken, PolicyType};
//!
//! let backend = OktaBackend::new("https://example.okta.com", "00token");
//! let page = backend
//!     .list_policies(&CancelToken::new(), Some(PolicyType::Password))
//!     .unwrap();
//! println!("{} policies on the first page", page.items.len());
//! ```

use super::{GroupSearch, PolicyApi};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::types::{Cursor, Group, Page, Policy, PolicyTemplate, PolicyType};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("polsync/", env!("CARGO_PKG_VERSION"));

/// Okta management API backend.
pub struct OktaBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Org base URL, without trailing slash.
    base_url: String,
    /// API token.
    token: String,
}

impl fmt::Debug for OktaBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OktaBackend")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl OktaBackend {
    /// Create a backend with the default timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT)
    }

    /// Create a backend with a global per-request timeout.
    #[must_use]
    pub fn with_timeout(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Org base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn policies_url(&self, policy_type: Option<PolicyType>) -> String {
        match policy_type {
            Some(t) => format!("{}/api/v1/policies?type={}", self.base_url, t),
            None => format!("{}/api/v1/policies", self.base_url),
        }
    }

    fn policy_url(&self, id: &str) -> String {
        format!("{}/api/v1/policies/{}", self.base_url, id)
    }

    fn lifecycle_url(&self, id: &str, action: &str) -> String {
        format!("{}/api/v1/policies/{}/lifecycle/{}", self.base_url, id, action)
    }

    fn groups_url(&self, query: &str) -> String {
        format!(
            "{}/api/v1/groups?q={}",
            self.base_url,
            urlencoding::encode(query)
        )
    }

    /// Whether `link` points at the configured org: same scheme, host and
    /// port, and no credentials of its own.
    fn is_org_url(&self, link: &str) -> bool {
        match (Url::parse(&self.base_url), Url::parse(link)) {
            (Ok(base), Ok(link)) => {
                base.origin() == link.origin()
                    && link.username().is_empty()
                    && link.password().is_none()
            }
            _ => false,
        }
    }

    fn authorization(&self) -> String {
        format!("SSWS {}", self.token)
    }

    fn get_page(&self, url: &str, operation: &str, target: &str) -> Result<Page<Policy>> {
        let mut response = self
            .agent
            .get(url)
            .header("Authorization", &self.authorization())
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| Error::from_ureq(e, operation, target))?;

        let next = response
            .headers()
            .get_all("link")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(parse_next_link)
            .map(Cursor::new);
        let items: Vec<Policy> = read_body(response.body_mut())?;
        Ok(Page { items, next })
    }

    fn lifecycle(&self, cancel: &CancelToken, id: &str, action: &str) -> Result<()> {
        let operation = format!("{action} policy");
        cancel.check(&operation)?;
        self.agent
            .post(&self.lifecycle_url(id, action))
            .header("Authorization", &self.authorization())
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .send_empty()
            .map_err(|e| Error::from_ureq(e, &operation, id))?;
        Ok(())
    }
}

impl PolicyApi for OktaBackend {
    fn list_policies(
        &self,
        cancel: &CancelToken,
        policy_type: Option<PolicyType>,
    ) -> Result<Page<Policy>> {
        cancel.check("list policies")?;
        let target = policy_type.map_or("all", |t| t.as_str());
        self.get_page(&self.policies_url(policy_type), "list policies", target)
    }

    fn next_page(&self, cancel: &CancelToken, cursor: &Cursor) -> Result<Page<Policy>> {
        cancel.check("list policies")?;
        // The token is only ever sent to the configured org.
        if !self.is_org_url(cursor.as_str()) {
            return Err(Error::InvalidResponse(format!(
                "next page link {} is outside {}",
                cursor.as_str(),
                self.base_url
            )));
        }
        self.get_page(cursor.as_str(), "list policies", cursor.as_str())
    }

    fn get_policy(&self, cancel: &CancelToken, id: &str) -> Result<Policy> {
        cancel.check("get policy")?;
        let mut response = self
            .agent
            .get(&self.policy_url(id))
            .header("Authorization", &self.authorization())
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| Error::from_ureq(e, "get policy", id))?;
        read_body(response.body_mut())
    }

    fn create_policy(&self, cancel: &CancelToken, template: &PolicyTemplate) -> Result<Policy> {
        cancel.check("create policy")?;
        // Lifecycle calls own activation, so the policy is created inactive.
        let url = format!("{}?activate=false", self.policies_url(None));
        let mut response = self
            .agent
            .post(&url)
            .header("Authorization", &self.authorization())
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .send_json(template)
            .map_err(|e| Error::from_ureq(e, "create policy", &template.name))?;
        read_body(response.body_mut())
    }

    fn update_policy(
        &self,
        cancel: &CancelToken,
        id: &str,
        template: &PolicyTemplate,
    ) -> Result<Policy> {
        cancel.check("update policy")?;
        let mut response = self
            .agent
            .put(&self.policy_url(id))
            .header("Authorization", &self.authorization())
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .send_json(template)
            .map_err(|e| Error::from_ureq(e, "update policy", id))?;
        read_body(response.body_mut())
    }

    fn delete_policy(&self, cancel: &CancelToken, id: &str) -> Result<()> {
        cancel.check("delete policy")?;
        self.agent
            .delete(&self.policy_url(id))
            .header("Authorization", &self.authorization())
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| Error::from_ureq(e, "delete policy", id))?;
        Ok(())
    }

    fn activate_policy(&self, cancel: &CancelToken, id: &str) -> Result<()> {
        self.lifecycle(cancel, id, "activate")
    }

    fn deactivate_policy(&self, cancel: &CancelToken, id: &str) -> Result<()> {
        self.lifecycle(cancel, id, "deactivate")
    }
}

impl GroupSearch for OktaBackend {
    fn list_groups(&self, cancel: &CancelToken, query: &str) -> Result<Vec<Group>> {
        cancel.check("list groups")?;
        let mut response = self
            .agent
            .get(&self.groups_url(query))
            .header("Authorization", &self.authorization())
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| Error::from_ureq(e, "list groups", query))?;
        let groups: Vec<OktaGroup> = read_body(response.body_mut())?;
        Ok(groups.into_iter().map(Into::into).collect())
    }
}

fn read_body<T: DeserializeOwned>(body: &mut ureq::Body) -> Result<T> {
    body.read_json()
        .map_err(|e| Error::InvalidResponse(e.to_string()))
}

/// Extract the `rel="next"` target from a `Link` header value.
fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            param == r#"rel="next""# || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

// =============================================================================
// Okta API response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct OktaGroup {
    id: String,
    profile: OktaGroupProfile,
}

#[derive(Debug, Deserialize)]
struct OktaGroupProfile {
    name: String,
}

impl From<OktaGroup> for Group {
    fn from(g: OktaGroup) -> Self {
        Self {
            id: g.id,
            name: g.profile.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policies_url() {
        let backend = OktaBackend::new("https://example.okta.com/", "t");
        assert_eq!(
            backend.policies_url(Some(PolicyType::Password)),
            "https://example.okta.com/api/v1/policies?type=PASSWORD"
        );
        assert_eq!(
            backend.policies_url(None),
            "https://example.okta.com/api/v1/policies"
        );
    }

    #[test]
    fn test_policy_and_lifecycle_urls() {
        let backend = OktaBackend::new("https://example.okta.com", "t");
        assert_eq!(
            backend.policy_url("00p1"),
            "https://example.okta.com/api/v1/policies/00p1"
        );
        assert_eq!(
            backend.lifecycle_url("00p1", "activate"),
            "https://example.okta.com/api/v1/policies/00p1/lifecycle/activate"
        );
    }

    #[test]
    fn test_groups_url_encodes_query() {
        let backend = OktaBackend::new("https://example.okta.com", "t");
        assert_eq!(
            backend.groups_url("Everyone Else"),
            "https://example.okta.com/api/v1/groups?q=Everyone%20Else"
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let backend = OktaBackend::new("https://example.okta.com", "secret-token");
        let debug = format!("{backend:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("example.okta.com"));
    }

    #[test]
    fn test_parse_next_link() {
        let header = r#"<https://example.okta.com/api/v1/policies?type=PASSWORD>; rel="self", <https://example.okta.com/api/v1/policies?after=00p9&type=PASSWORD>; rel="next""#;
        assert_eq!(
            parse_next_link(header).as_deref(),
            Some("https://example.okta.com/api/v1/policies?after=00p9&type=PASSWORD")
        );
    }

    #[test]
    fn test_parse_next_link_absent() {
        let header = r#"<https://example.okta.com/api/v1/policies>; rel="self""#;
        assert_eq!(parse_next_link(header), None);
        assert_eq!(parse_next_link(""), None);
    }

    #[test]
    fn test_next_page_rejects_foreign_cursor() {
        let backend = OktaBackend::new("https://example.okta.com", "t");
        let err = backend
            .next_page(
                &CancelToken::new(),
                &Cursor::new("https://attacker.example/api/v1/policies"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn test_next_page_rejects_look_alike_hosts() {
        let backend = OktaBackend::new("https://example.okta.com", "t");
        for link in [
            "https://example.okta.com.attacker.invalid/api/v1/policies?after=x",
            "https://example.okta.com@attacker.invalid/api/v1/policies?after=x",
            "http://example.okta.com/api/v1/policies?after=x",
            "https://example.okta.com:8443/api/v1/policies?after=x",
            "not a url",
        ] {
            let err = backend
                .next_page(&CancelToken::new(), &Cursor::new(link))
                .unwrap_err();
            assert!(
                matches!(err, Error::InvalidResponse(_)),
                "{link} was not rejected: {err:?}"
            );
        }
    }

    #[test]
    fn test_org_url_accepts_same_origin() {
        let backend = OktaBackend::new("https://example.okta.com/", "t");
        assert!(backend.is_org_url("https://example.okta.com/api/v1/policies?after=00p9"));
        assert!(backend.is_org_url("https://EXAMPLE.okta.com:443/api/v1/policies"));
        assert!(!backend.is_org_url("https://user:pw@example.okta.com/api/v1/policies"));
    }

    #[test]
    fn test_groups_url_encodes_reserved_characters() {
        let backend = OktaBackend::new("https://example.okta.com", "t");
        assert_eq!(
            backend.groups_url("R&D=1"),
            "https://example.okta.com/api/v1/groups?q=R%26D%3D1"
        );
    }

    #[test]
    fn test_cancelled_before_request() {
        let backend = OktaBackend::new("https://example.okta.com", "t");
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = backend.get_policy(&cancel, "00p1").unwrap_err();
        assert!(matches!(err, Error::Cancelled { .. }));
    }

    #[test]
    fn test_group_conversion() {
        let group: OktaGroup = serde_json::from_str(
            r#"{"id": "00g1", "type": "BUILT_IN", "profile": {"name": "Everyone", "description": "All users"}}"#,
        )
        .unwrap();
        let group: Group = group.into();
        assert_eq!(group.id, "00g1");
        assert_eq!(group.name, "Everyone");
    }
}
