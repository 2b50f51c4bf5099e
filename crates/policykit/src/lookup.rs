//! Read-only searches over policies and groups.

use crate::backend::{GroupSearch, PolicyApi};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::search::Paginated;
use crate::types::{Group, Policy, PolicyType};

/// Name of the built-in group every user belongs to.
pub const EVERYONE_GROUP: &str = "Everyone";

/// Walk every policy of a type and return the first matching one.
fn find_policy<P>(
    api: &dyn PolicyApi,
    cancel: &CancelToken,
    policy_type: PolicyType,
    criteria: impl FnOnce() -> String,
    predicate: P,
) -> Result<Policy>
where
    P: FnMut(&Policy) -> bool,
{
    let first = api.list_policies(cancel, Some(policy_type))?;
    let mut search = Paginated::new(first, |cursor| api.next_page(cancel, cursor));
    match search.find_first(predicate)? {
        Some(policy) => Ok(policy),
        None => Err(Error::LookupExhausted {
            policy_type,
            criteria: criteria(),
            pages: search.pages(),
        }),
    }
}

/// Find the system default policy of a type, regardless of its name.
pub fn find_system_policy(
    api: &dyn PolicyApi,
    cancel: &CancelToken,
    policy_type: PolicyType,
) -> Result<Policy> {
    log::debug!("looking up default {policy_type} policy");
    find_policy(
        api,
        cancel,
        policy_type,
        || "system=true".to_string(),
        |p| p.system,
    )
}

/// Find a policy of a type by exact name. First match in listing order wins.
pub fn find_policy_by_name(
    api: &dyn PolicyApi,
    cancel: &CancelToken,
    policy_type: PolicyType,
    name: &str,
) -> Result<Policy> {
    log::debug!("looking up {policy_type} policy {name:?}");
    find_policy(
        api,
        cancel,
        policy_type,
        || format!("name {name:?}"),
        |p| p.name == name,
    )
}

/// Find the default authentication policy.
///
/// `ACCESS_POLICY` only exists on Identity Engine orgs, so a classic org
/// yields `None` without a remote call.
pub fn find_default_access_policy(
    api: &dyn PolicyApi,
    cancel: &CancelToken,
    classic_org: bool,
) -> Result<Option<Policy>> {
    if classic_org {
        return Ok(None);
    }
    find_system_policy(api, cancel, PolicyType::AccessPolicy).map(Some)
}

/// Find a group by exact name. The server search is a prefix match.
pub fn find_group_by_name(
    groups: &dyn GroupSearch,
    cancel: &CancelToken,
    name: &str,
) -> Result<Option<Group>> {
    Ok(groups
        .list_groups(cancel, name)?
        .into_iter()
        .find(|g| g.name == name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Call, MockBackend, MockOp};
    use crate::types::PolicyStatus;

    fn custom(id: &str, name: &str, policy_type: PolicyType) -> Policy {
        Policy {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            status: PolicyStatus::Active,
            priority: None,
            system: false,
            policy_type,
            conditions: None,
        }
    }

    #[test]
    fn test_find_system_policy() {
        let mock = MockBackend::new();
        mock.add_policy(custom("00pA", "Custom", PolicyType::Password));
        mock.add_policy(Policy {
            system: true,
            ..custom("00pD", "Default Policy", PolicyType::Password)
        });

        let found = find_system_policy(&mock, &CancelToken::new(), PolicyType::Password).unwrap();
        assert_eq!(found.id, "00pD");
    }

    #[test]
    fn test_find_system_policy_missing_is_exhausted() {
        let mock = MockBackend::new();
        mock.add_policy(custom("00pA", "Custom", PolicyType::Password));

        let err = find_system_policy(&mock, &CancelToken::new(), PolicyType::Password).unwrap_err();
        assert!(matches!(
            err,
            Error::LookupExhausted {
                policy_type: PolicyType::Password,
                ..
            }
        ));
    }

    #[test]
    fn test_find_by_name_across_pages() {
        let mock = MockBackend::new();
        mock.set_page_size(2);
        for i in 0..7 {
            mock.add_policy(custom(&format!("00p{i}"), &format!("policy-{i}"), PolicyType::Password));
        }

        let found =
            find_policy_by_name(&mock, &CancelToken::new(), PolicyType::Password, "policy-5").unwrap();
        assert_eq!(found.id, "00p5");
        // Three pages were needed: [0,1] [2,3] [4,5].
        let next_pages = mock
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::NextPage(_)))
            .count();
        assert_eq!(next_pages, 2);
    }

    #[test]
    fn test_find_by_name_first_match_wins() {
        let mock = MockBackend::new();
        mock.set_page_size(1);
        mock.add_policy(custom("00p1", "dup", PolicyType::Password));
        mock.add_policy(custom("00p2", "dup", PolicyType::Password));

        let found =
            find_policy_by_name(&mock, &CancelToken::new(), PolicyType::Password, "dup").unwrap();
        assert_eq!(found.id, "00p1");
    }

    #[test]
    fn test_find_by_name_ignores_other_types() {
        let mock = MockBackend::new();
        mock.add_policy(custom("00p1", "Strict", PolicyType::MfaEnroll));

        let err = find_policy_by_name(&mock, &CancelToken::new(), PolicyType::Password, "Strict")
            .unwrap_err();
        assert!(matches!(err, Error::LookupExhausted { pages: 1, .. }));
    }

    #[test]
    fn test_find_by_name_exhausts_all_pages() {
        let mock = MockBackend::new();
        mock.set_page_size(3);
        for i in 0..10 {
            mock.add_policy(custom(&format!("00p{i}"), &format!("policy-{i}"), PolicyType::Password));
        }

        let err = find_policy_by_name(&mock, &CancelToken::new(), PolicyType::Password, "missing")
            .unwrap_err();
        match err {
            Error::LookupExhausted { pages, criteria, .. } => {
                assert_eq!(pages, 4);
                assert!(criteria.contains("missing"));
            }
            other => panic!("Expected LookupExhausted, got {other:?}"),
        }
    }

    #[test]
    fn test_list_failure_propagates() {
        let mock = MockBackend::with_system_defaults();
        mock.fail_on(MockOp::List, Some(503));

        let err = find_system_policy(&mock, &CancelToken::new(), PolicyType::Password).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_default_access_policy_classic_org_skips_lookup() {
        let mock = MockBackend::with_system_defaults();
        let found = find_default_access_policy(&mock, &CancelToken::new(), true).unwrap();
        assert!(found.is_none());
        assert!(mock.calls().is_empty());

        let found = find_default_access_policy(&mock, &CancelToken::new(), false).unwrap();
        assert_eq!(found.map(|p| p.policy_type), Some(PolicyType::AccessPolicy));
    }

    #[test]
    fn test_find_group_by_exact_name() {
        let mock = MockBackend::new();
        mock.add_group("00gEC", "Everyone Contractors");
        mock.add_group("00gE", EVERYONE_GROUP);

        let group = find_group_by_name(&mock, &CancelToken::new(), EVERYONE_GROUP).unwrap();
        assert_eq!(group.map(|g| g.id).as_deref(), Some("00gE"));

        let missing = find_group_by_name(&mock, &CancelToken::new(), "Nobody").unwrap();
        assert!(missing.is_none());
    }
}
