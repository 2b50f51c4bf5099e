//! Synchronizing remote policy state into local records.

use crate::backend::{GroupSearch, PolicyApi};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::lookup::{self, EVERYONE_GROUP};
use crate::resource::PolicyResource;
use crate::types::{Policy, PolicyType};

/// Overwrite declared fields with the remote record.
///
/// Priority is only overwritten when the server reports one. Included groups
/// are only overwritten when the remote record carries a non-empty inclusion
/// condition; otherwise the local value is left as declared.
pub fn sync_from_upstream(resource: &mut PolicyResource, policy: &Policy) {
    resource.name = policy.name.clone();
    resource.description = policy.description.clone();
    resource.status = policy.status;
    if let Some(priority) = policy.priority {
        resource.priority = Some(priority);
    }
    if let Some(groups) = policy.included_groups() {
        resource.groups_included = Some(groups);
    }
}

/// Discover the system default policy of a type and bind `resource` to it.
///
/// Also resolves the id of the built-in "Everyone" group; it stays unset when
/// the org has no group with exactly that name.
pub fn set_default_policy(
    api: &dyn PolicyApi,
    groups: &dyn GroupSearch,
    cancel: &CancelToken,
    resource: &mut PolicyResource,
    policy_type: PolicyType,
) -> Result<Policy> {
    let policy = lookup::find_system_policy(api, cancel, policy_type)?;

    let everyone = lookup::find_group_by_name(groups, cancel, EVERYONE_GROUP).map_err(|e| {
        match e {
            Error::Transport {
                message, status, ..
            } => Error::transport(
                "find default group",
                format!("default {policy_type} policy"),
                message,
                status,
            ),
            other => other,
        }
    })?;
    match everyone {
        Some(group) => resource.default_included_group_id = Some(group.id),
        None => log::debug!("no {EVERYONE_GROUP:?} group, default group id left unset"),
    }

    resource.policy_type = policy_type;
    resource.mark_system_default();
    resource.name = policy.name.clone();
    resource.description = policy.description.clone();
    resource.status = policy.status;
    if let Some(priority) = policy.priority {
        resource.priority = Some(priority);
    }
    resource.set_id(policy.id.clone());
    log::debug!("default {policy_type} policy is {}", policy.id);
    Ok(policy)
}
