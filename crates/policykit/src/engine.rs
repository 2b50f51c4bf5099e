//! Policy lifecycle engine.
//!
//! Create, read, update and delete one policy against the remote service,
//! keeping the local record's identity in step with what the server holds:
//!
//! - `Unbound -> Bound` on create or default discovery
//! - `Bound -> Unbound` on delete, or when a read finds the policy gone
//!
//! Writes are followed by priority reconciliation and then by activation
//! reconciliation. A priority conflict is reported after activation has been
//! attempted, and wins over an activation failure.

use crate::backend::{GroupSearch, PolicyApi};
use crate::cancel::CancelToken;
use crate::error::{Error, Mutation, Result};
use crate::lookup;
use crate::priority;
use crate::resource::PolicyResource;
use crate::sync;
use crate::types::{Policy, PolicyStatus, PolicyType};
use std::sync::Arc;

/// Lifecycle engine over an injected remote client and group search.
#[derive(Clone)]
pub struct PolicyEngine {
    policies: Arc<dyn PolicyApi>,
    groups: Arc<dyn GroupSearch>,
}

impl PolicyEngine {
    /// Create an engine from separate collaborators.
    pub fn new(policies: Arc<dyn PolicyApi>, groups: Arc<dyn GroupSearch>) -> Self {
        Self { policies, groups }
    }

    /// Create an engine from one backend serving both policies and groups.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: PolicyApi + GroupSearch + 'static,
    {
        Self {
            policies: backend.clone(),
            groups: backend,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create the declared policy and bind the record to it.
    ///
    /// The identity is recorded as soon as the server answers, so the record
    /// stays bound even when priority or activation reconciliation fails.
    pub fn create(&self, cancel: &CancelToken, resource: &mut PolicyResource) -> Result<Policy> {
        resource.ensure_not_default(Mutation::Create)?;
        log::info!(
            "creating policy name={:?} type={}",
            resource.name,
            resource.policy_type
        );

        let template = resource.template();
        let policy = self.policies.create_policy(cancel, &template)?;
        resource.set_id(policy.id.clone());

        let priority = priority::reconcile(template.priority, policy.priority, &policy.id);
        self.finish_write(cancel, resource, priority)?;
        Ok(policy)
    }

    /// Refresh the record from the server.
    ///
    /// An unbound record is left alone. A policy that no longer exists
    /// unbinds the record and yields `Ok(None)`.
    pub fn read(&self, cancel: &CancelToken, resource: &mut PolicyResource) -> Result<Option<Policy>> {
        let Some(id) = resource.id().map(str::to_string) else {
            return Ok(None);
        };
        log::info!("getting policy id={id}");

        match self.policies.get_policy(cancel, &id) {
            Ok(policy) => {
                sync::sync_from_upstream(resource, &policy);
                Ok(Some(policy))
            }
            Err(e) if e.is_not_found() => {
                log::debug!("policy {id} is gone, unbinding {:?}", resource.name);
                resource.clear_id();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Push the declared attributes to the bound policy.
    pub fn update(&self, cancel: &CancelToken, resource: &mut PolicyResource) -> Result<Policy> {
        resource.ensure_not_default(Mutation::Update)?;
        let id = resource.require_id("update")?.to_string();
        log::info!("updating policy name={:?} id={id}", resource.name);

        let template = resource.template();
        let policy = self.policies.update_policy(cancel, &id, &template)?;

        let priority = priority::reconcile(template.priority, policy.priority, &id);
        self.finish_write(cancel, resource, priority)?;
        Ok(policy)
    }

    /// Delete the bound policy and unbind the record.
    pub fn delete(&self, cancel: &CancelToken, resource: &mut PolicyResource) -> Result<()> {
        resource.ensure_not_default(Mutation::Delete)?;
        let id = resource.require_id("delete")?.to_string();
        log::info!("deleting policy name={:?} id={id}", resource.name);

        self.policies.delete_policy(cancel, &id)?;
        resource.clear_id();
        Ok(())
    }

    /// Activation reconciliation, then the priority verdict.
    fn finish_write(
        &self,
        cancel: &CancelToken,
        resource: &PolicyResource,
        priority: Result<()>,
    ) -> Result<()> {
        let activation = self.reconcile_status(cancel, resource);
        match (priority, activation) {
            (Err(conflict), Err(activation)) => {
                log::warn!("{activation}");
                Err(conflict)
            }
            (Err(conflict), Ok(())) => Err(conflict),
            (Ok(()), activation) => activation,
        }
    }

    /// Activate or deactivate according to the declared status.
    fn reconcile_status(&self, cancel: &CancelToken, resource: &PolicyResource) -> Result<()> {
        let id = resource.require_id("change status")?;
        log::info!("changing policy's status id={id} status={}", resource.status);

        match resource.status {
            PolicyStatus::Active => {
                self.policies
                    .activate_policy(cancel, id)
                    .map_err(|e| match e {
                        Error::Cancelled { .. } => e,
                        e => Error::ActivationFailed {
                            id: id.to_string(),
                            source: Box::new(e),
                        },
                    })
            }
            PolicyStatus::Inactive => {
                self.policies
                    .deactivate_policy(cancel, id)
                    .map_err(|e| match e {
                        Error::Cancelled { .. } => e,
                        e => Error::DeactivationFailed {
                            id: id.to_string(),
                            source: Box::new(e),
                        },
                    })
            }
            PolicyStatus::Unknown => Ok(()),
        }
    }

    // =========================================================================
    // Discovery and lookup
    // =========================================================================

    /// Discover the system default policy of a type.
    pub fn discover_default(
        &self,
        cancel: &CancelToken,
        policy_type: PolicyType,
    ) -> Result<PolicyResource> {
        let mut resource = PolicyResource::system_default(policy_type);
        sync::set_default_policy(
            self.policies.as_ref(),
            self.groups.as_ref(),
            cancel,
            &mut resource,
            policy_type,
        )?;
        Ok(resource)
    }

    /// Bind a declared record to the remote policy with the same type and name.
    ///
    /// Returns the remote record, or `None` when no policy matches and the
    /// record stays unbound. A match flagged as system marks the record as a
    /// system default.
    pub fn bind_by_name(
        &self,
        cancel: &CancelToken,
        resource: &mut PolicyResource,
    ) -> Result<Option<Policy>> {
        match self.find_by_name(cancel, resource.policy_type, &resource.name) {
            Ok(policy) => {
                resource.set_id(policy.id.clone());
                if policy.system {
                    resource.mark_system_default();
                }
                Ok(Some(policy))
            }
            Err(Error::LookupExhausted { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Find a policy by type and exact name.
    pub fn find_by_name(
        &self,
        cancel: &CancelToken,
        policy_type: PolicyType,
        name: &str,
    ) -> Result<Policy> {
        lookup::find_policy_by_name(self.policies.as_ref(), cancel, policy_type, name)
    }

    /// Find the system default policy of a type.
    pub fn find_default(&self, cancel: &CancelToken, policy_type: PolicyType) -> Result<Policy> {
        lookup::find_system_policy(self.policies.as_ref(), cancel, policy_type)
    }

    /// Find the default authentication policy; `None` on classic orgs.
    pub fn default_access_policy(
        &self,
        cancel: &CancelToken,
        classic_org: bool,
    ) -> Result<Option<Policy>> {
        lookup::find_default_access_policy(self.policies.as_ref(), cancel, classic_org)
    }
}
