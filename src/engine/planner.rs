//! Execution planner - bind declarations to remote policies and classify them

use anyhow::{Context, Result};
use policykit::{CancelToken, FieldChange, Policy, PolicyEngine, PolicyResource, PolicyType};

use crate::config::{Config, Ensure, PolicyDecl};

/// What apply would do for one declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// No remote policy with this type and name
    Create,
    /// Remote policy differs from the declaration
    Update(Vec<FieldChange>),
    /// Declared absent and present remotely
    Delete,
    /// Remote policy already matches
    NoChange,
    /// The name resolves to the system default of its type
    Protected,
}

impl Action {
    /// Whether apply has work to do
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Create | Self::Update(_) | Self::Delete)
    }
}

/// One declaration with its binding and classification
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub resource: PolicyResource,
    pub action: Action,
    pub remote: Option<Policy>,
}

impl PlannedChange {
    pub fn label(&self) -> String {
        format!("{}/{}", self.resource.policy_type, self.resource.name)
    }
}

/// Outcome of discovering one configured system default
#[derive(Debug, Clone)]
pub enum DefaultEntry {
    Found(PolicyResource),
    Unavailable(PolicyType),
}

#[derive(Debug, Default)]
pub struct ExecutionPlan {
    pub changes: Vec<PlannedChange>,
    pub defaults: Vec<DefaultEntry>,
}

impl ExecutionPlan {
    /// Entries apply would act on
    pub fn pending(&self) -> impl Iterator<Item = &PlannedChange> {
        self.changes.iter().filter(|c| c.action.is_change())
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }
}

/// Build the plan for every declaration and configured default
pub fn build(engine: &PolicyEngine, cancel: &CancelToken, config: &Config) -> Result<ExecutionPlan> {
    let mut plan = ExecutionPlan::default();

    for decl in config.declared() {
        let change = plan_one(engine, cancel, decl)
            .with_context(|| format!("Failed to plan {} policy {:?}", decl.policy_type, decl.name))?;
        log::debug!("planned {} as {:?}", change.label(), change.action);
        plan.changes.push(change);
    }

    for &policy_type in &config.defaults {
        plan.defaults
            .push(discover_default(engine, cancel, policy_type, config.org.classic)?);
    }

    Ok(plan)
}

/// Bind one declaration by name, refresh it and compare it to the remote record
pub fn plan_one(
    engine: &PolicyEngine,
    cancel: &CancelToken,
    decl: &PolicyDecl,
) -> Result<PlannedChange> {
    let mut resource = decl.to_resource();

    if engine.bind_by_name(cancel, &mut resource)?.is_none() {
        let action = match decl.ensure {
            Ensure::Present => Action::Create,
            Ensure::Absent => Action::NoChange,
        };
        return Ok(PlannedChange {
            resource,
            action,
            remote: None,
        });
    }

    if resource.is_system_default() {
        return Ok(PlannedChange {
            resource,
            action: Action::Protected,
            remote: None,
        });
    }

    // Refresh a copy so the declared attributes survive for the diff
    let mut state = resource.clone();
    let remote = engine.read(cancel, &mut state)?;
    let Some(remote) = remote else {
        resource.clear_id();
        let action = match decl.ensure {
            Ensure::Present => Action::Create,
            Ensure::Absent => Action::NoChange,
        };
        return Ok(PlannedChange {
            resource,
            action,
            remote: None,
        });
    };

    let action = match decl.ensure {
        Ensure::Absent => Action::Delete,
        Ensure::Present => {
            let changes = resource.drift(&remote);
            if changes.is_empty() {
                Action::NoChange
            } else {
                Action::Update(changes)
            }
        }
    };

    Ok(PlannedChange {
        resource,
        action,
        remote: Some(remote),
    })
}

fn discover_default(
    engine: &PolicyEngine,
    cancel: &CancelToken,
    policy_type: PolicyType,
    classic: bool,
) -> Result<DefaultEntry> {
    if policy_type == PolicyType::AccessPolicy
        && engine.default_access_policy(cancel, classic)?.is_none()
    {
        return Ok(DefaultEntry::Unavailable(policy_type));
    }

    let resource = engine
        .discover_default(cancel, policy_type)
        .with_context(|| format!("Failed to discover the default {policy_type} policy"))?;
    Ok(DefaultEntry::Found(resource))
}
