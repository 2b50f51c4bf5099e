//! Locally tracked policy record.
//!
//! A [`PolicyResource`] holds the declared attributes of one policy and, once
//! bound, the identity of its remote counterpart. The engine writes the
//! identity; the synchronizer overwrites declared fields from remote state.

use crate::error::{Error, Mutation, Result};
use crate::types::{Policy, PolicyConditions, PolicyStatus, PolicyTemplate, PolicyType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Ownership of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PolicyKind {
    /// Declared and fully owned: created, updated and deleted by the engine.
    #[default]
    Custom,
    /// Built-in default of its type: discovered, never created or deleted.
    SystemDefault,
}

/// Whether a local record is tied to a remote policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// No remote identity.
    Unbound,
    /// Remote identity recorded.
    Bound,
}

/// A declared attribute that differs from the remote record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    /// Attribute name as used in configuration.
    pub field: &'static str,
    /// Remote value, rendered for display.
    pub from: String,
    /// Declared value, rendered for display.
    pub to: String,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.from, self.to)
    }
}

/// Local record of one policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyResource {
    id: Option<String>,
    kind: PolicyKind,
    /// Policy type.
    pub policy_type: PolicyType,
    /// Policy name.
    pub name: String,
    /// Policy description.
    pub description: Option<String>,
    /// Declared status.
    pub status: PolicyStatus,
    /// Declared priority; `None` lets the server decide.
    pub priority: Option<u32>,
    /// Included group ids; `None` means no group restriction.
    pub groups_included: Option<BTreeSet<String>>,
    /// Id of the built-in "Everyone" group, filled for system defaults.
    pub default_included_group_id: Option<String>,
}

impl PolicyResource {
    /// Declare a custom policy with default attributes.
    pub fn new(policy_type: PolicyType, name: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: PolicyKind::Custom,
            policy_type,
            name: name.into(),
            description: None,
            status: PolicyStatus::default(),
            priority: None,
            groups_included: None,
            default_included_group_id: None,
        }
    }

    /// Record for the system default of a type, filled in by discovery.
    pub fn system_default(policy_type: PolicyType) -> Self {
        Self {
            kind: PolicyKind::SystemDefault,
            ..Self::new(policy_type, String::new())
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the status.
    pub fn status(mut self, status: PolicyStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the priority.
    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Restrict the policy to the given groups.
    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups_included = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    /// Remote identity, if bound.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Record the remote identity. An empty id unbinds.
    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.id = if id.is_empty() { None } else { Some(id) };
    }

    /// Forget the remote identity.
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    /// Remote identity or [`Error::Unbound`].
    pub fn require_id(&self, operation: &'static str) -> Result<&str> {
        self.id().ok_or_else(|| Error::Unbound {
            name: self.name.clone(),
            operation,
        })
    }

    /// Current binding state.
    pub fn binding(&self) -> Binding {
        if self.id.is_some() {
            Binding::Bound
        } else {
            Binding::Unbound
        }
    }

    /// Ownership of this policy.
    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    /// Mark the record as the system default of its type.
    pub fn mark_system_default(&mut self) {
        self.kind = PolicyKind::SystemDefault;
    }

    /// Whether this is a system default policy.
    pub fn is_system_default(&self) -> bool {
        self.kind == PolicyKind::SystemDefault
    }

    /// Fail if the record is a system default.
    pub fn ensure_not_default(&self, mutation: Mutation) -> Result<()> {
        match self.kind {
            PolicyKind::Custom => Ok(()),
            PolicyKind::SystemDefault => Err(Error::DefaultResourceMutationRejected {
                policy_type: self.policy_type,
                name: self.name.clone(),
                mutation,
            }),
        }
    }

    /// Group condition for the wire; absent unless at least one group is declared.
    pub fn conditions(&self) -> Option<PolicyConditions> {
        match &self.groups_included {
            Some(groups) if !groups.is_empty() => {
                Some(PolicyConditions::including_groups(groups.iter().cloned()))
            }
            _ => None,
        }
    }

    /// Body for a create or update call.
    pub fn template(&self) -> PolicyTemplate {
        PolicyTemplate {
            name: self.name.clone(),
            description: self.description.clone(),
            status: self.status,
            priority: self.priority,
            policy_type: self.policy_type,
            conditions: self.conditions(),
        }
    }

    /// Declared attributes that differ from a remote record.
    ///
    /// An undeclared priority never differs: the server assigns one anyway.
    pub fn drift(&self, remote: &Policy) -> Vec<FieldChange> {
        let mut changes = Vec::new();
        let mut push = |field, from: String, to: String| {
            changes.push(FieldChange { field, from, to });
        };

        if self.name != remote.name {
            push("name", remote.name.clone(), self.name.clone());
        }
        if normalized(&self.description) != normalized(&remote.description) {
            push(
                "description",
                display_opt(&remote.description),
                display_opt(&self.description),
            );
        }
        if self.status != remote.status {
            push("status", remote.status.to_string(), self.status.to_string());
        }
        if let Some(priority) = self.priority {
            if remote.priority != Some(priority) {
                push(
                    "priority",
                    remote.priority.map_or_else(|| "-".to_string(), |p| p.to_string()),
                    priority.to_string(),
                );
            }
        }
        let declared_groups = self.groups_included.clone().filter(|g| !g.is_empty());
        let remote_groups = remote.included_groups();
        if declared_groups != remote_groups {
            push(
                "groups_included",
                display_groups(remote_groups.as_ref()),
                display_groups(declared_groups.as_ref()),
            );
        }
        changes
    }
}

fn normalized(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn display_opt(value: &Option<String>) -> String {
    normalized(value).map_or_else(|| "-".to_string(), |s| format!("{s:?}"))
}

fn display_groups(groups: Option<&BTreeSet<String>>) -> String {
    match groups {
        Some(groups) => format!(
            "[{}]",
            groups.iter().cloned().collect::<Vec<_>>().join(", ")
        ),
        None => "-".to_string(),
    }
}
