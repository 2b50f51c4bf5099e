//! In-memory policy service for tests and dry runs.

use super::{GroupSearch, PolicyApi};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::types::{Cursor, Group, Page, Policy, PolicyStatus, PolicyTemplate, PolicyType};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default number of policies per page.
const DEFAULT_PAGE_SIZE: usize = 20;

/// Remote operations, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    /// `list_policies`
    List,
    /// `next_page`
    NextPage,
    /// `get_policy`
    Get,
    /// `create_policy`
    Create,
    /// `update_policy`
    Update,
    /// `delete_policy`
    Delete,
    /// `activate_policy`
    Activate,
    /// `deactivate_policy`
    Deactivate,
    /// `list_groups`
    ListGroups,
}

impl MockOp {
    fn operation(self) -> &'static str {
        match self {
            Self::List => "list policies",
            Self::NextPage => "list policies",
            Self::Get => "get policy",
            Self::Create => "create policy",
            Self::Update => "update policy",
            Self::Delete => "delete policy",
            Self::Activate => "activate policy",
            Self::Deactivate => "deactivate policy",
            Self::ListGroups => "list groups",
        }
    }
}

/// A recorded remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// First page of a listing.
    List(Option<PolicyType>),
    /// Continuation of a listing.
    NextPage(String),
    /// Fetch by id.
    Get(String),
    /// Create, by policy name.
    Create(String),
    /// Update, by id.
    Update(String),
    /// Delete, by id.
    Delete(String),
    /// Activate, by id.
    Activate(String),
    /// Deactivate, by id.
    Deactivate(String),
    /// Group search, by query.
    ListGroups(String),
}

#[derive(Debug)]
struct MockState {
    policies: Vec<Policy>,
    groups: Vec<Group>,
    page_size: usize,
    next_id: u32,
    calls: Vec<Call>,
    failures: HashMap<MockOp, Option<u16>>,
    forced_priorities: HashMap<String, u32>,
    cancel_after: HashMap<MockOp, CancelToken>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            policies: Vec::new(),
            groups: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            next_id: 1,
            calls: Vec::new(),
            failures: HashMap::new(),
            forced_priorities: HashMap::new(),
            cancel_after: HashMap::new(),
        }
    }
}

impl MockState {
    fn fail_if_configured(&self, op: MockOp, target: &str) -> Result<()> {
        match self.failures.get(&op) {
            Some(status) => Err(Error::transport(
                op.operation(),
                target,
                status.map_or_else(|| "connection reset".to_string(), |s| format!("HTTP {s}")),
                *status,
            )),
            None => Ok(()),
        }
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.policies
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| Error::NotFound { id: id.to_string() })
    }

    fn count_of_type(&self, policy_type: PolicyType) -> usize {
        self.policies
            .iter()
            .filter(|p| p.policy_type == policy_type)
            .count()
    }

    /// Priority the server would store: a forced value, the requested one if
    /// it is in range, otherwise the last slot.
    fn assign_priority(&self, template: &PolicyTemplate, slots: usize) -> u32 {
        if let Some(forced) = self.forced_priorities.get(&template.name) {
            return *forced;
        }
        let last = u32::try_from(slots.max(1)).unwrap_or(u32::MAX);
        match template.priority {
            Some(p) if (1..=last).contains(&p) => p,
            _ => last,
        }
    }

    fn page(&self, policy_type: Option<PolicyType>, offset: usize) -> Page<Policy> {
        let matching: Vec<&Policy> = self
            .policies
            .iter()
            .filter(|p| policy_type.is_none_or(|t| p.policy_type == t))
            .collect();
        let end = (offset + self.page_size).min(matching.len());
        let items = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|p| (*p).clone())
            .collect();
        let next = (end < matching.len()).then(|| encode_cursor(policy_type, end));
        Page { items, next }
    }
}

fn encode_cursor(policy_type: Option<PolicyType>, offset: usize) -> Cursor {
    let kind = policy_type.map_or("*", |t| t.as_str());
    Cursor::new(format!("mock:{kind}:{offset}"))
}

fn decode_cursor(cursor: &Cursor) -> Result<(Option<PolicyType>, usize)> {
    let invalid = || Error::InvalidResponse(format!("invalid cursor: {}", cursor.as_str()));
    let mut parts = cursor.as_str().splitn(3, ':');
    if parts.next() != Some("mock") {
        return Err(invalid());
    }
    let policy_type = match parts.next().ok_or_else(invalid)? {
        "*" => None,
        kind => Some(kind.parse().map_err(|_| invalid())?),
    };
    let offset = parts
        .next()
        .and_then(|o| o.parse().ok())
        .ok_or_else(invalid)?;
    Ok((policy_type, offset))
}

/// Mock policy service.
///
/// Clones share the same in-memory org, so a test can hand one clone to the
/// engine and inspect another.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create an empty org.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an org with one system default policy per type and the
    /// built-in "Everyone" group.
    #[must_use]
    pub fn with_system_defaults() -> Self {
        let mock = Self::new();
        for policy_type in PolicyType::all() {
            let id = mock.allocate_id();
            mock.add_policy(Policy {
                id,
                name: "Default Policy".to_string(),
                description: Some(format!("The default {policy_type} policy")),
                status: PolicyStatus::Active,
                priority: Some(1),
                system: true,
                policy_type: *policy_type,
                conditions: None,
            });
        }
        mock.add_group("00gEveryone", "Everyone");
        mock
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn allocate_id(&self) -> String {
        let mut state = self.state();
        let id = format!("00p{:04}", state.next_id);
        state.next_id += 1;
        id
    }

    /// Seed a policy, appended to the listing order.
    pub fn add_policy(&self, policy: Policy) {
        self.state().policies.push(policy);
    }

    /// Seed a group.
    pub fn add_group(&self, id: impl Into<String>, name: impl Into<String>) {
        self.state().groups.push(Group {
            id: id.into(),
            name: name.into(),
        });
    }

    /// Set the number of policies per page.
    pub fn set_page_size(&self, page_size: usize) {
        self.state().page_size = page_size.max(1);
    }

    /// Make the server store `priority` for the named policy on every write.
    pub fn force_priority(&self, name: impl Into<String>, priority: u32) {
        self.state().forced_priorities.insert(name.into(), priority);
    }

    /// Make an operation fail with a transport error until cleared.
    /// `status` of `None` simulates a connection failure.
    pub fn fail_on(&self, op: MockOp, status: Option<u16>) {
        self.state().failures.insert(op, status);
    }

    /// Cancel `token` right after the next successful `op`.
    pub fn cancel_after(&self, op: MockOp, token: &CancelToken) {
        self.state().cancel_after.insert(op, token.clone());
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Forget the recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Current server-side record for a policy.
    pub fn policy(&self, id: &str) -> Option<Policy> {
        self.state().policies.iter().find(|p| p.id == id).cloned()
    }

    /// Number of policies stored.
    pub fn policy_count(&self) -> usize {
        self.state().policies.len()
    }

    fn set_status(&self, op: MockOp, id: &str, status: PolicyStatus) -> Result<()> {
        let mut state = self.state();
        state.calls.push(match op {
            MockOp::Activate => Call::Activate(id.to_string()),
            _ => Call::Deactivate(id.to_string()),
        });
        state.fail_if_configured(op, id)?;
        let index = state.position(id)?;
        state.policies[index].status = status;
        Ok(())
    }
}

impl PolicyApi for MockBackend {
    fn list_policies(
        &self,
        cancel: &CancelToken,
        policy_type: Option<PolicyType>,
    ) -> Result<Page<Policy>> {
        cancel.check(MockOp::List.operation())?;
        let mut state = self.state();
        state.calls.push(Call::List(policy_type));
        let target = policy_type.map_or("all", |t| t.as_str());
        state.fail_if_configured(MockOp::List, target)?;
        Ok(state.page(policy_type, 0))
    }

    fn next_page(&self, cancel: &CancelToken, cursor: &Cursor) -> Result<Page<Policy>> {
        cancel.check(MockOp::NextPage.operation())?;
        let mut state = self.state();
        state.calls.push(Call::NextPage(cursor.as_str().to_string()));
        state.fail_if_configured(MockOp::NextPage, cursor.as_str())?;
        let (policy_type, offset) = decode_cursor(cursor)?;
        Ok(state.page(policy_type, offset))
    }

    fn get_policy(&self, cancel: &CancelToken, id: &str) -> Result<Policy> {
        cancel.check(MockOp::Get.operation())?;
        let mut state = self.state();
        state.calls.push(Call::Get(id.to_string()));
        state.fail_if_configured(MockOp::Get, id)?;
        let index = state.position(id)?;
        Ok(state.policies[index].clone())
    }

    fn create_policy(&self, cancel: &CancelToken, template: &PolicyTemplate) -> Result<Policy> {
        cancel.check(MockOp::Create.operation())?;
        let id = self.allocate_id();
        let mut state = self.state();
        state.calls.push(Call::Create(template.name.clone()));
        state.fail_if_configured(MockOp::Create, &template.name)?;

        let slots = state.count_of_type(template.policy_type) + 1;
        let policy = Policy {
            id,
            name: template.name.clone(),
            description: template.description.clone(),
            // Created policies start inactive until the lifecycle call.
            status: PolicyStatus::Inactive,
            priority: Some(state.assign_priority(template, slots)),
            system: false,
            policy_type: template.policy_type,
            conditions: template.conditions.clone(),
        };
        state.policies.push(policy.clone());
        if let Some(token) = state.cancel_after.remove(&MockOp::Create) {
            token.cancel();
        }
        Ok(policy)
    }

    fn update_policy(
        &self,
        cancel: &CancelToken,
        id: &str,
        template: &PolicyTemplate,
    ) -> Result<Policy> {
        cancel.check(MockOp::Update.operation())?;
        let mut state = self.state();
        state.calls.push(Call::Update(id.to_string()));
        state.fail_if_configured(MockOp::Update, id)?;

        let index = state.position(id)?;
        let slots = state.count_of_type(template.policy_type);
        let priority = state.assign_priority(template, slots);
        let policy = &mut state.policies[index];
        policy.name = template.name.clone();
        policy.description = template.description.clone();
        policy.priority = Some(priority);
        policy.conditions = template.conditions.clone();
        Ok(policy.clone())
    }

    fn delete_policy(&self, cancel: &CancelToken, id: &str) -> Result<()> {
        cancel.check(MockOp::Delete.operation())?;
        let mut state = self.state();
        state.calls.push(Call::Delete(id.to_string()));
        state.fail_if_configured(MockOp::Delete, id)?;
        let index = state.position(id)?;
        state.policies.remove(index);
        Ok(())
    }

    fn activate_policy(&self, cancel: &CancelToken, id: &str) -> Result<()> {
        cancel.check(MockOp::Activate.operation())?;
        self.set_status(MockOp::Activate, id, PolicyStatus::Active)
    }

    fn deactivate_policy(&self, cancel: &CancelToken, id: &str) -> Result<()> {
        cancel.check(MockOp::Deactivate.operation())?;
        self.set_status(MockOp::Deactivate, id, PolicyStatus::Inactive)
    }
}

impl GroupSearch for MockBackend {
    fn list_groups(&self, cancel: &CancelToken, query: &str) -> Result<Vec<Group>> {
        cancel.check(MockOp::ListGroups.operation())?;
        let mut state = self.state();
        state.calls.push(Call::ListGroups(query.to_string()));
        state.fail_if_configured(MockOp::ListGroups, query)?;
        Ok(state
            .groups
            .iter()
            .filter(|g| g.name.starts_with(query))
            .cloned()
            .collect())
    }
}
