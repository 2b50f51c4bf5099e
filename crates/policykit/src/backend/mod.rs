//! Remote policy client traits and implementations.
//!
//! [`PolicyApi`] and [`GroupSearch`] are the seams between the engine and the
//! remote identity service. [`okta::OktaBackend`] talks to the real API over
//! HTTP; [`MockBackend`] keeps everything in memory and behaves like the
//! server where it matters (priority substitution, system policies, paging).
//!
//! # Testing
//!
//! ```
//! use policykit::backend::{MockBackend, PolicyApi};
//! use policykit::{CancelToken, PolicyType};
//!
//! let mock = MockBackend::with_system_defaults();
//! let page = mock
//!     .list_policies(&CancelToken::new(), Some(PolicyType::Password))
//!     .unwrap();
//! assert!(page.items[0].system);
//! ```

mod mock;
pub mod okta;

pub use mock::{Call, MockBackend, MockOp};
pub use okta::OktaBackend;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::types::{Cursor, Group, Page, Policy, PolicyTemplate, PolicyType};

/// Remote policy client.
///
/// Every call takes the caller's [`CancelToken`]. Failures carry the
/// operation name and target; a missing policy is reported as
/// [`Error::NotFound`](crate::Error::NotFound).
pub trait PolicyApi: Send + Sync {
    /// List policies, optionally restricted to one type. Returns the first page.
    fn list_policies(
        &self,
        cancel: &CancelToken,
        policy_type: Option<PolicyType>,
    ) -> Result<Page<Policy>>;

    /// Fetch the page a cursor points at.
    fn next_page(&self, cancel: &CancelToken, cursor: &Cursor) -> Result<Page<Policy>>;

    /// Fetch a policy by identifier.
    fn get_policy(&self, cancel: &CancelToken, id: &str) -> Result<Policy>;

    /// Create a policy and return the stored record.
    fn create_policy(&self, cancel: &CancelToken, template: &PolicyTemplate) -> Result<Policy>;

    /// Replace a policy and return the stored record.
    fn update_policy(
        &self,
        cancel: &CancelToken,
        id: &str,
        template: &PolicyTemplate,
    ) -> Result<Policy>;

    /// Delete a policy.
    fn delete_policy(&self, cancel: &CancelToken, id: &str) -> Result<()>;

    /// Activate a policy. Activating an active policy is not an error.
    fn activate_policy(&self, cancel: &CancelToken, id: &str) -> Result<()>;

    /// Deactivate a policy. Deactivating an inactive policy is not an error.
    fn deactivate_policy(&self, cancel: &CancelToken, id: &str) -> Result<()>;
}

/// Group search used to resolve built-in groups by name.
pub trait GroupSearch: Send + Sync {
    /// List groups matching a name query (prefix match on the server).
    fn list_groups(&self, cancel: &CancelToken, query: &str) -> Result<Vec<Group>>;
}
