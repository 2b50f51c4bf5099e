//! # policykit
//!
//! Reconcile declared identity policies against a remote policy API.
//!
//! This crate provides:
//! - A remote client seam ([`backend::PolicyApi`], [`backend::GroupSearch`])
//!   with an HTTP implementation and an in-memory one
//! - A lifecycle engine that creates, reads, updates and deletes policies,
//!   then reconciles their priority and activation status
//! - System default discovery: every policy type has one built-in policy that
//!   is found, never created or deleted
//! - Paginated lookups by type and exact name
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use policykit::backend::MockBackend;
//! use policykit::{CancelToken, PolicyEngine, PolicyResource, PolicyStatus, PolicyType};
//!
//! let engine = PolicyEngine::from_backend(Arc::new(MockBackend::with_system_defaults()));
//! let cancel = CancelToken::new();
//!
//! let mut policy = PolicyResource::new(PolicyType::Password, "Strict")
//!     .status(PolicyStatus::Active)
//!     .groups(["00g1"]);
//! engine.create(&cancel, &mut policy).unwrap();
//! assert!(policy.id().is_some());
//!
//! engine.delete(&cancel, &mut policy).unwrap();
//! assert!(policy.id().is_none());
//! ```
//!
//! ## Priorities
//!
//! The server quietly substitutes a valid priority for an invalid one. The
//! engine reports that as [`Error::PriorityConflict`] after recording the
//! policy identity, so the policy stays tracked while the caller fixes the
//! declared value.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod cancel;
pub mod engine;
pub mod error;
pub mod lookup;
pub mod priority;
pub mod resource;
pub mod retry;
pub mod search;
pub mod sync;
pub mod types;

pub use cancel::CancelToken;
pub use engine::PolicyEngine;
pub use error::{Error, ErrorCategory, Mutation, Result};
pub use resource::{Binding, FieldChange, PolicyKind, PolicyResource};
pub use retry::{RetryConfig, with_retry};
pub use types::{
    Cursor, Group, GroupCondition, Page, PeopleCondition, Policy, PolicyConditions, PolicyStatus,
    PolicyTemplate, PolicyType,
};
