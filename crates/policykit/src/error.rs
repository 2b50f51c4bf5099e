//! Error types for policy reconciliation.
//!
//! Errors are categorized so the reconciliation loop driving the engine can
//! decide what to retry. The engine itself never retries.

use crate::types::PolicyType;
use std::fmt;

/// Result type alias for policykit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of errors for retry logic and user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related errors (transient, retryable).
    Network,
    /// Remote resource or lookup target not found.
    NotFound,
    /// The server disagreed with the declared configuration.
    Conflict,
    /// Authentication or authorization failure.
    Auth,
    /// The operation was cancelled by the caller.
    Cancelled,
    /// Undecodable response from the server.
    Format,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::NotFound => "Policy not found",
            Self::Conflict => "Declared configuration rejected by the server",
            Self::Auth => "Authentication failed",
            Self::Cancelled => "Operation cancelled",
            Self::Format => "Invalid API response",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your connection to the org and try again",
            Self::NotFound => "Verify the policy type and name are correct",
            Self::Conflict => "Adjust the declared policy (priority, default policy) and re-apply",
            Self::Auth => "Check that the API token is set and has policy admin scope",
            Self::Cancelled => "Re-run to reconcile the remaining policies",
            Self::Format => "The API may have changed; check the org version",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Lifecycle operations that can be rejected for system default policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Creating a policy.
    Create,
    /// Updating a policy.
    Update,
    /// Deleting a policy.
    Delete,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::Create => "created",
            Self::Update => "updated",
            Self::Delete => "deleted",
        };
        f.write_str(verb)
    }
}

/// Errors that can occur while reconciling policies.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The remote policy does not exist.
    #[error("policy {id} not found")]
    NotFound {
        /// Identifier that was looked up.
        id: String,
    },

    /// A system default policy cannot be created, updated or deleted.
    #[error("{policy_type} policy {name:?} is a system default and cannot be {mutation}")]
    DefaultResourceMutationRejected {
        /// Type of the default policy.
        policy_type: PolicyType,
        /// Name of the default policy.
        name: String,
        /// The rejected mutation.
        mutation: Mutation,
    },

    /// The server stored a different priority than the one requested.
    #[error(
        "provided priority {requested} was not valid, the server assigned {assigned} to policy {id}; \
         set the priority to a valid value for this policy type"
    )]
    PriorityConflict {
        /// Requested priority.
        requested: u32,
        /// Priority the server stored.
        assigned: u32,
        /// Policy that was written.
        id: String,
    },

    /// The policy was written but could not be activated.
    #[error("activation of policy {id} has failed: {source}")]
    ActivationFailed {
        /// Policy identifier.
        id: String,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// The policy was written but could not be deactivated.
    #[error("deactivation of policy {id} has failed: {source}")]
    DeactivationFailed {
        /// Policy identifier.
        id: String,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// A lookup walked every page without a match.
    #[error("no {policy_type} policy matched {criteria} after {pages} page(s)")]
    LookupExhausted {
        /// Policy type that was searched.
        policy_type: PolicyType,
        /// What the lookup was matching on.
        criteria: String,
        /// Number of pages examined.
        pages: usize,
    },

    /// Upstream request failed.
    #[error("{operation} failed for {target}: {message}")]
    Transport {
        /// Remote operation name.
        operation: String,
        /// Policy id, name, type or query the call targeted.
        target: String,
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// The caller cancelled the reconciliation.
    #[error("{operation} cancelled")]
    Cancelled {
        /// Remote operation that was about to run.
        operation: String,
    },

    /// The server answered with a body that could not be decoded.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// An operation that needs a remote identity was called without one.
    #[error("policy {name:?} has no remote identity; cannot {operation}")]
    Unbound {
        /// Name of the local policy.
        name: String,
        /// Operation that required an identity.
        operation: &'static str,
    },
}

impl Error {
    /// Create a transport error with operation context.
    pub fn transport(
        operation: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
        status: Option<u16>,
    ) -> Self {
        Self::Transport {
            operation: operation.into(),
            target: target.into(),
            message: message.into(),
            status,
        }
    }

    /// Map a `ureq` failure for a remote call, turning 404 into [`Error::NotFound`].
    pub fn from_ureq(err: ureq::Error, operation: &str, target: &str) -> Self {
        match err {
            ureq::Error::StatusCode(404) => Self::NotFound {
                id: target.to_string(),
            },
            ureq::Error::StatusCode(code) => {
                Self::transport(operation, target, format!("HTTP {code}"), Some(code))
            }
            other => Self::transport(operation, target, other.to_string(), None),
        }
    }

    /// Get the error category for retry logic.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotFound { .. } | Error::LookupExhausted { .. } => ErrorCategory::NotFound,
            Error::DefaultResourceMutationRejected { .. } | Error::PriorityConflict { .. } => {
                ErrorCategory::Conflict
            }
            Error::ActivationFailed { source, .. } | Error::DeactivationFailed { source, .. } => {
                source.category()
            }
            Error::Transport { status, .. } => match status {
                None | Some(429) => ErrorCategory::Network,
                Some(401 | 403) => ErrorCategory::Auth,
                Some(code) if *code >= 500 => ErrorCategory::Network,
                Some(_) => ErrorCategory::Other,
            },
            Error::Cancelled { .. } => ErrorCategory::Cancelled,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::Unbound { .. } => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether this is a "does not exist remotely" error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
