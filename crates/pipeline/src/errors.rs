//! Top-level error and retry-policy types for the Folio generation domain.
//!
//! [`FolioError`] covers conditions that halt a generation run. Content-quality
//! rejection and exhausted recovery budgets are deliberately absent: they are
//! states of the run's outcome, not errors.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions implements [`Retryable`] and produces a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::PhaseName;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by infrastructure error types to let the retry executor decide
/// whether to re-invoke an operation.
///
/// ## Rules
///
/// - `Retryable` errors: connection failures, resets, timeouts, transient
///   rate-limit responses from a collaborator.
/// - `NonRetryable` errors: security rejections, payload validation failures,
///   non-2xx responses, invalid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the minimum delay before retrying (e.g.
    /// derived from a `Retry-After` header).
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryPolicy::Retryable { .. })
    }
}

/// Implemented by every error type that participates in retry decisions.
pub trait Retryable {
    /// Classifies this error for the retry executor.
    fn retry_policy(&self) -> RetryPolicy;
}

// ---------------------------------------------------------------------------
// Collaborator errors
// ---------------------------------------------------------------------------

/// Failure reported by an external phase collaborator (research, plan, write,
/// review, fix) or by the asset store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CollaboratorError {
    /// The call failed for a reason expected to clear on its own
    /// (connection reset, timeout, rate limit).
    #[error("Transient collaborator failure: {message}")]
    Transient {
        /// Description of the failure.
        message: String,
        /// Server-suggested delay before retrying, when known.
        retry_after: Option<Duration>,
    },

    /// The collaborator refused the request outright.
    #[error("Collaborator rejected the request: {message}")]
    Rejected {
        /// Description of the refusal.
        message: String,
    },

    /// The collaborator answered with a payload whose shape could not be
    /// validated.
    #[error("Invalid collaborator payload: {message}")]
    InvalidPayload {
        /// Description of the validation failure.
        message: String,
    },
}

impl CollaboratorError {
    /// Convenience constructor for [`CollaboratorError::Transient`].
    pub fn transient(message: impl Into<String>) -> Self {
        CollaboratorError::Transient {
            message: message.into(),
            retry_after: None,
        }
    }
}

impl Retryable for CollaboratorError {
    fn retry_policy(&self) -> RetryPolicy {
        match self {
            CollaboratorError::Transient { retry_after, .. } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            CollaboratorError::Rejected { .. } | CollaboratorError::InvalidPayload { .. } => {
                RetryPolicy::NonRetryable
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline-level errors
// ---------------------------------------------------------------------------

/// Errors that halt a generation run.
///
/// These are distinct from a rejected draft: a run whose recovery budgets are
/// exhausted still completes and returns its best draft with the unresolved
/// issues attached.
#[derive(Debug, Error)]
pub enum FolioError {
    /// A collaborator call failed and its retry budget (if any) was spent.
    #[error("Phase '{phase}' failed: {source}")]
    PhaseFailed {
        /// Phase in which the failing call was made.
        phase: PhaseName,
        /// The final error returned by the collaborator.
        #[source]
        source: CollaboratorError,
    },

    /// A payload crossing into the orchestrator's state machine had an
    /// invalid shape (e.g. a plan with no sections).
    #[error("Validation rejection in phase '{phase}': {message}")]
    ValidationRejection {
        /// Phase that received the invalid payload.
        phase: PhaseName,
        /// Description of the validation failure.
        message: String,
    },

    /// The run was cancelled by the caller.
    #[error("Generation cancelled before phase '{phase}'")]
    Cancelled {
        /// Phase that would have started next.
        phase: PhaseName,
    },

    /// The configuration is invalid.
    ///
    /// Produced at load time; a run never starts with an invalid config.
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Description of the configuration problem.
        message: String,
    },
}
