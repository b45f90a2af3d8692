//! Error types for workflow execution.

use thiserror::Error;

use crate::contract::ContractViolation;
use crate::task::Phase;

/// The main error type for workflow operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Local state did not satisfy a task's input contract. Never retried.
    #[error(transparent)]
    ContractViolation(#[from] ContractViolation),

    /// A failure of an external call that may succeed if repeated.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The retry budget ran out. `last` is the failure of the final attempt.
    #[error("gave up after {attempts} attempt(s): {last}")]
    ExhaustedRetries {
        /// Number of attempts that were made.
        attempts: u32,
        /// The error returned by the last attempt, unchanged.
        last: Box<Error>,
    },

    /// A workflow could not be assembled.
    #[error("composition error: {0}")]
    Composition(String),

    /// The run was cancelled through its execution context.
    #[error("workflow run cancelled")]
    Cancelled,

    /// A task failed; carries the task identity and lifecycle phase.
    #[error("task '{task}' failed during {phase}: {source}")]
    TaskFailed {
        /// Name of the failing task.
        task: String,
        /// Phase in which the failure occurred.
        phase: Phase,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// A JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A generic error with a message.
    #[error("{0}")]
    Message(String),
}

impl Error {
    /// Shorthand for [`Error::Transient`].
    pub fn transient(msg: impl Into<String>) -> Self {
        Error::Transient(msg.into())
    }

    /// Whether the resilience wrapper may try again after this error.
    ///
    /// Contract, composition and cancellation failures are final. Anything
    /// else coming out of an operation is treated as transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Error::ContractViolation(_)
                | Error::Composition(_)
                | Error::Cancelled
                | Error::ExhaustedRetries { .. }
                | Error::TaskFailed { .. }
        )
    }

    /// Name of the failing task, if this is a task failure.
    pub fn task_name(&self) -> Option<&str> {
        match self {
            Error::TaskFailed { task, .. } => Some(task),
            _ => None,
        }
    }

    /// Lifecycle phase of the failure, if this is a task failure.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Error::TaskFailed { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// The innermost failure, looking through task and retry wrappers.
    pub fn last_failure(&self) -> &Error {
        match self {
            Error::TaskFailed { source, .. } => source.last_failure(),
            Error::ExhaustedRetries { last, .. } => last.last_failure(),
            other => other,
        }
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Message(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Message(msg.to_string())
    }
}

/// A specialized `Result` type for workflow operations.
pub type Result<T> = std::result::Result<T, Error>;
