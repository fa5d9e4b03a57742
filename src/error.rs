//! Error types for scheduler operations.
//!
//! [`SchedulerError`] is the single error surfaced by `Scheduler`, the task
//! iterator and the converter. Component errors ([`ValidationError`],
//! [`ConversionError`], [`IdentityError`]) convert into it with `?`.
//! Remote failures keep the [`RemoteError`] unchanged as their source.

use thiserror::Error;

use crate::client::{RemoteCode, RemoteError};
pub use crate::identity::IdentityError;

/// Errors that can occur while reconciling, creating, deleting or listing tasks.
///
/// # Examples
///
/// ```
/// use cloudtask_scheduler::{SchedulerError, ValidationError};
///
/// let err = SchedulerError::from(ValidationError::EmptyId);
/// assert!(err.is_validation());
/// assert!(err.to_string().contains("empty"));
/// ```
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The task was rejected before any remote call.
    #[error("task validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A create collided with an existing remote task of the same name.
    #[error("task already exists: {name}")]
    AlreadyExists {
        /// Fully-qualified name of the colliding task.
        name: String,
    },

    /// The task could not be mapped to or from the wire format.
    #[error("task conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    /// A listed task name carrying the owner prefix could not be decoded.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The remote queue reported a failure.
    #[error("failed to {operation} {target}: {source}")]
    Transport {
        /// The remote operation that failed (`list tasks`, `create task`, `delete task`).
        operation: &'static str,
        /// Queue path or task name the operation addressed.
        target: String,
        /// The collaborator error, unmodified.
        #[source]
        source: RemoteError,
    },

    /// Cancellation was observed before or during a remote call.
    #[error("cancelled before {operation} completed")]
    Cancelled {
        /// The remote operation that was not issued or not awaited.
        operation: &'static str,
    },
}

impl SchedulerError {
    /// Returns `true` for a create that raced with an existing task.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns `true` for errors raised before any remote call.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns `true` if the run stopped because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The remote status code, for transport failures.
    pub fn remote_code(&self) -> Option<RemoteCode> {
        match self {
            Self::Transport { source, .. } => Some(source.code),
            _ => None,
        }
    }
}

/// Reasons a task is rejected before it reaches the remote queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The caller-chosen id is empty.
    #[error("task id is empty")]
    EmptyId,

    /// The encoded task id contains a character outside `[A-Za-z0-9_-]`.
    #[error("task id {task_id:?} contains invalid character {character:?}")]
    InvalidCharacter {
        /// The full encoded task id.
        task_id: String,
        /// The first offending character.
        character: char,
    },

    /// The encoded task id is longer than the remote queue accepts.
    #[error("task id is {len} characters, maximum is {max}")]
    TooLong {
        /// The full encoded task id.
        task_id: String,
        /// Its length in characters.
        len: usize,
        /// The enforced maximum.
        max: usize,
    },

    /// Two desired tasks share a comparison key.
    #[error("duplicate task in desired set: {key}")]
    DuplicateTask {
        /// The shared comparison key.
        key: String,
    },

    /// The task targets a different queue than the scheduler manages.
    #[error("task targets queue {actual}, scheduler manages {expected}")]
    QueueMismatch {
        /// The scheduler's queue path.
        expected: String,
        /// The task's queue path.
        actual: String,
    },

    /// The task carries a different owner prefix than the scheduler.
    #[error("task prefix {actual:?} does not match scheduler prefix {expected:?}")]
    PrefixMismatch {
        /// The scheduler's prefix.
        expected: String,
        /// The task's prefix.
        actual: String,
    },

    /// The schedule time falls inside a leap second.
    #[error("task {task_id:?} is scheduled inside a leap second")]
    LeapSecond {
        /// The full encoded task id.
        task_id: String,
    },

    /// A superseded remote task already carries the highest version.
    #[error("cannot supersede {name}: version is already at its maximum")]
    VersionExhausted {
        /// Full resource name of the remote task.
        name: String,
    },
}

/// Failures mapping between [`Task`](crate::Task) and [`WireTask`](crate::types::WireTask).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// The HTTP method is not one the remote queue can dispatch.
    #[error("unsupported http method: {0}")]
    UnsupportedMethod(String),

    /// The remote task dispatches something other than a plain HTTP request.
    #[error("unsupported message type: {0}")]
    UnsupportedMessageType(&'static str),

    /// The authorization header is neither an OAuth nor an OIDC token.
    #[error("unsupported authorization header type: {0}")]
    UnsupportedAuthorizationType(&'static str),

    /// The remote task has no schedule time.
    #[error("task has no schedule time")]
    MissingScheduleTime,

    /// The remote schedule time is outside the representable range.
    #[error("invalid schedule time: {seconds}s {nanos}ns")]
    InvalidScheduleTime {
        /// Whole seconds since the epoch.
        seconds: i64,
        /// Sub-second nanoseconds.
        nanos: i32,
    },

    /// The remote URL could not be parsed.
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl {
        /// The URL as received.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// A header name or value cannot be carried by the wire format.
    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader {
        /// The header name.
        name: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Result type alias for [`SchedulerError`].
pub type Result<T, E = SchedulerError> = std::result::Result<T, E>;
