//! Remote queue collaborator traits.
//!
//! The scheduler never talks to a transport directly. It drives a
//! [`CloudTasksClient`] for create/delete and a [`TaskLister`] for paging,
//! so tests can substitute either side.
//!
//! Implementations:
//! - [`InMemoryCloudTasks`](crate::memory::InMemoryCloudTasks) - process-local queue
//! - `HttpCloudTasksClient` - the v2 REST API (feature `http-client`)

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SchedulerError};
use crate::types::{CreateTaskRequest, DeleteTaskRequest, ListTasksRequest, ListTasksResponse, WireTask};

/// Status codes the remote queue reports, named as in the Google API error model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCode {
    /// A task with the requested name already exists or existed recently.
    AlreadyExists,
    /// The task or queue does not exist.
    NotFound,
    /// The caller lacks permission on the queue.
    PermissionDenied,
    /// Credentials are missing or invalid.
    Unauthenticated,
    /// The request was malformed.
    InvalidArgument,
    /// The queue is not in a state that allows the operation.
    FailedPrecondition,
    /// Quota or rate limit exceeded.
    ResourceExhausted,
    /// The service is temporarily unreachable.
    Unavailable,
    /// The call did not complete in time.
    DeadlineExceeded,
    /// Server-side failure.
    Internal,
    /// Anything else.
    Unknown,
}

impl RemoteCode {
    /// Google status string, e.g. `ALREADY_EXISTS`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::NotFound => "NOT_FOUND",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::Unavailable => "UNAVAILABLE",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::Internal => "INTERNAL",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parses a Google status string. Unrecognised values map to [`RemoteCode::Unknown`].
    ///
    /// # Examples
    ///
    /// ```
    /// use cloudtask_scheduler::client::RemoteCode;
    ///
    /// assert_eq!(RemoteCode::from_status("ALREADY_EXISTS"), RemoteCode::AlreadyExists);
    /// assert_eq!(RemoteCode::from_status("DATA_LOSS"), RemoteCode::Unknown);
    /// ```
    pub fn from_status(status: &str) -> Self {
        match status {
            "ALREADY_EXISTS" => Self::AlreadyExists,
            "NOT_FOUND" => Self::NotFound,
            "PERMISSION_DENIED" => Self::PermissionDenied,
            "UNAUTHENTICATED" => Self::Unauthenticated,
            "INVALID_ARGUMENT" => Self::InvalidArgument,
            "FAILED_PRECONDITION" => Self::FailedPrecondition,
            "RESOURCE_EXHAUSTED" => Self::ResourceExhausted,
            "UNAVAILABLE" => Self::Unavailable,
            "DEADLINE_EXCEEDED" => Self::DeadlineExceeded,
            "INTERNAL" => Self::Internal,
            _ => Self::Unknown,
        }
    }

    /// Best-effort mapping from an HTTP status when the body carries no status string.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidArgument,
            401 => Self::Unauthenticated,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            409 => Self::AlreadyExists,
            429 => Self::ResourceExhausted,
            500 => Self::Internal,
            503 => Self::Unavailable,
            504 => Self::DeadlineExceeded,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for RemoteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a queue collaborator.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct RemoteError {
    /// Status classification.
    pub code: RemoteCode,
    /// Human-readable message from the remote side.
    pub message: String,
    /// Underlying transport error, if there was one.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl RemoteError {
    /// Creates an error without an underlying cause.
    pub fn new(code: RemoteCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the underlying transport error.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

/// Pages through the tasks of a queue.
#[async_trait]
pub trait TaskLister: Send + Sync {
    /// Returns one page of tasks.
    async fn list_tasks(&self, request: ListTasksRequest) -> Result<ListTasksResponse, RemoteError>;
}

/// Creates and deletes tasks in a queue.
///
/// Every client is also a lister; the scheduler uses it for paging unless a
/// separate lister is injected.
#[async_trait]
pub trait CloudTasksClient: TaskLister {
    /// Creates one task and returns it as stored.
    async fn create_task(&self, request: CreateTaskRequest) -> Result<WireTask, RemoteError>;

    /// Deletes one task by name.
    async fn delete_task(&self, request: DeleteTaskRequest) -> Result<(), RemoteError>;
}

/// Runs one remote call under a cancellation token.
///
/// A token that is already cancelled prevents the call from being issued.
/// Cancellation observed while the call is in flight drops it.
pub(crate) async fn guarded<F, T>(
    cancel: &CancellationToken,
    operation: &'static str,
    call: F,
) -> Result<T>
where
    F: Future<Output = T>,
{
    if cancel.is_cancelled() {
        return Err(SchedulerError::Cancelled { operation });
    }

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(SchedulerError::Cancelled { operation }),
        out = call => Ok(out),
    }
}
