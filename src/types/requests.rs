//! Request and response messages for the three queue operations.

use serde::{Deserialize, Serialize};

use super::task::WireTask;

/// How much of each task the queue returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskView {
    /// Server default, equivalent to [`TaskView::Basic`].
    #[default]
    ViewUnspecified,
    /// Omits potentially large fields such as the body.
    Basic,
    /// Every field. Requires extra IAM permission on the queue.
    Full,
}

impl TaskView {
    /// Wire name of the view.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewUnspecified => "VIEW_UNSPECIFIED",
            Self::Basic => "BASIC",
            Self::Full => "FULL",
        }
    }
}

/// One page of a task listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListTasksRequest {
    /// Queue path to list.
    pub parent: String,
    /// Maximum number of tasks in the page.
    pub page_size: i32,
    /// Token from the previous page; empty for the first page.
    pub page_token: String,
    /// Fields to return per task.
    pub response_view: TaskView,
}

/// A page of tasks and the token for the next one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksResponse {
    /// Tasks in the page, in queue order.
    #[serde(default)]
    pub tasks: Vec<WireTask>,
    /// Empty when this is the last page.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub next_page_token: String,
}

/// Creates one task under a queue.
///
/// Only `task` and `response_view` travel in the body; `parent` is part of
/// the request path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    /// Queue path the task is created in.
    #[serde(skip)]
    pub parent: String,
    /// The task to create. Its name carries the identity.
    pub task: WireTask,
    /// Fields to return in the created task.
    #[serde(default)]
    pub response_view: TaskView,
}

/// Deletes one task by fully-qualified name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteTaskRequest {
    /// `projects/<p>/locations/<l>/queues/<q>/tasks/<task id>`.
    pub name: String,
}
