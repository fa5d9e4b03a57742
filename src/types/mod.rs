//! Cloud Tasks wire model.
//!
//! These are the shapes exchanged with the remote queue. They carry no
//! scheduler semantics; see [`crate::convert`] for the mapping to
//! [`Task`](crate::Task).

pub mod requests;
pub mod task;

pub use requests::{
    CreateTaskRequest, DeleteTaskRequest, ListTasksRequest, ListTasksResponse, TaskView,
};
pub use task::{
    HttpMethod, MessageType, OAuthToken, OidcToken, Timestamp, WireHttpRequest, WireTask,
};
