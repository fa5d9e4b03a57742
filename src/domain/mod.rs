//! Internal task representation.
//!
//! - [`Task`] - A scheduled HTTP dispatch with its identity and version.
//! - [`HttpRequest`] - Method, URL, headers and body of the dispatch.
//! - [`Authorization`] - OAuth or OIDC credential attached on dispatch.

pub mod task;

pub use task::{Authorization, HttpRequest, Task};
