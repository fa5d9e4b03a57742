//! # cloudtask-scheduler
//!
//! Declarative scheduling of HTTP tasks on a Google Cloud Tasks queue.
//!
//! Callers describe the full set of tasks they want to exist under an owner
//! prefix; [`Scheduler::sync`] lists the queue, works out which remote tasks
//! are stale or superseded, deletes them, and creates what is missing. The
//! queue is the only state: everything needed to recognise a managed task
//! is encoded in its name.
//!
//! ## Modules
//!
//! - [`identity`] - Task id grammar, comparison keys and validation
//! - [`domain`] - The [`Task`] model
//! - [`types`] - Cloud Tasks wire model
//! - [`convert`] - Mapping between [`Task`] and the wire model
//! - [`client`] - Remote collaborator traits and [`RemoteError`](client::RemoteError)
//! - [`iterator`] - Paged, prefix-filtered listing
//! - [`scheduler`] - Planning and applying a sync
//! - [`config`] - [`SchedulerConfig`] loading
//! - [`memory`] - In-memory queue for tests and demos
//! - `http_client` - REST transport (feature `http-client`)
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use chrono::DateTime;
//! use cloudtask_scheduler::memory::InMemoryCloudTasks;
//! use cloudtask_scheduler::{Authorization, HttpRequest, Scheduler, SchedulerConfig, Task};
//! use http::Method;
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SchedulerConfig::new("tokyo-rain-123", "asia-northeast1", "scheduler", "calendar-");
//! let scheduler = Scheduler::new(Arc::new(InMemoryCloudTasks::new()), &config)?;
//!
//! let reminder = Task::new(
//!     config.queue_path(),
//!     &config.prefix,
//!     "standup",
//!     DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
//!     HttpRequest::new(Method::POST, Url::parse("https://example.com/notify")?),
//! )
//! .with_authorization(Authorization::oidc("runner@example.iam.gserviceaccount.com", "https://example.com"));
//!
//! let report = scheduler.sync(&[reminder], &CancellationToken::new()).await?;
//! assert_eq!(report.created[0].version, 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod constants;
pub mod convert;
pub mod domain;
pub mod error;
pub mod identity;
pub mod iterator;
pub mod memory;
pub mod scheduler;
pub mod types;

#[cfg(feature = "http-client")]
pub mod http_client;

pub use client::{CloudTasksClient, RemoteCode, RemoteError, TaskLister};
pub use config::{ConfigError, SchedulerConfig};
pub use domain::{Authorization, HttpRequest, Task};
pub use error::{ConversionError, IdentityError, Result, SchedulerError, ValidationError};
pub use iterator::TaskIterator;
pub use memory::InMemoryCloudTasks;
pub use scheduler::{Scheduler, SyncPlan, SyncReport};

#[cfg(feature = "http-client")]
pub use http_client::{HttpCloudTasksClient, StaticToken, TokenSource};
