//! Reconciliation of a desired task set against one queue.
//!
//! The queue has no update primitive, so a changed task is replaced: the old
//! remote task is deleted and the desired one is created under a higher
//! version. A run is split into [`Scheduler::plan`], which only lists, and
//! [`Scheduler::apply`], which issues every deletion before any creation.

use std::sync::Arc;

use indexmap::map::Entry;
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;

use crate::client::{guarded, CloudTasksClient, RemoteCode, TaskLister};
use crate::config::{ConfigError, SchedulerConfig};
use crate::convert::task_to_wire;
use crate::domain::Task;
use crate::error::{Result, SchedulerError, ValidationError};
use crate::iterator::TaskIterator;
use crate::types::{CreateTaskRequest, DeleteTaskRequest, TaskView};

/// Operations needed to make the queue match a desired set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    /// Remote tasks to delete, in listing order.
    pub deletions: Vec<Task>,
    /// Desired tasks to create, in input order, carrying their final versions.
    pub creations: Vec<Task>,
    /// Remote tasks that already satisfy a desired task.
    pub unchanged: Vec<Task>,
}

impl SyncPlan {
    /// Returns `true` if applying the plan issues no remote call.
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.creations.is_empty()
    }
}

/// Outcome of a completed [`Scheduler::apply`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Names of the deleted remote tasks.
    pub deleted: Vec<String>,
    /// Created tasks with the versions they were created under.
    pub created: Vec<Task>,
    /// Number of remote tasks left untouched.
    pub unchanged: usize,
}

/// Keeps the tasks under one owner prefix in one queue equal to a desired set.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use chrono::DateTime;
/// use cloudtask_scheduler::{HttpRequest, Scheduler, SchedulerConfig, Task};
/// use cloudtask_scheduler::memory::InMemoryCloudTasks;
/// use http::Method;
/// use tokio_util::sync::CancellationToken;
/// use url::Url;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let config = SchedulerConfig::new("p", "l", "q", "pre-");
/// let queue = Arc::new(InMemoryCloudTasks::new());
/// let scheduler = Scheduler::new(queue.clone(), &config).unwrap();
///
/// let task = Task::new(
///     config.queue_path(),
///     "pre-",
///     "daily",
///     DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
///     HttpRequest::new(Method::POST, Url::parse("https://example.com/run").unwrap()),
/// );
///
/// let cancel = CancellationToken::new();
/// let report = scheduler.sync(&[task.clone()], &cancel).await.unwrap();
/// assert_eq!(report.created.len(), 1);
///
/// // A second run finds nothing to do.
/// let report = scheduler.sync(&[task], &cancel).await.unwrap();
/// assert!(report.created.is_empty() && report.deleted.is_empty());
/// # }
/// ```
pub struct Scheduler {
    client: Arc<dyn CloudTasksClient>,
    lister: Arc<dyn TaskLister>,
    queue_path: String,
    prefix: String,
    page_size: i32,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("queue_path", &self.queue_path)
            .field("prefix", &self.prefix)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Creates a scheduler that lists through the same client it mutates with.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] from [`SchedulerConfig::validate`].
    pub fn new<C>(client: Arc<C>, config: &SchedulerConfig) -> Result<Self, ConfigError>
    where
        C: CloudTasksClient + 'static,
    {
        config.validate()?;
        let lister: Arc<dyn TaskLister> = client.clone();
        Ok(Self {
            client,
            lister,
            queue_path: config.queue_path(),
            prefix: config.prefix.clone(),
            page_size: config.effective_page_size(),
        })
    }

    /// Replaces the collaborator used for listing.
    pub fn with_lister(mut self, lister: Arc<dyn TaskLister>) -> Self {
        self.lister = lister;
        self
    }

    /// The managed queue path.
    pub fn queue_path(&self) -> &str {
        &self.queue_path
    }

    /// The owner prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// A fresh iterator over the owned tasks. No call is made until it is advanced.
    pub fn list(&self) -> TaskIterator {
        TaskIterator::new(self.lister.clone(), self.queue_path.clone(), self.prefix.clone())
            .with_page_size(self.page_size)
    }

    /// Computes the operations that make the queue match `desired`.
    ///
    /// Every desired task is checked before the queue is listed, and every
    /// creation is checked again once its final version is known, so an
    /// invalid input never leads to a partial [`apply`](Self::apply).
    ///
    /// A remote task is matched to the desired task with the same comparison
    /// key. If it satisfies it (see [`Task::is_satisfied_by`]) nothing is done.
    /// Otherwise it is deleted and the desired task is recreated with a
    /// version above the remote one. Remote tasks with no desired counterpart,
    /// including extra copies of an already matched key, are deleted.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::Validation`] for an invalid, duplicate or foreign desired task,
    ///   or a superseded remote task already at the highest version.
    /// - Any error of [`TaskIterator::next`].
    pub async fn plan(&self, desired: &[Task], cancel: &CancellationToken) -> Result<SyncPlan> {
        let mut pending: IndexMap<String, Task> = IndexMap::with_capacity(desired.len());
        for task in desired {
            self.check_ownership(task)?;
            task.validate()?;
            match pending.entry(task.comparison_key()) {
                Entry::Occupied(entry) => {
                    return Err(ValidationError::DuplicateTask {
                        key: entry.key().clone(),
                    }
                    .into());
                },
                Entry::Vacant(entry) => {
                    entry.insert(task.clone());
                },
            }
        }

        let mut plan = SyncPlan::default();
        let mut remote = self.list();
        while let Some(existing) = remote.next(cancel).await? {
            let key = existing.comparison_key();
            let Some(wanted) = pending.get_mut(&key) else {
                tracing::debug!(task = %existing.task_name(), "stale task");
                plan.deletions.push(existing);
                continue;
            };

            if wanted.is_satisfied_by(&existing) {
                tracing::debug!(task = %existing.task_name(), "task up to date");
                pending.shift_remove(&key);
                plan.unchanged.push(existing);
                continue;
            }

            if wanted.version <= existing.version {
                wanted.version = existing.version.checked_add(1).ok_or_else(|| {
                    ValidationError::VersionExhausted {
                        name: existing.task_name(),
                    }
                })?;
            }
            tracing::debug!(
                task = %existing.task_name(),
                version = wanted.version,
                "task superseded"
            );
            plan.deletions.push(existing);
        }

        for (_, mut task) in pending {
            task.version = task.effective_version();
            task.validate()?;
            plan.creations.push(task);
        }

        tracing::info!(
            queue = %self.queue_path,
            prefix = %self.prefix,
            deletions = plan.deletions.len(),
            creations = plan.creations.len(),
            unchanged = plan.unchanged.len(),
            "planned sync"
        );
        Ok(plan)
    }

    /// Executes a plan: all deletions, then all creations.
    ///
    /// Stops at the first failure. Operations already completed are not
    /// undone; running [`sync`](Self::sync) again converges.
    pub async fn apply(&self, plan: SyncPlan, cancel: &CancellationToken) -> Result<SyncReport> {
        let mut report = SyncReport {
            unchanged: plan.unchanged.len(),
            ..SyncReport::default()
        };

        for task in &plan.deletions {
            let name = task.task_name();
            self.delete(&name, cancel).await?;
            report.deleted.push(name);
        }

        for task in &plan.creations {
            report.created.push(self.create(task, cancel).await?);
        }

        tracing::info!(
            queue = %self.queue_path,
            deleted = report.deleted.len(),
            created = report.created.len(),
            unchanged = report.unchanged,
            "sync applied"
        );
        Ok(report)
    }

    /// Makes the owned tasks of the queue equal to `desired`.
    ///
    /// Idempotent: a second run against an unchanged queue issues only list calls.
    pub async fn sync(&self, desired: &[Task], cancel: &CancellationToken) -> Result<SyncReport> {
        let plan = self.plan(desired, cancel).await?;
        self.apply(plan, cancel).await
    }

    /// Creates one task and returns it with the version it was created under.
    ///
    /// An unset version becomes 1. The task is validated before any call.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::Validation`] or [`SchedulerError::Conversion`] before the call.
    /// - [`SchedulerError::AlreadyExists`] if the name is taken.
    /// - [`SchedulerError::Transport`] for any other remote failure.
    /// - [`SchedulerError::Cancelled`] if `cancel` fires first.
    pub async fn create(&self, task: &Task, cancel: &CancellationToken) -> Result<Task> {
        let mut task = task.clone();
        task.version = task.effective_version();
        self.check_ownership(&task)?;
        task.validate()?;

        let wire = task_to_wire(&task)?;
        let name = wire.name.clone();
        let request = CreateTaskRequest {
            parent: self.queue_path.clone(),
            task: wire,
            response_view: TaskView::Basic,
        };

        tracing::debug!(task = %name, "creating task");
        match guarded(cancel, "create task", self.client.create_task(request)).await? {
            Ok(_) => Ok(task),
            Err(err) if err.code == RemoteCode::AlreadyExists => {
                tracing::warn!(task = %name, error = %err, "task already exists");
                Err(SchedulerError::AlreadyExists { name })
            },
            Err(source) => Err(SchedulerError::Transport {
                operation: "create task",
                target: name,
                source,
            }),
        }
    }

    /// Deletes one task by fully-qualified name. Not-found is a transport error.
    pub async fn delete(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        tracing::debug!(task = %name, "deleting task");
        let request = DeleteTaskRequest {
            name: name.to_string(),
        };
        guarded(cancel, "delete task", self.client.delete_task(request))
            .await?
            .map_err(|source| SchedulerError::Transport {
                operation: "delete task",
                target: name.to_string(),
                source,
            })
    }

    fn check_ownership(&self, task: &Task) -> Result<(), ValidationError> {
        if task.queue_path != self.queue_path {
            return Err(ValidationError::QueueMismatch {
                expected: self.queue_path.clone(),
                actual: task.queue_path.clone(),
            });
        }
        if task.prefix != self.prefix {
            return Err(ValidationError::PrefixMismatch {
                expected: self.prefix.clone(),
                actual: task.prefix.clone(),
            });
        }
        Ok(())
    }
}
