//! In-memory Cloud Tasks queue.
//!
//! [`InMemoryCloudTasks`] implements [`CloudTasksClient`] over a
//! `BTreeMap<String, WireTask>` keyed by task name. It behaves like the
//! remote queue where the scheduler can observe it:
//!
//! - listing is sorted by name and paged; the page token is the last name returned
//! - `BASIC` views omit the request body
//! - creating an existing name fails with `ALREADY_EXISTS`
//! - deleting a missing name fails with `NOT_FOUND`
//!
//! It keeps one counter per operation so tests can assert how many remote
//! calls a run made.
//!
//! # Examples
//!
//! ```
//! use cloudtask_scheduler::memory::InMemoryCloudTasks;
//! use cloudtask_scheduler::types::WireTask;
//!
//! let queue = InMemoryCloudTasks::new();
//! queue.insert(WireTask {
//!     name: "projects/p/locations/l/queues/q/tasks/other-a_1v1".to_string(),
//!     ..Default::default()
//! });
//! assert_eq!(queue.len(), 1);
//! assert_eq!(queue.create_calls(), 0);
//! ```

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::{CloudTasksClient, RemoteCode, RemoteError, TaskLister};
use crate::constants::{MAX_PAGE_SIZE, TASKS_SEGMENT};
use crate::types::{
    CreateTaskRequest, DeleteTaskRequest, ListTasksRequest, ListTasksResponse, TaskView, WireTask,
};

/// Process-local stand-in for a Cloud Tasks queue.
///
/// Holds tasks of any number of queues; each operation is scoped by the
/// queue path in its request.
#[derive(Debug, Default)]
pub struct InMemoryCloudTasks {
    tasks: Mutex<BTreeMap<String, WireTask>>,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl InMemoryCloudTasks {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a task directly, replacing any task of the same name. Not counted.
    pub fn insert(&self, task: WireTask) {
        self.tasks.lock().insert(task.name.clone(), task);
    }

    /// Returns a stored task in full view.
    pub fn get(&self, name: &str) -> Option<WireTask> {
        self.tasks.lock().get(name).cloned()
    }

    /// Names of all stored tasks, sorted.
    pub fn names(&self) -> Vec<String> {
        self.tasks.lock().keys().cloned().collect()
    }

    /// Returns the number of stored tasks.
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Returns `true` if no task is stored.
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Number of `list_tasks` calls served.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `create_task` calls received, including failed ones.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of `delete_task` calls received, including failed ones.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Resets all call counters.
    pub fn reset_counters(&self) {
        self.list_calls.store(0, Ordering::SeqCst);
        self.create_calls.store(0, Ordering::SeqCst);
        self.delete_calls.store(0, Ordering::SeqCst);
    }
}

fn with_view(mut task: WireTask, view: TaskView) -> WireTask {
    if view != TaskView::Full {
        if let Some(http) = task.http_request.as_mut() {
            http.body = None;
        }
    }
    task
}

#[async_trait]
impl TaskLister for InMemoryCloudTasks {
    async fn list_tasks(&self, request: ListTasksRequest) -> Result<ListTasksResponse, RemoteError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let page_size = match request.page_size {
            size if size <= 0 => MAX_PAGE_SIZE,
            size => size.min(MAX_PAGE_SIZE),
        };
        let page_size = page_size as usize;

        let scope = format!("{}{TASKS_SEGMENT}", request.parent);
        let lower = if request.page_token.is_empty() {
            Bound::Included(scope.as_str())
        } else {
            if !request.page_token.starts_with(&scope) {
                return Err(RemoteError::new(
                    RemoteCode::InvalidArgument,
                    format!("page token {:?} does not belong to {}", request.page_token, request.parent),
                ));
            }
            Bound::Excluded(request.page_token.as_str())
        };

        let tasks = self.tasks.lock();
        let mut in_scope = tasks
            .range::<str, _>((lower, Bound::Unbounded))
            .take_while(|(name, _)| name.starts_with(&scope));

        let page: Vec<WireTask> = in_scope
            .by_ref()
            .take(page_size)
            .map(|(_, task)| with_view(task.clone(), request.response_view))
            .collect();

        let next_page_token = match (in_scope.next(), page.last()) {
            (Some(_), Some(last)) => last.name.clone(),
            _ => String::new(),
        };

        Ok(ListTasksResponse {
            tasks: page,
            next_page_token,
        })
    }
}

#[async_trait]
impl CloudTasksClient for InMemoryCloudTasks {
    async fn create_task(&self, request: CreateTaskRequest) -> Result<WireTask, RemoteError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let name = request.task.name.clone();
        let scope = format!("{}{TASKS_SEGMENT}", request.parent);
        if !name.starts_with(&scope) || name.len() == scope.len() {
            return Err(RemoteError::new(
                RemoteCode::InvalidArgument,
                format!("task name {name:?} is not under {}", request.parent),
            ));
        }

        let mut tasks = self.tasks.lock();
        if tasks.contains_key(&name) {
            return Err(RemoteError::new(
                RemoteCode::AlreadyExists,
                format!("requested entity already exists: {name}"),
            ));
        }
        tasks.insert(name, request.task.clone());
        Ok(with_view(request.task, request.response_view))
    }

    async fn delete_task(&self, request: DeleteTaskRequest) -> Result<(), RemoteError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        match self.tasks.lock().remove(&request.name) {
            Some(_) => Ok(()),
            None => Err(RemoteError::new(
                RemoteCode::NotFound,
                format!("requested entity was not found: {}", request.name),
            )),
        }
    }
}
