//! Paged, prefix-filtered iteration over a queue.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::{self, Stream};
use tokio_util::sync::CancellationToken;

use crate::client::{guarded, TaskLister};
use crate::constants::DEFAULT_PAGE_SIZE;
use crate::convert::wire_to_task;
use crate::domain::Task;
use crate::error::{Result, SchedulerError};
use crate::identity::task_name;
use crate::types::{ListTasksRequest, TaskView, WireTask};

/// Lazily yields the tasks of one queue that carry one owner prefix.
///
/// Pages are fetched on demand, so a caller that stops early never issues
/// the remaining list calls. Tasks whose name lacks the prefix are skipped
/// without being decoded; an owned task that cannot be decoded or converted
/// ends the iteration with an error.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use cloudtask_scheduler::{memory::InMemoryCloudTasks, TaskIterator};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let queue = Arc::new(InMemoryCloudTasks::new());
/// let mut tasks = TaskIterator::new(queue, "projects/p/locations/l/queues/q", "pre-");
/// let cancel = CancellationToken::new();
/// assert!(tasks.next(&cancel).await.unwrap().is_none());
/// # }
/// ```
pub struct TaskIterator {
    lister: Arc<dyn TaskLister>,
    queue_path: String,
    prefix: String,
    filter: String,
    page_size: i32,
    buffered: VecDeque<WireTask>,
    next_page_token: String,
    started: bool,
}

impl std::fmt::Debug for TaskIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskIterator")
            .field("queue_path", &self.queue_path)
            .field("prefix", &self.prefix)
            .field("page_size", &self.page_size)
            .field("buffered", &self.buffered.len())
            .field("exhausted", &self.is_exhausted())
            .finish()
    }
}

impl TaskIterator {
    /// Creates an iterator with the default page size.
    pub fn new(
        lister: Arc<dyn TaskLister>,
        queue_path: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        let queue_path = queue_path.into();
        let prefix = prefix.into();
        Self {
            filter: task_name(&queue_path, &prefix),
            lister,
            queue_path,
            prefix,
            page_size: DEFAULT_PAGE_SIZE,
            buffered: VecDeque::new(),
            next_page_token: String::new(),
            started: false,
        }
    }

    /// Sets the page size requested from the lister.
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Returns the next owned task, or `None` once the queue is exhausted.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::Cancelled`] if `cancel` fires before a page arrives.
    /// - [`SchedulerError::Transport`] if a list call fails.
    /// - [`SchedulerError::Identity`] or [`SchedulerError::Conversion`] for
    ///   an owned task that cannot be read back.
    pub async fn next(&mut self, cancel: &CancellationToken) -> Result<Option<Task>> {
        loop {
            while let Some(wire) = self.buffered.pop_front() {
                if !wire.name.starts_with(&self.filter) {
                    continue;
                }
                return wire_to_task(&self.queue_path, &self.prefix, &wire).map(Some);
            }

            if self.is_exhausted() {
                return Ok(None);
            }
            self.fetch_page(cancel).await?;
        }
    }

    /// Drains the iterator into a vector.
    pub async fn collect(mut self, cancel: &CancellationToken) -> Result<Vec<Task>> {
        let mut tasks = Vec::new();
        while let Some(task) = self.next(cancel).await? {
            tasks.push(task);
        }
        Ok(tasks)
    }

    /// Adapts the iterator into a [`Stream`].
    ///
    /// The stream ends after the first error.
    pub fn into_stream(self, cancel: CancellationToken) -> impl Stream<Item = Result<Task>> {
        stream::try_unfold((self, cancel), |(mut iter, cancel)| async move {
            let next = iter.next(&cancel).await?;
            Ok(next.map(|task| (task, (iter, cancel))))
        })
    }

    fn is_exhausted(&self) -> bool {
        self.started && self.next_page_token.is_empty() && self.buffered.is_empty()
    }

    async fn fetch_page(&mut self, cancel: &CancellationToken) -> Result<()> {
        let request = ListTasksRequest {
            parent: self.queue_path.clone(),
            page_size: self.page_size,
            page_token: self.next_page_token.clone(),
            response_view: TaskView::Basic,
        };

        tracing::debug!(
            queue = %self.queue_path,
            page_token = %request.page_token,
            page_size = request.page_size,
            "listing tasks"
        );

        let response = guarded(cancel, "list tasks", self.lister.list_tasks(request))
            .await?
            .map_err(|source| SchedulerError::Transport {
                operation: "list tasks",
                target: self.queue_path.clone(),
                source,
            })?;

        tracing::debug!(
            queue = %self.queue_path,
            returned = response.tasks.len(),
            has_more = !response.next_page_token.is_empty(),
            "listed tasks"
        );

        self.started = true;
        self.next_page_token = response.next_page_token;
        self.buffered.extend(response.tasks);
        Ok(())
    }
}
