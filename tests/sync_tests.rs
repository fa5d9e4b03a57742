//! Reconciliation tests against a mocked queue.
//!
//! Each test states exactly which remote calls it expects; any other call
//! fails the mock. Organized into module blocks per concern.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::Method;
use mockall::{mock, Sequence};
use tokio_util::sync::CancellationToken;
use url::Url;

use cloudtask_scheduler::client::{CloudTasksClient, RemoteCode, RemoteError, TaskLister};
use cloudtask_scheduler::convert::task_to_wire;
use cloudtask_scheduler::types::{
    CreateTaskRequest, DeleteTaskRequest, ListTasksRequest, ListTasksResponse, TaskView, WireTask,
};
use cloudtask_scheduler::{
    Authorization, HttpRequest, Scheduler, SchedulerConfig, SchedulerError, Task, ValidationError,
};

mock! {
    pub Queue {}

    #[async_trait]
    impl TaskLister for Queue {
        async fn list_tasks(&self, request: ListTasksRequest) -> Result<ListTasksResponse, RemoteError>;
    }

    #[async_trait]
    impl CloudTasksClient for Queue {
        async fn create_task(&self, request: CreateTaskRequest) -> Result<WireTask, RemoteError>;
        async fn delete_task(&self, request: DeleteTaskRequest) -> Result<(), RemoteError>;
    }
}

mock! {
    pub Lister {}

    #[async_trait]
    impl TaskLister for Lister {
        async fn list_tasks(&self, request: ListTasksRequest) -> Result<ListTasksResponse, RemoteError>;
    }
}

const QUEUE: &str = "projects/tokyo-rain-123/locations/asia-northeast1/queues/scheduler";
const PREFIX: &str = "test_";

fn config() -> SchedulerConfig {
    SchedulerConfig::new("tokyo-rain-123", "asia-northeast1", "scheduler", PREFIX)
}

fn name(task_id: &str) -> String {
    format!("{QUEUE}/tasks/{task_id}")
}

/// POST with a JSON body and an OAuth token, scheduled at 1s 2ns.
fn post_task() -> Task {
    Task::new(
        QUEUE,
        PREFIX,
        "id",
        DateTime::from_timestamp(1, 2).unwrap(),
        HttpRequest::new(Method::POST, Url::parse("https://example.com/").unwrap())
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(r#"{"payload":"test"}"#),
    )
    .with_authorization(Authorization::oauth(
        "test@example.com",
        "https://www.googleapis.com/auth/calendar",
    ))
}

/// Unauthenticated GET scheduled at 10s 1ns.
fn get_task() -> Task {
    Task::new(
        QUEUE,
        PREFIX,
        "get",
        DateTime::from_timestamp(10, 1).unwrap(),
        HttpRequest::new(Method::GET, Url::parse("https://example.com/").unwrap()),
    )
}

/// The task as the queue lists it: BASIC view, no body.
fn listed(task: &Task, version: u64) -> WireTask {
    let mut wire = task_to_wire(&task.clone().with_version(version)).unwrap();
    if let Some(http) = wire.http_request.as_mut() {
        http.body = None;
    }
    wire
}

fn expect_listing(queue: &mut MockQueue, tasks: Vec<WireTask>) {
    queue
        .expect_list_tasks()
        .times(1)
        .returning(move |_| {
            Ok(ListTasksResponse {
                tasks: tasks.clone(),
                next_page_token: String::new(),
            })
        });
}

fn scheduler(queue: MockQueue) -> Scheduler {
    Scheduler::new(Arc::new(queue), &config()).unwrap()
}

// ─── Plan and apply ─────────────────────────────────────────────────────────

mod sync_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_empty_queue_and_empty_desired_set() {
        let mut queue = MockQueue::new();
        expect_listing(&mut queue, vec![]);

        let report = scheduler(queue)
            .sync(&[], &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.deleted.is_empty());
        assert!(report.created.is_empty());
        assert_eq!(report.unchanged, 0);
    }

    #[tokio::test]
    async fn test_matching_tasks_are_left_alone() {
        let mut queue = MockQueue::new();
        expect_listing(&mut queue, vec![listed(&post_task(), 1), listed(&get_task(), 1)]);

        let report = scheduler(queue)
            .sync(&[post_task(), get_task()], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.unchanged, 2);
        assert!(report.deleted.is_empty());
        assert!(report.created.is_empty());
    }

    #[tokio::test]
    async fn test_new_tasks_are_created_at_version_one() {
        let mut queue = MockQueue::new();
        expect_listing(&mut queue, vec![]);

        let mut seq = Sequence::new();
        queue
            .expect_create_task()
            .withf(|req| {
                req.parent == QUEUE
                    && req.response_view == TaskView::Basic
                    && req.task.name == name("test_id_3b9aca02v1")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|req| Ok(req.task));
        queue
            .expect_create_task()
            .withf(|req| req.task.name == name("test_get_2540be401v1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|req| Ok(req.task));

        let report = scheduler(queue)
            .sync(&[post_task(), get_task()], &CancellationToken::new())
            .await
            .unwrap();
        let versions: Vec<_> = report.created.iter().map(|t| (t.id.as_str(), t.version)).collect();
        assert_eq!(versions, vec![("id", 1), ("get", 1)]);
    }

    #[tokio::test]
    async fn test_changed_tasks_are_replaced_with_bumped_version() {
        let mut queue = MockQueue::new();
        expect_listing(&mut queue, vec![listed(&post_task(), 2), listed(&get_task(), 2)]);

        let mut seq = Sequence::new();
        queue
            .expect_delete_task()
            .withf(|req| req.name == name("test_id_3b9aca02v2"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        queue
            .expect_delete_task()
            .withf(|req| req.name == name("test_get_2540be401v2"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        queue
            .expect_create_task()
            .withf(|req| req.task.name == name("test_id_3b9aca02v3"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|req| Ok(req.task));
        queue
            .expect_create_task()
            .withf(|req| req.task.name == name("test_get_2540be401v3"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|req| Ok(req.task));

        let mut moved = post_task();
        moved.request.url = Url::parse("https://example.com/updated").unwrap();
        let mut now_put = get_task();
        now_put.request.method = Method::PUT;

        let desired = [moved, now_put];
        let report = scheduler(queue)
            .sync(&desired, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            report.deleted,
            vec![name("test_id_3b9aca02v2"), name("test_get_2540be401v2")]
        );
        assert!(report.created.iter().all(|t| t.version == 3));
        // The caller's tasks are not modified.
        assert_eq!(desired[0].version, 0);
    }

    #[tokio::test]
    async fn test_higher_desired_version_forces_replacement() {
        let mut queue = MockQueue::new();
        expect_listing(&mut queue, vec![listed(&post_task(), 2)]);
        queue
            .expect_delete_task()
            .withf(|req| req.name == name("test_id_3b9aca02v2"))
            .times(1)
            .returning(|_| Ok(()));
        queue
            .expect_create_task()
            .withf(|req| req.task.name == name("test_id_3b9aca02v5"))
            .times(1)
            .returning(|req| Ok(req.task));

        let report = scheduler(queue)
            .sync(&[post_task().with_version(5)], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.created[0].version, 5);
    }

    #[tokio::test]
    async fn test_maximum_remote_version_cannot_be_superseded() {
        let mut queue = MockQueue::new();
        expect_listing(&mut queue, vec![listed(&post_task(), u64::MAX)]);

        let mut changed = post_task();
        changed.request.url = Url::parse("https://example.com/changed").unwrap();

        let err = scheduler(queue)
            .sync(&[changed], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::Validation(ValidationError::VersionExhausted { ref name })
                if name.ends_with(&format!("v{}", u64::MAX))
        ));
    }

    #[tokio::test]
    async fn test_stale_tasks_are_deleted() {
        let mut queue = MockQueue::new();
        expect_listing(&mut queue, vec![listed(&post_task(), 1), listed(&get_task(), 1)]);
        queue.expect_delete_task().times(2).returning(|_| Ok(()));

        let report = scheduler(queue)
            .sync(&[], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.deleted.len(), 2);
        assert!(report.created.is_empty());
    }

    #[tokio::test]
    async fn test_leftover_duplicate_of_matched_key_is_deleted() {
        let mut queue = MockQueue::new();
        expect_listing(&mut queue, vec![listed(&post_task(), 1), listed(&post_task(), 2)]);
        queue
            .expect_delete_task()
            .withf(|req| req.name == name("test_id_3b9aca02v2"))
            .times(1)
            .returning(|_| Ok(()));

        let report = scheduler(queue)
            .sync(&[post_task()], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.deleted, vec![name("test_id_3b9aca02v2")]);
    }

    #[tokio::test]
    async fn test_foreign_tasks_are_ignored() {
        let mut queue = MockQueue::new();
        let mut foreign = listed(&get_task(), 1);
        foreign.name = name("other_get_2540be401v1");
        expect_listing(&mut queue, vec![foreign]);

        let report = scheduler(queue)
            .sync(&[], &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.deleted.is_empty());
    }

    #[tokio::test]
    async fn test_plan_does_not_mutate_queue() {
        let mut queue = MockQueue::new();
        expect_listing(&mut queue, vec![listed(&get_task(), 1)]);

        let plan = scheduler(queue)
            .plan(&[post_task()], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(plan.deletions.len(), 1);
        assert_eq!(plan.creations.len(), 1);
        assert_eq!(plan.creations[0].version, 1);
        assert!(!plan.is_empty());
    }
}

// ─── Failures ───────────────────────────────────────────────────────────────

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_collision_is_already_exists() {
        let mut queue = MockQueue::new();
        expect_listing(&mut queue, vec![]);
        queue.expect_create_task().times(1).returning(|_| {
            Err(RemoteError::new(
                RemoteCode::AlreadyExists,
                "Requested entity already exists",
            ))
        });

        let err = scheduler(queue)
            .sync(&[post_task()], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
        assert!(matches!(
            err,
            SchedulerError::AlreadyExists { ref name } if name.ends_with("test_id_3b9aca02v1")
        ));
    }

    #[tokio::test]
    async fn test_failed_delete_stops_the_run() {
        let mut queue = MockQueue::new();
        expect_listing(&mut queue, vec![listed(&post_task(), 1), listed(&get_task(), 1)]);
        queue
            .expect_delete_task()
            .times(1)
            .returning(|_| Err(RemoteError::new(RemoteCode::Unavailable, "try again")));
        queue.expect_create_task().never();

        let desired = [get_task().with_version(4)];
        let err = scheduler(queue)
            .sync(&desired, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.remote_code(), Some(RemoteCode::Unavailable));
        assert!(err.to_string().starts_with("failed to delete task"));
    }

    #[tokio::test]
    async fn test_failed_create_stops_the_run() {
        let mut queue = MockQueue::new();
        expect_listing(&mut queue, vec![]);
        queue
            .expect_create_task()
            .times(1)
            .returning(|_| Err(RemoteError::new(RemoteCode::PermissionDenied, "denied")));

        let err = scheduler(queue)
            .sync(&[post_task(), get_task()], &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.remote_code(), Some(RemoteCode::PermissionDenied));
    }

    #[tokio::test]
    async fn test_failed_listing_is_reported() {
        let mut queue = MockQueue::new();
        queue
            .expect_list_tasks()
            .times(1)
            .returning(|_| Err(RemoteError::new(RemoteCode::NotFound, "queue not found")));

        let err = scheduler(queue)
            .sync(&[post_task()], &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.remote_code(), Some(RemoteCode::NotFound));
    }

    #[tokio::test]
    async fn test_cancelled_run_issues_no_calls() {
        let mut queue = MockQueue::new();
        queue.expect_list_tasks().never();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = scheduler(queue)
            .sync(&[post_task()], &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancellation_between_calls_stops_the_run() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let mut queue = MockQueue::new();
        expect_listing(&mut queue, vec![listed(&post_task(), 1), listed(&get_task(), 1)]);
        queue.expect_delete_task().times(1).returning(move |_| {
            trigger.cancel();
            Ok(())
        });

        let err = scheduler(queue).sync(&[], &cancel).await.unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::Cancelled {
                operation: "delete task"
            }
        ));
    }
}

// ─── Validation ─────────────────────────────────────────────────────────────

mod validation_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn never_called() -> MockQueue {
        let mut queue = MockQueue::new();
        queue.expect_list_tasks().never();
        queue.expect_create_task().never();
        queue.expect_delete_task().never();
        queue
    }

    #[tokio::test]
    async fn test_duplicate_comparison_key_is_rejected() {
        let err = scheduler(never_called())
            .sync(&[get_task(), get_task().with_version(3)], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::Validation(ValidationError::DuplicateTask { ref key })
                if key == "test_get_2540be401"
        ));
    }

    #[tokio::test]
    async fn test_foreign_queue_is_rejected() {
        let mut task = get_task();
        task.queue_path = "projects/p/locations/l/queues/other".to_string();
        let err = scheduler(never_called())
            .sync(&[task], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::Validation(ValidationError::QueueMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_foreign_prefix_is_rejected() {
        let mut task = get_task();
        task.prefix = "other_".to_string();
        let err = scheduler(never_called())
            .sync(&[task], &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "task validation failed: task prefix \"other_\" does not match scheduler prefix \"test_\""
        );
    }

    #[tokio::test]
    async fn test_invalid_id_fails_before_any_call() {
        let mut bad = get_task();
        bad.id = "bad id".to_string();
        let err = scheduler(never_called())
            .sync(&[get_task(), bad], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_standalone_create_validates_first() {
        let mut empty = get_task();
        empty.id = String::new();
        let err = scheduler(never_called())
            .create(&empty, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::Validation(ValidationError::EmptyId)
        ));
    }
}

// ─── Standalone operations ──────────────────────────────────────────────────

mod operation_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_create_assigns_version_one_and_sends_full_request() {
        let mut queue = MockQueue::new();
        queue
            .expect_create_task()
            .withf(|req| {
                let http = req.task.http_request.as_ref().unwrap();
                req.task.name == name("test_id_3b9aca02v1")
                    && http.body.as_deref() == Some(br#"{"payload":"test"}"#.as_slice())
                    && http.oauth_token.is_some()
            })
            .times(1)
            .returning(|req| Ok(req.task));

        let created = scheduler(queue)
            .create(&post_task(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(created.version, 1);
    }

    #[tokio::test]
    async fn test_delete_passes_name_through() {
        let mut queue = MockQueue::new();
        queue
            .expect_delete_task()
            .withf(|req| req.name == name("test_get_2540be401v1"))
            .times(1)
            .returning(|_| Err(RemoteError::new(RemoteCode::NotFound, "gone")));

        let err = scheduler(queue)
            .delete(&name("test_get_2540be401v1"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.remote_code(), Some(RemoteCode::NotFound));
    }

    #[tokio::test]
    async fn test_list_uses_injected_lister() {
        let mut queue = MockQueue::new();
        queue.expect_list_tasks().never();

        let mut lister = MockLister::new();
        lister
            .expect_list_tasks()
            .withf(|req| req.parent == QUEUE && req.page_size == 1000 && req.page_token.is_empty())
            .times(1)
            .returning(|_| {
                Ok(ListTasksResponse {
                    tasks: vec![listed(&get_task(), 7)],
                    next_page_token: String::new(),
                })
            });

        let scheduler = scheduler(queue).with_lister(Arc::new(lister));
        let tasks = scheduler
            .list()
            .collect(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "get");
        assert_eq!(tasks[0].version, 7);
    }
}
