//! Reconciles a small reminder schedule against an in-memory queue.
//!
//! Run with `RUST_LOG=debug cargo run --example sync_demo` to see every
//! decision the scheduler makes.

use std::sync::Arc;

use chrono::{Duration, Utc};
use cloudtask_scheduler::memory::InMemoryCloudTasks;
use cloudtask_scheduler::{Authorization, HttpRequest, Scheduler, SchedulerConfig, Task};
use http::header::{HeaderValue, CONTENT_TYPE};
use http::Method;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

fn reminder(
    config: &SchedulerConfig,
    id: &str,
    in_minutes: i64,
    url: &str,
) -> Result<Task, url::ParseError> {
    let request = HttpRequest::new(Method::POST, Url::parse(url)?)
        .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .with_body(format!(r#"{{"reminder":"{id}"}}"#));

    Ok(Task::new(
        config.queue_path(),
        &config.prefix,
        id,
        Utc::now() + Duration::minutes(in_minutes),
        request,
    )
    .with_authorization(Authorization::oidc(
        "scheduler@tokyo-rain-123.iam.gserviceaccount.com",
        "https://reminders.example.com",
    )))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = SchedulerConfig::new("tokyo-rain-123", "asia-northeast1", "scheduler", "reminder-");
    let queue = Arc::new(InMemoryCloudTasks::new());
    let scheduler = Scheduler::new(queue.clone(), &config)?;
    let cancel = CancellationToken::new();

    let standup = reminder(&config, "standup", 30, "https://reminders.example.com/standup")?;
    let review = reminder(&config, "review", 90, "https://reminders.example.com/review")?;

    println!("== initial sync");
    let report = scheduler.sync(&[standup.clone(), review.clone()], &cancel).await?;
    println!("created {} task(s)", report.created.len());

    println!("== unchanged sync");
    let report = scheduler.sync(&[standup, review.clone()], &cancel).await?;
    println!("{} task(s) already up to date", report.unchanged);

    println!("== review moves to a new endpoint, standup is dropped");
    let mut moved = review.clone();
    moved.request.url = Url::parse("https://reminders.example.com/review/v2")?;
    let plan = scheduler.plan(&[moved], &cancel).await?;
    for task in &plan.deletions {
        println!("  delete {}", task.task_name());
    }
    for task in &plan.creations {
        println!("  create {}", task.task_name());
    }
    scheduler.apply(plan, &cancel).await?;

    println!("== queue now holds");
    for name in queue.names() {
        println!("  {name}");
    }

    Ok(())
}
