//! Task worker draining an in-memory queue

mod common;

use common::*;
use scanflow_compute::steps::ComputationStep;
use scanflow_compute::{
    EnricherKind, ErrorCategory, InMemoryTaskQueue, ServerContext, Task, TaskQueue, TaskStatus,
    TaskWorker, WorkerStats,
};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_task_reported_once() {
    let dir = TempDir::new().unwrap();
    let queue = Arc::new(InMemoryTaskQueue::new());
    let tasks = vec![
        Task::new(write_sample_report(dir.path(), "one.report")),
        Task::new(dir.path().join("missing.report")),
        Task::new(write_sample_report(dir.path(), "two.report")),
    ];
    for task in &tasks {
        queue.push(task.clone());
    }

    let worker = TaskWorker::new(queue.clone(), server_context(repository()), 2);
    let stats = worker.run(CancellationToken::new()).await;

    assert_eq!(
        stats,
        WorkerStats {
            completed: 2,
            failed: 1
        }
    );
    assert_eq!(queue.pending(), 0);

    let outcomes = queue.outcomes();
    assert_eq!(outcomes.len(), 3);
    let reported: HashSet<_> = outcomes.iter().map(|o| o.task_id).collect();
    let expected: HashSet<_> = tasks.iter().map(|t| t.id).collect();
    assert_eq!(reported, expected);

    let missing = outcomes.iter().find(|o| o.task_id == tasks[1].id).unwrap();
    assert!(!missing.status.is_completed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_bounded_by_workers() {
    let gauge = Arc::new(ConcurrencyGaugeStep::default());
    let parent = Arc::new(
        ServerContext::new(repository(), EnricherKind::default_order())
            .with_steps(vec![gauge.clone() as Arc<dyn ComputationStep>]),
    );
    let queue = Arc::new(InMemoryTaskQueue::new());
    for n in 0..6 {
        queue.push(Task::new(format!("/unused/{}.report", n)));
    }

    let stats = TaskWorker::new(queue.clone(), parent, 2)
        .run(CancellationToken::new())
        .await;

    assert_eq!(stats.completed, 6);
    assert!(gauge.max_seen() <= 2);
    assert!(gauge.max_seen() >= 1);
}

#[tokio::test]
async fn test_aborted_container_still_reported() {
    let parent = Arc::new(
        ServerContext::new(repository(), EnricherKind::default_order())
            .with_steps(vec![Arc::new(TrackPanicOnReleaseStep) as Arc<dyn ComputationStep>]),
    );
    let queue = Arc::new(InMemoryTaskQueue::new());
    let task = Task::new("/unused.report");
    queue.push(task.clone());

    let stats = TaskWorker::new(queue.clone(), parent, 1)
        .run(CancellationToken::new())
        .await;

    assert_eq!(stats.failed, 1);
    let outcomes = queue.outcomes();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].task_id, task.id);
    match &outcomes[0].status {
        TaskStatus::Failed { error_category, .. } => {
            assert_eq!(*error_category, ErrorCategory::Infrastructure)
        }
        TaskStatus::Completed => panic!("Expected a failed outcome"),
    }
}

#[tokio::test]
async fn test_cancelled_worker_polls_nothing() {
    let queue = Arc::new(InMemoryTaskQueue::new());
    queue.push(Task::new("/unused.report"));
    let token = CancellationToken::new();
    token.cancel();

    let stats = TaskWorker::new(queue.clone(), server_context(repository()), 1)
        .run(token)
        .await;

    assert_eq!(stats.processed(), 0);
    assert_eq!(queue.pending(), 1);
    assert!(queue.outcomes().is_empty());
}

#[tokio::test]
async fn test_empty_queue() {
    let queue = Arc::new(InMemoryTaskQueue::new());
    let stats = TaskWorker::new(queue.clone(), server_context(repository()), 4)
        .run(CancellationToken::new())
        .await;
    assert_eq!(stats, WorkerStats::default());
    assert_eq!(queue.poll().await, None);
}

#[test]
fn test_zero_workers_means_one() {
    let worker = TaskWorker::new(
        Arc::new(InMemoryTaskQueue::new()),
        server_context(repository()),
        0,
    );
    assert_eq!(worker.workers(), 1);
}
