mod helpers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use jobscout::{
    IntoTaskResult, JobOptions, JobStatus, TaskContext, TaskError, TaskHandler, TaskKind,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::sleep;

use crate::helpers::{enable_logs, StaticCounter, TestWorld};

#[tokio::test]
async fn it_will_execute_jobs_as_they_come_up_and_exits_cleanly() {
    static SCAN_CALL_COUNT: StaticCounter = StaticCounter::new();

    enable_logs().await;

    #[derive(Serialize, Deserialize)]
    struct CountingScan {
        a: u32,
    }

    impl TaskHandler for CountingScan {
        const KIND: TaskKind = TaskKind::UserJobScan;

        async fn run(self, _ctx: TaskContext) -> impl IntoTaskResult {
            SCAN_CALL_COUNT.increment().await;
            Ok::<(), TaskError>(())
        }
    }

    let world = TestWorld::new();
    let worker = Arc::new(
        world
            .worker_options()
            .define_task::<CountingScan>()
            .init()
            .await
            .expect("Failed to init worker"),
    );
    let client = worker.client().clone();

    let worker_fut = tokio::spawn({
        let worker = worker.clone();
        async move { worker.run().await }
    });

    // Schedule 5 jobs one after the other and wait until each has run.
    for i in 1..=5 {
        client
            .enqueue_task(CountingScan { a: i }, JobOptions::default())
            .await
            .expect("Failed to enqueue job");

        let start_time = Instant::now();
        while SCAN_CALL_COUNT.get().await < i {
            if start_time.elapsed().as_secs() > 5 {
                panic!("Job should have been processed by now");
            }
            sleep(Duration::from_millis(50)).await;
        }
    }

    assert_eq!(SCAN_CALL_COUNT.get().await, 5);

    worker.request_shutdown();
    worker_fut
        .await
        .expect("Worker task panicked")
        .expect("Worker should exit cleanly");
}

#[tokio::test]
async fn handler_output_is_stored_on_the_completed_job() {
    #[derive(Serialize, Deserialize)]
    struct Sweep {}

    impl TaskHandler for Sweep {
        const KIND: TaskKind = TaskKind::CleanupOldJobs;

        async fn run(self, _ctx: TaskContext) -> impl IntoTaskResult {
            Ok::<_, TaskError>(json!({ "swept": 3 }))
        }
    }

    let world = TestWorld::new();
    let worker = world
        .worker_options()
        .define_task::<Sweep>()
        .init()
        .await
        .expect("Failed to init worker");
    let client = worker.client().clone();

    let job = client
        .enqueue_task(Sweep {}, JobOptions::default())
        .await
        .expect("Failed to enqueue job");
    worker.run_once().await.expect("Failed to run worker");

    let stored = client.job(*job.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), &JobStatus::Completed);
    assert_eq!(stored.result(), &Some(json!({ "swept": 3 })));
    assert_eq!(stored.attempt_count(), &0);
    assert!(stored.processed_at().is_some());
}

#[tokio::test]
async fn a_job_without_a_registered_handler_fails_for_good() {
    let world = TestWorld::new();
    // No handler registered at all.
    let worker = world
        .worker_options()
        .init()
        .await
        .expect("Failed to init worker");
    let client = worker.client().clone();

    let job = client
        .enqueue(TaskKind::AnalyzeJobMatch, json!({}), JobOptions::default())
        .await
        .expect("Failed to enqueue job");
    worker.run_once().await.expect("Failed to run worker");

    let stored = client.job(*job.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), &JobStatus::Failed);
    // A missing handler can never heal, so no attempts are kept back.
    assert_eq!(stored.attempt_count(), &1);
    let error = stored.error_message().as_deref().unwrap();
    assert!(
        error.contains("Cannot find any handler for task kind 'analyze_job_match'"),
        "unexpected error message: {error}"
    );
}

#[tokio::test]
async fn a_panicking_handler_does_not_take_the_worker_down() {
    static PANIC_CALL_COUNT: StaticCounter = StaticCounter::new();

    #[derive(Serialize, Deserialize)]
    struct Panics {}

    impl TaskHandler for Panics {
        const KIND: TaskKind = TaskKind::UserJobScan;

        async fn run(self, _ctx: TaskContext) -> impl IntoTaskResult {
            PANIC_CALL_COUNT.increment().await;
            if true {
                panic!("handler blew up");
            }
            Ok::<(), TaskError>(())
        }
    }

    let world = TestWorld::new();
    let worker = world
        .worker_options()
        .define_task::<Panics>()
        .init()
        .await
        .expect("Failed to init worker");
    let client = worker.client().clone();

    let job = client
        .enqueue_task(
            Panics {},
            JobOptions::builder().max_attempts(1).build(),
        )
        .await
        .expect("Failed to enqueue job");
    worker.run_once().await.expect("Failed to run worker");

    assert_eq!(PANIC_CALL_COUNT.get().await, 1);
    let stored = client.job(*job.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), &JobStatus::Failed);
    let error = stored.error_message().as_deref().unwrap();
    assert!(
        error.contains("Task failed execution to complete"),
        "unexpected error message: {error}"
    );

    // The worker is still able to process jobs afterwards.
    let second = client
        .enqueue_task(
            Panics {},
            JobOptions::builder().max_attempts(1).build(),
        )
        .await
        .expect("Failed to enqueue job");
    worker.run_once().await.expect("Failed to run worker");

    assert_eq!(PANIC_CALL_COUNT.get().await, 2);
    let stored = client.job(*second.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), &JobStatus::Failed);
}

#[tokio::test]
async fn a_handler_past_its_timeout_is_aborted_and_fails_for_good() {
    static FINISHED: StaticCounter = StaticCounter::new();

    #[derive(Serialize, Deserialize)]
    struct Stuck {}

    impl TaskHandler for Stuck {
        const KIND: TaskKind = TaskKind::UserJobScan;
        const TIMEOUT: Option<Duration> = Some(Duration::from_millis(100));

        async fn run(self, _ctx: TaskContext) -> impl IntoTaskResult {
            sleep(Duration::from_secs(3600)).await;
            FINISHED.increment().await;
            Ok::<(), TaskError>(())
        }
    }

    let world = TestWorld::new();
    let worker = world
        .worker_options()
        .define_task::<Stuck>()
        .init()
        .await
        .expect("Failed to init worker");
    let client = worker.client().clone();

    let job = client
        .enqueue_task(Stuck {}, JobOptions::default())
        .await
        .expect("Failed to enqueue job");
    worker.run_once().await.expect("Failed to run worker");

    let stored = client.job(*job.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), &JobStatus::Failed);
    // Deadline expiry is not retried, the attempts are spent on the spot.
    assert_eq!(stored.attempt_count(), &1);
    let error = stored.error_message().as_deref().unwrap();
    assert!(
        error.contains("Task exceeded its timeout"),
        "unexpected error message: {error}"
    );
    assert_eq!(FINISHED.get().await, 0);
}
