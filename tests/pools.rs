//! Pool lifecycle, session state, throttling, and retention scenarios.

mod common;

use std::time::Duration;

use serde_json::{json, Value};

use common::ScriptedEngine;
use runpool::{
    Config, ConfigureRequest, CreatePool, JobStatus, SchedulerError, SessionUpdate, StartRequest,
};

const WAIT: Option<Duration> = Some(Duration::from_secs(5));

fn text(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn pools_isolate_session_variables() {
    let scheduler = common::build(ScriptedEngine::new());

    for (pool, marker) in [("a", "A"), ("b", "B")] {
        scheduler
            .create_pool(CreatePool::new(pool).with_session(
                SessionUpdate::none().with_variables(vec![("Marker".into(), json!(marker))]),
            ))
            .await
            .unwrap();
    }

    let in_a = scheduler
        .start(StartRequest::new("emit $marker").in_pool("A"))
        .unwrap();
    let in_b = scheduler
        .start(StartRequest::new("emit $marker").in_pool("b"))
        .unwrap();

    assert!(scheduler.wait(&in_a, WAIT).await.unwrap());
    assert!(scheduler.wait(&in_b, WAIT).await.unwrap());
    assert_eq!(text(&in_a.receive_output(false)), ["A"]);
    assert_eq!(text(&in_b.receive_output(false)), ["B"]);
}

#[tokio::test]
async fn session_rebuild_is_rejected_while_tasks_are_active() {
    let scheduler = common::build(ScriptedEngine::new());

    let before = scheduler.session(None).await.unwrap();
    let job = scheduler.start(StartRequest::new("sleep 10000")).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = scheduler
        .configure_session(None, SessionUpdate::none().with_modules(vec!["json".into()]))
        .await
        .unwrap_err();
    match &err {
        SchedulerError::PoolBusy { name, active } => {
            assert_eq!(name, "default");
            assert!(*active >= 1);
        }
        other => panic!("expected PoolBusy, got {other:?}"),
    }
    assert!(err.to_string().contains("tasks are active"));

    // Nothing changed, and the task is untouched.
    assert_eq!(scheduler.session(None).await.unwrap(), before);
    assert!(job.is_active());

    scheduler.stop(&job).unwrap();
    assert!(scheduler.wait(&job, WAIT).await.unwrap());

    // Idle now: the same call succeeds.
    let after = scheduler
        .configure_session(None, SessionUpdate::none().with_modules(vec!["json".into()]))
        .await
        .unwrap();
    assert_eq!(after.modules, ["json"]);
}

#[tokio::test]
async fn init_runs_once_per_worker() {
    let engine = ScriptedEngine::new();
    let scheduler = common::build(engine.clone());

    scheduler
        .create_pool(
            CreatePool::new("boot")
                .with_min_workers(1)
                .with_max_workers(1)
                .with_session(SessionUpdate::none().with_init("incr boot")),
        )
        .await
        .unwrap();

    for _ in 0..2 {
        let job = scheduler
            .start(StartRequest::new("emit $boot").in_pool("boot"))
            .unwrap();
        assert!(scheduler.wait(&job, WAIT).await.unwrap());
        assert_eq!(job.status(), JobStatus::Completed);
        // Both tasks observe the counter at 1: the init ran exactly once.
        assert_eq!(text(&job.receive_output(false)), ["1"]);
    }
    assert_eq!(engine.workers_created(), 1);
}

#[tokio::test]
async fn running_tasks_never_exceed_max_workers() {
    let engine = ScriptedEngine::new();
    let scheduler = common::build(engine.clone());

    scheduler
        .create_pool(CreatePool::new("narrow").with_max_workers(2))
        .await
        .unwrap();

    let jobs: Vec<_> = (0..4)
        .map(|_| {
            scheduler
                .start(StartRequest::new("sleep 150").in_pool("narrow"))
                .unwrap()
        })
        .collect();

    for job in &jobs {
        assert!(scheduler.wait(job, WAIT).await.unwrap());
        assert_eq!(job.status(), JobStatus::Completed);
    }
    assert!(
        engine.peak_concurrency() <= 2,
        "peak concurrency {} exceeded the gate",
        engine.peak_concurrency()
    );
}

#[tokio::test]
async fn retention_evicts_completed_tasks_only() {
    let cfg = Config {
        sweep_interval: Duration::from_millis(100),
        ..Config::default()
    };
    let scheduler = common::build_with(ScriptedEngine::new(), cfg);

    scheduler
        .create_pool(
            CreatePool::new("shortlived").with_retention(Duration::from_millis(200)),
        )
        .await
        .unwrap();

    let done = scheduler
        .start(StartRequest::new("emit hi").in_pool("shortlived"))
        .unwrap();
    let running = scheduler
        .start(StartRequest::new("sleep 10000").in_pool("shortlived"))
        .unwrap();

    assert!(scheduler.wait(&done, WAIT).await.unwrap());
    assert!(scheduler.job(done.id()).is_some());

    tokio::time::sleep(Duration::from_secs(1)).await;

    // The completed task aged out; the active one is never evicted.
    assert!(scheduler.job(done.id()).is_none());
    assert!(scheduler.job(running.id()).is_some());

    scheduler.stop(&running).unwrap();
    assert!(scheduler.wait(&running, WAIT).await.unwrap());
}

#[tokio::test]
async fn configure_validates_limits() {
    let scheduler = common::build(ScriptedEngine::new());

    for req in [
        ConfigureRequest::none().with_min_workers(0),
        ConfigureRequest::none().with_min_workers(4).with_max_workers(2),
    ] {
        match scheduler.configure(None, req).await {
            Err(SchedulerError::InvalidArgument { .. }) => {}
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn configure_resizes_the_gate() {
    let scheduler = common::build(ScriptedEngine::new());

    let settings = scheduler
        .configure(
            None,
            ConfigureRequest::none()
                .with_min_workers(1)
                .with_max_workers(3)
                .with_retention(Duration::from_secs(60)),
        )
        .await
        .unwrap();
    assert_eq!(settings.max_workers, 3);
    assert_eq!(settings.retention, Duration::from_secs(60));
    assert_eq!(scheduler.settings(None).await.unwrap(), settings);

    // Shrink while idle succeeds immediately.
    let shrunk = scheduler
        .configure(None, ConfigureRequest::none().with_max_workers(1))
        .await
        .unwrap();
    assert_eq!(shrunk.max_workers, 1);
}

#[tokio::test]
async fn gate_shrink_times_out_under_load() {
    let cfg = Config {
        resize_wait: Duration::from_millis(200),
        ..Config::default()
    };
    let scheduler = common::build_with(ScriptedEngine::new(), cfg);

    scheduler
        .create_pool(CreatePool::new("busy").with_max_workers(2))
        .await
        .unwrap();

    let jobs: Vec<_> = (0..2)
        .map(|_| {
            scheduler
                .start(StartRequest::new("sleep 10000").in_pool("busy"))
                .unwrap()
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(50)).await;

    match scheduler
        .configure(Some("busy"), ConfigureRequest::none().with_max_workers(1))
        .await
    {
        Err(SchedulerError::ResizeTimedOut { pool, .. }) => assert_eq!(pool, "busy"),
        other => panic!("expected ResizeTimedOut, got {other:?}"),
    }
    // The recorded limit is unchanged after the failed shrink.
    assert_eq!(
        scheduler.settings(Some("busy")).await.unwrap().max_workers,
        2
    );

    for job in &jobs {
        scheduler.stop(job).unwrap();
        assert!(scheduler.wait(job, WAIT).await.unwrap());
    }
}

#[tokio::test]
async fn module_probe_reports_the_search_path() {
    let scheduler = common::build(ScriptedEngine::new());

    let checks = scheduler.check_modules(&["json", "nope"]).unwrap();
    assert!(checks[0].available);
    assert!(checks[0].location.is_some());
    assert!(!checks[1].available);
    assert!(checks[1].message.contains("/opt/scripted/modules"));

    let before = scheduler.session(None).await.unwrap();
    let err = scheduler
        .configure_session(
            None,
            SessionUpdate::none().with_modules(vec!["json".into(), "nope".into()]),
        )
        .await
        .unwrap_err();
    match &err {
        SchedulerError::MissingModules { missing, search_path } => {
            assert_eq!(missing.len(), 1);
            assert_eq!(missing[0].name, "nope");
            assert_eq!(search_path, "/opt/scripted/modules");
        }
        other => panic!("expected MissingModules, got {other:?}"),
    }
    assert!(err.to_string().contains("nope"));
    assert!(err.to_string().contains("/opt/scripted/modules"));
    // A failed probe mutates nothing.
    assert_eq!(scheduler.session(None).await.unwrap(), before);
}

#[tokio::test]
async fn pool_removal_guards() {
    let scheduler = common::build(ScriptedEngine::new());

    match scheduler.remove_pool("default", true).await {
        Err(SchedulerError::DefaultPoolProtected) => {}
        other => panic!("expected DefaultPoolProtected, got {other:?}"),
    }
    match scheduler.remove_pool("ghost", false).await {
        Err(SchedulerError::PoolNotFound { .. }) => {}
        other => panic!("expected PoolNotFound, got {other:?}"),
    }

    scheduler
        .create_pool(CreatePool::new("doomed"))
        .await
        .unwrap();
    let job = scheduler
        .start(StartRequest::new("sleep 10000").in_pool("doomed"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    match scheduler.remove_pool("doomed", false).await {
        Err(SchedulerError::PoolBusy { name, .. }) => assert_eq!(name, "doomed"),
        other => panic!("expected PoolBusy, got {other:?}"),
    }

    // Force removal fires every active task's cancel signal and waits for
    // no one; the held handle still observes the cancellation.
    scheduler.remove_pool("doomed", true).await.unwrap();
    assert!(job.wait(Some(Duration::from_secs(5))).await);
    assert_eq!(job.status(), JobStatus::Cancelled);
    assert!(scheduler.job(job.id()).is_none());
    assert!(scheduler.pools(Some("doomed")).await.unwrap().is_empty());
}

#[tokio::test]
async fn create_pool_is_idempotent_and_applies_overrides() {
    let scheduler = common::build(ScriptedEngine::new());

    let first = scheduler
        .create_pool(CreatePool::new("Work").with_max_workers(4))
        .await
        .unwrap();
    assert_eq!(first.name, "work");
    assert_eq!(first.max_workers, 4);

    // Same name (case-insensitively): returns the existing pool with the
    // overrides applied through the regular update path.
    let second = scheduler
        .create_pool(CreatePool::new("WORK").with_max_workers(2))
        .await
        .unwrap();
    assert_eq!(second.name, "work");
    assert_eq!(second.max_workers, 2);

    let listed = scheduler.pools(None).await.unwrap();
    let names: Vec<_> = listed.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["default", "work"]);
}

#[tokio::test]
async fn pool_info_counts_tasks() {
    let scheduler = common::build(ScriptedEngine::new());

    let done = scheduler.start(StartRequest::new("emit hi")).unwrap();
    assert!(scheduler.wait(&done, WAIT).await.unwrap());
    let running = scheduler.start(StartRequest::new("sleep 10000")).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let pools = scheduler.pools(Some("default")).await.unwrap();
    let info = &pools[0];
    assert_eq!(info.task_count, 2);
    assert_eq!(info.active_count, 1);

    scheduler.stop(&running).unwrap();
    assert!(scheduler.wait(&running, WAIT).await.unwrap());
}

#[tokio::test]
async fn disposed_scheduler_rejects_everything() {
    let scheduler = common::build(ScriptedEngine::new());

    let job = scheduler.start(StartRequest::new("sleep 10000")).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    scheduler.shutdown().await;

    // Shutdown cancelled the in-flight task.
    assert!(job.wait(Some(Duration::from_secs(5))).await);
    assert_eq!(job.status(), JobStatus::Cancelled);

    match scheduler.start(StartRequest::new("emit hi")) {
        Err(SchedulerError::Disposed) => {}
        other => panic!("expected Disposed, got {other:?}"),
    }
    assert!(matches!(
        scheduler.jobs(None, None),
        Err(SchedulerError::Disposed)
    ));
    assert!(matches!(
        scheduler.configure(None, ConfigureRequest::none()).await,
        Err(SchedulerError::Disposed)
    ));
    assert!(matches!(
        scheduler.check_modules(&["json"]),
        Err(SchedulerError::Disposed)
    ));

    // Idempotent.
    scheduler.shutdown().await;
}
