//! End-to-end scheduler flows: registration, elastic groups, close/restart,
//! and the shutdown drain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use taskherd::{
    Config, Scheduler, SchedulerBuilder, TaskDescriptor, WorkError, WorkerFn, WorkerRef,
};

fn fast_monitor_config() -> Config {
    let mut cfg = Config::default();
    cfg.monitor_interval = Duration::from_millis(25);
    cfg.shutdown_timeout = Duration::from_secs(5);
    cfg
}

fn scheduler() -> Arc<Scheduler> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    SchedulerBuilder::new(fast_monitor_config()).build()
}

fn counting_worker() -> (WorkerRef, Arc<AtomicU64>) {
    let count = Arc::new(AtomicU64::new(0));
    let c = count.clone();
    let worker = WorkerFn::arc(move || {
        let c = c.clone();
        async move {
            c.fetch_add(1, Ordering::Relaxed);
            Ok::<_, WorkError>(())
        }
    });
    (worker, count)
}

/// Polls until `probe` returns true or the deadline passes.
async fn wait_until(deadline: Duration, mut probe: impl FnMut() -> bool) -> bool {
    let clock = Instant::now();
    loop {
        if probe() {
            return true;
        }
        if clock.elapsed() > deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn interval_descriptor(group: &str, parallel: usize, worker: WorkerRef) -> TaskDescriptor {
    TaskDescriptor::new(group, worker)
        .parallel(parallel)
        .interval(Duration::from_millis(10))
}

#[tokio::test(flavor = "multi_thread")]
async fn register_and_start_cron_replicas() {
    let sched = scheduler();
    let (worker, _count) = counting_worker();

    let descriptor = TaskDescriptor::new("gather", worker)
        .parallel(3)
        .cron("* * * * * *");
    assert_eq!(sched.load(&[descriptor], &Vec::new()).unwrap(), 3);

    let registry = sched.registry();
    assert_eq!(registry.group_size("gather"), 3);
    for i in 0..3 {
        let task = registry.find(&format!("gather-{i}")).unwrap();
        assert_eq!(task.config().index(), i);
        assert_eq!(task.config().total(), 3);
        assert!(registry.is_stopped(task.id()));
    }

    registry.start_all();
    assert!(registry.has_started_group("gather"));
    assert_eq!(registry.stopped_len(), 0);

    // The first tick fires immediately, so every replica runs well within 2s.
    let ran = wait_until(Duration::from_secs(2), || {
        (0..3).all(|i| {
            sched
                .registry()
                .find(&format!("gather-{i}"))
                .map(|t| t.analysis().executions() >= 1)
                .unwrap_or(false)
        })
    })
    .await;
    assert!(ran, "every replica should execute within two seconds");

    sched.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn append_rebalances_group() {
    let sched = scheduler();
    let (worker, _count) = counting_worker();
    sched
        .load(&[interval_descriptor("pool", 3, worker)], &Vec::new())
        .unwrap();

    sched.registry().append("pool", 2, false).unwrap();

    let registry = sched.registry();
    assert_eq!(registry.group_size("pool"), 5);
    for i in 0..5 {
        let task = registry.find(&format!("pool-{i}")).unwrap();
        assert_eq!(task.config().index(), i);
        assert_eq!(task.config().total(), 5);
    }
    // The clones stay stopped until started explicitly.
    assert!(registry.is_stopped("pool-3"));
    assert!(registry.is_stopped("pool-4"));

    sched.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn remove_last_replica_drains_it() {
    let sched = scheduler();
    let (worker, _count) = counting_worker();
    sched
        .load(&[interval_descriptor("pool", 3, worker)], &Vec::new())
        .unwrap();
    sched.registry().start_group("pool");

    assert_eq!(sched.registry().remove_replica("pool"), 2);
    assert_eq!(sched.registry().group_size("pool"), 2);

    // The removed replica was running; it transitions through stopping and is
    // dropped by the monitor instead of returning to stopped.
    let gone = wait_until(Duration::from_secs(3), || {
        let r = sched.registry();
        !r.is_started("pool-2") && !r.is_stopped("pool-2") && r.stopping_len() == 0
    })
    .await;
    assert!(gone, "removed replica should leave every table");

    // Survivors keep contiguous indices.
    for i in 0..2 {
        let task = sched.registry().find(&format!("pool-{i}")).unwrap();
        assert_eq!(task.config().index(), i);
        assert_eq!(task.config().total(), 2);
    }

    sched.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn close_then_restart_resumes_iterations() {
    let sched = scheduler();
    let (worker, count) = counting_worker();
    sched
        .load(&[interval_descriptor("beat", 1, worker)], &Vec::new())
        .unwrap();

    sched.registry().start("beat-0");
    assert!(
        wait_until(Duration::from_secs(2), || count.load(Ordering::Relaxed) >= 1).await,
        "task should iterate after start"
    );

    assert!(sched.registry().close("beat-0"));
    let stopped = wait_until(Duration::from_secs(3), || {
        sched.registry().is_stopped("beat-0")
    })
    .await;
    assert!(stopped, "monitor should finalize the closed task");

    let before_restart = count.load(Ordering::Relaxed);
    assert!(sched.registry().start("beat-0"));
    let resumed = wait_until(Duration::from_secs(2), || {
        count.load(Ordering::Relaxed) > before_restart
    })
    .await;
    assert!(resumed, "iterations should resume after restart");

    sched.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn close_and_start_are_idempotent() {
    let sched = scheduler();
    let (worker, _count) = counting_worker();
    sched
        .load(&[interval_descriptor("solo", 1, worker)], &Vec::new())
        .unwrap();

    assert!(sched.registry().start("solo-0"));
    // Already started: the stopped table no longer holds the id.
    assert!(!sched.registry().start("solo-0"));

    assert!(sched.registry().close("solo-0"));
    // Close already requested: second call is a no-op.
    assert!(!sched.registry().close("solo-0"));

    let settled = wait_until(Duration::from_secs(3), || {
        sched.registry().is_stopped("solo-0")
    })
    .await;
    assert!(settled);

    sched.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn run_limit_closes_the_task_by_itself() {
    let sched = scheduler();
    let (worker, count) = counting_worker();
    let descriptor = TaskDescriptor::new("burst", worker)
        .parallel(1)
        .interval(Duration::from_millis(5))
        .run_limit(3);
    sched.load(&[descriptor], &Vec::new()).unwrap();

    sched.registry().start("burst-0");
    let finished = wait_until(Duration::from_secs(3), || {
        sched.registry().is_stopped("burst-0")
    })
    .await;
    assert!(finished, "task should retire itself at the run limit");
    assert_eq!(count.load(Ordering::Relaxed), 3);

    sched.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_hooks_are_contained() {
    let sched = scheduler();
    let attempts = Arc::new(AtomicU64::new(0));
    let a = attempts.clone();
    let worker = WorkerFn::arc(move || {
        let a = a.clone();
        async move {
            a.fetch_add(1, Ordering::Relaxed);
            Err::<(), _>(WorkError::fail("boom"))
        }
    });
    sched
        .load(&[interval_descriptor("flaky", 1, worker)], &Vec::new())
        .unwrap();

    sched.registry().start("flaky-0");
    let kept_running = wait_until(Duration::from_secs(2), || {
        attempts.load(Ordering::Relaxed) >= 3
    })
    .await;
    assert!(kept_running, "loop must continue past hook failures");

    let task = sched.registry().find("flaky-0").unwrap();
    assert!(task.analysis().failures() >= 3);
    assert!(sched.registry().is_started("flaky-0"));

    sched.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn before_after_only_brackets_the_whole_run() {
    let sched = scheduler();
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    struct Bracketed {
        order: Arc<std::sync::Mutex<Vec<&'static str>>>,
    }

    #[async_trait::async_trait]
    impl taskherd::Worker for Bracketed {
        async fn before(&self) -> Result<(), WorkError> {
            self.order.lock().unwrap().push("before");
            Ok(())
        }
        async fn execute(&self) -> Result<(), WorkError> {
            self.order.lock().unwrap().push("execute");
            Ok(())
        }
        async fn after(&self) -> Result<(), WorkError> {
            self.order.lock().unwrap().push("after");
            Ok(())
        }
        async fn destroy(&self) -> Result<(), WorkError> {
            self.order.lock().unwrap().push("destroy");
            Ok(())
        }
    }

    let descriptor = TaskDescriptor::new("bracket", Arc::new(Bracketed { order: order.clone() }))
        .parallel(1)
        .interval(Duration::from_millis(5))
        .run_limit(3)
        .before_after_only(true);
    sched.load(&[descriptor], &Vec::new()).unwrap();

    sched.registry().start("bracket-0");
    // Wait on the destroy hook rather than table state: the monitor can move
    // the task to stopped a moment before destroy runs.
    let finished = wait_until(Duration::from_secs(3), || {
        order.lock().unwrap().last() == Some(&"destroy")
    })
    .await;
    assert!(finished);

    let seen = order.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec!["before", "execute", "execute", "execute", "after", "destroy"],
        "before/after must bracket the whole run exactly once"
    );

    sched.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_drains_running_tasks() {
    let sched = scheduler();
    let (worker, _count) = counting_worker();
    sched
        .load(&[interval_descriptor("fleet", 3, worker)], &Vec::new())
        .unwrap();
    sched.registry().start_all();
    assert_eq!(sched.registry().started_len(), 3);

    let report = sched.shutdown().await;
    assert!(report.drained, "drain should finish inside the timeout");
    assert!(report.leaked.is_empty());
    assert!(report.elapsed < Duration::from_secs(5));
    assert_eq!(sched.registry().started_len(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn every_task_lives_in_at_most_one_table() {
    let sched = scheduler();
    let (worker, _count) = counting_worker();
    sched
        .load(&[interval_descriptor("mix", 4, worker)], &Vec::new())
        .unwrap();

    sched.registry().start("mix-0");
    sched.registry().start("mix-1");
    sched.registry().close("mix-0");

    // Let the monitor settle the in-flight transition.
    let quiescent = wait_until(Duration::from_secs(3), || {
        sched.registry().stopping_len() == 0
    })
    .await;
    assert!(quiescent);

    for i in 0..4 {
        let id = format!("mix-{i}");
        let buckets = [
            sched.registry().is_started(&id),
            sched
                .registry()
                .stopping_tasks()
                .iter()
                .any(|t| t.id() == id),
            sched.registry().is_stopped(&id),
        ];
        assert_eq!(
            buckets.iter().filter(|b| **b).count(),
            1,
            "{id} must live in exactly one table at quiescence"
        );
    }

    sched.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn remove_group_shrinks_to_one_then_closes() {
    let sched = scheduler();
    let (worker, _count) = counting_worker();
    sched
        .load(&[interval_descriptor("herd", 4, worker)], &Vec::new())
        .unwrap();
    sched.registry().start_group("herd");

    sched.registry().remove_group("herd");
    assert_eq!(sched.registry().group_size("herd"), 1);

    let drained = wait_until(Duration::from_secs(3), || {
        !sched.registry().has_started_group("herd") && sched.registry().stopping_len() == 0
    })
    .await;
    assert!(drained, "the surviving replica should close");

    sched.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn include_exclusion_filters_apply() {
    let mut cfg = fast_monitor_config();
    cfg.includes = vec!["keep.*".to_string()];
    cfg.exclusions = vec!["keep-not".to_string()];
    let sched = SchedulerBuilder::new(cfg).build();

    let (worker, _count) = counting_worker();
    let loaded = sched
        .load(
            &[
                interval_descriptor("keep-yes", 1, worker.clone()),
                interval_descriptor("keep-not", 1, worker.clone()),
                interval_descriptor("drop-me", 1, worker),
            ],
            &Vec::new(),
        )
        .unwrap();

    assert_eq!(loaded, 1);
    assert_eq!(sched.registry().group_size("keep-yes"), 1);
    assert_eq!(sched.registry().group_size("keep-not"), 0);
    assert_eq!(sched.registry().group_size("drop-me"), 0);

    sched.shutdown().await;
}
