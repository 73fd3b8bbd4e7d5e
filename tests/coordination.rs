//! Coordination flows: mirror publications, remote commands, the root lease,
//! and direct port injection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use taskherd::coordination::{command_key, commands_prefix};
use taskherd::{
    AnalysisSnapshot, Config, Coordination, KvStore, MemoryKv, Scheduler, SchedulerBuilder,
    TaskDescriptor, WorkError, WorkerFn, WorkerRef,
};

fn coordinated_config() -> Config {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut cfg = Config::default();
    cfg.monitor_interval = Duration::from_millis(25);
    cfg.shutdown_timeout = Duration::from_secs(5);
    cfg.coordination = true;
    cfg.root = "/herd-test".to_string();
    cfg
}

fn ticking_worker() -> WorkerRef {
    WorkerFn::arc(|| async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok::<_, WorkError>(())
    })
}

fn interval_descriptor(group: &str, parallel: usize) -> TaskDescriptor {
    TaskDescriptor::new(group, ticking_worker())
        .parallel(parallel)
        .interval(Duration::from_millis(10))
}

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

async fn state_of(store: &MemoryKv, root: &str, group: &str, id: &str) -> Option<String> {
    store
        .get(&format!("{root}/{group}/{id}/state"))
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn mirror_publishes_lifecycle_states() {
    let store = Arc::new(MemoryKv::new());
    let sched = SchedulerBuilder::new(coordinated_config())
        .with_store(store.clone())
        .build();

    sched
        .load(&[interval_descriptor("mirror", 1)], &Vec::new())
        .unwrap();
    sched.registry().start("mirror-0");

    let published = {
        let store = store.clone();
        wait_until(Duration::from_secs(3), move || {
            futures::executor::block_on(state_of(&store, "/herd-test", "mirror", "mirror-0"))
                .as_deref()
                == Some("STARTED")
        })
        .await
    };
    assert!(published, "start should reach the store");

    sched.registry().close("mirror-0");
    let stopped = {
        let store = store.clone();
        wait_until(Duration::from_secs(3), move || {
            futures::executor::block_on(state_of(&store, "/herd-test", "mirror", "mirror-0"))
                .as_deref()
                == Some("STOPPED")
        })
        .await
    };
    assert!(stopped, "monitor finalization should reach the store");

    // Analysis is published alongside the state as JSON counters.
    let analysis = store
        .get("/herd-test/mirror/mirror-0/analysis")
        .await
        .unwrap()
        .expect("analysis key should exist");
    let parsed: serde_json::Value = serde_json::from_str(&analysis).unwrap();
    assert!(parsed.get("executions").is_some());

    sched.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn removed_replica_publishes_removed_state() {
    let store = Arc::new(MemoryKv::new());
    let sched = SchedulerBuilder::new(coordinated_config())
        .with_store(store.clone())
        .build();

    sched
        .load(&[interval_descriptor("shrink", 2)], &Vec::new())
        .unwrap();
    sched.registry().start_group("shrink");

    assert_eq!(sched.registry().remove_replica("shrink"), 1);

    let removed = {
        let store = store.clone();
        wait_until(Duration::from_secs(3), move || {
            futures::executor::block_on(state_of(&store, "/herd-test", "shrink", "shrink-1"))
                .as_deref()
                == Some("REMOVED")
        })
        .await
    };
    assert!(removed, "removal should publish the REMOVED state");

    sched.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_commands_drive_the_registry() {
    let store = Arc::new(MemoryKv::new());
    let sched = SchedulerBuilder::new(coordinated_config())
        .with_store(store.clone())
        .build();

    sched
        .load(&[interval_descriptor("remote", 1)], &Vec::new())
        .unwrap();
    sched.registry().start("remote-0");

    // Grow the group by two auto-started replicas.
    store
        .put(&command_key("/herd-test", 1), "append remote 2")
        .await
        .unwrap();
    let grown = wait_until(Duration::from_secs(3), || {
        sched.registry().group_size("remote") == 3 && sched.registry().started_len() == 3
    })
    .await;
    assert!(grown, "remote append should add started replicas");

    // Stop one replica remotely.
    store
        .put(&command_key("/herd-test", 2), "stop remote remote-1")
        .await
        .unwrap();
    let stopped = wait_until(Duration::from_secs(3), || {
        sched.registry().is_stopped("remote-1")
    })
    .await;
    assert!(stopped, "remote stop should close the replica");

    // Restart it remotely.
    store
        .put(&command_key("/herd-test", 3), "start remote remote-1")
        .await
        .unwrap();
    let restarted = wait_until(Duration::from_secs(3), || {
        sched.registry().is_started("remote-1")
    })
    .await;
    assert!(restarted, "remote start should rebind the replica");

    // Shrink the group remotely.
    store
        .put(&command_key("/herd-test", 4), "remove remote")
        .await
        .unwrap();
    let shrunk = wait_until(Duration::from_secs(3), || {
        sched.registry().group_size("remote") == 2
    })
    .await;
    assert!(shrunk, "remote remove should drop the last replica");

    // Consumed commands are deleted from the queue.
    let queue_empty = {
        let store = store.clone();
        wait_until(Duration::from_secs(3), move || {
            futures::executor::block_on(store.list(&commands_prefix("/herd-test")))
                .unwrap()
                .is_empty()
        })
        .await
    };
    assert!(queue_empty, "consumed commands should leave the queue");

    sched.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_commands_are_rejected_and_consumed() {
    let store = Arc::new(MemoryKv::new());
    let sched = SchedulerBuilder::new(coordinated_config())
        .with_store(store.clone())
        .build();

    sched
        .load(&[interval_descriptor("safe", 1)], &Vec::new())
        .unwrap();

    store
        .put(&command_key("/herd-test", 1), "explode safe now")
        .await
        .unwrap();
    // Well-formed but aimed at an id nobody registered.
    store
        .put(&command_key("/herd-test", 2), "stop safe safe-9")
        .await
        .unwrap();

    let consumed = {
        let store = store.clone();
        wait_until(Duration::from_secs(3), move || {
            futures::executor::block_on(store.list(&commands_prefix("/herd-test")))
                .unwrap()
                .is_empty()
        })
        .await
    };
    assert!(consumed, "bad commands must still be consumed");
    assert_eq!(sched.registry().group_size("safe"), 1);
    assert!(sched.registry().is_stopped("safe-0"));

    sched.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn root_lease_stays_alive() {
    let store = Arc::new(MemoryKv::new());
    let sched = SchedulerBuilder::new(coordinated_config())
        .with_store(store.clone())
        .with_lease_ttl(Duration::from_millis(200))
        .build();

    // Well past one TTL: the refresher must have renewed the lease.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
        store.get("/herd-test").await.unwrap().as_deref(),
        Some("alive")
    );

    sched.shutdown().await;
}

// ---------------------------------------------------------------------------
// Direct port injection
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingPort {
    calls: Mutex<Vec<(String, String, Option<bool>)>>,
    stopped_count: AtomicU64,
}

impl RecordingPort {
    fn calls_for(&self, id: &str) -> Vec<(String, Option<bool>)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, task, _)| task == id)
            .map(|(kind, _, removed)| (kind.clone(), *removed))
            .collect()
    }
}

impl Coordination for RecordingPort {
    fn task_started(&self, _group: &str, id: &str, _analysis: &AnalysisSnapshot) {
        self.calls
            .lock()
            .unwrap()
            .push(("started".into(), id.into(), None));
    }

    fn task_stopping(&self, _group: &str, id: &str, _analysis: &AnalysisSnapshot) {
        self.calls
            .lock()
            .unwrap()
            .push(("stopping".into(), id.into(), None));
    }

    fn task_stopped(&self, _group: &str, id: &str, removed: bool, _analysis: &AnalysisSnapshot) {
        self.stopped_count.fetch_add(1, Ordering::Relaxed);
        self.calls
            .lock()
            .unwrap()
            .push(("stopped".into(), id.into(), Some(removed)));
    }
}

fn port_scheduler(port: Arc<RecordingPort>) -> Arc<Scheduler> {
    let mut cfg = Config::default();
    cfg.monitor_interval = Duration::from_millis(25);
    SchedulerBuilder::new(cfg).with_coordination(port).build()
}

#[tokio::test(flavor = "multi_thread")]
async fn one_stopped_publication_per_close_cycle() {
    let port = Arc::new(RecordingPort::default());
    let sched = port_scheduler(port.clone());

    sched
        .load(&[interval_descriptor("cycle", 1)], &Vec::new())
        .unwrap();
    sched.registry().start("cycle-0");
    sched.registry().close("cycle-0");

    let settled = wait_until(Duration::from_secs(3), || {
        sched.registry().is_stopped("cycle-0")
    })
    .await;
    assert!(settled);
    // Give a few extra monitor ticks a chance to double-publish (they must not).
    tokio::time::sleep(Duration::from_millis(150)).await;

    let calls = port.calls_for("cycle-0");
    assert_eq!(
        calls,
        vec![
            ("started".to_string(), None),
            ("stopping".to_string(), None),
            ("stopped".to_string(), Some(false)),
        ],
        "exactly one publication per transition"
    );

    sched.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn disabled_coordination_publishes_nothing() {
    // Coordination off: the builder falls back to the no-op port, and every
    // lifecycle operation still succeeds.
    let mut cfg = Config::default();
    cfg.monitor_interval = Duration::from_millis(25);
    let sched = SchedulerBuilder::new(cfg).build();

    sched
        .load(&[interval_descriptor("local", 2)], &Vec::new())
        .unwrap();
    sched.registry().start_all();
    sched.registry().append("local", 1, true).unwrap();
    assert_eq!(sched.registry().group_size("local"), 3);
    sched.registry().close_all();

    let drained = wait_until(Duration::from_secs(3), || {
        sched.registry().started_len() == 0 && sched.registry().stopping_len() == 0
    })
    .await;
    assert!(drained);

    sched.shutdown().await;
}
