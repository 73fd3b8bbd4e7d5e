//! # Registry: tri-state task tables and the group index.
//!
//! The registry owns every task for the process lifetime and tracks each one
//! in exactly one of three tables:
//!
//! - `started`: bound to the worker pool, loop running or about to run
//! - `stopping`: close requested, loop not yet finished
//! - `stopped`: idle, available for restart
//!
//! A fourth structure, the group index, holds every replica of a group in
//! insertion order regardless of lifecycle state; it is the source of truth
//! for the `(index, total)` shard assignment and is recomputed by
//! [`rebalance`](Registry::rebalance) on every membership change.
//!
//! ## Concurrency contract
//! Single-key table operations are atomic. Moves between tables are
//! insert-then-remove, so a task may transiently be visible in two tables (or
//! neither); the status monitor restores the single-table invariant within one
//! sweep. Bulk operations (`close_all`, `start_all`) are not serialized
//! against concurrent `register`/`append`; callers coordinate those phases.
//!
//! Every transition is forwarded to the
//! [`Coordination`](crate::coordination::Coordination) port. The registry
//! never branches on whether coordination is enabled; a disabled deployment
//! injects the no-op port.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::coordination::Coordination;
use crate::error::SchedulerError;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{Task, TaskConfig, TaskRef, WorkerRef};

use super::runner;

/// Per-group state: members in insertion order plus the id counter.
///
/// The counter only grows, so clone ids stay unique across the life of the
/// group even after removals.
#[derive(Default)]
struct GroupEntry {
    members: Vec<TaskRef>,
    next_seq: usize,
}

/// Process-wide task registry and lifecycle manager.
pub struct Registry {
    started: DashMap<String, TaskRef>,
    stopping: DashMap<String, TaskRef>,
    stopped: DashMap<String, TaskRef>,
    groups: Mutex<HashMap<String, GroupEntry>>,
    bus: Bus,
    coordination: Arc<dyn Coordination>,
}

impl Registry {
    /// Creates an empty registry publishing to `bus` and mirroring through
    /// `coordination`.
    pub fn new(bus: Bus, coordination: Arc<dyn Coordination>) -> Arc<Self> {
        Arc::new(Self {
            started: DashMap::new(),
            stopping: DashMap::new(),
            stopped: DashMap::new(),
            groups: Mutex::new(HashMap::new()),
            bus,
            coordination,
        })
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.bus
    }

    // ---------------------------
    // Registration
    // ---------------------------

    /// Registers a task: places it in the stopped table, appends it to its
    /// group, and rebalances the group.
    ///
    /// # Errors
    /// Returns [`SchedulerError::AlreadyRegistered`] when the id exists in any
    /// table; no state is mutated in that case.
    pub fn register(
        &self,
        config: TaskConfig,
        worker: WorkerRef,
    ) -> Result<TaskRef, SchedulerError> {
        let id = config.id().to_string();
        if self.contains(&id) {
            return Err(SchedulerError::AlreadyRegistered { id });
        }

        let task = Task::new(config, worker);
        let group = task.group().to_string();

        {
            let mut groups = self.lock_groups();
            let entry = groups.entry(group.clone()).or_default();
            entry.members.push(task.clone());
            // Keep the clone counter ahead of explicitly chosen ids.
            if let Some(seq) = id_sequence(&id) {
                entry.next_seq = entry.next_seq.max(seq + 1);
            }
            self.rebalance_members(&group, &entry.members);
        }

        self.stopped.insert(id.clone(), task.clone());
        info!(task = %id, group = %group, "registered task");
        self.bus
            .publish(Event::now(EventKind::Registered).with_task(&id).with_group(&group));

        Ok(task)
    }

    /// Reserves the next replica sequence number for a group.
    pub(crate) fn next_index(&self, group: &str) -> usize {
        let mut groups = self.lock_groups();
        let entry = groups.entry(group.to_string()).or_default();
        let seq = entry.next_seq;
        entry.next_seq += 1;
        seq
    }

    // ---------------------------
    // Start
    // ---------------------------

    /// Starts a stopped task: binds it, submits its loop to the worker pool,
    /// and publishes the transition. No-op when the id is unknown, not in the
    /// stopped table, or already running.
    ///
    /// Removing from the stopped table is the claim, so concurrent starts of
    /// the same id spawn exactly one loop.
    pub fn start(self: &Arc<Self>, id: &str) -> bool {
        let Some((_, task)) = self.stopped.remove_if(id, |_, v| v.is_close()) else {
            return false;
        };

        self.bind(&task);
        tokio::spawn(runner::run_loop(task.clone(), Arc::clone(self)));

        self.coordination
            .task_started(task.group(), id, &task.analysis().snapshot());
        true
    }

    /// Like [`start`](Registry::start), but an id unknown to every table is
    /// reported instead of silently ignored. Returns whether this call
    /// performed the transition; a known id that is not startable (already
    /// running, close pending) is an `Ok(false)` no-op.
    ///
    /// # Errors
    /// Returns [`SchedulerError::NotFound`] for an unregistered id.
    pub fn start_checked(self: &Arc<Self>, id: &str) -> Result<bool, SchedulerError> {
        if !self.contains(id) {
            return Err(SchedulerError::NotFound { id: id.to_string() });
        }
        Ok(self.start(id))
    }

    /// Starts every stopped task of a group.
    pub fn start_group(self: &Arc<Self>, group: &str) {
        for id in self.stopped_ids_of(group) {
            self.start(&id);
        }
    }

    /// Starts every stopped task.
    pub fn start_all(self: &Arc<Self>) {
        let ids: Vec<String> = self.stopped.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.start(&id);
        }
    }

    /// Moves the task into the started table with a cleared close flag.
    fn bind(&self, task: &TaskRef) {
        task.set_close(false);
        task.set_closed(false);
        self.started.insert(task.id().to_string(), task.clone());

        info!(task = %task.id(), group = %task.group(), "bound task to worker pool");
        self.bus.publish(
            Event::now(EventKind::Started)
                .with_task(task.id())
                .with_group(task.group()),
        );
    }

    // ---------------------------
    // Close
    // ---------------------------

    /// Requests a close for a started task. Idempotent; returns whether this
    /// call performed the transition.
    pub fn close(&self, id: &str) -> bool {
        let Some(task) = self.started.get(id).map(|e| e.value().clone()) else {
            return false;
        };
        self.close_task(&task)
    }

    /// Requests a close on a task reference directly. The close flag is
    /// claimed atomically, so exactly one caller performs the transition and
    /// publishes it; publication happens after the local mutation.
    pub fn close_task(&self, task: &TaskRef) -> bool {
        if !task.try_close() {
            return false;
        }

        let id = task.id().to_string();
        self.stopping.insert(id.clone(), task.clone());
        if self
            .started
            .remove_if(&id, |_, v| Arc::ptr_eq(v, task))
            .is_some()
        {
            debug!(task = %id, remaining = self.started.len(), "unbound task");
        }
        task.wake();

        self.coordination
            .task_stopping(task.group(), &id, &task.analysis().snapshot());

        info!(task = %id, group = %task.group(), "close requested");
        self.bus.publish(
            Event::now(EventKind::Stopping)
                .with_task(&id)
                .with_group(task.group()),
        );
        true
    }

    /// Like [`close`](Registry::close), but an id unknown to every table is
    /// reported instead of silently ignored. Returns whether this call
    /// performed the transition; a known id that is already closed or never
    /// started is an `Ok(false)` no-op.
    ///
    /// # Errors
    /// Returns [`SchedulerError::NotFound`] for an unregistered id.
    pub fn close_checked(&self, id: &str) -> Result<bool, SchedulerError> {
        if !self.contains(id) {
            return Err(SchedulerError::NotFound { id: id.to_string() });
        }
        Ok(self.close(id))
    }

    /// Requests a close for every started task of a group.
    pub fn close_group(&self, group: &str) {
        for task in self.started_of(group) {
            self.close_task(&task);
        }
    }

    /// Requests a close for every started task.
    pub fn close_all(&self) {
        let tasks: Vec<TaskRef> = self.started.iter().map(|e| e.value().clone()).collect();
        if !tasks.is_empty() {
            warn!(count = tasks.len(), "closing all started tasks");
        }
        for task in tasks {
            self.close_task(&task);
        }
    }

    /// Moves a task whose loop has finished out of the started table.
    ///
    /// Called by the scheduler loop on exit. Covers self-closing tasks (run
    /// limit, exhausted schedule) whose transition was never requested through
    /// [`close`](Registry::close); externally closed tasks were already moved
    /// and this is a no-op.
    pub(crate) fn retire(&self, task: &TaskRef) {
        let id = task.id().to_string();
        if self
            .started
            .remove_if(&id, |_, v| Arc::ptr_eq(v, task))
            .is_none()
        {
            return;
        }

        self.coordination
            .task_stopping(task.group(), &id, &task.analysis().snapshot());
        self.stopping.insert(id.clone(), task.clone());

        debug!(task = %id, "task retired after final iteration");
        self.bus.publish(
            Event::now(EventKind::Stopping)
                .with_task(&id)
                .with_group(task.group()),
        );
    }

    /// Finalizes a closed task from the stopping table.
    ///
    /// Called by the status monitor once `closed` is observed: the task
    /// returns to the stopped table unless it was detached for removal, and
    /// exactly one stopped publication goes out either way.
    pub(crate) fn finalize(&self, task: &TaskRef) {
        let id = task.id().to_string();
        let removed = task.is_remove();

        if !removed {
            self.stopped.insert(id.clone(), task.clone());
        }
        self.stopping.remove_if(&id, |_, v| Arc::ptr_eq(v, task));

        self.coordination
            .task_stopped(task.group(), &id, removed, &task.analysis().snapshot());

        debug!(task = %id, removed, "task finalized as stopped");
        self.bus.publish(
            Event::now(EventKind::Stopped)
                .with_task(&id)
                .with_group(task.group())
                .with_removed(removed),
        );
    }

    // ---------------------------
    // Elastic groups
    // ---------------------------

    /// Grows a group by cloning its last replica `size` times.
    ///
    /// New replicas start stopped; with `auto_start` they are started
    /// immediately, otherwise their stopped state is published to the mirror.
    /// Unknown groups are a logged no-op.
    pub fn append(
        self: &Arc<Self>,
        group: &str,
        size: usize,
        auto_start: bool,
    ) -> Result<(), SchedulerError> {
        let Some(template) = self.find_last(group) else {
            warn!(group, "append ignored: no replica to clone");
            return Ok(());
        };

        for _ in 0..size {
            let seq = self.next_index(group);
            let id = format!("{group}-{seq}");
            if self.contains(&id) {
                return Err(SchedulerError::AlreadyRegistered { id });
            }

            let total = template.config().total();
            let config = template.config().clone_as(id.clone(), total, total + 1);
            let task = Task::new(config, template.worker().clone());

            {
                let mut groups = self.lock_groups();
                let entry = groups.entry(group.to_string()).or_default();
                entry.members.push(task.clone());
                self.rebalance_members(group, &entry.members);
            }
            self.stopped.insert(id.clone(), task.clone());

            info!(task = %id, group, "appended replica");
            self.bus
                .publish(Event::now(EventKind::Registered).with_task(&id).with_group(group));

            if auto_start {
                self.start(&id);
            } else {
                self.coordination
                    .task_stopped(group, &id, false, &task.analysis().snapshot());
            }
        }

        Ok(())
    }

    /// Removes a replica from its group.
    ///
    /// A group keeps its last replica unless `force` is set; in that case the
    /// call is a no-op returning the unchanged size. A detached replica is
    /// closed if still running (the monitor finalizes it as removed), or
    /// finalized immediately when already closed. Returns the remaining group
    /// size.
    pub fn remove_replica_task(&self, task: &TaskRef, force: bool) -> usize {
        let group = task.group().to_string();
        let id = task.id().to_string();

        let remaining = {
            let mut groups = self.lock_groups();
            let Some(entry) = groups.get_mut(&group) else {
                return 0;
            };
            if entry.members.len() <= 1 && !force {
                return entry.members.len();
            }

            entry.members.retain(|t| !Arc::ptr_eq(t, task));
            task.set_remove(true);
            self.rebalance_members(&group, &entry.members);
            entry.members.len()
        };

        info!(task = %id, group = %group, remaining, "removed replica from group");
        self.bus
            .publish(Event::now(EventKind::Removed).with_task(&id).with_group(&group));

        if task.is_closed() && !self.stopping.contains_key(&id) {
            // Idle replica; finalize in place.
            self.stopped.remove_if(&id, |_, v| Arc::ptr_eq(v, task));
            self.coordination
                .task_stopped(&group, &id, true, &task.analysis().snapshot());
            self.bus.publish(
                Event::now(EventKind::Stopped)
                    .with_task(&id)
                    .with_group(&group)
                    .with_removed(true),
            );
        } else {
            // Running (or already draining): the monitor finalizes it with the
            // remove flag once the loop observes the close.
            self.close_task(task);
        }

        remaining
    }

    /// Removes the last replica (highest index) of a group.
    ///
    /// Returns the remaining group size, or zero for an unknown group.
    pub fn remove_replica(&self, group: &str) -> usize {
        match self.find_last(group) {
            Some(task) => self.remove_replica_task(&task, false),
            None => 0,
        }
    }

    /// Shrinks a group to one replica, then closes the group.
    pub fn remove_group(&self, group: &str) {
        while self.remove_replica(group) > 1 {}
        self.close_group(group);
    }

    /// Recomputes `(index, total)` on every replica of a group.
    pub fn rebalance(&self, group: &str) {
        let groups = self.lock_groups();
        if let Some(entry) = groups.get(group) {
            self.rebalance_members(group, &entry.members);
        }
    }

    /// Caller holds the groups lock.
    fn rebalance_members(&self, group: &str, members: &[TaskRef]) {
        let total = members.len();
        for (index, task) in members.iter().enumerate() {
            task.config().set_index(index);
            task.config().set_total(total);
        }

        debug!(group, total, "rebalanced group");
        self.bus
            .publish(Event::now(EventKind::Rebalanced).with_group(group));
    }

    // ---------------------------
    // Queries
    // ---------------------------

    /// Looks a task up through its group, deriving the group name from the id.
    pub fn find(&self, id: &str) -> Option<TaskRef> {
        let (group, _) = id.rsplit_once('-')?;
        let groups = self.lock_groups();
        groups
            .get(group)?
            .members
            .iter()
            .find(|t| t.id() == id)
            .cloned()
    }

    /// Like [`find`](Registry::find), reporting an unknown id as an error.
    ///
    /// # Errors
    /// Returns [`SchedulerError::NotFound`] when no replica carries the id.
    pub fn find_checked(&self, id: &str) -> Result<TaskRef, SchedulerError> {
        self.find(id)
            .ok_or_else(|| SchedulerError::NotFound { id: id.to_string() })
    }

    /// Returns the replica with the highest index, i.e. the append template.
    pub fn find_last(&self, group: &str) -> Option<TaskRef> {
        let groups = self.lock_groups();
        groups
            .get(group)?
            .members
            .iter()
            .max_by_key(|t| t.config().index())
            .cloned()
    }

    /// Current number of replicas in a group.
    pub fn group_size(&self, group: &str) -> usize {
        self.lock_groups()
            .get(group)
            .map(|e| e.members.len())
            .unwrap_or(0)
    }

    /// Whether any replica of the group is started.
    pub fn has_started_group(&self, group: &str) -> bool {
        self.started.iter().any(|e| e.value().group() == group)
    }

    /// Whether any replica of the group is stopped.
    pub fn has_stopped_group(&self, group: &str) -> bool {
        self.stopped.iter().any(|e| e.value().group() == group)
    }

    /// Whether the id is currently in the started table.
    pub fn is_started(&self, id: &str) -> bool {
        self.started.contains_key(id)
    }

    /// Whether the id is currently in the stopped table.
    pub fn is_stopped(&self, id: &str) -> bool {
        self.stopped.contains_key(id)
    }

    /// Number of started tasks.
    pub fn started_len(&self) -> usize {
        self.started.len()
    }

    /// Number of tasks with a pending close.
    pub fn stopping_len(&self) -> usize {
        self.stopping.len()
    }

    /// Number of stopped tasks.
    pub fn stopped_len(&self) -> usize {
        self.stopped.len()
    }

    /// Snapshot of the started table.
    pub fn started_tasks(&self) -> Vec<TaskRef> {
        self.started.iter().map(|e| e.value().clone()).collect()
    }

    /// Snapshot of the stopping table.
    pub fn stopping_tasks(&self) -> Vec<TaskRef> {
        self.stopping.iter().map(|e| e.value().clone()).collect()
    }

    /// Started or stopping tasks that block the shutdown drain.
    pub(crate) fn draining_tasks(&self) -> Vec<TaskRef> {
        self.started
            .iter()
            .chain(self.stopping.iter())
            .map(|e| e.value().clone())
            .filter(|t| !t.config().is_daemon())
            .collect()
    }

    /// Detaches every stopped task ahead of a reload.
    pub(crate) fn clear_stopped(&self) {
        let tasks: Vec<TaskRef> = self.stopped.iter().map(|e| e.value().clone()).collect();
        for task in tasks {
            let group = task.group().to_string();
            {
                let mut groups = self.lock_groups();
                if let Some(entry) = groups.get_mut(&group) {
                    entry.members.retain(|t| !Arc::ptr_eq(t, &task));
                    self.rebalance_members(&group, &entry.members);
                }
            }
            self.stopped
                .remove_if(task.id(), |_, v| Arc::ptr_eq(v, &task));
        }
    }

    // ---------------------------
    // Helpers
    // ---------------------------

    fn contains(&self, id: &str) -> bool {
        self.started.contains_key(id)
            || self.stopping.contains_key(id)
            || self.stopped.contains_key(id)
    }

    fn stopped_ids_of(&self, group: &str) -> Vec<String> {
        self.stopped
            .iter()
            .filter(|e| e.value().group() == group)
            .map(|e| e.key().clone())
            .collect()
    }

    fn started_of(&self, group: &str) -> Vec<TaskRef> {
        self.started
            .iter()
            .filter(|e| e.value().group() == group)
            .map(|e| e.value().clone())
            .collect()
    }

    fn lock_groups(&self) -> std::sync::MutexGuard<'_, HashMap<String, GroupEntry>> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Extracts the numeric suffix of `group-N` style ids.
fn id_sequence(id: &str) -> Option<usize> {
    id.rsplit_once('-').and_then(|(_, n)| n.parse().ok())
}
