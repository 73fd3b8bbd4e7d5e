//! # Status monitor: the sweep moving `stopping` to `stopped`.
//!
//! The monitor is itself a worker driven by the scheduler framework, swept at
//! the configured cadence (one second by default). It is a daemon task owned
//! by the runtime, never held in the registries and never closed during
//! normal operation.
//!
//! Per tick:
//! 1. `before` stages every stopping task whose loop has fully terminated
//!    (`closed` observed true).
//! 2. `execute` finalizes each staged task through the registry: back to
//!    `stopped` unless marked for removal, with exactly one stopped
//!    publication either way.
//! 3. `after` clears the staging map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::WorkError;
use crate::tasks::{TaskRef, Worker};

use super::registry::Registry;

/// Worker implementation of the status sweep.
pub(crate) struct StatusMonitor {
    registry: Arc<Registry>,
    staged: Mutex<HashMap<String, TaskRef>>,
}

impl StatusMonitor {
    pub(crate) fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            staged: Mutex::new(HashMap::new()),
        }
    }

    fn staged(&self) -> std::sync::MutexGuard<'_, HashMap<String, TaskRef>> {
        self.staged.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Worker for StatusMonitor {
    async fn before(&self) -> Result<(), WorkError> {
        let mut staged = self.staged();
        for task in self.registry.stopping_tasks() {
            if task.is_closed() {
                staged.insert(task.id().to_string(), task);
            }
        }
        Ok(())
    }

    async fn execute(&self) -> Result<(), WorkError> {
        let staged: Vec<TaskRef> = self.staged().values().cloned().collect();
        for task in staged {
            self.registry.finalize(&task);
        }
        Ok(())
    }

    async fn after(&self) -> Result<(), WorkError> {
        self.staged().clear();
        Ok(())
    }
}
