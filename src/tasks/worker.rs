//! # Worker abstraction: the four user-supplied hooks.
//!
//! A [`Worker`] supplies the code a task runs: `before`, `execute`, `after`,
//! and `destroy`. The framework owns the loop; workers own the work. All hooks
//! are async and share the worker by reference, so a worker driving several
//! replicas of a group must be internally synchronized (or stateless).
//!
//! [`WorkerFn`] wraps a closure as the `execute` hook for the common case
//! where the other hooks are not needed.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::WorkError;

/// Shared handle to a worker.
pub type WorkerRef = Arc<dyn Worker>;

/// User-supplied task body driven by the scheduler loop.
///
/// Hook failures are contained: the loop logs them, counts them in the task's
/// analysis block, and continues with the next iteration.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use taskherd::{Worker, WorkError};
///
/// struct Sweep;
///
/// #[async_trait]
/// impl Worker for Sweep {
///     async fn execute(&self) -> Result<(), WorkError> {
///         // do one unit of work
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// Runs before `execute`. With `before_after_only` set, runs once per
    /// start instead of once per iteration.
    async fn before(&self) -> Result<(), WorkError> {
        Ok(())
    }

    /// One iteration of work. Opaque to the framework and never interrupted;
    /// long-running implementations should check their own exit conditions.
    async fn execute(&self) -> Result<(), WorkError>;

    /// Runs after `execute`. With `before_after_only` set, runs once after the
    /// final iteration instead of once per iteration.
    async fn after(&self) -> Result<(), WorkError> {
        Ok(())
    }

    /// Runs once when the loop terminates, before the task is finalized.
    async fn destroy(&self) -> Result<(), WorkError> {
        Ok(())
    }
}

/// Function-backed worker: a closure as the `execute` hook.
///
/// The closure is `Fn` and must return a fresh future per call; captured state
/// shared across iterations needs its own synchronization.
pub struct WorkerFn<F, Fut>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkError>> + Send + 'static,
{
    func: F,
}

impl<F, Fut> WorkerFn<F, Fut>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkError>> + Send + 'static,
{
    /// Creates a function-backed worker.
    pub fn new(func: F) -> Self {
        Self { func }
    }

    /// Creates the worker and returns it as a shared handle.
    ///
    /// # Example
    /// ```
    /// use taskherd::{WorkerFn, WorkerRef, WorkError};
    ///
    /// let w: WorkerRef = WorkerFn::arc(|| async { Ok::<_, WorkError>(()) });
    /// ```
    pub fn arc(func: F) -> WorkerRef {
        Arc::new(Self::new(func))
    }
}

#[async_trait]
impl<F, Fut> Worker for WorkerFn<F, Fut>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkError>> + Send + 'static,
{
    async fn execute(&self) -> Result<(), WorkError> {
        (self.func)().await
    }
}
