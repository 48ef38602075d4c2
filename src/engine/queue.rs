// src/engine/queue.rs

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error};

use crate::errors::{ModhostError, Result};

/// A unit of work run on the consumer with exclusive access to its context.
pub type Task<C> = Box<dyn FnOnce(&mut C) -> anyhow::Result<()> + Send>;

/// Counters for one [`DispatchQueue::drain_queued`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub executed: usize,
    pub failed: usize,
}

/// FIFO of tasks drained by a single consumer.
///
/// Semantics:
/// - `dispatch` appends to the tail and never waits on task execution; it is
///   safe to call from any thread, including from inside a running task.
/// - `drain_queued` runs everything enqueued at the moment it is called, in
///   order, on the caller's thread. Tasks dispatched meanwhile wait for the
///   next drain.
/// - A task returning `Err` or panicking is logged and does not affect the
///   tasks after it.
///
/// The context type `C` is only ever reachable through `drain_queued`, so
/// whoever drains is the single writer of `C`.
pub struct DispatchQueue<C> {
    name: Arc<str>,
    tasks: Arc<Mutex<VecDeque<Task<C>>>>,
    closed: Arc<AtomicBool>,
}

impl<C> Clone for DispatchQueue<C> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            tasks: Arc::clone(&self.tasks),
            closed: Arc::clone(&self.closed),
        }
    }
}

impl<C> fmt::Debug for DispatchQueue<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<C> DispatchQueue<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            tasks: Arc::new(Mutex::new(VecDeque::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a task to the tail of the queue.
    ///
    /// Fails only once the queue has been closed.
    pub fn dispatch<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce(&mut C) -> anyhow::Result<()> + Send + 'static,
    {
        let mut tasks = self.lock();
        if self.is_closed() {
            return Err(ModhostError::QueueClosed(self.name.to_string()));
        }
        tasks.push_back(Box::new(task));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Stop accepting new tasks. Already queued tasks still get drained.
    pub fn close(&self) {
        let _tasks = self.lock();
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Pop and run every currently queued task, in order.
    pub fn drain_queued(&self, ctx: &mut C) -> DrainStats {
        let batch = std::mem::take(&mut *self.lock());
        let mut stats = DrainStats::default();

        if batch.is_empty() {
            return stats;
        }
        debug!(queue = %self.name, tasks = batch.len(), "draining queued tasks");

        for task in batch {
            stats.executed += 1;
            match panic::catch_unwind(AssertUnwindSafe(|| task(ctx))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    stats.failed += 1;
                    error!(queue = %self.name, error = %format!("{err:#}"), "queued task failed");
                }
                Err(_) => {
                    stats.failed += 1;
                    error!(queue = %self.name, "queued task panicked");
                }
            }
        }

        stats
    }

    // Tasks never run while the lock is held, so a poisoned lock still
    // guards a consistent deque.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Task<C>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
