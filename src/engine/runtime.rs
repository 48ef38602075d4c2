// src/engine/runtime.rs

use std::fmt;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::anyhow;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::Result;

use super::gate::ReadinessGate;
use super::queue::DispatchQueue;

/// Options for the consumer thread.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Queue and thread name.
    pub name: String,
    /// Sleep between drains while the queue is empty.
    pub idle_interval: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            name: "engine".to_string(),
            idle_interval: Duration::from_millis(10),
        }
    }
}

/// The consumer loop.
///
/// - Drains the queue.
/// - If nothing is left afterwards, sleeps `idle_interval` before retrying.
/// - On `stop`, closes the queue, drains what is left so every dispatched
///   task runs to completion, and returns.
pub fn consumer_loop<C>(
    queue: &DispatchQueue<C>,
    ctx: &mut C,
    idle_interval: Duration,
    stop: &CancellationToken,
) {
    info!(queue = queue.name(), "consumer loop started");

    while !stop.is_cancelled() {
        queue.drain_queued(ctx);
        if queue.is_empty() {
            thread::sleep(idle_interval);
        }
    }

    queue.close();
    let stats = queue.drain_queued(ctx);
    debug!(queue = queue.name(), executed = stats.executed, "final drain after stop");

    info!(queue = queue.name(), "consumer loop finished");
}

/// Owns the consumer thread ("engine thread") and the context it drains into.
///
/// Everything that needs the context goes through [`dispatch`](Self::dispatch)
/// or a cloned [`DispatchQueue`] handle.
pub struct EngineRuntime<C> {
    queue: DispatchQueue<C>,
    gate: ReadinessGate,
    stop: CancellationToken,
    handle: Option<JoinHandle<C>>,
}

impl<C> fmt::Debug for EngineRuntime<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRuntime")
            .field("queue", &self.queue)
            .field("ready", &self.gate.is_ready())
            .finish_non_exhaustive()
    }
}

impl<C: Send + 'static> EngineRuntime<C> {
    /// Move `ctx` onto a new consumer thread and start draining.
    pub fn spawn(ctx: C, options: RuntimeOptions) -> Result<Self> {
        Self::spawn_with_gate(ctx, options, ReadinessGate::new())
    }

    /// Like [`spawn`](Self::spawn), sharing a gate created beforehand so
    /// threads can start waiting before the runtime exists.
    pub fn spawn_with_gate(ctx: C, options: RuntimeOptions, gate: ReadinessGate) -> Result<Self> {
        let queue = DispatchQueue::new(options.name.clone());
        let stop = CancellationToken::new();

        let thread_queue = queue.clone();
        let thread_stop = stop.clone();
        let idle_interval = options.idle_interval;

        let handle = thread::Builder::new()
            .name(options.name)
            .spawn(move || {
                let mut ctx = ctx;
                consumer_loop(&thread_queue, &mut ctx, idle_interval, &thread_stop);
                ctx
            })?;

        Ok(Self {
            queue,
            gate,
            stop,
            handle: Some(handle),
        })
    }

    /// Enqueue a task for the consumer.
    pub fn dispatch<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce(&mut C) -> anyhow::Result<()> + Send + 'static,
    {
        self.queue.dispatch(task)
    }

    /// A handle other threads can dispatch through.
    pub fn queue(&self) -> DispatchQueue<C> {
        self.queue.clone()
    }

    pub fn gate(&self) -> ReadinessGate {
        self.gate.clone()
    }

    pub fn wait_until_ready(&self) {
        self.gate.wait_until_ready();
    }

    /// Stop the consumer after it finished every queued task and hand the
    /// context back.
    pub fn shutdown(mut self) -> Result<C> {
        self.stop.cancel();
        let handle = self
            .handle
            .take()
            .ok_or_else(|| anyhow!("consumer thread already joined"))?;
        let ctx = handle
            .join()
            .map_err(|_| anyhow!("consumer thread '{}' panicked", self.queue.name()))?;
        Ok(ctx)
    }
}

impl<C> Drop for EngineRuntime<C> {
    fn drop(&mut self) {
        self.stop.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> RuntimeOptions {
        RuntimeOptions {
            name: "test-engine".to_string(),
            idle_interval: Duration::from_millis(1),
        }
    }

    #[test]
    fn tasks_run_on_the_consumer_thread() {
        let runtime = EngineRuntime::spawn(Vec::<String>::new(), options()).unwrap();
        runtime
            .dispatch(|names: &mut Vec<String>| {
                let name = thread::current().name().unwrap_or_default().to_string();
                names.push(name);
                Ok(())
            })
            .unwrap();

        let names = runtime.shutdown().unwrap();
        assert_eq!(names, vec!["test-engine".to_string()]);
    }

    #[test]
    fn shutdown_drains_pending_tasks_and_closes_queue() {
        let runtime = EngineRuntime::spawn(0usize, options()).unwrap();
        let queue = runtime.queue();
        for _ in 0..100 {
            runtime
                .dispatch(|count: &mut usize| {
                    *count += 1;
                    Ok(())
                })
                .unwrap();
        }

        let count = runtime.shutdown().unwrap();

        assert_eq!(count, 100);
        assert!(queue.is_closed());
        assert!(queue.dispatch(|_: &mut usize| Ok(())).is_err());
    }
}
