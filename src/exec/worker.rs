// src/exec/worker.rs

//! Supervised execution of a session's run hook.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::exec::{EngineError, RunBody};
use crate::types::Hook;

/// Handle for a run hook executing on its own thread.
///
/// - `cancel` asks the body to stop; it is passed to the body at spawn time.
/// - `handle` is joined by [`RunWorker::stop`], so the body never outlives the
///   session that owns the worker.
#[derive(Debug)]
pub struct RunWorker {
    hook: Hook,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RunWorker {
    /// Start `body` on a thread named `<session>-run`.
    pub fn spawn(hook: Hook, body: RunBody) -> std::io::Result<Self> {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let thread_hook = hook.clone();

        let handle = thread::Builder::new()
            .name(format!("{}-run", hook.session))
            .spawn(move || run_body(thread_hook, body, token))?;

        Ok(Self {
            hook,
            cancel,
            handle: Some(handle),
        })
    }

    /// True once the body returned (or was never started).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel the body and wait for its thread to exit. Idempotent.
    pub fn stop(&mut self) {
        self.cancel.cancel();

        let Some(handle) = self.handle.take() else {
            return;
        };

        debug!(hook = %self.hook, "joining run worker");
        if handle.join().is_err() {
            warn!(hook = %self.hook, "run worker thread terminated abnormally");
        }
    }
}

impl Drop for RunWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_body(hook: Hook, body: RunBody, token: CancellationToken) {
    info!(hook = %hook, "run hook started");

    match panic::catch_unwind(AssertUnwindSafe(|| body(token))) {
        Ok(Ok(())) => info!(hook = %hook, "run hook returned"),
        Ok(Err(EngineError::Cancelled { .. })) => {
            debug!(hook = %hook, "run hook stopped after cancellation")
        }
        Ok(Err(err)) => error!(hook = %hook, error = %err, "run hook failed"),
        Err(_) => error!(hook = %hook, "run hook panicked"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::types::HookKind;

    #[test]
    fn stop_cancels_and_joins_body() {
        let observed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&observed);

        let body: RunBody = Box::new(move |token: CancellationToken| {
            while !token.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            flag.store(true, Ordering::SeqCst);
            Err(EngineError::Cancelled {
                hook: "app_run".into(),
            })
        });

        let mut worker =
            RunWorker::spawn(Hook::new("app", HookKind::Run), body).expect("spawn worker");
        assert!(!worker.is_finished());

        worker.stop();

        assert!(worker.is_finished());
        assert!(observed.load(Ordering::SeqCst));
    }

    #[test]
    fn panicking_body_is_contained() {
        let body: RunBody = Box::new(|_token| panic!("boom"));
        let mut worker =
            RunWorker::spawn(Hook::new("app", HookKind::Run), body).expect("spawn worker");
        worker.stop();
        assert!(worker.is_finished());
    }
}
