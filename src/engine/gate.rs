// src/engine/gate.rs

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::info;

/// One-shot readiness flag other threads can block on.
///
/// Starts not ready; [`signal_ready`](Self::signal_ready) flips it once and
/// wakes every waiter. It is never reset.
#[derive(Debug, Clone, Default)]
pub struct ReadinessGate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark ready and wake all waiters. Signalling again has no effect.
    pub fn signal_ready(&self) {
        let (lock, cvar) = &*self.inner;
        {
            let mut ready = lock_flag(lock);
            if *ready {
                return;
            }
            *ready = true;
        }
        info!("engine ready");
        cvar.notify_all();
    }

    pub fn is_ready(&self) -> bool {
        *lock_flag(&self.inner.0)
    }

    /// Block until ready. Returns immediately if already ready.
    pub fn wait_until_ready(&self) {
        let (lock, cvar) = &*self.inner;
        let guard = lock_flag(lock);
        let _ready = cvar
            .wait_while(guard, |ready| !*ready)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Like [`wait_until_ready`](Self::wait_until_ready) with an upper bound.
    /// Returns whether the gate is ready.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock_flag(lock);
        let (ready, _) = cvar
            .wait_timeout_while(guard, timeout, |ready| !*ready)
            .unwrap_or_else(PoisonError::into_inner);
        *ready
    }
}

fn lock_flag(lock: &Mutex<bool>) -> MutexGuard<'_, bool> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}
