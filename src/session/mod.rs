// src/session/mod.rs

//! Sessions: one named, independently reloadable engine instance each.
//!
//! - [`Session`] drives one engine handle through
//!   `Created -> Prepared -> Running -> Destroyed`.
//! - [`registry`] holds the live sessions in module table order and
//!   implements the full-reload protocol.
//! - [`report`] holds the typed outcomes of lifecycle operations.

pub mod registry;
pub mod report;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::exec::{CompilationResult, EngineError, Interpreter, InterpreterFactory, RunWorker};
use crate::types::{Hook, HookKind, LifecycleState, SessionId};

pub use registry::Registry;
pub use report::{EntryOutcome, EntryReport, PrepareReport, ReloadReport, UnitOutcome};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session '{id}': engine construction failed: {source}")]
    EngineConstruction {
        id: SessionId,
        #[source]
        source: EngineError,
    },

    #[error("session '{id}': hook '{hook}' failed: {source}")]
    HookFailed {
        id: SessionId,
        hook: String,
        #[source]
        source: EngineError,
    },

    #[error("session '{id}': {source}")]
    Engine {
        id: SessionId,
        #[source]
        source: EngineError,
    },

    #[error("session '{id}': cannot spawn run worker: {source}")]
    WorkerSpawn {
        id: SessionId,
        #[source]
        source: std::io::Error,
    },

    /// Engine or hook code panicked; the panic was contained.
    #[error("session '{id}': panicked during {phase}")]
    Panicked { id: SessionId, phase: &'static str },

    #[error("session '{id}': invalid transition {from} -> {to}")]
    InvalidTransition {
        id: SessionId,
        from: LifecycleState,
        to: LifecycleState,
    },
}

/// One execution session.
///
/// The session exclusively owns its engine handle. Dropping a session
/// destroys it, so the shutdown hook runs on every destruction path.
pub struct Session {
    id: SessionId,
    sources: Vec<PathBuf>,
    engine: Option<Box<dyn Interpreter>>,
    state: LifecycleState,
    worker: Option<RunWorker>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("sources", &self.sources)
            .field("state", &self.state)
            .field("worker", &self.worker)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Construct the engine handle and apply the shared declarations.
    ///
    /// Fails with `EngineConstruction` if the handle cannot be built or
    /// rejects a declaration.
    pub fn create(
        id: impl Into<SessionId>,
        sources: Vec<PathBuf>,
        factory: &dyn InterpreterFactory,
        config: &EngineConfig,
    ) -> Result<Self, SessionError> {
        let id = id.into();
        for unit in &sources {
            info!(session = %id, unit = ?unit, "session source unit");
        }

        let construction = |source| SessionError::EngineConstruction {
            id: id.clone(),
            source,
        };

        let mut engine = factory.create(&id, config).map_err(construction)?;
        for declaration in &config.declare {
            engine.declare(declaration).map_err(construction)?;
        }

        info!(session = %id, units = sources.len(), "created session");

        Ok(Self {
            id,
            sources,
            engine: Some(engine),
            state: LifecycleState::Created,
            worker: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// A session without source units never calls any hook.
    pub fn is_inert(&self) -> bool {
        self.sources.is_empty()
    }

    /// True while the run hook's worker thread is still executing.
    pub fn is_run_active(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Submit every source unit in order, then call `<id>_prepare`.
    ///
    /// Compilation failures are recorded and the remaining units are still
    /// attempted; the prepare hook is called regardless.
    pub fn prepare(&mut self) -> Result<PrepareReport, SessionError> {
        if self.is_inert() {
            return Ok(PrepareReport::inert());
        }
        self.ensure_state(LifecycleState::Created, LifecycleState::Prepared)?;

        let id = self.id.clone();
        let Some(engine) = self.engine.as_mut() else {
            return Err(self.missing_engine(LifecycleState::Prepared));
        };

        let mut report = PrepareReport::default();
        for unit in &self.sources {
            info!(session = %id, unit = ?unit, "loading source unit");
            let result = engine.process(unit);
            if let CompilationResult::Failure(message) = &result {
                warn!(session = %id, unit = ?unit, %message, "source unit failed to compile");
            }
            report.units.push(UnitOutcome {
                unit: unit.clone(),
                result,
            });
        }

        let hook = Hook::new(id.as_str(), HookKind::Prepare);
        report.hook_invoked = true;
        if let Err(err) = engine.invoke(&hook) {
            warn!(session = %id, hook = %hook, error = %err, "prepare hook failed");
            report.hook_error = Some(err);
        }

        self.state = LifecycleState::Prepared;
        Ok(report)
    }

    /// Start `<id>_run` on a supervised worker thread.
    ///
    /// The worker is retained by the session; `destroy` cancels and joins it.
    pub fn run(&mut self) -> Result<(), SessionError> {
        if self.is_inert() {
            return Ok(());
        }
        self.ensure_state(LifecycleState::Prepared, LifecycleState::Running)?;

        let hook = Hook::new(self.id.as_str(), HookKind::Run);
        let body = self
            .engine_mut(LifecycleState::Running)?
            .launch(&hook)
            .map_err(|source| SessionError::HookFailed {
                id: self.id.clone(),
                hook: hook.symbol(),
                source,
            })?;

        let worker = RunWorker::spawn(hook, body).map_err(|source| SessionError::WorkerSpawn {
            id: self.id.clone(),
            source,
        })?;

        self.worker = Some(worker);
        self.state = LifecycleState::Running;
        Ok(())
    }

    /// Evaluate free-form text inside this session's engine.
    pub fn execute(&mut self, text: &str) -> Result<(), SessionError> {
        let id = self.id.clone();
        self.engine_mut(self.state)?
            .execute(text)
            .map_err(|source| SessionError::Engine { id, source })
    }

    /// Tear the session down.
    ///
    /// For non-inert sessions this calls `<id>_shutdown`, then cancels and
    /// joins the run worker, and only then releases the engine handle.
    /// Calling it again is a no-op.
    pub fn destroy(&mut self) -> Result<(), SessionError> {
        if self.state == LifecycleState::Destroyed {
            return Ok(());
        }

        // Taken up front: a panicking shutdown hook must not be re-run by
        // `Drop`.
        let mut engine = self.engine.take();

        let mut result = Ok(());
        if !self.is_inert() {
            if let Some(engine) = engine.as_mut() {
                let hook = Hook::new(self.id.as_str(), HookKind::Shutdown);
                if let Err(source) = engine.invoke(&hook) {
                    warn!(session = %self.id, hook = %hook, error = %source, "shutdown hook failed");
                    result = Err(SessionError::HookFailed {
                        id: self.id.clone(),
                        hook: hook.symbol(),
                        source,
                    });
                }
            }
        }

        self.release(engine);

        info!(session = %self.id, "erased session");
        result
    }

    /// Stop the run worker, then drop the engine handle.
    fn release(&mut self, engine: Option<Box<dyn Interpreter>>) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
        drop(engine);
        self.state = LifecycleState::Destroyed;
    }

    fn ensure_state(
        &self,
        expected: LifecycleState,
        to: LifecycleState,
    ) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                id: self.id.clone(),
                from: self.state,
                to,
            })
        }
    }

    fn engine_mut(&mut self, to: LifecycleState) -> Result<&mut Box<dyn Interpreter>, SessionError> {
        let (id, from) = (&self.id, self.state);
        self.engine
            .as_mut()
            .ok_or_else(|| SessionError::InvalidTransition {
                id: id.clone(),
                from,
                to,
            })
    }

    fn missing_engine(&self, to: LifecycleState) -> SessionError {
        SessionError::InvalidTransition {
            id: self.id.clone(),
            from: self.state,
            to,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state == LifecycleState::Destroyed {
            return;
        }
        // A hook panicking now would abort the process.
        if std::thread::panicking() {
            warn!(session = %self.id, "dropping session while unwinding; skipping shutdown hook");
            let engine = self.engine.take();
            self.release(engine);
            return;
        }
        if let Err(err) = self.destroy() {
            warn!(session = %self.id, error = %err, "error while dropping session");
        }
    }
}
