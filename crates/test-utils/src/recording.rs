use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::debug;

use modhost::config::EngineConfig;
use modhost::exec::{CompilationResult, EngineError, Interpreter, InterpreterFactory, RunBody};
use modhost::types::{Hook, HookKind};

/// One observable call into a fake engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Created { session: String },
    Declared { session: String, text: String },
    Processed { session: String, unit: PathBuf, ok: bool },
    Invoked { symbol: String },
    Launched { symbol: String },
    RunStarted { symbol: String },
    RunStopped { symbol: String },
    Executed { session: String, text: String },
    Dropped { session: String },
}

/// Shared, ordered log of every engine call across all sessions.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<EngineCall>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn snapshot(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn position(&self, call: &EngineCall) -> Option<usize> {
        self.snapshot().iter().position(|c| c == call)
    }

    pub fn count(&self, call: &EngineCall) -> usize {
        self.snapshot().iter().filter(|c| *c == call).count()
    }

    /// Symbols of every synchronously invoked hook, in call order.
    pub fn invoked(&self) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Invoked { symbol } => Some(symbol),
                _ => None,
            })
            .collect()
    }

    /// True if any hook (invoked or launched) was ever called for `session`.
    pub fn touched_hooks_of(&self, session: &str) -> bool {
        let symbols: Vec<String> = [HookKind::Prepare, HookKind::Run, HookKind::Shutdown]
            .into_iter()
            .map(|kind| Hook::new(session, kind).symbol())
            .collect();
        self.snapshot().iter().any(|c| match c {
            EngineCall::Invoked { symbol }
            | EngineCall::Launched { symbol }
            | EngineCall::RunStarted { symbol } => symbols.contains(symbol),
            _ => false,
        })
    }
}

pub fn invoked(symbol: &str) -> EngineCall {
    EngineCall::Invoked {
        symbol: symbol.to_string(),
    }
}

pub fn launched(symbol: &str) -> EngineCall {
    EngineCall::Launched {
        symbol: symbol.to_string(),
    }
}

pub fn run_started(symbol: &str) -> EngineCall {
    EngineCall::RunStarted {
        symbol: symbol.to_string(),
    }
}

pub fn run_stopped(symbol: &str) -> EngineCall {
    EngineCall::RunStopped {
        symbol: symbol.to_string(),
    }
}

/// A fake engine factory that:
/// - records every call into a shared [`Journal`]
/// - can be told to fail construction, units or hooks
/// - runs `<id>_run` as a body that idles until cancelled.
#[derive(Debug, Clone, Default)]
pub struct RecordingFactory {
    journal: Journal,
    fail_construction: HashSet<String>,
    failing_units: HashSet<PathBuf>,
    failing_hooks: HashSet<String>,
    panicking_hooks: HashSet<String>,
    execute_supported: bool,
}

impl RecordingFactory {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    pub fn fail_construction(mut self, session: &str) -> Self {
        self.fail_construction.insert(session.to_string());
        self
    }

    pub fn fail_unit(mut self, unit: &str) -> Self {
        self.failing_units.insert(PathBuf::from(unit));
        self
    }

    pub fn fail_hook(mut self, symbol: &str) -> Self {
        self.failing_hooks.insert(symbol.to_string());
        self
    }

    /// Make `symbol` panic when invoked or launched.
    pub fn panic_hook(mut self, symbol: &str) -> Self {
        self.panicking_hooks.insert(symbol.to_string());
        self
    }

    pub fn with_execute(mut self) -> Self {
        self.execute_supported = true;
        self
    }
}

impl InterpreterFactory for RecordingFactory {
    fn create(
        &self,
        session: &str,
        _config: &EngineConfig,
    ) -> Result<Box<dyn Interpreter>, EngineError> {
        if self.fail_construction.contains(session) {
            return Err(EngineError::Construction(format!(
                "refusing to construct '{session}'"
            )));
        }
        debug!(session, "recording engine created");
        self.journal.push(EngineCall::Created {
            session: session.to_string(),
        });
        Ok(Box::new(RecordingInterpreter {
            session: session.to_string(),
            factory: self.clone(),
        }))
    }
}

pub struct RecordingInterpreter {
    session: String,
    factory: RecordingFactory,
}

impl RecordingInterpreter {
    fn journal(&self) -> &Journal {
        &self.factory.journal
    }

    fn check_hook(&self, hook: &Hook) -> Result<(), EngineError> {
        let symbol = hook.symbol();
        if self.factory.panicking_hooks.contains(&symbol) {
            panic!("{symbol} panicked");
        }
        if self.factory.failing_hooks.contains(&symbol) {
            Err(EngineError::Hook {
                hook: symbol,
                message: "configured to fail".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl Interpreter for RecordingInterpreter {
    fn declare(&mut self, text: &str) -> Result<(), EngineError> {
        self.journal().push(EngineCall::Declared {
            session: self.session.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    fn process(&mut self, unit: &Path) -> CompilationResult {
        let ok = !self.factory.failing_units.contains(unit);
        self.journal().push(EngineCall::Processed {
            session: self.session.clone(),
            unit: unit.to_path_buf(),
            ok,
        });
        if ok {
            CompilationResult::Success
        } else {
            CompilationResult::Failure(format!("{unit:?}: configured to fail"))
        }
    }

    fn execute(&mut self, text: &str) -> Result<(), EngineError> {
        if !self.factory.execute_supported {
            return Err(EngineError::Unimplemented {
                capability: "execute",
            });
        }
        self.journal().push(EngineCall::Executed {
            session: self.session.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    fn invoke(&mut self, hook: &Hook) -> Result<(), EngineError> {
        self.journal().push(EngineCall::Invoked {
            symbol: hook.symbol(),
        });
        self.check_hook(hook)
    }

    fn launch(&mut self, hook: &Hook) -> Result<RunBody, EngineError> {
        let symbol = hook.symbol();
        self.journal().push(EngineCall::Launched {
            symbol: symbol.clone(),
        });
        self.check_hook(hook)?;

        let journal = self.journal().clone();
        Ok(Box::new(move |cancel| {
            journal.push(EngineCall::RunStarted {
                symbol: symbol.clone(),
            });
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            journal.push(EngineCall::RunStopped {
                symbol: symbol.clone(),
            });
            Err(EngineError::Cancelled { hook: symbol })
        }))
    }
}

impl Drop for RecordingInterpreter {
    fn drop(&mut self) {
        self.journal().push(EngineCall::Dropped {
            session: self.session.clone(),
        });
    }
}
