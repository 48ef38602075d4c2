// src/exec/callback.rs

//! In-process engine where hooks are named callbacks.
//!
//! Loading a unit runs its registration function against the session's
//! [`HookTable`]; the unit then "defines" hooks by inserting callbacks under
//! their symbol names (`<id>_prepare`, `<id>_run`, ...). No source text is
//! ever generated: hooks are looked up and called directly.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::EngineConfig;
use crate::exec::{CompilationResult, EngineError, Interpreter, InterpreterFactory, RunBody};
use crate::types::{Hook, SessionId};

/// A hook implementation.
pub type HookFn = Arc<dyn Fn(&HookContext) -> Result<(), EngineError> + Send + Sync>;

/// A unit's registration function: installs the unit's hooks.
pub type UnitFn = Arc<dyn Fn(&mut HookTable) -> Result<(), String> + Send + Sync>;

/// What a hook callback gets to see when called.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub session: SessionId,
    pub symbol: String,
    /// Cancelled when the owning session is destroyed. Only the run hook
    /// ever observes it cancelled.
    pub cancel: CancellationToken,
}

impl HookContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Per-session table of defined symbols.
#[derive(Clone, Default)]
pub struct HookTable {
    hooks: HashMap<String, HookFn>,
}

impl fmt::Debug for HookTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut symbols: Vec<_> = self.hooks.keys().collect();
        symbols.sort();
        f.debug_struct("HookTable").field("symbols", &symbols).finish()
    }
}

impl HookTable {
    /// Define `symbol`. A later unit redefining a symbol wins.
    pub fn register<F>(&mut self, symbol: impl Into<String>, hook: F)
    where
        F: Fn(&HookContext) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        self.hooks.insert(symbol.into(), Arc::new(hook));
    }

    pub fn get(&self, symbol: &str) -> Option<HookFn> {
        self.hooks.get(symbol).cloned()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.hooks.contains_key(symbol)
    }
}

/// Source units known to the callback engine, keyed by path.
#[derive(Clone, Default)]
pub struct UnitLibrary {
    units: HashMap<PathBuf, UnitFn>,
}

impl fmt::Debug for UnitLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitLibrary")
            .field("units", &self.units.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl UnitLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration of a unit.
    pub fn unit<F>(mut self, path: impl Into<PathBuf>, register: F) -> Self
    where
        F: Fn(&mut HookTable) -> Result<(), String> + Send + Sync + 'static,
    {
        self.units.insert(path.into(), Arc::new(register));
        self
    }

    pub fn get(&self, path: &Path) -> Option<UnitFn> {
        self.units.get(path).cloned()
    }
}

/// Engine handle backed by a [`HookTable`].
pub struct CallbackInterpreter {
    session: SessionId,
    library: Arc<UnitLibrary>,
    hooks: HookTable,
    globals: Vec<String>,
}

impl fmt::Debug for CallbackInterpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackInterpreter")
            .field("session", &self.session)
            .field("hooks", &self.hooks)
            .field("globals", &self.globals)
            .finish_non_exhaustive()
    }
}

impl CallbackInterpreter {
    pub fn new(session: impl Into<SessionId>, library: Arc<UnitLibrary>) -> Self {
        Self {
            session: session.into(),
            library,
            hooks: HookTable::default(),
            globals: Vec::new(),
        }
    }

    pub fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    pub fn globals(&self) -> &[String] {
        &self.globals
    }

    fn context(&self, symbol: String, cancel: CancellationToken) -> HookContext {
        HookContext {
            session: self.session.clone(),
            symbol,
            cancel,
        }
    }

    fn lookup(&self, hook: &Hook) -> Result<HookFn, EngineError> {
        let symbol = hook.symbol();
        self.hooks.get(&symbol).ok_or_else(|| EngineError::Hook {
            hook: symbol,
            message: "symbol is not defined by any loaded unit".to_string(),
        })
    }
}

impl Interpreter for CallbackInterpreter {
    fn declare(&mut self, text: &str) -> Result<(), EngineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::Declaration("empty declaration".to_string()));
        }
        self.globals.push(text.to_string());
        Ok(())
    }

    fn process(&mut self, unit: &Path) -> CompilationResult {
        let Some(register) = self.library.get(unit) else {
            return CompilationResult::Failure(format!("unit {unit:?} is not in the library"));
        };

        // Register into a scratch copy so a failing unit leaves no partial
        // definitions behind.
        let mut staged = self.hooks.clone();
        match register(&mut staged) {
            Ok(()) => {
                self.hooks = staged;
                debug!(session = %self.session, ?unit, "unit registered hooks");
                CompilationResult::Success
            }
            Err(message) => CompilationResult::Failure(message),
        }
    }

    /// Calls a defined symbol written as `name`, `name()` or `name();`.
    fn execute(&mut self, text: &str) -> Result<(), EngineError> {
        let symbol = text
            .trim()
            .trim_end_matches(';')
            .trim_end()
            .trim_end_matches("()")
            .trim();
        let hook = self
            .hooks
            .get(symbol)
            .ok_or_else(|| EngineError::Evaluation(format!("unknown symbol '{symbol}'")))?;
        hook(&self.context(symbol.to_string(), CancellationToken::new()))
    }

    fn invoke(&mut self, hook: &Hook) -> Result<(), EngineError> {
        let callback = self.lookup(hook)?;
        callback(&self.context(hook.symbol(), CancellationToken::new()))
    }

    fn launch(&mut self, hook: &Hook) -> Result<RunBody, EngineError> {
        let callback = self.lookup(hook)?;
        let session = self.session.clone();
        let symbol = hook.symbol();

        Ok(Box::new(move |cancel| {
            callback(&HookContext {
                session,
                symbol,
                cancel,
            })
        }))
    }
}

/// Factory handing every session its own [`CallbackInterpreter`] over a
/// shared [`UnitLibrary`].
#[derive(Debug, Clone)]
pub struct CallbackFactory {
    library: Arc<UnitLibrary>,
}

impl CallbackFactory {
    pub fn new(library: UnitLibrary) -> Self {
        Self {
            library: Arc::new(library),
        }
    }
}

impl InterpreterFactory for CallbackFactory {
    fn create(
        &self,
        session: &str,
        _config: &EngineConfig,
    ) -> Result<Box<dyn Interpreter>, EngineError> {
        Ok(Box::new(CallbackInterpreter::new(
            session,
            Arc::clone(&self.library),
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::types::HookKind;

    fn library(calls: Arc<Mutex<Vec<String>>>) -> UnitLibrary {
        UnitLibrary::new()
            .unit("lib.unit", move |hooks| {
                let calls = Arc::clone(&calls);
                hooks.register("lib_prepare", move |ctx| {
                    calls.lock().unwrap().push(ctx.symbol.clone());
                    Ok(())
                });
                Ok(())
            })
            .unit("broken.unit", |hooks| {
                hooks.register("lib_shutdown", |_| Ok(()));
                Err("syntax error".to_string())
            })
    }

    #[test]
    fn processed_unit_defines_invocable_hook() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut interp = CallbackInterpreter::new("lib", Arc::new(library(calls.clone())));

        assert!(interp.process(Path::new("lib.unit")).is_success());
        interp
            .invoke(&Hook::new("lib", HookKind::Prepare))
            .expect("prepare defined");

        assert_eq!(calls.lock().unwrap().as_slice(), ["lib_prepare"]);
    }

    #[test]
    fn failed_unit_leaves_no_partial_definitions() {
        let mut interp =
            CallbackInterpreter::new("lib", Arc::new(library(Arc::new(Mutex::new(Vec::new())))));

        let result = interp.process(Path::new("broken.unit"));

        assert_eq!(result, CompilationResult::Failure("syntax error".to_string()));
        assert!(!interp.hooks().contains("lib_shutdown"));
    }

    #[test]
    fn unknown_unit_and_undefined_hook_are_errors() {
        let mut interp = CallbackInterpreter::new("lib", Arc::new(UnitLibrary::new()));

        assert!(!interp.process(Path::new("missing.unit")).is_success());
        assert!(matches!(
            interp.invoke(&Hook::new("lib", HookKind::Prepare)),
            Err(EngineError::Hook { .. })
        ));
        assert!(matches!(
            interp.execute("nothing();"),
            Err(EngineError::Evaluation(_))
        ));
    }

    #[test]
    fn execute_accepts_call_syntax() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut interp = CallbackInterpreter::new("lib", Arc::new(library(calls.clone())));
        assert!(interp.process(Path::new("lib.unit")).is_success());

        interp.execute("lib_prepare();").expect("call by name");

        assert_eq!(calls.lock().unwrap().len(), 1);
    }
}
