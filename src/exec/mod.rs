// src/exec/mod.rs

//! Execution engine capability.
//!
//! The engine itself is an external collaborator; this module only defines
//! the seam sessions talk to, plus the adapters shipped with the crate:
//!
//! - [`Interpreter`] is one engine handle, exclusively owned by a session.
//! - [`InterpreterFactory`] constructs a handle per session from the shared
//!   [`EngineConfig`].
//! - [`worker`] runs a session's run hook on a supervised thread that can be
//!   cancelled and joined.
//! - [`shell`] is a textual adapter backed by a shell interpreter; it is the
//!   only place hooks are turned into source text.
//! - [`callback`] is an in-process adapter where loaded units register hook
//!   callbacks by symbol name.

pub mod callback;
pub mod shell;
pub mod worker;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::types::Hook;

pub use callback::{CallbackFactory, CallbackInterpreter, HookContext, HookTable, UnitLibrary};
pub use shell::{ShellFactory, ShellInterpreter};
pub use worker::RunWorker;

/// Failures reported by an engine handle.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine construction failed: {0}")]
    Construction(String),

    #[error("compilation of {unit:?} failed: {message}")]
    Compilation { unit: PathBuf, message: String },

    #[error("declaration rejected: {0}")]
    Declaration(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// The engine variant does not support this operation at all.
    #[error("capability '{capability}' is not implemented by this engine")]
    Unimplemented { capability: &'static str },

    #[error("hook '{hook}' failed: {message}")]
    Hook { hook: String, message: String },

    #[error("hook '{hook}' was cancelled")]
    Cancelled { hook: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of submitting one source unit to an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilationResult {
    Success,
    Failure(String),
}

impl CompilationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CompilationResult::Success)
    }
}

/// Self-contained body of a run hook.
///
/// Produced on the engine thread by [`Interpreter::launch`] and executed on a
/// [`RunWorker`] thread. The token is cancelled when the owning session is
/// destroyed; bodies are expected to return promptly once it is.
pub type RunBody = Box<dyn FnOnce(CancellationToken) -> Result<(), EngineError> + Send>;

/// One engine instance.
///
/// Engines are not safe for concurrent use; every call arrives from the
/// dispatch queue consumer.
pub trait Interpreter: Send {
    /// Declare symbols (globals, prototypes) without evaluating anything.
    fn declare(&mut self, text: &str) -> Result<(), EngineError>;

    /// Load and compile one source unit. Later units may depend on symbols
    /// declared by earlier ones.
    fn process(&mut self, unit: &Path) -> CompilationResult;

    /// Evaluate free-form text. Not every engine supports this.
    fn execute(&mut self, _text: &str) -> Result<(), EngineError> {
        Err(EngineError::Unimplemented {
            capability: "execute",
        })
    }

    /// Synchronously call a zero-argument hook (`prepare` / `shutdown`).
    fn invoke(&mut self, hook: &Hook) -> Result<(), EngineError>;

    /// Prepare the long-running `run` hook for execution on another thread.
    fn launch(&mut self, hook: &Hook) -> Result<RunBody, EngineError>;
}

/// Builds one engine handle per session.
pub trait InterpreterFactory: Send {
    fn create(
        &self,
        session: &str,
        config: &EngineConfig,
    ) -> Result<Box<dyn Interpreter>, EngineError>;
}
