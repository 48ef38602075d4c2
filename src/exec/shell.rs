// src/exec/shell.rs

//! Textual engine adapter backed by a shell interpreter.
//!
//! Source units are shell scripts defining functions. The adapter keeps a
//! per-session prelude (declarations plus every unit that passed the syntax
//! check) and evaluates hooks by appending the hook symbol as a command:
//! `<prelude>\n<id>_prepare`. Each evaluation is a fresh interpreter process,
//! so state shared between hooks has to live outside the shell (files, env).

use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::exec::{CompilationResult, EngineError, Interpreter, InterpreterFactory, RunBody};
use crate::types::{Hook, SessionId};

/// Engine handle evaluating source text with `[engine].program`.
pub struct ShellInterpreter {
    session: SessionId,
    config: EngineConfig,
    env: Vec<(String, OsString)>,
    prelude: String,
}

impl fmt::Debug for ShellInterpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellInterpreter")
            .field("session", &self.session)
            .field("program", &self.config.program)
            .field("prelude_len", &self.prelude.len())
            .finish_non_exhaustive()
    }
}

impl ShellInterpreter {
    /// Construct a handle, probing that the interpreter can be started.
    pub fn new(session: &str, config: &EngineConfig) -> Result<Self, EngineError> {
        let status = Command::new(&config.program)
            .arg("-c")
            .arg(":")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| {
                EngineError::Construction(format!("cannot start '{}': {e}", config.program))
            })?;
        if !status.success() {
            return Err(EngineError::Construction(format!(
                "'{}' exited with {status} while probing",
                config.program
            )));
        }

        let include = std::env::join_paths(&config.include)
            .map_err(|e| EngineError::Construction(format!("invalid include path: {e}")))?;

        let mut env: Vec<(String, OsString)> = config
            .define
            .iter()
            .map(|(name, value)| (name.clone(), OsString::from(value)))
            .collect();
        env.push(("MODHOST_SESSION".to_string(), OsString::from(session)));
        env.push(("MODHOST_INCLUDE".to_string(), include));

        debug!(session, args = ?config.args(), "constructed shell engine");

        Ok(Self {
            session: session.to_string(),
            config: config.clone(),
            env,
            prelude: String::new(),
        })
    }

    /// Everything declared and loaded so far.
    pub fn prelude(&self) -> &str {
        &self.prelude
    }

    fn command(&self, script: &str) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.arg("-c")
            .arg(script)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null());
        cmd
    }

    fn script_with(&self, tail: &str) -> String {
        format!("{}\n{}\n", self.prelude, tail)
    }

    fn check_syntax(&self, script: &str) -> Result<(), String> {
        let output = Command::new(&self.config.program)
            .arg("-n")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| format!("cannot start '{}': {e}", self.config.program))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
        }
    }

    fn run_to_completion(&self, script: &str) -> Result<(), String> {
        let status = self
            .command(script)
            .status()
            .map_err(|e| format!("cannot start '{}': {e}", self.config.program))?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("exited with {status}"))
        }
    }
}

impl Interpreter for ShellInterpreter {
    fn declare(&mut self, text: &str) -> Result<(), EngineError> {
        self.check_syntax(text).map_err(EngineError::Declaration)?;
        self.prelude.push_str(text);
        self.prelude.push('\n');
        Ok(())
    }

    fn process(&mut self, unit: &Path) -> CompilationResult {
        let Some(path) = self.config.resolve_unit(unit) else {
            return CompilationResult::Failure(format!(
                "{unit:?} not found (searched include dirs {:?})",
                self.config.include
            ));
        };

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => return CompilationResult::Failure(format!("reading {path:?}: {e}")),
        };

        if let Err(message) = self.check_syntax(&contents) {
            return CompilationResult::Failure(message);
        }

        self.prelude.push_str(&format!("# unit {}\n", path.display()));
        self.prelude.push_str(&contents);
        self.prelude.push('\n');
        CompilationResult::Success
    }

    fn execute(&mut self, text: &str) -> Result<(), EngineError> {
        self.run_to_completion(&self.script_with(text))
            .map_err(EngineError::Evaluation)
    }

    fn invoke(&mut self, hook: &Hook) -> Result<(), EngineError> {
        let symbol = hook.symbol();
        self.run_to_completion(&self.script_with(&symbol))
            .map_err(|message| EngineError::Hook {
                hook: symbol,
                message,
            })
    }

    fn launch(&mut self, hook: &Hook) -> Result<RunBody, EngineError> {
        let symbol = hook.symbol();
        let cmd = self.command(&self.script_with(&symbol));
        Ok(Box::new(move |cancel| run_cancellable(cmd, symbol, cancel)))
    }
}

/// Run the hook process until it exits or `cancel` fires, whichever is first.
///
/// On cancellation the child is killed and `EngineError::Cancelled` returned.
fn run_cancellable(
    cmd: Command,
    symbol: String,
    cancel: CancellationToken,
) -> Result<(), EngineError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let mut cmd = tokio::process::Command::from(cmd);
    cmd.kill_on_drop(true);

    runtime.block_on(wait_or_cancel(cmd, symbol, cancel))
}

async fn wait_or_cancel(
    mut cmd: tokio::process::Command,
    symbol: String,
    cancel: CancellationToken,
) -> Result<(), EngineError> {
    let mut child = cmd.spawn()?;

    tokio::select! {
        status_res = child.wait() => {
            let status = status_res?;
            if status.success() {
                Ok(())
            } else {
                Err(EngineError::Hook {
                    hook: symbol,
                    message: format!("exited with {status}"),
                })
            }
        }

        _ = cancel.cancelled() => {
            info!(hook = %symbol, "cancellation requested; killing run hook process");
            if let Err(e) = child.kill().await {
                warn!(hook = %symbol, error = %e, "failed to kill run hook process");
            }
            Err(EngineError::Cancelled { hook: symbol })
        }
    }
}

/// Factory for [`ShellInterpreter`] handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellFactory;

impl InterpreterFactory for ShellFactory {
    fn create(
        &self,
        session: &str,
        config: &EngineConfig,
    ) -> Result<Box<dyn Interpreter>, EngineError> {
        Ok(Box::new(ShellInterpreter::new(session, config)?))
    }
}
