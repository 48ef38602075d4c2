// src/types.rs

//! Small shared vocabulary types: session ids, lifecycle states and hooks.

use std::fmt;
use std::str::FromStr;

/// Unique key of a session inside the registry.
///
/// Ids double as the prefix of the lifecycle hook symbols (`<id>_prepare`,
/// `<id>_run`, `<id>_shutdown`), so configuration validation only admits
/// identifier-like ids.
pub type SessionId = String;

/// Lifecycle of a single session.
///
/// `Created -> Prepared -> Running -> Destroyed`. An inert session (no source
/// units) never leaves `Created` until it is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Created,
    Prepared,
    Running,
    Destroyed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Created => "created",
            LifecycleState::Prepared => "prepared",
            LifecycleState::Running => "running",
            LifecycleState::Destroyed => "destroyed",
        };
        f.write_str(s)
    }
}

/// The three procedures a session's source units are expected to define.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Prepare,
    Run,
    Shutdown,
}

impl HookKind {
    /// Suffix appended to the session id to form the hook symbol.
    pub fn suffix(self) -> &'static str {
        match self {
            HookKind::Prepare => "prepare",
            HookKind::Run => "run",
            HookKind::Shutdown => "shutdown",
        }
    }
}

impl FromStr for HookKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prepare" => Ok(HookKind::Prepare),
            "run" => Ok(HookKind::Run),
            "shutdown" => Ok(HookKind::Shutdown),
            other => Err(format!(
                "invalid hook kind: {other} (expected \"prepare\", \"run\" or \"shutdown\")"
            )),
        }
    }
}

/// A lifecycle hook of one particular session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hook {
    pub session: SessionId,
    pub kind: HookKind,
}

impl Hook {
    pub fn new(session: impl Into<SessionId>, kind: HookKind) -> Self {
        Self {
            session: session.into(),
            kind,
        }
    }

    /// Symbol the loaded units define for this hook, e.g. `app_run`.
    pub fn symbol(&self) -> String {
        format!("{}_{}", self.session, self.kind.suffix())
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.session, self.kind.suffix())
    }
}
