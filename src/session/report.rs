// src/session/report.rs

//! Typed outcomes of lifecycle operations, so callers can assert on results
//! rather than on log text.

use std::path::PathBuf;

use crate::errors::ModhostError;
use crate::exec::{CompilationResult, EngineError};
use crate::session::SessionError;
use crate::types::{LifecycleState, SessionId};

/// Result of submitting one source unit during `prepare`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutcome {
    pub unit: PathBuf,
    pub result: CompilationResult,
}

/// What `Session::prepare` did.
#[derive(Debug, Default)]
pub struct PrepareReport {
    /// Per-unit outcomes, in load order. Empty for inert sessions.
    pub units: Vec<UnitOutcome>,
    /// Whether the prepare hook was called at all (false for inert sessions).
    pub hook_invoked: bool,
    /// Error returned by the prepare hook, if it failed.
    pub hook_error: Option<EngineError>,
}

impl PrepareReport {
    pub(crate) fn inert() -> Self {
        Self::default()
    }

    /// Units that failed to compile.
    pub fn failed_units(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.units.iter().filter(|u| !u.result.is_success())
    }

    /// True when every unit compiled and the hook (if any) succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed_units().next().is_none() && self.hook_error.is_none()
    }
}

/// Outcome of loading one module table entry.
#[derive(Debug)]
pub enum EntryOutcome {
    /// The session is registered; `state` is where its lifecycle ended up.
    Loaded {
        state: LifecycleState,
        prepare: PrepareReport,
    },
    /// The session could not be created or started.
    Failed(SessionError),
}

#[derive(Debug)]
pub struct EntryReport {
    pub id: SessionId,
    pub outcome: EntryOutcome,
}

impl EntryReport {
    pub fn is_loaded(&self) -> bool {
        matches!(self.outcome, EntryOutcome::Loaded { .. })
    }

    /// Lifecycle state reached, if loaded.
    pub fn state(&self) -> Option<LifecycleState> {
        match &self.outcome {
            EntryOutcome::Loaded { state, .. } => Some(*state),
            EntryOutcome::Failed(_) => None,
        }
    }
}

/// Aggregated outcome of a full reload, one entry per module table entry, in
/// table order.
#[derive(Debug, Default)]
pub struct ReloadReport {
    pub entries: Vec<EntryReport>,
}

impl ReloadReport {
    pub fn get(&self, id: &str) -> Option<&EntryReport> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Ids of entries whose session could not be loaded.
    pub fn failed_ids(&self) -> Vec<SessionId> {
        self.entries
            .iter()
            .filter(|e| !e.is_loaded())
            .map(|e| e.id.clone())
            .collect()
    }

    /// True when every entry loaded, every unit compiled and every prepare
    /// hook succeeded.
    pub fn is_clean(&self) -> bool {
        self.entries.iter().all(|e| match &e.outcome {
            EntryOutcome::Loaded { prepare, .. } => prepare.is_clean(),
            EntryOutcome::Failed(_) => false,
        })
    }

    /// Strict all-or-nothing check layered on top of the best-effort reload.
    pub fn ensure_complete(&self) -> Result<(), ModhostError> {
        let failed = self.failed_ids();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(ModhostError::IncompleteReload(failed))
        }
    }
}
