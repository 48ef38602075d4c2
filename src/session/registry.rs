// src/session/registry.rs

//! The authoritative set of live sessions.

use std::panic::{self, AssertUnwindSafe};

use indexmap::IndexMap;
use tracing::{error, info, warn};

use crate::config::{EngineConfig, ModuleEntry, ModuleTable};
use crate::errors::{ModhostError, Result};
use crate::exec::InterpreterFactory;
use crate::session::{EntryOutcome, EntryReport, ReloadReport, Session, SessionError};
use crate::types::{LifecycleState, SessionId};

/// Live sessions keyed by id, kept in module table order.
///
/// The registry has no locking of its own: it is only ever mutated from
/// tasks running on the dispatch queue consumer, which is what makes a full
/// reload appear atomic to everyone else.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: IndexMap<SessionId, Session>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Live ids, in registry order.
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().cloned().collect()
    }

    /// `(id, state)` pairs, in registry order.
    pub fn states(&self) -> Vec<(SessionId, LifecycleState)> {
        self.sessions
            .iter()
            .map(|(id, session)| (id.clone(), session.state()))
            .collect()
    }

    /// Destroy every session. Order is unspecified.
    pub fn clear(&mut self) {
        for (id, mut session) in self.sessions.drain(..) {
            if let Err(err) = destroy_contained(&mut session) {
                warn!(session = %id, error = %err, "error while erasing session");
            }
        }
    }

    /// Tear down every live session, then recreate one per table entry, in
    /// table order.
    ///
    /// A failing entry is logged and skipped; later entries still load.
    pub fn reload_all(
        &mut self,
        table: &ModuleTable,
        factory: &dyn InterpreterFactory,
        config: &EngineConfig,
    ) -> ReloadReport {
        self.clear();

        let mut report = ReloadReport::default();
        for entry in table.iter() {
            let (session, entry_report) = start_contained(entry, factory, config);
            if let Some(session) = session {
                self.sessions.insert(entry.id.clone(), session);
            }
            report.entries.push(entry_report);
        }

        info!(
            loaded = self.sessions.len(),
            failed = report.failed_ids().len(),
            "reload complete"
        );
        report
    }

    /// Recreate a single session from its table entry, keeping its position.
    ///
    /// The old session (if any) is destroyed before the new one is created.
    /// If creation fails the old slot is dropped.
    pub fn reload_one(
        &mut self,
        entry: &ModuleEntry,
        factory: &dyn InterpreterFactory,
        config: &EngineConfig,
    ) -> EntryReport {
        let slot = self.sessions.get_index_of(&entry.id);
        if let Some(old) = self.sessions.get_mut(&entry.id) {
            if let Err(err) = destroy_contained(old) {
                warn!(session = %entry.id, error = %err, "error while erasing session");
            }
        }

        let (session, report) = start_contained(entry, factory, config);
        match (slot, session) {
            (Some(index), Some(session)) => {
                if let Some((_, old)) = self.sessions.get_index_mut(index) {
                    *old = session;
                }
            }
            (None, Some(session)) => {
                self.sessions.insert(entry.id.clone(), session);
            }
            (Some(_), None) => {
                self.sessions.shift_remove(&entry.id);
            }
            (None, None) => {}
        }
        report
    }

    /// Destroy and remove one session.
    ///
    /// An unknown id leaves the registry untouched and reports every known
    /// id as a suggestion.
    pub fn remove(&mut self, id: &str) -> Result<()> {
        let Some(mut session) = self.sessions.shift_remove(id) else {
            let known = self.ids();
            warn!(session = %id, ?known, "session not found");
            for candidate in &known {
                info!("maybe you wanted to type {candidate}?");
            }
            return Err(ModhostError::SessionNotFound {
                id: id.to_string(),
                known,
            });
        };

        destroy_contained(&mut session)?;
        Ok(())
    }

    /// Evaluate text inside one session's engine.
    pub fn execute(&mut self, id: &str, text: &str) -> Result<()> {
        let known = self.ids();
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| ModhostError::SessionNotFound {
                id: id.to_string(),
                known,
            })?;
        session.execute(text)?;
        Ok(())
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.clear();
    }
}

/// [`start_session`] with panics from engine or hook code contained, so one
/// broken entry cannot stop the rest of the table from loading.
fn start_contained(
    entry: &ModuleEntry,
    factory: &dyn InterpreterFactory,
    config: &EngineConfig,
) -> (Option<Session>, EntryReport) {
    panic::catch_unwind(AssertUnwindSafe(|| start_session(entry, factory, config))).unwrap_or_else(
        |_| {
            error!(session = %entry.id, "session panicked while starting; skipping it");
            let err = SessionError::Panicked {
                id: entry.id.clone(),
                phase: "start",
            };
            (
                None,
                EntryReport {
                    id: entry.id.clone(),
                    outcome: EntryOutcome::Failed(err),
                },
            )
        },
    )
}

/// `Session::destroy` with a panicking shutdown hook contained. The worker
/// is still stopped and the engine released.
fn destroy_contained(session: &mut Session) -> std::result::Result<(), SessionError> {
    match panic::catch_unwind(AssertUnwindSafe(|| session.destroy())) {
        Ok(result) => result,
        Err(_) => {
            error!(session = %session.id(), "shutdown panicked");
            // The engine was already taken, so this only stops the worker.
            let _ = session.destroy();
            Err(SessionError::Panicked {
                id: session.id().to_string(),
                phase: "shutdown",
            })
        }
    }
}

/// Create, prepare and run one session.
///
/// Returns the session whenever it was created (even if `run` failed, in
/// which case it stays registered as `Prepared`).
fn start_session(
    entry: &ModuleEntry,
    factory: &dyn InterpreterFactory,
    config: &EngineConfig,
) -> (Option<Session>, EntryReport) {
    let failed = |err: SessionError| EntryReport {
        id: entry.id.clone(),
        outcome: EntryOutcome::Failed(err),
    };

    let mut session = match Session::create(entry.id.clone(), entry.sources.clone(), factory, config)
    {
        Ok(session) => session,
        Err(err) => {
            warn!(session = %entry.id, error = %err, "skipping session");
            return (None, failed(err));
        }
    };

    let prepare = match session.prepare() {
        Ok(prepare) => prepare,
        Err(err) => {
            warn!(session = %entry.id, error = %err, "prepare failed");
            return (Some(session), failed(err));
        }
    };

    if let Err(err) = session.run() {
        warn!(session = %entry.id, error = %err, "run failed");
        return (Some(session), failed(err));
    }

    info!(session = %entry.id, state = %session.state(), "reloaded session");
    let report = EntryReport {
        id: entry.id.clone(),
        outcome: EntryOutcome::Loaded {
            state: session.state(),
            prepare,
        },
    };
    (Some(session), report)
}
