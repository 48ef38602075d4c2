// src/engine/host.rs

//! The orchestrator: everything the engine thread owns.

use std::fmt;

use tracing::{info, warn};

use crate::config::{ConfigFile, EngineConfig, ModuleTable};
use crate::errors::{ModhostError, Result};
use crate::exec::InterpreterFactory;
use crate::session::{EntryReport, Registry, ReloadReport};

use super::gate::ReadinessGate;
use super::runtime::{EngineRuntime, RuntimeOptions};

/// Consumer-side state: module table, engine factory and the registry.
///
/// A `Host` lives on the engine thread and is only reachable from tasks
/// dispatched to it, so no other thread ever sees a half-reloaded registry.
pub struct Host {
    table: ModuleTable,
    config: EngineConfig,
    factory: Box<dyn InterpreterFactory>,
    registry: Registry,
    reloads: u64,
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("table", &self.table)
            .field("registry", &self.registry)
            .field("reloads", &self.reloads)
            .finish_non_exhaustive()
    }
}

impl Host {
    pub fn new(
        table: ModuleTable,
        config: EngineConfig,
        factory: impl InterpreterFactory + 'static,
    ) -> Self {
        Self {
            table,
            config,
            factory: Box::new(factory),
            registry: Registry::new(),
            reloads: 0,
        }
    }

    pub fn from_config(cfg: &ConfigFile, factory: impl InterpreterFactory + 'static) -> Self {
        Self::new(cfg.module_table().clone(), cfg.engine.clone(), factory)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn table(&self) -> &ModuleTable {
        &self.table
    }

    /// Number of full reloads performed so far.
    pub fn reload_count(&self) -> u64 {
        self.reloads
    }

    /// Destroy every session and recreate the whole table, in order.
    pub fn reload_all(&mut self) -> ReloadReport {
        self.reloads += 1;
        info!(pass = self.reloads, modules = self.table.len(), "reloading all sessions");
        self.registry
            .reload_all(&self.table, self.factory.as_ref(), &self.config)
    }

    /// Recreate one session from its table entry.
    pub fn reload_one(&mut self, id: &str) -> Result<EntryReport> {
        let Some(entry) = self.table.get(id) else {
            let known = self.table.ids();
            warn!(session = %id, ?known, "module not in table");
            return Err(ModhostError::SessionNotFound {
                id: id.to_string(),
                known,
            });
        };
        Ok(self
            .registry
            .reload_one(entry, self.factory.as_ref(), &self.config))
    }

    pub fn remove(&mut self, id: &str) -> Result<()> {
        self.registry.remove(id)
    }

    pub fn execute(&mut self, id: &str, text: &str) -> Result<()> {
        self.registry.execute(id, text)
    }

    /// Destroy every session, leaving the host empty.
    pub fn teardown(&mut self) {
        info!(sessions = self.registry.len(), "tearing down all sessions");
        self.registry.clear();
    }
}

pub type HostRuntime = EngineRuntime<Host>;

/// Start the engine thread for `host` and queue the initial full reload.
///
/// The runtime's readiness gate opens once that reload task has run.
pub fn start(host: Host, options: RuntimeOptions) -> Result<HostRuntime> {
    start_with_gate(host, options, ReadinessGate::new())
}

/// Like [`start`], opening `gate` instead of a fresh one.
pub fn start_with_gate(
    host: Host,
    options: RuntimeOptions,
    gate: ReadinessGate,
) -> Result<HostRuntime> {
    let runtime = EngineRuntime::spawn_with_gate(host, options, gate.clone())?;

    runtime.dispatch(move |host: &mut Host| {
        // Opens the gate even if the reload unwinds.
        let _ready = OpenOnDrop(gate);

        info!("running initial reload");
        let report = host.reload_all();
        let failed = report.failed_ids();
        if !failed.is_empty() {
            warn!(?failed, "initial reload left modules unloaded");
        }
        Ok(())
    })?;

    Ok(runtime)
}

struct OpenOnDrop(ReadinessGate);

impl Drop for OpenOnDrop {
    fn drop(&mut self) {
        self.0.signal_ready();
    }
}
