// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::types::SessionId;

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// idle_interval_ms = 10
///
/// [engine]
/// include = [".", "../resources"]
/// define = { ENGINE_IS_ON = "1" }
///
/// [[module]]
/// id = "lib"
/// sources = ["scripts/lib.sh"]
///
/// [[module]]
/// id = "app"
/// sources = ["scripts/app.sh"]
/// ```
///
/// `[[module]]` is an array of tables because load order matters: the
/// module hosting the application loop must be declared last.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub module: Vec<ModuleEntry>,
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub engine: EngineConfig,
    modules: ModuleTable,
}

impl ConfigFile {
    /// Assemble a config without running validation. Used by the validator
    /// once all checks passed.
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        engine: EngineConfig,
        modules: Vec<ModuleEntry>,
    ) -> Self {
        Self {
            config,
            engine,
            modules: ModuleTable::new(modules),
        }
    }

    pub fn module_table(&self) -> &ModuleTable {
        &self.modules
    }
}

/// `[config]` section: behaviour of the dispatch queue consumer.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// How long the consumer sleeps when the queue is empty.
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,

    /// Name of the dispatch queue; also used for the consumer thread.
    #[serde(default = "default_queue_name")]
    pub queue_name: String,
}

fn default_idle_interval_ms() -> u64 {
    10
}

fn default_queue_name() -> String {
    "engine".to_string()
}

impl ConfigSection {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            idle_interval_ms: default_idle_interval_ms(),
            queue_name: default_queue_name(),
        }
    }
}

/// `[engine]` section: the fixed configuration every engine handle is
/// constructed with. Identical for all sessions.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Interpreter program used by the built-in shell adapter.
    #[serde(default = "default_program")]
    pub program: String,

    /// Include directories, searched in order for relative source units.
    #[serde(default)]
    pub include: Vec<PathBuf>,

    /// Predefined macros (`-DNAME=VALUE`).
    #[serde(default)]
    pub define: BTreeMap<String, String>,

    /// Globals declared in every engine right after construction.
    #[serde(default)]
    pub declare: Vec<String>,
}

fn default_program() -> String {
    "sh".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            include: Vec::new(),
            define: BTreeMap::new(),
            declare: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Flattened argument vector, in the shape interpreters usually take it.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.program.clone()];
        args.extend(self.include.iter().map(|dir| format!("-I{}", dir.display())));
        args.extend(
            self.define
                .iter()
                .map(|(name, value)| format!("-D{name}={value}")),
        );
        args
    }

    /// Locate a source unit: as given if it exists, otherwise relative to
    /// each include directory in order.
    pub fn resolve_unit(&self, unit: &Path) -> Option<PathBuf> {
        if unit.is_file() {
            return Some(unit.to_path_buf());
        }
        if unit.is_absolute() {
            return None;
        }
        self.include
            .iter()
            .map(|dir| dir.join(unit))
            .find(|candidate| candidate.is_file())
    }
}

/// One `[[module]]` entry: a session id and its ordered source units.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModuleEntry {
    pub id: SessionId,

    /// Source units, declared in this order. Empty means the session is inert.
    #[serde(default)]
    pub sources: Vec<PathBuf>,
}

impl ModuleEntry {
    pub fn new<I, P>(id: impl Into<SessionId>, sources: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            id: id.into(),
            sources: sources.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ordered mapping from session id to source units.
///
/// Reload walks it front to back; later sessions may rely on symbols the
/// earlier ones declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleTable {
    entries: Vec<ModuleEntry>,
}

impl ModuleTable {
    pub fn new(entries: Vec<ModuleEntry>) -> Self {
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleEntry> {
        self.entries.iter()
    }

    pub fn get(&self, id: &str) -> Option<&ModuleEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.entries.iter().map(|entry| entry.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All source units of all modules, in table order.
    pub fn source_units(&self) -> impl Iterator<Item = &Path> {
        self.entries
            .iter()
            .flat_map(|entry| entry.sources.iter().map(PathBuf::as_path))
    }
}

impl FromIterator<ModuleEntry> for ModuleTable {
    fn from_iter<T: IntoIterator<Item = ModuleEntry>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
