#![allow(dead_code)]

use std::path::PathBuf;

use modhost::config::{
    ConfigFile, ConfigSection, EngineConfig, ModuleEntry, ModuleTable, RawConfigFile,
};

/// Builder for `ModuleTable` to simplify test setup.
#[derive(Debug, Default)]
pub struct ModuleTableBuilder {
    entries: Vec<ModuleEntry>,
}

impl ModuleTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(mut self, id: &str, sources: &[&str]) -> Self {
        self.entries.push(ModuleEntry::new(id, sources.iter().copied()));
        self
    }

    /// A module without source units.
    pub fn inert(mut self, id: &str) -> Self {
        self.entries.push(ModuleEntry::new(id, Vec::<PathBuf>::new()));
        self
    }

    pub fn build(self) -> ModuleTable {
        ModuleTable::new(self.entries)
    }
}

/// Builder for `ConfigFile`.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                engine: EngineConfig::default(),
                module: Vec::new(),
            },
        }
    }

    pub fn module(mut self, id: &str, sources: &[&str]) -> Self {
        self.config
            .module
            .push(ModuleEntry::new(id, sources.iter().copied()));
        self
    }

    pub fn idle_interval_ms(mut self, ms: u64) -> Self {
        self.config.config.idle_interval_ms = ms;
        self
    }

    pub fn include(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.engine.include.push(dir.into());
        self
    }

    pub fn define(mut self, name: &str, value: &str) -> Self {
        self.config
            .engine
            .define
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn declare(mut self, text: &str) -> Self {
        self.config.engine.declare.push(text.to_string());
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
