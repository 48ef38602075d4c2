// src/config/validate.rs

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{ModhostError, Result};

/// Ids become hook symbol prefixes and defines become variable names, so both
/// must be plain identifiers.
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex is valid")
});

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ModhostError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.engine, raw.module))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_modules(cfg)?;
    validate_global_config(cfg)?;
    validate_module_ids(cfg)?;
    validate_engine(cfg)?;
    Ok(())
}

fn ensure_has_modules(cfg: &RawConfigFile) -> Result<()> {
    if cfg.module.is_empty() {
        return Err(ModhostError::ConfigError(
            "config must contain at least one [[module]] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.idle_interval_ms == 0 {
        return Err(ModhostError::ConfigError(
            "[config].idle_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.config.queue_name.trim().is_empty() {
        return Err(ModhostError::ConfigError(
            "[config].queue_name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_module_ids(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for entry in cfg.module.iter() {
        if !IDENTIFIER.is_match(&entry.id) {
            return Err(ModhostError::ConfigError(format!(
                "module id '{}' is not a valid identifier (expected [A-Za-z_][A-Za-z0-9_]*)",
                entry.id
            )));
        }
        if !seen.insert(entry.id.as_str()) {
            return Err(ModhostError::ConfigError(format!(
                "module id '{}' is declared more than once",
                entry.id
            )));
        }
    }
    Ok(())
}

fn validate_engine(cfg: &RawConfigFile) -> Result<()> {
    if cfg.engine.program.trim().is_empty() {
        return Err(ModhostError::ConfigError(
            "[engine].program must not be empty".to_string(),
        ));
    }
    for name in cfg.engine.define.keys() {
        if !IDENTIFIER.is_match(name) {
            return Err(ModhostError::ConfigError(format!(
                "[engine].define key '{}' is not a valid identifier",
                name
            )));
        }
    }
    Ok(())
}
