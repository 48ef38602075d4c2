// src/config/mod.rs

//! Configuration loading and validation for modhost.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`), including the ordered
//!   module table.
//! - Load a config file from disk (`loader.rs`).
//! - Validate module ids and engine settings (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, ConfigSection, EngineConfig, ModuleEntry, ModuleTable, RawConfigFile,
};
