// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::session::SessionError;
use crate::types::SessionId;

#[derive(Error, Debug)]
pub enum ModhostError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Lookup of an id that is not live; `known` lists what is, to catch typos.
    #[error("Session not found: {id} (known sessions: {})", .known.join(", "))]
    SessionNotFound { id: SessionId, known: Vec<SessionId> },

    #[error("Dispatch queue '{0}' is closed")]
    QueueClosed(String),

    #[error("Reload left sessions unloaded: {}", .0.join(", "))]
    IncompleteReload(Vec<SessionId>),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ModhostError>;
