// src/watch/mod.rs

//! Hot reload on source edits.
//!
//! - [`watcher`] wires a `notify` watcher over the directories holding the
//!   module table's source units and dispatches a full reload onto the
//!   engine queue when one of them changes.
//! - [`hash`] keeps `blake3` content hashes so repeated events for the same
//!   save, or touches without content changes, do not trigger reloads.

pub mod hash;
pub mod watcher;

pub use hash::{SourceHashes, compute_file_hash};
pub use watcher::{WatcherHandle, spawn_watcher};
