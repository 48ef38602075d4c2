// src/watch/watcher.rs

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, ModuleTable};
use crate::engine::{DispatchQueue, Host};
use crate::watch::hash::SourceHashes;

/// Handle for the source watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive; dropping it stops
/// watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    units: usize,
}

impl WatcherHandle {
    /// Number of source units being watched.
    pub fn units(&self) -> usize {
        self.units
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("units", &self.units)
            .finish()
    }
}

/// Watch every source unit of `table` and dispatch a full reload onto `queue`
/// whenever one of them changes content.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_watcher(
    table: &ModuleTable,
    engine: &EngineConfig,
    queue: DispatchQueue<Host>,
) -> Result<WatcherHandle> {
    let units = resolve_units(table, engine);

    let mut hashes = SourceHashes::new();
    hashes.seed(&units)?;

    let dirs: BTreeSet<PathBuf> = units
        .iter()
        .filter_map(|unit| unit.parent().map(Path::to_path_buf))
        .collect();

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    // No subscriber context in the notify thread.
                    eprintln!("modhost: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("modhost: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    for dir in &dirs {
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
    }

    info!(units = units.len(), dirs = ?dirs, "source watcher started");

    let watched: HashSet<PathBuf> = units.iter().cloned().collect();
    let unit_count = watched.len();

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if event.kind.is_access() {
                continue;
            }
            debug!(?event, "received notify event");

            if !units_changed(&event.paths, &watched, &mut hashes) {
                continue;
            }

            info!(paths = ?event.paths, "source unit changed; dispatching reload");
            let dispatched = queue.dispatch(|host: &mut Host| {
                host.reload_all();
                Ok(())
            });
            if let Err(err) = dispatched {
                warn!(error = %err, "cannot dispatch reload; stopping source watcher");
                break;
            }
        }
        debug!("source watcher loop finished");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        units: unit_count,
    })
}

/// Resolve and canonicalize every unit that exists on disk.
fn resolve_units(table: &ModuleTable, engine: &EngineConfig) -> Vec<PathBuf> {
    let mut units = Vec::new();
    for unit in table.source_units() {
        match engine.resolve_unit(unit) {
            Some(path) => units.push(path.canonicalize().unwrap_or(path)),
            None => warn!(?unit, "source unit not found; not watching it"),
        }
    }
    units.sort();
    units.dedup();
    units
}

/// True if any of `paths` is a watched unit whose content changed.
fn units_changed(paths: &[PathBuf], watched: &HashSet<PathBuf>, hashes: &mut SourceHashes) -> bool {
    let mut changed = false;
    for path in paths {
        let path = path.canonicalize().unwrap_or_else(|_| path.clone());
        if !watched.contains(&path) {
            continue;
        }
        match hashes.changed(&path) {
            Ok(true) => changed = true,
            Ok(false) => debug!(?path, "content unchanged; ignoring event"),
            Err(err) => warn!(?path, error = %err, "failed to hash source unit"),
        }
    }
    changed
}
