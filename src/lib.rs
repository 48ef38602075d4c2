// src/lib.rs

pub mod cli;
pub mod config;
pub mod console;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod session;
pub mod types;
pub mod watch;

use anyhow::Result;
use tokio::io::BufReader;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::config::loader::load_and_validate;
use crate::engine::{Host, RuntimeOptions};
use crate::exec::ShellFactory;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the engine thread with its dispatch queue and the initial reload
/// - waiting on the readiness gate
/// - the stdin console and (optional) source watcher
/// - Ctrl-C handling and orderly teardown on the engine thread
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let options = RuntimeOptions {
        name: cfg.config.queue_name.clone(),
        idle_interval: cfg.config.idle_interval(),
    };

    let host = Host::from_config(&cfg, ShellFactory);
    let runtime = engine::start(host, options)?;

    // The gate blocks; keep it off the async workers.
    let gate = runtime.gate();
    tokio::task::spawn_blocking(move || gate.wait_until_ready()).await?;
    info!(modules = cfg.module_table().len(), "initial reload finished");

    if !args.once {
        let _watcher = if args.watch {
            Some(watch::spawn_watcher(
                cfg.module_table(),
                &cfg.engine,
                runtime.queue(),
            )?)
        } else {
            None
        };

        let console = console::run_console(BufReader::new(tokio::io::stdin()), runtime.queue());
        tokio::select! {
            res = console => res?,
            res = tokio::signal::ctrl_c() => {
                res?;
                info!("Ctrl-C received; shutting down");
            }
        }
    }

    // Sessions own engine handles, so they are destroyed on the engine thread.
    runtime.dispatch(|host: &mut Host| {
        host.teardown();
        Ok(())
    })?;
    let host = tokio::task::spawn_blocking(move || runtime.shutdown()).await??;
    info!(reloads = host.reload_count(), "engine thread stopped");

    Ok(())
}

/// Simple dry-run output: print the engine config and the module table.
fn print_dry_run(cfg: &ConfigFile) {
    println!("modhost dry-run");
    println!("  config.queue_name = {}", cfg.config.queue_name);
    println!("  config.idle_interval_ms = {}", cfg.config.idle_interval_ms);
    println!("  engine.args = {:?}", cfg.engine.args());
    if !cfg.engine.declare.is_empty() {
        println!("  engine.declare = {:?}", cfg.engine.declare);
    }
    println!();

    let table = cfg.module_table();
    println!("modules ({}), in load order:", table.len());
    for entry in table.iter() {
        println!("  - {}", entry.id);
        if entry.sources.is_empty() {
            println!("      (inert: no source units)");
        }
        for unit in &entry.sources {
            match cfg.engine.resolve_unit(unit) {
                Some(path) => println!("      {}", path.display()),
                None => println!("      {} (not found)", unit.display()),
            }
        }
    }

    debug!("dry-run complete (no engine started)");
}
