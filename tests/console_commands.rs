// tests/console_commands.rs

mod common;
use crate::common::builders::ModuleTableBuilder;
use crate::common::init_tracing;
use crate::common::recording::{EngineCall, Journal, RecordingFactory, invoked};

use std::time::Duration;

use tokio::io::BufReader;

use modhost::config::EngineConfig;
use modhost::console::run_console;
use modhost::engine::{self, Host, RuntimeOptions};

#[tokio::test]
async fn console_commands_become_engine_tasks_until_quit() {
    init_tracing();

    let journal = Journal::new();
    let table = ModuleTableBuilder::new()
        .module("lib", &["a.src"])
        .module("app", &["main.src"])
        .build();
    let host = Host::new(
        table,
        EngineConfig::default(),
        RecordingFactory::new(journal.clone()).with_execute(),
    );
    let runtime = engine::start(
        host,
        RuntimeOptions {
            name: "console-engine".to_string(),
            idle_interval: Duration::from_millis(1),
        },
    )
    .unwrap();

    let gate = runtime.gate();
    tokio::task::spawn_blocking(move || gate.wait_until_ready())
        .await
        .unwrap();

    let input = "list\n\nreload lib\nexec lib ping\nremove app\nremove ghost\nfrobnicate\nquit\nreload\n";
    run_console(BufReader::new(input.as_bytes()), runtime.queue())
        .await
        .unwrap();

    let host = tokio::task::spawn_blocking(move || runtime.shutdown())
        .await
        .unwrap()
        .unwrap();

    // `reload` after `quit` was never dispatched.
    assert_eq!(host.reload_count(), 1);
    assert_eq!(host.registry().ids(), vec!["lib".to_string()]);

    assert_eq!(journal.count(&invoked("lib_prepare")), 2);
    assert_eq!(journal.count(&invoked("app_shutdown")), 1);
    assert_eq!(
        journal.count(&EngineCall::Executed {
            session: "lib".to_string(),
            text: "ping".to_string(),
        }),
        1
    );
}
