// tests/config_errors.rs

mod common;
use crate::common::builders::ConfigFileBuilder;
use crate::common::init_tracing;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use modhost::config::load_and_validate;
use modhost::errors::ModhostError;

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("Modhost.toml");
    fs::write(&path, contents).unwrap();
    path
}

fn config_error(contents: &str) -> String {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, contents);
    match load_and_validate(&path) {
        Err(ModhostError::ConfigError(message)) => message,
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn full_config_loads_in_declared_order() {
    init_tracing();

    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[config]
idle_interval_ms = 25
queue_name = "main"

[engine]
program = "bash"
include = ["scripts", "vendor"]
define = { LEVEL = "2", MODE = "debug" }
declare = ["shared=1"]

[[module]]
id = "lib"
sources = ["lib/a.sh", "lib/b.sh"]

[[module]]
id = "empty"

[[module]]
id = "app"
sources = ["app.sh"]
"#,
    );

    let cfg = load_and_validate(&path).unwrap();
    assert_eq!(cfg.config.idle_interval(), Duration::from_millis(25));
    assert_eq!(cfg.config.queue_name, "main");
    assert_eq!(cfg.engine.program, "bash");
    assert_eq!(
        cfg.engine.args(),
        vec!["bash", "-Iscripts", "-Ivendor", "-DLEVEL=2", "-DMODE=debug"]
    );
    assert_eq!(cfg.engine.declare, vec!["shared=1".to_string()]);

    let table = cfg.module_table();
    assert_eq!(table.ids(), vec!["lib", "empty", "app"]);
    assert_eq!(
        table.get("lib").unwrap().sources,
        vec![PathBuf::from("lib/a.sh"), PathBuf::from("lib/b.sh")]
    );
    assert!(table.get("empty").unwrap().sources.is_empty());
}

#[test]
fn defaults_apply_when_sections_are_missing() {
    init_tracing();

    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[[module]]\nid = \"app\"\nsources = [\"app.sh\"]\n");

    let cfg = load_and_validate(&path).unwrap();
    assert_eq!(cfg.config.idle_interval(), Duration::from_millis(10));
    assert_eq!(cfg.config.queue_name, "engine");
    assert_eq!(cfg.engine.program, "sh");
}

#[test]
fn empty_config_is_rejected() {
    init_tracing();
    let message = config_error("");
    assert!(message.contains("at least one [[module]]"), "{message}");
}

#[test]
fn duplicate_module_id_is_rejected() {
    init_tracing();
    let message = config_error(
        "[[module]]\nid = \"app\"\n\n[[module]]\nid = \"app\"\n",
    );
    assert!(message.contains("declared more than once"), "{message}");
}

#[test]
fn module_id_must_be_an_identifier() {
    init_tracing();
    let message = config_error("[[module]]\nid = \"my-app\"\n");
    assert!(message.contains("not a valid identifier"), "{message}");
}

#[test]
fn zero_idle_interval_is_rejected() {
    init_tracing();
    let message = config_error("[config]\nidle_interval_ms = 0\n\n[[module]]\nid = \"app\"\n");
    assert!(message.contains("idle_interval_ms"), "{message}");
}

#[test]
fn malformed_toml_is_a_toml_error() {
    init_tracing();

    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[[module]\nid = ");
    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, ModhostError::TomlError(_)), "{err:?}");
}

#[test]
fn missing_file_is_an_io_error() {
    init_tracing();

    let dir = TempDir::new().unwrap();
    let err = load_and_validate(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, ModhostError::IoError(_)), "{err:?}");
}

#[test]
fn builder_produces_the_same_table_shape() {
    init_tracing();

    let cfg = ConfigFileBuilder::new()
        .module("lib", &["a.src"])
        .module("app", &["main.src"])
        .define("LEVEL", "1")
        .build();
    assert_eq!(cfg.module_table().ids(), vec!["lib", "app"]);
    assert_eq!(cfg.engine.args(), vec!["sh", "-DLEVEL=1"]);
}
