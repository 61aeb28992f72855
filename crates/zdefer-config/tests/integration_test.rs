//! Integration tests for zdefer-config
//!
//! These tests verify the full config loading pipeline with real file system operations.

use tempfile::tempdir;
use zdefer_config::{
    Config, EffortStepConfig, DEFAULT_INITIAL_CAPACITY, ENV_DISABLE, ENV_INITIAL_CAPACITY,
};

fn no_env(_: &str) -> Option<String> {
    None
}

/// Test config loading from a single file
#[test]
fn test_load_config_from_file() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[shim]
enabled = false
initial_capacity = 65536

[effort]
fallback_iterations = 7
steps = [{ below = 1024, iterations = 300 }]

[log]
level = "trace"
color = "35"
"#,
    )
    .unwrap();

    let config = Config::load_from(&[path], no_env);

    assert!(!config.shim.enabled);
    assert_eq!(config.shim.initial_capacity, 65536);
    assert_eq!(
        config.effort.steps,
        vec![EffortStepConfig {
            below: 1024,
            iterations: 300
        }]
    );
    assert_eq!(config.effort.fallback_iterations, 7);
    assert_eq!(config.log.level.as_deref(), Some("trace"));
    assert_eq!(config.log.color.as_deref(), Some("35"));
}

/// Later files override earlier ones key by key, untouched keys survive
#[test]
fn test_config_layering() {
    let temp = tempdir().unwrap();
    let global = temp.path().join("global.toml");
    let local = temp.path().join("local.toml");
    std::fs::write(
        &global,
        r#"
[shim]
enabled = false
initial_capacity = 1024

[effort]
fallback_iterations = 9
"#,
    )
    .unwrap();
    std::fs::write(
        &local,
        r#"
[shim]
initial_capacity = 2048
"#,
    )
    .unwrap();

    let config = Config::load_from(&[global, local], no_env);

    assert!(!config.shim.enabled);
    assert_eq!(config.shim.initial_capacity, 2048);
    assert_eq!(config.effort.fallback_iterations, 9);
    // steps were never mentioned: defaults apply
    assert_eq!(config.effort.steps.len(), 2);
}

/// Environment wins over every file
#[test]
fn test_env_overrides_files() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[shim]\ninitial_capacity = 1024\n").unwrap();

    let config = Config::load_from(&[path], |key| {
        (key == ENV_INITIAL_CAPACITY).then(|| "4096".to_string())
    });

    assert_eq!(config.shim.initial_capacity, 4096);
}

#[test]
fn test_missing_files_are_skipped() {
    let temp = tempdir().unwrap();
    let config = Config::load_from(&[temp.path().join("nope.toml")], no_env);
    assert_eq!(config, Config::default());
}

/// An unparseable file is skipped; the layers around it still apply
#[test]
fn test_malformed_file_is_skipped() {
    let temp = tempdir().unwrap();
    let global = temp.path().join("global.toml");
    let broken = temp.path().join("broken.toml");
    std::fs::write(&global, "[shim]\ninitial_capacity = 1024\n").unwrap();
    std::fs::write(&broken, "[shim\nenabled = ").unwrap();

    let config = Config::load_from(&[global, broken], no_env);

    assert!(config.shim.enabled);
    assert_eq!(config.shim.initial_capacity, 1024);
}

/// A file that parses but has the wrong shape is skipped as a whole
#[test]
fn test_mistyped_file_is_skipped() {
    let temp = tempdir().unwrap();
    let global = temp.path().join("global.toml");
    let local = temp.path().join("local.toml");
    std::fs::write(&global, "[effort]\nfallback_iterations = 9\n").unwrap();
    std::fs::write(
        &local,
        "[shim]\ninitial_capacity = 2048\n[effort]\nfallback_iterations = \"many\"\n",
    )
    .unwrap();

    let config = Config::load_from(&[global, local], no_env);

    assert_eq!(config.effort.fallback_iterations, 9);
    assert_eq!(config.shim.initial_capacity, DEFAULT_INITIAL_CAPACITY);
}

/// The disable switch holds even when every file is broken
#[test]
fn test_env_disable_survives_malformed_file() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[shim\nenabled = ").unwrap();

    let config = Config::load_from(&[path], |key| (key == ENV_DISABLE).then(|| "1".to_string()));

    assert!(!config.shim.enabled);
}
