//! Exercises the same `pp_config::resolve_config` path the CLI binary runs
//! through before constructing an `Agent`, against a real file on disk.

use pp_config::{resolve_config, CliOverrides, ConfigPaths};

#[test]
fn explicit_config_path_overrides_compiled_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[sampler]\ntop_n = 7\n").unwrap();

    let paths = ConfigPaths { explicit: Some(path) };
    let config = resolve_config(&paths, &CliOverrides::default()).unwrap();

    assert_eq!(config.sampler.top_n, 7);
}

#[test]
fn missing_config_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist.toml");

    let paths = ConfigPaths { explicit: Some(path) };
    let config = resolve_config(&paths, &CliOverrides::default()).unwrap();
    let defaults = pp_config::AgentConfig::default();

    assert_eq!(config.sampler.top_n, defaults.sampler.top_n);
    assert_eq!(config.scanner.scan_interval, defaults.scanner.scan_interval);
}

#[test]
fn malformed_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "not = [valid toml").unwrap();

    let paths = ConfigPaths { explicit: Some(path) };
    assert!(resolve_config(&paths, &CliOverrides::default()).is_err());
}

#[test]
fn cli_override_takes_precedence_over_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[sampler]\ntop_n = 7\n").unwrap();

    let paths = ConfigPaths { explicit: Some(path) };
    let overrides = CliOverrides { top_n: Some(42), ..Default::default() };
    let config = resolve_config(&paths, &overrides).unwrap();

    assert_eq!(config.sampler.top_n, 42);
}
