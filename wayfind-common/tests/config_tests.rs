//! Config file resolution and loading through the public API
//!
//! Tests that touch WAYFIND_CONFIG are marked #[serial] so they do not race
//! on the process environment.

use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::io::Write;
use wayfind_common::config::{load_toml, resolve_config_path, LoggingConfig, CONFIG_ENV_VAR};
use wayfind_common::Error;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AppConfig {
    region: String,
    logging: LoggingConfig,
}

#[test]
#[serial]
fn test_cli_argument_wins_over_environment() {
    let from_env = tempfile::NamedTempFile::new().unwrap();
    let from_cli = tempfile::NamedTempFile::new().unwrap();
    env::set_var(CONFIG_ENV_VAR, from_env.path());

    let resolved = resolve_config_path(Some(from_cli.path()), "wayfind-config-test").unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved.as_deref(), Some(from_cli.path()));
}

#[test]
#[serial]
fn test_environment_pointing_nowhere_is_an_error() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/wayfind-missing-config-file.toml");

    let result = resolve_config_path(None, "wayfind-config-test");
    env::remove_var(CONFIG_ENV_VAR);

    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_no_file_anywhere_falls_back_to_defaults() {
    env::remove_var(CONFIG_ENV_VAR);

    let resolved = resolve_config_path(None, "wayfind-config-test-no-such-app").unwrap();
    let config: AppConfig = load_toml(resolved.as_deref()).unwrap();

    assert!(resolved.is_none());
    assert_eq!(config.region, "");
    assert_eq!(config.logging.level, "info");
}

#[test]
#[serial]
fn test_resolved_file_is_loaded() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "region = \"kanto\"\n\n[logging]\nlevel = \"wayfind_places=debug\"").unwrap();
    env::set_var(CONFIG_ENV_VAR, file.path());

    let resolved = resolve_config_path(None, "wayfind-config-test").unwrap();
    env::remove_var(CONFIG_ENV_VAR);
    let config: AppConfig = load_toml(resolved.as_deref()).unwrap();

    assert_eq!(config.region, "kanto");
    assert_eq!(config.logging.level, "wayfind_places=debug");
}
