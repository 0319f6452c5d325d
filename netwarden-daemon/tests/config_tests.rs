//! Configuration loading and CLI override tests.

use clap::Parser;
use serial_test::serial;

use netwarden_core::config::NetwardenConfig;
use netwarden_daemon::cli::DaemonCli;
use netwarden_daemon::orchestrator::check_config;

#[test]
fn example_config_parses_to_defaults() {
    let example = include_str!("../../netwarden.toml.example");
    let config = NetwardenConfig::parse(example).expect("example config should parse");
    config.validate().expect("example config should validate");

    let defaults = NetwardenConfig::default();
    assert_eq!(config.flow.sweep_interval_secs, defaults.flow.sweep_interval_secs);
    assert_eq!(config.flow.idle_timeout_secs, defaults.flow.idle_timeout_secs);
    assert_eq!(
        config.heuristic.fwd_packet_threshold,
        defaults.heuristic.fwd_packet_threshold
    );
    assert_eq!(config.alerts.recent_capacity, 50);
    assert_eq!(config.capture.replay_path, "-");
    assert!(!config.classifier.is_configured());
}

#[test]
fn cli_overrides_take_precedence() {
    let cli = DaemonCli::parse_from([
        "netwarden-daemon",
        "--log-level",
        "debug",
        "--log-format",
        "pretty",
        "--pid-file",
        "/tmp/netwarden-test.pid",
        "--replay",
        "/var/lib/netwarden/capture.jsonl",
        "--pace",
    ]);

    let mut config = NetwardenConfig::parse("[general]\nlog_level = \"warn\"\n").unwrap();
    cli.apply_overrides(&mut config);

    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.general.pid_file, "/tmp/netwarden-test.pid");
    assert_eq!(config.capture.replay_path, "/var/lib/netwarden/capture.jsonl");
    assert!(config.capture.pace);
    assert!(cli.config.is_none());
}

#[test]
fn cli_without_flags_changes_nothing() {
    let cli = DaemonCli::parse_from(["netwarden-daemon"]);
    let mut config = NetwardenConfig::default();
    cli.apply_overrides(&mut config);

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.capture.replay_path, "-");
    assert!(!config.capture.pace);
    assert!(!cli.validate);
}

#[test]
fn cli_invalid_log_level_is_caught_by_validation() {
    let cli = DaemonCli::parse_from(["netwarden-daemon", "--log-level", "verbose"]);
    let mut config = NetwardenConfig::default();
    cli.apply_overrides(&mut config);
    assert!(config.validate().is_err());
}

#[tokio::test]
#[serial]
async fn load_applies_env_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("netwarden.toml");
    std::fs::write(&path, "[flow]\nidle_timeout_secs = 30\n").unwrap();

    // SAFETY: serialized with other env tests
    unsafe { std::env::set_var("NETWARDEN_FLOW_IDLE_TIMEOUT_SECS", "12") };
    let loaded = NetwardenConfig::load(&path).await;
    unsafe { std::env::remove_var("NETWARDEN_FLOW_IDLE_TIMEOUT_SECS") };

    assert_eq!(loaded.unwrap().flow.idle_timeout_secs, 12);
}

#[tokio::test]
async fn check_config_without_classifier() {
    let loaded = check_config(&NetwardenConfig::default()).await.unwrap();
    assert!(!loaded);
}

#[tokio::test]
async fn check_config_rejects_broken_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("model.json");
    std::fs::write(&model, "{ not json").unwrap();

    let mut config = NetwardenConfig::default();
    config.classifier.model_path = model.display().to_string();
    config.classifier.scaler_path = dir.path().join("scaler.json").display().to_string();
    config.classifier.features_path = dir.path().join("features.json").display().to_string();
    config.classifier.labels_path = dir.path().join("labels.json").display().to_string();

    let err = check_config(&config).await.unwrap_err();
    assert!(err.to_string().contains("classifier artifacts"), "got: {err}");
}
