//! Orchestrator integration tests.
//!
//! Full path: replay file -> flow engine -> subscribers -> shutdown.

use std::io::Write;
use std::time::Duration;

use tempfile::{NamedTempFile, TempDir};

use netwarden_core::config::NetwardenConfig;
use netwarden_core::pipeline::HealthStatus;
use netwarden_daemon::orchestrator::{Orchestrator, Shutdown};
use netwarden_daemon::source::ReplaySource;

fn fast_config() -> NetwardenConfig {
    let mut config = NetwardenConfig::default();
    config.flow.sweep_interval_secs = 1;
    config.flow.idle_timeout_secs = 1;
    config
}

fn replay_file(lines: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file.flush().unwrap();
    file
}

fn header_line(src: &str, dst: &str, sport: u16, dport: u16, proto: u8, len: usize) -> String {
    format!(
        r#"{{"src_ip":"{src}","dst_ip":"{dst}","src_port":{sport},"dst_port":{dport},"protocol":{proto},"length":{len}}}"#
    )
}

#[tokio::test]
async fn heavy_flow_reaches_recent_alerts_without_model() {
    let lines: Vec<String> = (0..150)
        .map(|_| header_line("192.168.1.5", "10.0.0.9", 5000, 80, 6, 60))
        .collect();
    let file = replay_file(&lines);

    let mut config = fast_config();
    config.heuristic.apply_without_model = true;
    config.capture.replay_path = file.path().display().to_string();

    let mut orchestrator = Orchestrator::build_from_config(config).await.unwrap();
    assert!(!orchestrator.classifier_enabled());
    let recent = orchestrator.recent_alerts();

    let watcher = recent.clone();
    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        orchestrator.run_until(async move {
            while watcher.is_empty() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            "test"
        }),
    )
    .await
    .expect("alert within timeout")
    .unwrap();

    assert!(matches!(outcome, Shutdown::Requested("test")));
    assert!(outcome.is_clean());

    let alerts = recent.snapshot();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].label, "DDoS");
    assert_eq!(alerts[0].src_ip.to_string(), "192.168.1.5");
    assert_eq!(alerts[0].dst_ip.to_string(), "10.0.0.9");

    let stats = orchestrator.stats();
    assert_eq!(stats.packets, 150);
    assert_eq!(stats.alerts, 1);
}

#[tokio::test]
async fn default_rule_stays_quiet_without_model() {
    let lines: Vec<String> = (0..150)
        .map(|_| header_line("192.168.1.5", "10.0.0.9", 5000, 80, 6, 60))
        .collect();
    let file = replay_file(&lines);

    let mut config = fast_config();
    config.capture.replay_path = file.path().display().to_string();

    let mut orchestrator = Orchestrator::build_from_config(config).await.unwrap();
    let recent = orchestrator.recent_alerts();

    let outcome = orchestrator
        .run_until(async {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            "test"
        })
        .await
        .unwrap();

    assert!(outcome.is_clean());
    assert!(recent.is_empty());
    let stats = orchestrator.stats();
    assert_eq!(stats.packets, 150);
    assert_eq!(stats.flows_evicted, 1);
}

#[tokio::test]
async fn missing_replay_file_fails_the_run() {
    let mut config = fast_config();
    config.capture.replay_path = "/nonexistent/netwarden/capture.jsonl".to_owned();

    let mut orchestrator = Orchestrator::build_from_config(config).await.unwrap();
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        orchestrator.run_until(std::future::pending::<&'static str>()),
    )
    .await
    .expect("source failure should end the run")
    .unwrap();

    match outcome {
        Shutdown::SourceFailed(e) => assert!(format!("{e:#}").contains("failed to open replay file")),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn pid_file_lives_for_the_run() {
    let dir = TempDir::new().unwrap();
    let pid_path = dir.path().join("netwarden.pid");

    let mut config = fast_config();
    config.general.pid_file = pid_path.display().to_string();

    let source = ReplaySource::from_reader(std::io::Cursor::new(Vec::new()), false);
    let mut orchestrator = Orchestrator::build_with_source(config, Box::new(source))
        .await
        .unwrap();

    let during = pid_path.clone();
    let outcome = orchestrator
        .run_until(async move {
            assert!(during.exists(), "PID file should exist while running");
            "test"
        })
        .await
        .unwrap();

    assert!(outcome.is_clean());
    assert!(!pid_path.exists(), "PID file should be removed after the run");
}

#[tokio::test]
async fn second_run_is_rejected() {
    let source = ReplaySource::from_reader(std::io::Cursor::new(Vec::new()), false);
    let mut orchestrator = Orchestrator::build_with_source(fast_config(), Box::new(source))
        .await
        .unwrap();

    orchestrator.run_until(async { "first" }).await.unwrap();
    let err = orchestrator.run_until(async { "second" }).await.unwrap_err();
    assert!(err.to_string().contains("already run"));
}

#[tokio::test]
async fn health_before_start_is_unhealthy() {
    let source = ReplaySource::from_reader(std::io::Cursor::new(Vec::new()), false);
    let orchestrator = Orchestrator::build_with_source(fast_config(), Box::new(source))
        .await
        .unwrap();

    let health = orchestrator.health().await;
    assert!(health.status.is_unhealthy());
    assert_eq!(health.components.len(), 2);
    assert_eq!(health.components[0].name, "flow-engine");
    assert_eq!(health.components[1].name, "capture:replay");
    assert_eq!(health.recent_alerts, 0);
    assert_eq!(health.traffic.packets, 0);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let mut config = NetwardenConfig::default();
    config.flow.sweep_interval_secs = 0;
    let err = Orchestrator::build_from_config(config).await.err().unwrap();
    assert!(err.to_string().contains("config validation failed"));
}

#[tokio::test]
async fn loads_json_classifier_artifacts() {
    let dir = TempDir::new().unwrap();
    let write = |name: &str, body: &str| {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path.display().to_string()
    };

    let mut config = fast_config();
    config.classifier.model_path = write(
        "model.json",
        r#"{"coefficients":[[0.0,0.0]],"intercepts":[-1.0]}"#,
    );
    config.classifier.scaler_path = write("scaler.json", r#"{"mean":[0.0,0.0],"scale":[1.0,1.0]}"#);
    config.classifier.features_path =
        write("features.json", r#"["Flow Duration"," Total Fwd Packets"]"#);
    config.classifier.labels_path = write("labels.json", r#"["BENIGN","DDoS"]"#);

    let source = ReplaySource::from_reader(std::io::Cursor::new(Vec::new()), false);
    let orchestrator = Orchestrator::build_with_source(config, Box::new(source))
        .await
        .unwrap();
    assert!(orchestrator.classifier_enabled());

    let health = orchestrator.health().await;
    // engine not started yet
    assert_eq!(
        health.components[0].status,
        HealthStatus::Unhealthy("not started".to_owned())
    );
}
