//! Component assembly and lifecycle.
//!
//! The [`Orchestrator`] wires a packet source, the flow engine and the
//! alert subscribers together and runs them until shutdown.
//!
//! ```text
//! PacketSource ──mpsc──▶ FlowEngine ──mpsc──▶ AlertLogger
//!                            │       └─mpsc──▶ RecentAlerts
//!                            └──fatal──▶ Orchestrator
//! ```
//!
//! # Startup order
//!
//! 1. PID file
//! 2. Flow engine (ingest and sweep tasks)
//! 3. Alert subscribers
//! 4. Packet source
//!
//! # Shutdown order (producers first)
//!
//! 1. Packet source (cancelled)
//! 2. Flow engine (ingest and sweep stop, alert senders dropped)
//! 3. Alert subscribers (drain what is queued, then exit)
//! 4. PID file removed
//!
//! The main loop ends on a shutdown signal, a fatal flow engine error, or
//! a failing packet source. An exhausted source is not a reason to stop:
//! the remaining flows still idle out and get classified.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use netwarden_core::config::NetwardenConfig;
use netwarden_core::event::{MODULE_CAPTURE, MODULE_FLOW_ENGINE};
use netwarden_core::metrics as m;
use netwarden_core::pipeline::{HealthStatus, Pipeline};
use netwarden_flow_engine::{
    AlertEvent, FlowEngine, FlowEngineConfig, FlowEngineError, TrafficSnapshot, load_artifact,
};

use crate::consumers::{AlertLogger, RecentAlerts};
use crate::health::{ComponentHealth, DaemonHealth, aggregate_status};
use crate::metrics_server;
use crate::pid::PidFile;
use crate::source::{PacketSource, ReplaySource, SourceReport};

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Why [`Orchestrator::run`] returned.
#[derive(Debug)]
pub enum Shutdown {
    /// Shutdown was requested (signal name).
    Requested(&'static str),
    /// The flow engine halted on a fatal error.
    Fatal(FlowEngineError),
    /// The packet source failed.
    SourceFailed(anyhow::Error),
}

impl Shutdown {
    /// Whether the daemon should exit with status 0.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Requested(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureState {
    Pending,
    Running,
    Exhausted,
}

/// Channels and source consumed by the first run.
struct Wiring {
    source: Box<dyn PacketSource>,
    logger_rx: mpsc::Receiver<AlertEvent>,
    recent_rx: mpsc::Receiver<AlertEvent>,
    fatal_rx: mpsc::Receiver<FlowEngineError>,
}

/// The daemon orchestrator.
pub struct Orchestrator {
    config: NetwardenConfig,
    engine: FlowEngine,
    recent: RecentAlerts,
    wiring: Option<Wiring>,
    source_name: String,
    capture: CaptureState,
    source_cancel: CancellationToken,
    start_time: Instant,
}

impl Orchestrator {
    /// Load `netwarden.toml` (with env overrides) and build.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = NetwardenConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build with the replay source described by `[capture]`.
    pub async fn build_from_config(config: NetwardenConfig) -> Result<Self> {
        let source = ReplaySource::from_config(&config.capture);
        Self::build_with_source(config, Box::new(source)).await
    }

    /// Build around an explicit packet source.
    ///
    /// Validates the configuration, installs the metrics recorder when
    /// enabled, loads classifier artifacts and wires every channel.
    ///
    /// # Errors
    ///
    /// - invalid configuration
    /// - metrics recorder installation fails
    /// - classifier artifacts exist but are unreadable or inconsistent
    pub async fn build_with_source(
        config: NetwardenConfig,
        source: Box<dyn PacketSource>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let artifact = load_artifact(&config.classifier)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load classifier artifacts: {}", e))?;

        let capacity = config.alerts.channel_capacity;
        let (logger_tx, logger_rx) = mpsc::channel(capacity);
        let (recent_tx, recent_rx) = mpsc::channel(capacity);

        let mut builder = FlowEngine::builder()
            .config(FlowEngineConfig::from_core(&config))
            .alert_sender("logger", logger_tx)
            .alert_sender("recent", recent_tx);
        if let Some(artifact) = artifact {
            builder = builder.artifact(artifact);
        }
        let (mut engine, _) = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build flow engine: {}", e))?;
        let fatal_rx = engine
            .take_fatal_receiver()
            .ok_or_else(|| anyhow::anyhow!("flow engine fatal channel unavailable"))?;

        if config.metrics.enabled {
            metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
        }

        tracing::info!(
            source = source.name(),
            classifier = engine.classifier_enabled(),
            recent_capacity = config.alerts.recent_capacity,
            "orchestrator initialized"
        );

        Ok(Self {
            recent: RecentAlerts::new(config.alerts.recent_capacity),
            source_name: source.name().to_owned(),
            wiring: Some(Wiring {
                source,
                logger_rx,
                recent_rx,
                fatal_rx,
            }),
            config,
            engine,
            capture: CaptureState::Pending,
            source_cancel: CancellationToken::new(),
            start_time: Instant::now(),
        })
    }

    /// Run until SIGTERM or SIGINT, a fatal engine error or a source failure.
    pub async fn run(&mut self) -> Result<Shutdown> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

        self.run_until(async move {
            tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            }
        })
        .await
    }

    /// Run until `shutdown` resolves, a fatal engine error or a source failure.
    ///
    /// Can be called once; the channels are consumed by the first run.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<Shutdown>
    where
        F: Future<Output = &'static str>,
    {
        let Wiring {
            source,
            logger_rx,
            recent_rx,
            mut fatal_rx,
        } = self
            .wiring
            .take()
            .ok_or_else(|| anyhow::anyhow!("orchestrator has already run"))?;

        // removed on every return path below
        let _pid_file = self.pid_file_path().map(PidFile::create).transpose()?;

        self.engine
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start flow engine: {}", e))?;

        let logger_task = AlertLogger::new().spawn(logger_rx);
        let recent_task = self.recent.spawn(recent_rx);

        let mut source_task = tokio::spawn(
            source.run(self.engine.packet_sender(), self.source_cancel.clone()),
        );
        let mut source_joined = false;
        self.capture = CaptureState::Running;

        let mut health_tick = tokio::time::interval_at(
            tokio::time::Instant::now() + HEALTH_CHECK_INTERVAL,
            HEALTH_CHECK_INTERVAL,
        );
        health_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        tracing::info!(source = %self.source_name, "netwarden-daemon running");

        let outcome = loop {
            tokio::select! {
                signal = &mut shutdown => break Shutdown::Requested(signal),
                Some(err) = fatal_rx.recv() => break Shutdown::Fatal(err),
                joined = &mut source_task, if !source_joined => {
                    source_joined = true;
                    match joined {
                        Ok(Ok(report)) => {
                            self.capture = CaptureState::Exhausted;
                            log_source_report(&report);
                        }
                        Ok(Err(e)) => break Shutdown::SourceFailed(e),
                        Err(e) => {
                            break Shutdown::SourceFailed(anyhow::anyhow!(
                                "packet source task panicked: {}",
                                e
                            ));
                        }
                    }
                }
                _ = health_tick.tick() => self.log_health().await,
            }
        };

        match &outcome {
            Shutdown::Requested(signal) => tracing::info!(signal, "shutdown requested"),
            Shutdown::Fatal(e) => tracing::error!(error = %e, "flow engine halted"),
            Shutdown::SourceFailed(e) => {
                tracing::error!(error = %format!("{e:#}"), "packet source failed")
            }
        }

        // producers first
        self.source_cancel.cancel();
        if !source_joined {
            match source_task.await {
                Ok(Ok(report)) => log_source_report(&report),
                Ok(Err(e)) => tracing::warn!(error = %format!("{e:#}"), "packet source failed during shutdown"),
                Err(e) => tracing::error!(error = %e, "packet source task panicked"),
            }
        }

        if let Err(e) = self.engine.stop().await {
            tracing::error!(error = %e, "failed to stop flow engine");
        }

        match logger_task.await {
            Ok(logged) => tracing::debug!(logged, "alert logger stopped"),
            Err(e) => tracing::error!(error = %e, "alert logger task panicked"),
        }
        if let Err(e) = recent_task.await {
            tracing::error!(error = %e, "recent alert task panicked");
        }

        Ok(outcome)
    }

    /// Current aggregated health.
    pub async fn health(&self) -> DaemonHealth {
        let capture = match self.capture {
            CaptureState::Pending => HealthStatus::Unhealthy("not started".to_owned()),
            CaptureState::Running => HealthStatus::Healthy,
            CaptureState::Exhausted => HealthStatus::Degraded("input exhausted".to_owned()),
        };
        let components = vec![
            ComponentHealth::new(MODULE_FLOW_ENGINE, self.engine.health_check().await),
            ComponentHealth::new(format!("{MODULE_CAPTURE}:{}", self.source_name), capture),
        ];

        let uptime_secs = self.start_time.elapsed().as_secs();
        if self.config.metrics.enabled {
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
        }

        DaemonHealth {
            status: aggregate_status(&components),
            uptime_secs,
            components,
            traffic: self.engine.stats(),
            recent_alerts: self.recent.len(),
        }
    }

    async fn log_health(&self) {
        let health = self.health().await;
        let t = &health.traffic;
        if health.status.is_healthy() {
            tracing::info!(
                uptime_secs = health.uptime_secs,
                packets = t.packets,
                active_flows = t.active_flows,
                pps = t.packets_per_second,
                alerts = t.alerts,
                "health check"
            );
        } else {
            tracing::warn!(
                status = %health.status,
                uptime_secs = health.uptime_secs,
                packets = t.packets,
                active_flows = t.active_flows,
                alerts = t.alerts,
                "health check"
            );
        }
    }

    fn pid_file_path(&self) -> Option<PathBuf> {
        let path = &self.config.general.pid_file;
        (!path.is_empty()).then(|| PathBuf::from(path))
    }

    /// Shared handle to the recent-alert buffer.
    pub fn recent_alerts(&self) -> RecentAlerts {
        self.recent.clone()
    }

    pub fn stats(&self) -> TrafficSnapshot {
        self.engine.stats()
    }

    pub fn classifier_enabled(&self) -> bool {
        self.engine.classifier_enabled()
    }

    pub fn config(&self) -> &NetwardenConfig {
        &self.config
    }
}

fn log_source_report(report: &SourceReport) {
    tracing::info!(
        lines = report.lines,
        packets = report.packets,
        dropped = report.dropped,
        "packet source finished"
    );
}

/// Check configuration and classifier artifacts without starting anything.
///
/// Returns whether a classifier would be loaded.
pub async fn check_config(config: &NetwardenConfig) -> Result<bool> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
    FlowEngineConfig::from_core(config)
        .validate()
        .map_err(|e| anyhow::anyhow!("flow engine config invalid: {}", e))?;
    if config.metrics.enabled {
        metrics_server::listen_addr(&config.metrics)?;
    }
    let artifact = load_artifact(&config.classifier)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load classifier artifacts: {}", e))?;
    Ok(artifact.is_some())
}
