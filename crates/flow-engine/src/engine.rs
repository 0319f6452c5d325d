//! 플로우 엔진: 수집 태스크와 스윕 태스크의 생명주기 관리
//!
//! [`FlowEngine`]은 빌더([`FlowEngineBuilder`])로 생성하며 [`Pipeline`] trait을 구현합니다.
//!
//! # 아키텍처
//! ```text
//! ┌──────────────┐  mpsc   ┌────────────────┐        ┌───────────┐
//! │ PacketSource │───────▶│ ingest task    │──────▶│ FlowTable │
//! │ (daemon)     │        │ (Demultiplexer)│        └─────┬─────┘
//! └──────────────┘        └────────────────┘              │ snapshot / remove
//!                                                         ▼
//!                          ┌───────────────────────────────────┐   mpsc    ┌────────────┐
//!                          │ sweep task (ExpirySweeper)         │─────────▶│ subscribers│
//!                          │ extract → classify → AlertEmitter  │          └────────────┘
//!                          └───────────────────────────────────┘
//! ```
//!
//! 치명적 에러(테이블 락 오염)가 나면 두 태스크를 모두 취소하고
//! [`FlowEngine::take_fatal_receiver`]로 얻은 채널에 에러를 보냅니다.
//!
//! # 사용 예시
//! ```ignore
//! let (mut engine, alert_rx) = FlowEngine::builder()
//!     .config(FlowEngineConfig::from_core(&config))
//!     .artifact(artifact)
//!     .build()?;
//!
//! let packets = engine.packet_sender();
//! engine.start().await?;
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use netwarden_core::error::{NetwardenError, PipelineError};
use netwarden_core::pipeline::{HealthStatus, Pipeline};
use netwarden_core::types::PacketInfo;

use crate::classifier::{ClassifierArtifact, FlowClassifier};
use crate::config::FlowEngineConfig;
use crate::demux::Demultiplexer;
use crate::emitter::AlertEmitter;
use crate::error::FlowEngineError;
use crate::event::AlertEvent;
use crate::stats::{TrafficCounters, TrafficSnapshot};
use crate::sweeper::ExpirySweeper;
use crate::table::FlowTable;

/// 엔진 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    /// 빌드됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨 (재시작 불가)
    Stopped,
}

/// 플로우 엔진
pub struct FlowEngine {
    config: FlowEngineConfig,
    state: EngineState,
    table: Arc<FlowTable>,
    counters: Arc<TrafficCounters>,
    classifier: Arc<FlowClassifier>,
    /// start() 시 스위퍼로 이동
    emitter: Option<AlertEmitter>,
    packet_tx: mpsc::Sender<PacketInfo>,
    /// start() 시 수집 태스크로 이동
    packet_rx: Option<mpsc::Receiver<PacketInfo>>,
    fatal_tx: mpsc::Sender<FlowEngineError>,
    fatal_rx: Option<mpsc::Receiver<FlowEngineError>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// 플로우 엔진 빌더
///
/// `build()`는 `(FlowEngine, Option<mpsc::Receiver<AlertEvent>>)`를 반환합니다.
/// 외부 알림 송신자를 하나도 지정하지 않으면 내부 채널의 수신자를 돌려줍니다.
pub struct FlowEngineBuilder {
    config: FlowEngineConfig,
    artifact: Option<ClassifierArtifact>,
    senders: Vec<(String, mpsc::Sender<AlertEvent>)>,
}

impl FlowEngineBuilder {
    fn new() -> Self {
        Self {
            config: FlowEngineConfig::default(),
            artifact: None,
            senders: Vec::new(),
        }
    }

    /// 엔진 설정을 지정합니다.
    pub fn config(mut self, config: FlowEngineConfig) -> Self {
        self.config = config;
        self
    }

    /// 분류기 아티팩트를 지정합니다. 지정하지 않으면 분류 비활성입니다.
    pub fn artifact(mut self, artifact: ClassifierArtifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    /// 알림 구독자 송신자를 추가합니다. 여러 번 호출할 수 있습니다.
    pub fn alert_sender(mut self, name: impl Into<String>, tx: mpsc::Sender<AlertEvent>) -> Self {
        self.senders.push((name.into(), tx));
        self
    }

    /// 엔진을 빌드합니다.
    ///
    /// # 에러
    /// - `FlowEngineError::Config`: 설정 검증 실패
    pub fn build(
        self,
    ) -> Result<(FlowEngine, Option<mpsc::Receiver<AlertEvent>>), FlowEngineError> {
        self.config.validate()?;

        let mut emitter = AlertEmitter::new();
        let alert_rx = if self.senders.is_empty() {
            Some(emitter.subscribe("default", self.config.alert_channel_capacity))
        } else {
            for (name, tx) in self.senders {
                emitter.add_sender(name, tx);
            }
            None
        };

        let classifier = FlowClassifier::new(self.artifact, self.config.heuristic);
        let (packet_tx, packet_rx) = mpsc::channel(self.config.ingest_channel_capacity);
        let (fatal_tx, fatal_rx) = mpsc::channel(1);

        let engine = FlowEngine {
            config: self.config,
            state: EngineState::Initialized,
            table: Arc::new(FlowTable::new()),
            counters: Arc::new(TrafficCounters::new()),
            classifier: Arc::new(classifier),
            emitter: Some(emitter),
            packet_tx,
            packet_rx: Some(packet_rx),
            fatal_tx,
            fatal_rx: Some(fatal_rx),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        };

        Ok((engine, alert_rx))
    }
}

impl FlowEngine {
    /// 빌더를 반환합니다.
    pub fn builder() -> FlowEngineBuilder {
        FlowEngineBuilder::new()
    }

    /// 패킷 입력 채널의 송신자를 반환합니다.
    pub fn packet_sender(&self) -> mpsc::Sender<PacketInfo> {
        self.packet_tx.clone()
    }

    /// 치명적 에러 수신 채널을 가져갑니다. 한 번만 가져갈 수 있습니다.
    pub fn take_fatal_receiver(&mut self) -> Option<mpsc::Receiver<FlowEngineError>> {
        self.fatal_rx.take()
    }

    /// 트래픽 카운터 스냅샷
    pub fn stats(&self) -> TrafficSnapshot {
        self.counters.snapshot()
    }

    /// 공유 플로우 테이블
    pub fn table(&self) -> &Arc<FlowTable> {
        &self.table
    }

    /// 엔진 설정
    pub fn config(&self) -> &FlowEngineConfig {
        &self.config
    }

    /// 분류기가 로드되어 있는지
    pub fn classifier_enabled(&self) -> bool {
        self.classifier.is_enabled()
    }

    /// 현재 상태 이름
    pub fn state_name(&self) -> &'static str {
        match self.state {
            EngineState::Initialized => "initialized",
            EngineState::Running => "running",
            EngineState::Stopped => "stopped",
        }
    }

    fn report_fatal(
        fatal_tx: &mpsc::Sender<FlowEngineError>,
        cancel: &CancellationToken,
        task: &str,
        err: FlowEngineError,
    ) {
        error!(task, error = %err, "fatal flow engine error, halting");
        cancel.cancel();
        // 첫 에러만 전달되면 충분
        let _ = fatal_tx.try_send(err);
    }

    fn spawn_ingest(&mut self, mut rx: mpsc::Receiver<PacketInfo>) {
        let demux = Demultiplexer::new(Arc::clone(&self.table), Arc::clone(&self.counters));
        let cancel = self.cancel.clone();
        let fatal_tx = self.fatal_tx.clone();

        self.tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    packet = rx.recv() => {
                        let Some(packet) = packet else { break };
                        if let Err(err) = demux.ingest(&packet) {
                            Self::report_fatal(&fatal_tx, &cancel, "ingest", err);
                            break;
                        }
                    }
                }
            }
            debug!("ingest task finished");
        }));
    }

    fn spawn_sweeper(&mut self, emitter: AlertEmitter) {
        let sweeper = ExpirySweeper::new(
            Arc::clone(&self.table),
            Arc::clone(&self.classifier),
            emitter,
            Arc::clone(&self.counters),
            self.config.idle_timeout,
        );
        let interval = self.config.sweep_interval;
        let cancel = self.cancel.clone();
        let fatal_tx = self.fatal_tx.clone();

        self.tasks.push(tokio::spawn(async move {
            if let Err(err) = sweeper.run(interval, cancel.clone()).await {
                Self::report_fatal(&fatal_tx, &cancel, "sweep", err);
            }
            debug!("sweep task finished");
        }));
    }
}

impl Pipeline for FlowEngine {
    /// 수집 태스크와 스윕 태스크를 스폰합니다.
    async fn start(&mut self) -> Result<(), NetwardenError> {
        match self.state {
            EngineState::Running => return Err(PipelineError::AlreadyRunning.into()),
            EngineState::Stopped => {
                return Err(
                    PipelineError::InitFailed("flow engine cannot be restarted".to_owned()).into(),
                );
            }
            EngineState::Initialized => {}
        }

        let (Some(packet_rx), Some(emitter)) = (self.packet_rx.take(), self.emitter.take()) else {
            return Err(PipelineError::InitFailed("engine channels already consumed".to_owned()).into());
        };

        info!(
            sweep_interval_ms = self.config.sweep_interval.as_millis() as u64,
            idle_timeout_ms = self.config.idle_timeout.as_millis() as u64,
            classifier = self.classifier.is_enabled(),
            subscribers = emitter.subscriber_count(),
            "starting flow engine"
        );

        self.spawn_ingest(packet_rx);
        self.spawn_sweeper(emitter);

        self.state = EngineState::Running;
        Ok(())
    }

    /// 두 태스크를 취소하고 종료를 기다립니다.
    async fn stop(&mut self) -> Result<(), NetwardenError> {
        if self.state != EngineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping flow engine");
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!(error = %e, "flow engine task panicked");
            }
        }

        self.state = EngineState::Stopped;
        let stats = self.counters.snapshot();
        info!(
            packets = stats.packets,
            flows_created = stats.flows_created,
            flows_evicted = stats.flows_evicted,
            alerts = stats.alerts,
            "flow engine stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            EngineState::Running if self.cancel.is_cancelled() => {
                HealthStatus::Unhealthy("halted after fatal error".to_owned())
            }
            EngineState::Running if !self.classifier.is_enabled() => {
                HealthStatus::Degraded("classifier not loaded".to_owned())
            }
            EngineState::Running => HealthStatus::Healthy,
            EngineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            EngineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}
