//! 만료 스위퍼: 유휴 플로우 평가 및 제거
//!
//! 틱마다 락 안에서 유휴 플로우만 골라 복사하고, 락 밖에서
//! 피처 추출 → 분류 → 알림 전달을 수행한 뒤 한 번에 제거합니다.
//!
//! ```text
//! snapshot(idle) ──▶ extract ──▶ classify ──▶ non-benign? ──▶ emit
//!        │                          │ (error: log, no alert)
//!        └──────────────────────────┴──────────▶ mark for removal ──▶ remove(batch)
//! ```
//!
//! 분류 실패는 플로우 단위로 격리되며 스윕을 중단시키지 않습니다.
//! 테이블 락 오염만 치명적 에러로 반환됩니다.
//!
//! 스냅샷과 일괄 제거 사이에 패킷이 더 들어온 플로우는 제거하지 않고
//! 다음 틱에 다시 평가합니다.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use netwarden_core::metrics as m;

use crate::classifier::FlowClassifier;
use crate::emitter::AlertEmitter;
use crate::error::FlowEngineError;
use crate::event::{AlertEvent, FlowAlert};
use crate::features;
use crate::flow::FlowKey;
use crate::stats::TrafficCounters;
use crate::table::FlowTable;

/// 스윕 1회 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// 스윕 시점의 전체 플로우 수
    pub scanned: usize,
    /// 유휴로 판정되어 복사된 플로우 수
    pub idle: usize,
    /// 제거된 플로우 수
    pub evicted: usize,
    /// 평가 도중 패킷이 더 들어와 남겨 둔 플로우 수
    pub retained: usize,
    /// 생성된 알림 수
    pub alerts: usize,
    /// 분류 실패 수
    pub classification_failures: usize,
    /// 제거 후 테이블 크기
    pub active_after: usize,
}

/// 만료 스위퍼
#[derive(Debug)]
pub struct ExpirySweeper {
    table: Arc<FlowTable>,
    classifier: Arc<FlowClassifier>,
    emitter: AlertEmitter,
    counters: Arc<TrafficCounters>,
    idle_timeout: Duration,
}

impl ExpirySweeper {
    /// 스위퍼를 생성합니다.
    pub fn new(
        table: Arc<FlowTable>,
        classifier: Arc<FlowClassifier>,
        emitter: AlertEmitter,
        counters: Arc<TrafficCounters>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            table,
            classifier,
            emitter,
            counters,
            idle_timeout,
        }
    }

    /// 유휴 타임아웃
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// `now` 기준으로 한 번 스윕합니다.
    pub async fn sweep_once(&mut self, now: SystemTime) -> Result<SweepReport, FlowEngineError> {
        let started = Instant::now();
        let (scanned, idle) = self.table.snapshot_idle(now, self.idle_timeout)?;
        let mut report = SweepReport {
            scanned,
            idle: idle.len(),
            ..SweepReport::default()
        };

        let mut expired: Vec<(FlowKey, u64)> = Vec::with_capacity(idle.len());
        for (key, flow) in idle {
            expired.push((key, flow.total_packets()));

            let vector = features::extract(&flow, now);
            let classification = match self.classifier.classify(&vector) {
                Ok(c) => c,
                Err(FlowEngineError::Classification { stage, source }) => {
                    report.classification_failures += 1;
                    metrics::counter!(
                        m::FLOW_CLASSIFICATION_FAILURES_TOTAL,
                        m::LABEL_STAGE => stage.as_str()
                    )
                    .increment(1);
                    warn!(flow = %key, %stage, error = %source, "flow classification failed");
                    continue;
                }
                Err(other) => return Err(other),
            };

            if classification.heuristic_applied {
                metrics::counter!(m::FLOW_HEURISTIC_OVERRIDES_TOTAL).increment(1);
            }

            let verdict = classification.verdict;
            if !verdict.is_alert() {
                debug!(flow = %key, verdict = verdict.label(), "flow expired");
                continue;
            }

            let label = verdict.label().to_owned();
            metrics::counter!(m::FLOW_ALERTS_TOTAL, m::LABEL_CLASS => label.clone()).increment(1);
            info!(
                flow = %key,
                label = label.as_str(),
                fwd_packets = flow.fwd_packets,
                bwd_packets = flow.bwd_packets,
                heuristic = classification.heuristic_applied,
                "alert raised"
            );
            let event = AlertEvent::new(FlowAlert::new(&key, label, vector, now));
            self.emitter.emit(event).await;
            report.alerts += 1;
        }

        report.evicted = self.table.remove_unchanged(&expired)?;
        report.retained = expired.len() - report.evicted;
        report.active_after = self.table.len()?;

        metrics::counter!(m::FLOW_EVICTED_TOTAL).increment(report.evicted as u64);
        metrics::histogram!(m::FLOW_SWEEP_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        self.counters.record_sweep(
            report.evicted as u64,
            report.alerts as u64,
            report.classification_failures as u64,
            report.active_after as u64,
        );

        if report.evicted > 0 || report.retained > 0 {
            debug!(
                scanned = report.scanned,
                evicted = report.evicted,
                retained = report.retained,
                alerts = report.alerts,
                failures = report.classification_failures,
                active = report.active_after,
                "sweep completed"
            );
        }
        Ok(report)
    }

    /// 취소될 때까지 `interval` 주기로 스윕합니다.
    ///
    /// 첫 스윕은 한 주기 뒤에 실행됩니다. 치명적 에러가 나면 즉시 반환합니다.
    pub async fn run(
        mut self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Result<(), FlowEngineError> {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("sweeper cancelled");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.sweep_once(SystemTime::now()).await?;
                    self.counters.tick(Instant::now());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use netwarden_core::types::{PROTO_TCP, PacketInfo};

    use super::*;
    use crate::config::HeuristicRule;

    fn sweeper(table: &Arc<FlowTable>) -> (ExpirySweeper, tokio::sync::mpsc::Receiver<AlertEvent>) {
        let mut emitter = AlertEmitter::new();
        let rx = emitter.subscribe("test", 16);
        let classifier = FlowClassifier::disabled(HeuristicRule {
            fwd_packet_threshold: 100,
            apply_without_model: true,
        });
        (
            ExpirySweeper::new(
                Arc::clone(table),
                Arc::new(classifier),
                emitter,
                Arc::new(TrafficCounters::new()),
                Duration::from_secs(5),
            ),
            rx,
        )
    }

    fn packets(table: &FlowTable, src: &str, count: usize, at: SystemTime) {
        for _ in 0..count {
            let p = PacketInfo::new(src.parse().unwrap(), "10.0.0.9".parse().unwrap(), 5000, 80, PROTO_TCP, 60)
                .at(at);
            table.observe(&p).unwrap();
        }
    }

    #[tokio::test]
    async fn idle_flow_is_removed_once() {
        let table = Arc::new(FlowTable::new());
        let (mut sweeper, _rx) = sweeper(&table);
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        packets(&table, "192.168.1.5", 1, t0);
        packets(&table, "192.168.1.6", 1, t0 + Duration::from_secs(4));

        let report = sweeper.sweep_once(t0 + Duration::from_secs(6)).await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.idle, 1);
        assert_eq!(report.evicted, 1);
        assert_eq!(report.retained, 0);
        assert_eq!(report.active_after, 1);
        assert_eq!(table.len().unwrap(), 1);

        let report = sweeper.sweep_once(t0 + Duration::from_secs(6)).await.unwrap();
        assert_eq!(report.evicted, 0);
    }

    #[tokio::test]
    async fn exactly_timeout_is_not_idle() {
        let table = Arc::new(FlowTable::new());
        let (mut sweeper, _rx) = sweeper(&table);
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        packets(&table, "192.168.1.5", 1, t0);

        let report = sweeper.sweep_once(t0 + Duration::from_secs(5)).await.unwrap();
        assert_eq!(report.evicted, 0);
        assert_eq!(table.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn heavy_flow_alerts_and_light_flow_does_not() {
        let table = Arc::new(FlowTable::new());
        let (mut sweeper, mut rx) = sweeper(&table);
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        packets(&table, "192.168.1.5", 150, t0);
        packets(&table, "192.168.1.6", 3, t0);

        let report = sweeper.sweep_once(t0 + Duration::from_secs(10)).await.unwrap();
        assert_eq!(report.evicted, 2);
        assert_eq!(report.alerts, 1);
        assert!(table.is_empty().unwrap());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.alert.label, "DDoS");
        assert_eq!(event.alert.src_ip.to_string(), "192.168.1.5");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let table = Arc::new(FlowTable::new());
        let (sweeper, _rx) = sweeper(&table);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(sweeper.run(Duration::from_millis(10), cancel.clone()));
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn busy_active_flow_is_not_copied() {
        let table = Arc::new(FlowTable::new());
        let (mut sweeper, mut rx) = sweeper(&table);
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        packets(&table, "192.168.1.5", 5_000, t0 + Duration::from_secs(9));
        packets(&table, "192.168.1.6", 1, t0);

        let report = sweeper.sweep_once(t0 + Duration::from_secs(10)).await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.idle, 1);
        assert_eq!(report.evicted, 1);
        assert_eq!(report.alerts, 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(table.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn flow_that_grows_during_evaluation_survives() {
        let table = Arc::new(FlowTable::new());
        let mut emitter = AlertEmitter::new();
        // no capacity left: emit waits until the receiver drains
        let mut rx = emitter.subscribe("test", 1);
        let classifier = FlowClassifier::disabled(HeuristicRule {
            fwd_packet_threshold: 100,
            apply_without_model: true,
        });
        let mut sweeper = ExpirySweeper::new(
            Arc::clone(&table),
            Arc::new(classifier),
            emitter,
            Arc::new(TrafficCounters::new()),
            Duration::from_secs(5),
        );
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        packets(&table, "192.168.1.5", 150, t0);
        packets(&table, "192.168.1.6", 150, t0);

        let sweep = tokio::spawn(async move {
            sweeper.sweep_once(t0 + Duration::from_secs(10)).await.unwrap()
        });

        // first alert delivered, second emit is parked on the full channel
        let first = rx.recv().await.unwrap();
        let late = if first.alert.src_ip.to_string() == "192.168.1.5" {
            "192.168.1.6"
        } else {
            "192.168.1.5"
        };
        packets(&table, late, 1, t0 + Duration::from_secs(10));
        rx.recv().await.unwrap();

        let report = sweep.await.unwrap();
        assert_eq!(report.idle, 2);
        assert_eq!(report.alerts, 2);
        assert_eq!(report.evicted, 1);
        assert_eq!(report.retained, 1);
        assert_eq!(table.len().unwrap(), 1);
        let survivor = table.snapshot().unwrap();
        assert_eq!(survivor[0].0.src_ip.to_string(), late);
        assert_eq!(survivor[0].1.total_packets(), 151);
    }
}
