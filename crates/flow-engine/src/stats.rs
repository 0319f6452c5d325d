//! 트래픽 통계: 누적 카운터와 초당 패킷 수
//!
//! [`TrafficCounters`]는 수집 태스크와 스위퍼가 공유하는 원자적 카운터입니다.
//! 초당 패킷 수(pps)는 스위프 틱마다 [`TrafficCounters::tick`]으로 갱신됩니다.
//!
//! # 데이터 흐름
//! ```text
//! Demultiplexer ──record_packet──▶ TrafficCounters ◀──tick/record_sweep── ExpirySweeper
//!                                        │
//!                                        └──snapshot──▶ TrafficSnapshot (Serialize)
//! ```

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

use netwarden_core::metrics as m;

/// pps 계산용 이전 틱 상태
#[derive(Debug)]
struct RateWindow {
    last_tick: Option<Instant>,
    last_packets: u64,
}

/// 엔진 전체 트래픽 카운터
#[derive(Debug)]
pub struct TrafficCounters {
    packets: AtomicU64,
    bytes: AtomicU64,
    flows_created: AtomicU64,
    flows_evicted: AtomicU64,
    alerts: AtomicU64,
    classification_failures: AtomicU64,
    active_flows: AtomicU64,
    /// f64 비트 패턴으로 저장
    packets_per_second: AtomicU64,
    window: Mutex<RateWindow>,
}

/// 특정 시점의 카운터 값
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrafficSnapshot {
    /// 수집된 패킷 수 (누적)
    pub packets: u64,
    /// 수집된 바이트 수 (누적)
    pub bytes: u64,
    /// 생성된 플로우 수 (누적)
    pub flows_created: u64,
    /// 만료 제거된 플로우 수 (누적)
    pub flows_evicted: u64,
    /// 생성된 알림 수 (누적)
    pub alerts: u64,
    /// 분류 실패 수 (누적)
    pub classification_failures: u64,
    /// 마지막 스윕 직후 테이블 크기
    pub active_flows: u64,
    /// 마지막 두 틱 사이의 초당 패킷 수
    pub packets_per_second: f64,
}

impl Default for TrafficCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl TrafficCounters {
    /// 0으로 초기화된 카운터를 생성합니다.
    pub fn new() -> Self {
        Self {
            packets: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            flows_created: AtomicU64::new(0),
            flows_evicted: AtomicU64::new(0),
            alerts: AtomicU64::new(0),
            classification_failures: AtomicU64::new(0),
            active_flows: AtomicU64::new(0),
            packets_per_second: AtomicU64::new(0f64.to_bits()),
            window: Mutex::new(RateWindow {
                last_tick: None,
                last_packets: 0,
            }),
        }
    }

    /// 패킷 하나를 기록합니다.
    pub fn record_packet(&self, size: usize) {
        self.packets.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(size as u64, Ordering::Relaxed);
    }

    /// 플로우 생성을 기록합니다.
    pub fn record_flow_created(&self) {
        self.flows_created.fetch_add(1, Ordering::Relaxed);
    }

    /// 스윕 한 번의 결과를 기록하고 게이지를 갱신합니다.
    pub fn record_sweep(&self, evicted: u64, alerts: u64, failures: u64, active_after: u64) {
        self.flows_evicted.fetch_add(evicted, Ordering::Relaxed);
        self.alerts.fetch_add(alerts, Ordering::Relaxed);
        self.classification_failures
            .fetch_add(failures, Ordering::Relaxed);
        self.active_flows.store(active_after, Ordering::Relaxed);
        metrics::gauge!(m::FLOW_ACTIVE).set(active_after as f64);
    }

    /// 직전 틱 이후 패킷 증가량으로 pps를 갱신하고 반환합니다.
    ///
    /// 첫 호출은 기준점만 설정하고 0을 반환합니다.
    pub fn tick(&self, now: Instant) -> f64 {
        let packets = self.packets.load(Ordering::Relaxed);
        let mut window = match self.window.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let rate = match window.last_tick {
            Some(last) => {
                let elapsed = now.saturating_duration_since(last).as_secs_f64();
                if elapsed > 0.0 {
                    packets.saturating_sub(window.last_packets) as f64 / elapsed
                } else {
                    self.packets_per_second()
                }
            }
            None => 0.0,
        };

        window.last_tick = Some(now);
        window.last_packets = packets;
        self.packets_per_second
            .store(rate.to_bits(), Ordering::Relaxed);
        metrics::gauge!(m::FLOW_PACKETS_PER_SECOND).set(rate);
        rate
    }

    /// 마지막으로 계산된 pps
    pub fn packets_per_second(&self) -> f64 {
        f64::from_bits(self.packets_per_second.load(Ordering::Relaxed))
    }

    /// 현재 카운터 값을 복사합니다.
    pub fn snapshot(&self) -> TrafficSnapshot {
        TrafficSnapshot {
            packets: self.packets.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            flows_created: self.flows_created.load(Ordering::Relaxed),
            flows_evicted: self.flows_evicted.load(Ordering::Relaxed),
            alerts: self.alerts.load(Ordering::Relaxed),
            classification_failures: self.classification_failures.load(Ordering::Relaxed),
            active_flows: self.active_flows.load(Ordering::Relaxed),
            packets_per_second: self.packets_per_second(),
        }
    }
}
