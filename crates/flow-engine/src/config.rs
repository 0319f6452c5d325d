//! 플로우 엔진 설정
//!
//! [`FlowEngineConfig`]는 core의 `[flow]`, `[heuristic]`, `[alerts]` 섹션을
//! 런타임 타입(`Duration` 등)으로 변환한 엔진 전용 설정입니다.

use std::time::Duration;

use netwarden_core::config::{DEFAULT_HEURISTIC_FWD_PACKETS, NetwardenConfig};

use crate::error::FlowEngineError;

/// 휴리스틱 재분류 규칙 설정
///
/// benign 판정 + forward 패킷 수가 임계값 초과 → "DDoS"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeuristicRule {
    /// forward 패킷 임계값 (초과 시 적용)
    pub fwd_packet_threshold: u64,
    /// 분류기가 없을 때도 적용할지 여부
    pub apply_without_model: bool,
}

impl Default for HeuristicRule {
    fn default() -> Self {
        Self {
            fwd_packet_threshold: DEFAULT_HEURISTIC_FWD_PACKETS,
            apply_without_model: false,
        }
    }
}

/// 플로우 엔진 설정
#[derive(Debug, Clone)]
pub struct FlowEngineConfig {
    /// 만료 스윕 주기
    pub sweep_interval: Duration,
    /// 유휴 타임아웃
    pub idle_timeout: Duration,
    /// 패킷 수집 채널 용량
    pub ingest_channel_capacity: usize,
    /// 구독자별 알림 채널 용량
    pub alert_channel_capacity: usize,
    /// 휴리스틱 재분류 규칙
    pub heuristic: HeuristicRule,
}

impl Default for FlowEngineConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(5),
            ingest_channel_capacity: 4096,
            alert_channel_capacity: 256,
            heuristic: HeuristicRule::default(),
        }
    }
}

impl FlowEngineConfig {
    /// core 설정에서 엔진 설정을 생성합니다.
    pub fn from_core(config: &NetwardenConfig) -> Self {
        Self {
            sweep_interval: Duration::from_secs(config.flow.sweep_interval_secs),
            idle_timeout: Duration::from_secs(config.flow.idle_timeout_secs),
            ingest_channel_capacity: config.flow.ingest_channel_capacity,
            alert_channel_capacity: config.alerts.channel_capacity,
            heuristic: HeuristicRule {
                fwd_packet_threshold: config.heuristic.fwd_packet_threshold,
                apply_without_model: config.heuristic.apply_without_model,
            },
        }
    }

    /// 설정값을 검증합니다.
    pub fn validate(&self) -> Result<(), FlowEngineError> {
        if self.sweep_interval.is_zero() {
            return Err(config_err("sweep_interval", "must be greater than 0"));
        }
        if self.idle_timeout.is_zero() {
            return Err(config_err("idle_timeout", "must be greater than 0"));
        }
        if self.ingest_channel_capacity == 0 {
            return Err(config_err("ingest_channel_capacity", "must be greater than 0"));
        }
        if self.alert_channel_capacity == 0 {
            return Err(config_err("alert_channel_capacity", "must be greater than 0"));
        }
        Ok(())
    }
}

fn config_err(field: &str, reason: &str) -> FlowEngineError {
    FlowEngineError::Config {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}
