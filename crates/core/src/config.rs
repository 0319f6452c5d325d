//! 설정 관리: netwarden.toml 파싱 및 런타임 설정
//!
//! [`NetwardenConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`NETWARDEN_FLOW_IDLE_TIMEOUT_SECS=10` 형식)
//! 3. 설정 파일 (`netwarden.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), netwarden_core::error::NetwardenError> {
//! use netwarden_core::config::NetwardenConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = NetwardenConfig::load("netwarden.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = NetwardenConfig::parse("[flow]\nidle_timeout_secs = 10")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, NetwardenError};

/// 휴리스틱 규칙의 기본 forward 패킷 임계값
///
/// benign으로 분류된 플로우의 forward 패킷 수가 이 값을 초과하면 DDoS로 재분류합니다.
pub const DEFAULT_HEURISTIC_FWD_PACKETS: u64 = 100;

/// Netwarden 통합 설정
///
/// `netwarden.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetwardenConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 플로우 테이블/스윕 설정
    #[serde(default)]
    pub flow: FlowConfig,
    /// 휴리스틱 규칙 설정
    #[serde(default)]
    pub heuristic: HeuristicConfig,
    /// 분류기 아티팩트 설정
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// 알림 전달 설정
    #[serde(default)]
    pub alerts: AlertsConfig,
    /// 패킷 캡처 소스 설정
    #[serde(default)]
    pub capture: CaptureConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl NetwardenConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, NetwardenError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, NetwardenError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                NetwardenError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                NetwardenError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, NetwardenError> {
        toml::from_str(toml_str).map_err(|e| {
            NetwardenError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `NETWARDEN_{SECTION}_{FIELD}`
    /// 예: `NETWARDEN_HEURISTIC_FWD_PACKET_THRESHOLD=250`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "NETWARDEN_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "NETWARDEN_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "NETWARDEN_GENERAL_PID_FILE");

        // Flow
        override_u64(
            &mut self.flow.sweep_interval_secs,
            "NETWARDEN_FLOW_SWEEP_INTERVAL_SECS",
        );
        override_u64(
            &mut self.flow.idle_timeout_secs,
            "NETWARDEN_FLOW_IDLE_TIMEOUT_SECS",
        );
        override_usize(
            &mut self.flow.ingest_channel_capacity,
            "NETWARDEN_FLOW_INGEST_CHANNEL_CAPACITY",
        );

        // Heuristic
        override_u64(
            &mut self.heuristic.fwd_packet_threshold,
            "NETWARDEN_HEURISTIC_FWD_PACKET_THRESHOLD",
        );
        override_bool(
            &mut self.heuristic.apply_without_model,
            "NETWARDEN_HEURISTIC_APPLY_WITHOUT_MODEL",
        );

        // Classifier
        override_string(
            &mut self.classifier.model_path,
            "NETWARDEN_CLASSIFIER_MODEL_PATH",
        );
        override_string(
            &mut self.classifier.scaler_path,
            "NETWARDEN_CLASSIFIER_SCALER_PATH",
        );
        override_string(
            &mut self.classifier.features_path,
            "NETWARDEN_CLASSIFIER_FEATURES_PATH",
        );
        override_string(
            &mut self.classifier.labels_path,
            "NETWARDEN_CLASSIFIER_LABELS_PATH",
        );

        // Alerts
        override_usize(
            &mut self.alerts.channel_capacity,
            "NETWARDEN_ALERTS_CHANNEL_CAPACITY",
        );
        override_usize(
            &mut self.alerts.recent_capacity,
            "NETWARDEN_ALERTS_RECENT_CAPACITY",
        );

        // Capture
        override_string(&mut self.capture.replay_path, "NETWARDEN_CAPTURE_REPLAY_PATH");
        override_bool(&mut self.capture.pace, "NETWARDEN_CAPTURE_PACE");

        // Metrics
        override_bool(&mut self.metrics.enabled, "NETWARDEN_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "NETWARDEN_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "NETWARDEN_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), NetwardenError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.flow.sweep_interval_secs == 0 {
            return Err(invalid(
                "flow.sweep_interval_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.flow.idle_timeout_secs == 0 {
            return Err(invalid(
                "flow.idle_timeout_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.flow.ingest_channel_capacity == 0 {
            return Err(invalid(
                "flow.ingest_channel_capacity",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.alerts.channel_capacity == 0 {
            return Err(invalid(
                "alerts.channel_capacity",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.alerts.recent_capacity == 0 {
            return Err(invalid(
                "alerts.recent_capacity",
                "must be greater than 0".to_owned(),
            ));
        }

        // 모델 경로가 주어지면 나머지 아티팩트도 모두 필요
        if self.classifier.is_configured() {
            let required = [
                ("classifier.scaler_path", &self.classifier.scaler_path),
                ("classifier.features_path", &self.classifier.features_path),
                ("classifier.labels_path", &self.classifier.labels_path),
            ];
            for (field, value) in required {
                if value.is_empty() {
                    return Err(invalid(
                        field,
                        "required when classifier.model_path is set".to_owned(),
                    ));
                }
            }
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "must be non-zero when metrics are enabled".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> NetwardenError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 사용 안 함)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 플로우 테이블/스윕 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// 만료 스윕 주기 (초)
    pub sweep_interval_secs: u64,
    /// 유휴 타임아웃 (초). 마지막 패킷 이후 이 시간을 초과하면 만료
    pub idle_timeout_secs: u64,
    /// 패킷 수집 채널 용량
    pub ingest_channel_capacity: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 1,
            idle_timeout_secs: 5,
            ingest_channel_capacity: 4096,
        }
    }
}

/// 휴리스틱 규칙 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// benign 판정을 DDoS로 뒤집는 forward 패킷 임계값 (초과 시 적용)
    pub fwd_packet_threshold: u64,
    /// 분류기가 없을 때도 휴리스틱을 적용할지 여부
    pub apply_without_model: bool,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            fwd_packet_threshold: DEFAULT_HEURISTIC_FWD_PACKETS,
            apply_without_model: false,
        }
    }
}

/// 분류기 아티팩트 설정
///
/// 모든 경로가 비어 있으면 분류가 비활성화됩니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// 선형 모델 JSON 경로
    pub model_path: String,
    /// 표준화 스케일러 JSON 경로
    pub scaler_path: String,
    /// 선택된 피처 이름 목록 JSON 경로
    pub features_path: String,
    /// 클래스 레이블 목록 JSON 경로
    pub labels_path: String,
}

impl ClassifierConfig {
    /// 모델 경로가 설정되어 있는지 확인합니다.
    pub fn is_configured(&self) -> bool {
        !self.model_path.is_empty()
    }
}

/// 알림 전달 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// 구독자별 알림 채널 용량
    pub channel_capacity: usize,
    /// 최근 알림 버퍼 크기
    pub recent_capacity: usize,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            recent_capacity: 50,
        }
    }
}

/// 패킷 캡처 소스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// JSON lines 재생 파일 경로 ("-"는 표준 입력)
    pub replay_path: String,
    /// 기록된 타임스탬프 간격대로 재생할지 여부
    pub pace: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            replay_path: "-".to_owned(),
            pace: false,
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 바인딩 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 엔드포인트 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}
