//! 플로우 엔진 에러 타입
//!
//! [`FlowEngineError`]는 플로우 엔진 내부에서 발생하는 에러를 표현합니다.
//! `From<FlowEngineError> for NetwardenError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.
//!
//! # 에러 분류
//! - 치명적: [`FlowEngineError::TablePoisoned`]: 플로우 테이블 일관성이 깨짐
//! - 플로우 단위: [`FlowEngineError::Classification`]: 해당 플로우만 알림 없이 제거
//! - 설정/채널: 시작 시점 또는 종료 시점에만 발생

use netwarden_core::error::{ClassifierError, ConfigError, NetwardenError, PipelineError};

/// 분류 실패 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifyStage {
    /// 피처 선택
    Select,
    /// 스케일링
    Scale,
    /// 예측
    Predict,
    /// 레이블 디코딩
    Decode,
}

impl ClassifyStage {
    /// 메트릭 레이블 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Scale => "scale",
            Self::Predict => "predict",
            Self::Decode => "decode",
        }
    }
}

impl std::fmt::Display for ClassifyStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 플로우 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum FlowEngineError {
    /// 플로우 테이블 락이 오염됨 (다른 스레드가 락을 쥔 채 패닉)
    #[error("flow table lock poisoned")]
    TablePoisoned,

    /// 플로우 단위 분류 실패
    #[error("classification failed at {stage}: {source}")]
    Classification {
        /// 실패 단계
        stage: ClassifyStage,
        /// 원인
        #[source]
        source: ClassifierError,
    },

    /// 분류기 아티팩트 에러
    #[error("classifier artifact error: {0}")]
    Artifact(#[from] ClassifierError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),
}

impl FlowEngineError {
    /// 엔진 전체를 중단해야 하는 에러인지 확인합니다.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TablePoisoned)
    }
}

impl From<FlowEngineError> for NetwardenError {
    fn from(err: FlowEngineError) -> Self {
        match err {
            FlowEngineError::Classification { source, .. } | FlowEngineError::Artifact(source) => {
                NetwardenError::Classifier(source)
            }
            FlowEngineError::Config { field, reason } => {
                NetwardenError::Config(ConfigError::InvalidValue { field, reason })
            }
            FlowEngineError::Channel(msg) => NetwardenError::Pipeline(PipelineError::ChannelSend(msg)),
            FlowEngineError::TablePoisoned => NetwardenError::Pipeline(PipelineError::InitFailed(
                "flow table lock poisoned".to_owned(),
            )),
        }
    }
}
