//! 에러 타입: 도메인별 에러 정의

/// Netwarden 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum NetwardenError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 분류기 에러
    #[error("classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 채널 수신 실패
    #[error("channel receive failed: {0}")]
    ChannelRecv(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline is not running")]
    NotRunning,
}

/// 분류기 에러
///
/// 플로우 단위로 발생하며 스윕 전체를 중단시키지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// 분류기가 요구하는 피처 이름이 스키마에 없음
    #[error("feature '{0}' is not part of the flow feature schema")]
    MissingFeature(String),

    /// 입력 차원 불일치
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// 디코딩할 수 없는 클래스 인덱스
    #[error("unknown class index {index} (known classes: {known})")]
    UnknownClass { index: usize, known: usize },

    /// 예측 실패 (비유한 값 등)
    #[error("prediction failed: {0}")]
    Prediction(String),

    /// 아티팩트 로드/검증 실패
    #[error("invalid artifact '{path}': {reason}")]
    Artifact { path: String, reason: String },
}
