#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`demux`]: 패킷 → (플로우 키, 방향) 판정
//! - [`table`]: 단일 뮤텍스 기반 플로우 테이블
//! - [`flow`]: 5-tuple 키와 플로우 누적 상태
//! - [`features`]: 78개 CICIDS2017 피처 추출
//! - [`classifier`]: 분류기 trait, 판정, 휴리스틱 재분류
//! - [`artifact`]: JSON 분류기 아티팩트 로더
//! - [`sweeper`]: 유휴 플로우 만료 스윕
//! - [`emitter`]: 구독자별 bounded 채널 알림 팬아웃
//! - [`engine`]: FlowEngine, Pipeline trait 구현
//! - [`decode`]: Ethernet/IP 프레임 디코딩 (etherparse)
//! - [`stats`]: 트래픽 카운터와 pps
//!
//! # 아키텍처
//!
//! ```text
//! packets -> Demultiplexer -> FlowTable ==(timer)==> ExpirySweeper
//!                                                     |
//!                          extract -> FlowClassifier -> AlertEmitter -> subscribers
//! ```

pub mod artifact;
pub mod classifier;
pub mod config;
pub mod decode;
pub mod demux;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod event;
pub mod features;
pub mod flow;
pub mod stats;
pub mod sweeper;
pub mod table;

// --- 주요 타입 re-export ---

// 엔진
pub use engine::{FlowEngine, FlowEngineBuilder};

// 설정
pub use config::{FlowEngineConfig, HeuristicRule};

// 에러
pub use error::{ClassifyStage, FlowEngineError};

// 플로우
pub use flow::{Direction, Flow, FlowKey};
pub use table::{FlowTable, Observation};

// 피처
pub use features::{FEATURE_COUNT, FEATURE_NAMES, Feature, FeatureVector, extract};

// 분류
pub use artifact::{LabelClasses, LinearModel, StandardScaler, load_artifact};
pub use classifier::{
    Classification, ClassifierArtifact, FeatureScaler, FlowClassifier, FlowModel, LabelDecoder,
    Verdict,
};

// 스윕 / 알림
pub use emitter::AlertEmitter;
pub use event::{AlertEvent, FlowAlert};
pub use sweeper::{ExpirySweeper, SweepReport};

// 통계
pub use stats::{TrafficCounters, TrafficSnapshot};
