#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ClassifierError, ConfigError, NetwardenError, PipelineError};

// 설정
pub use config::NetwardenConfig;

// 이벤트
pub use event::{Event, EventMetadata};

// 파이프라인 trait
pub use pipeline::{BoxFuture, DynPipeline, HealthStatus, Pipeline};

// 도메인 타입
pub use types::PacketInfo;
