//! 파이프라인 trait: 모듈 생명주기 정의
//!
//! [`Pipeline`]은 장시간 실행되는 모든 모듈(플로우 엔진 등)이 구현하는
//! 생명주기 인터페이스입니다. RPITIT를 사용하므로 `dyn Pipeline`이 불가하며,
//! 동적 디스패치가 필요한 곳에서는 [`DynPipeline`]을 사용합니다.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::NetwardenError;

/// `Send` 바운드가 있는 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모듈 건강 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상 동작
    Healthy,
    /// 동작 중이지만 일부 기능 저하 (예: 분류기 미로드)
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 트래픽을 처리할 수 있는 상태인지 확인합니다 (Healthy 또는 Degraded).
    pub fn is_operational(&self) -> bool {
        !self.is_unhealthy()
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 모든 장기 실행 모듈이 구현하는 생명주기 trait
///
/// ```text
/// built → start() → running → stop() → stopped
/// ```
pub trait Pipeline: Send + Sync {
    /// 백그라운드 태스크를 스폰하고 처리를 시작합니다.
    ///
    /// 이미 실행 중이면 `PipelineError::AlreadyRunning`을 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), NetwardenError>> + Send;

    /// 백그라운드 태스크를 정지하고 완료를 기다립니다.
    ///
    /// 실행 중이 아니면 `PipelineError::NotRunning`을 반환합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), NetwardenError>> + Send;

    /// 현재 건강 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// dyn-compatible 파이프라인 trait
pub trait DynPipeline: Send + Sync {
    /// 파이프라인을 시작합니다.
    fn start(&mut self) -> BoxFuture<'_, Result<(), NetwardenError>>;

    /// 파이프라인을 정지합니다.
    fn stop(&mut self) -> BoxFuture<'_, Result<(), NetwardenError>>;

    /// 건강 상태를 확인합니다.
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

/// Pipeline을 구현한 타입은 자동으로 DynPipeline도 구현됩니다.
impl<T: Pipeline> DynPipeline for T {
    fn start(&mut self) -> BoxFuture<'_, Result<(), NetwardenError>> {
        Box::pin(Pipeline::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), NetwardenError>> {
        Box::pin(Pipeline::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Pipeline::health_check(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    struct Toggle {
        running: bool,
    }

    impl Pipeline for Toggle {
        async fn start(&mut self) -> Result<(), NetwardenError> {
            if self.running {
                return Err(PipelineError::AlreadyRunning.into());
            }
            self.running = true;
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), NetwardenError> {
            if !self.running {
                return Err(PipelineError::NotRunning.into());
            }
            self.running = false;
            Ok(())
        }

        async fn health_check(&self) -> HealthStatus {
            if self.running {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy("stopped".to_owned())
            }
        }
    }

    #[tokio::test]
    async fn dyn_pipeline_dispatches_to_pipeline() {
        let mut boxed: Box<dyn DynPipeline> = Box::new(Toggle { running: false });
        boxed.start().await.unwrap();
        assert!(boxed.health_check().await.is_healthy());
        assert!(boxed.start().await.is_err());
        boxed.stop().await.unwrap();
        assert!(!boxed.health_check().await.is_operational());
    }

    #[test]
    fn health_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(
            HealthStatus::Degraded("no model".to_owned()).to_string(),
            "degraded: no model"
        );
        assert!(HealthStatus::Degraded(String::new()).is_operational());
    }
}
