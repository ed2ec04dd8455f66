//! 파이프라인 trait: 스캐너 생명주기 정의

use std::fmt;
use std::future::Future;

use serde::Serialize;

use crate::error::ScanpostError;

/// 파이프라인 상태 점검 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum HealthStatus {
    /// 정상 동작
    Healthy,
    /// 동작 중이지만 일부 기능에 문제가 있음
    Degraded(String),
    /// 동작하지 않음
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
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

/// 시작/정지/상태 점검 생명주기를 가지는 파이프라인
///
/// `start()`는 이미 실행 중이면 아무 일도 하지 않아야 하며,
/// `stop()`은 여러 번 호출해도 안전해야 합니다.
pub trait Pipeline: Send {
    /// 파이프라인을 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), ScanpostError>> + Send;

    /// 파이프라인을 정지합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), ScanpostError>> + Send;

    /// 현재 상태를 점검합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(
            HealthStatus::Degraded("last submission failed".to_owned()).to_string(),
            "degraded: last submission failed"
        );
        assert!(!HealthStatus::Unhealthy("stopped".to_owned()).is_healthy());
    }

    #[test]
    fn health_status_serializes_reason() {
        let json = serde_json::to_value(HealthStatus::Unhealthy("stopped".to_owned())).unwrap();
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["reason"], "stopped");
    }
}
