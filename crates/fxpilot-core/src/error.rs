//! 자동매매 엔진의 에러 타입.
//!
//! 이 모듈은 엔진 전반에서 사용되는 공통 에러 타입을 정의합니다.
//! 크레이트별 세부 에러(브로커, 리스크, 실행 등)는 각 크레이트에서
//! 정의하고 필요 시 이 타입으로 변환합니다.

use thiserror::Error;

/// 핵심 엔진 에러.
#[derive(Debug, Error)]
pub enum PilotError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 브로커 연동 에러
    #[error("브로커 에러: {0}")]
    Broker(String),

    /// 시세 데이터 에러
    #[error("시세 데이터 에러: {0}")]
    MarketData(String),

    /// 전략 에러
    #[error("전략 에러: {0}")]
    Strategy(String),

    /// 리스크 관리 에러
    #[error("리스크 에러: {0}")]
    Risk(String),

    /// 주문 실행 에러
    #[error("주문 에러: {0}")]
    Execution(String),

    /// 포지션 에러
    #[error("포지션 에러: {0}")]
    Position(String),

    /// 네트워크 에러
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 평가 사이클 타임아웃
    #[error("사이클 타임아웃: {0}")]
    CycleTimeout(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 엔진 작업을 위한 Result 타입.
pub type PilotResult<T> = Result<T, PilotError>;

impl PilotError {
    /// 재시도 가능한 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PilotError::Network(_) | PilotError::CycleTimeout(_))
    }

    /// 치명적인 에러인지 확인합니다.
    pub fn is_critical(&self) -> bool {
        matches!(self, PilotError::Config(_) | PilotError::Internal(_))
    }
}

impl From<serde_json::Error> for PilotError {
    fn from(err: serde_json::Error) -> Self {
        PilotError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let network_err = PilotError::Network("timeout".to_string());
        assert!(network_err.is_retryable());

        let config_err = PilotError::Config("missing key".to_string());
        assert!(!config_err.is_retryable());
    }

    #[test]
    fn test_error_critical() {
        let config_err = PilotError::Config("missing key".to_string());
        assert!(config_err.is_critical());

        let exec_err = PilotError::Execution("invalid quantity".to_string());
        assert!(!exec_err.is_critical());
    }
}
