//! 브로커 에러 타입.

use thiserror::Error;

/// 브로커 관련 에러.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// 시세가 신선도 한계를 초과함 (fail-closed)
    #[error("Stale market data for {instrument}: {age_secs}s old")]
    Stale {
        /// 대상 인스트루먼트
        instrument: String,
        /// 스냅샷 나이 (초)
        age_secs: i64,
    },

    /// 브로커 응답 불가 (이 사이클에서 해당 인스트루먼트 건너뜀)
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// 일시적 네트워크/서버 에러 (재시도 대상)
    #[error("Transient broker error: {0}")]
    Transient(String),

    /// 브로커가 주문을 거부함 (재시도 불가)
    #[error("Order rejected by broker: {0}")]
    Rejected(String),

    /// 인증/권한 에러
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 요청 한도 초과
    #[error("Rate limit exceeded")]
    RateLimited,

    /// 주문/거래를 찾을 수 없음
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),
}

/// 브로커 작업을 위한 Result 타입.
pub type BrokerResult<T> = Result<T, BrokerError>;

impl BrokerError {
    /// 백오프 후 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BrokerError::Transient(_)
                | BrokerError::Timeout(_)
                | BrokerError::RateLimited
                | BrokerError::Unavailable(_)
        )
    }

    /// 재시도하면 안 되는 터미널 거부인지 확인.
    pub fn is_rejection(&self) -> bool {
        matches!(self, BrokerError::Rejected(_) | BrokerError::Unauthorized(_))
    }

    /// 이 사이클에서 인스트루먼트를 건너뛰어야 하는 데이터 에러인지 확인.
    pub fn is_data_unusable(&self) -> bool {
        matches!(self, BrokerError::Stale { .. } | BrokerError::Unavailable(_))
    }
}

impl From<reqwest::Error> for BrokerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BrokerError::Timeout(err.to_string())
        } else if err.is_connect() {
            BrokerError::Transient(err.to_string())
        } else {
            BrokerError::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        BrokerError::ParseError(err.to_string())
    }
}
