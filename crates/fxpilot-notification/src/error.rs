//! 알림 에러 타입.

use thiserror::Error;

/// 알림 발신 에러.
///
/// 발신 실패는 로그로만 남기며 코어 경로로 전파되지 않습니다.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// 발신자가 비활성화됨
    #[error("sender disabled")]
    Disabled,

    /// 전송 실패
    #[error("send failed: {0}")]
    Send(String),

    /// 메시지 직렬화 실패
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        NotificationError::Send(err.to_string())
    }
}
