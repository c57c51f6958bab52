//! 로그 발신자.

use async_trait::async_trait;
use tracing::info;

use crate::error::NotificationError;
use crate::events::PilotEvent;
use crate::traits::NotificationSender;

/// 이벤트를 구조화 로그로만 남기는 발신자.
///
/// 외부 채널이 비활성일 때의 기본 발신자입니다.
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    fn name(&self) -> &str {
        "log"
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn send(&self, event: &PilotEvent) -> Result<(), NotificationError> {
        info!(event = event.kind(), summary = %event.summary(), "Engine event");
        Ok(())
    }
}
