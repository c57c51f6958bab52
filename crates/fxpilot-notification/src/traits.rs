//! 알림 발신자 trait.

use async_trait::async_trait;

use crate::error::NotificationError;
use crate::events::PilotEvent;

/// 알림 발신 채널 인터페이스.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// 발신자 이름.
    fn name(&self) -> &str;

    /// 활성화 여부. 비활성 발신자는 건너뜁니다.
    fn is_enabled(&self) -> bool;

    /// 이벤트를 발신합니다.
    async fn send(&self, event: &PilotEvent) -> Result<(), NotificationError>;
}
