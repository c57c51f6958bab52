//! 알림 이벤트 및 발행.
//!
//! 엔진의 모든 주요 이벤트는 `EventSink`를 통해 발행됩니다.
//! 발행은 fire-and-forget이며, 채널이 가득 차거나 발신자가 실패해도
//! 코어 경로는 절대 블록되거나 실패하지 않습니다.

pub mod error;
pub mod events;
pub mod log_sender;
pub mod sink;
pub mod telegram;
pub mod traits;

pub use error::NotificationError;
pub use events::PilotEvent;
pub use log_sender::LogSender;
pub use sink::EventSink;
pub use telegram::TelegramSender;
pub use traits::NotificationSender;
