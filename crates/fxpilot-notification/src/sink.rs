//! 이벤트 싱크.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::events::PilotEvent;
use crate::traits::NotificationSender;

/// 비블로킹 이벤트 발행 핸들.
///
/// 내부는 유한 mpsc 채널이며, 채널이 가득 차면 이벤트를 버리고
/// 경고만 남깁니다. 코어 경로는 알림 전달을 절대 기다리지 않습니다.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<PilotEvent>,
}

impl EventSink {
    /// 싱크와 백그라운드 전달 태스크를 생성합니다.
    pub fn spawn(
        senders: Vec<Arc<dyn NotificationSender>>,
        buffer_size: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<PilotEvent>(buffer_size.max(1));

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                for sender in &senders {
                    if !sender.is_enabled() {
                        continue;
                    }
                    if let Err(e) = sender.send(&event).await {
                        warn!(
                            sender = sender.name(),
                            event = event.kind(),
                            error = %e,
                            "Notification delivery failed"
                        );
                    }
                }
            }
            debug!("Event sink channel closed, forwarding task exiting");
        });

        (Self { tx }, handle)
    }

    /// 발신자 없이 이벤트를 소비만 하는 싱크를 생성합니다 (테스트/드라이런용).
    pub fn disabled() -> (Self, JoinHandle<()>) {
        Self::spawn(Vec::new(), 16)
    }

    /// 이벤트를 발행합니다. 블록하지 않으며 실패해도 에러를 내지 않습니다.
    pub fn publish(&self, event: PilotEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(event = event.kind(), "Event channel full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                warn!(event = event.kind(), "Event channel closed, dropping event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotificationError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSender {
        sent: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationSender for CountingSender {
        fn name(&self) -> &str {
            "counting"
        }

        fn is_enabled(&self) -> bool {
            true
        }

        async fn send(&self, _event: &PilotEvent) -> Result<(), NotificationError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(NotificationError::Send("scripted failure".to_string()));
            }
            Ok(())
        }
    }

    fn event() -> PilotEvent {
        PilotEvent::CycleMissed {
            account_id: "a1".to_string(),
            reason: "timeout".to_string(),
        }
    }

    #[tokio::test]
    async fn test_events_are_forwarded_to_senders() {
        let sent = Arc::new(AtomicUsize::new(0));
        let sender = Arc::new(CountingSender {
            sent: sent.clone(),
            fail: false,
        });
        let (sink, handle) = EventSink::spawn(vec![sender], 16);

        sink.publish(event());
        sink.publish(event());
        drop(sink);
        handle.await.unwrap();

        assert_eq!(sent.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sender_failure_does_not_stop_forwarding() {
        let sent = Arc::new(AtomicUsize::new(0));
        let sender = Arc::new(CountingSender {
            sent: sent.clone(),
            fail: true,
        });
        let (sink, handle) = EventSink::spawn(vec![sender], 16);

        sink.publish(event());
        sink.publish(event());
        drop(sink);
        handle.await.unwrap();

        // 실패해도 다음 이벤트는 계속 전달됨
        assert_eq!(sent.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_publish_never_blocks_when_full() {
        let (tx, _rx) = mpsc::channel(1);
        let sink = EventSink { tx };

        // 수신자가 없어 채널이 가득 차지만 publish는 즉시 반환
        sink.publish(event());
        sink.publish(event());
        sink.publish(event());
    }
}
