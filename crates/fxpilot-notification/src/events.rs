//! 엔진 이벤트 정의.

use chrono::{DateTime, Utc};
use fxpilot_core::{ProtectionStage, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 엔진이 발행하는 알림 이벤트.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PilotEvent {
    /// 엔진 기동
    EngineStarted {
        account_count: usize,
        started_at: DateTime<Utc>,
    },
    /// 엔진 종료
    EngineStopped { stopped_at: DateTime<Utc> },
    /// 전략이 신호를 생성함
    SignalGenerated {
        account_id: String,
        strategy_id: String,
        signal_id: Uuid,
        instrument: String,
        side: Side,
        entry_price: Decimal,
    },
    /// 리스크 게이트가 신호를 거부함
    SignalRejected {
        account_id: String,
        signal_id: Uuid,
        instrument: String,
        reason_code: String,
        reason: String,
    },
    /// 주문 체결
    OrderFilled {
        account_id: String,
        position_id: Uuid,
        instrument: String,
        side: Side,
        fill_price: Decimal,
        size: Decimal,
    },
    /// 브로커가 주문을 거부했거나 제출이 최종 실패함
    OrderRejected {
        account_id: String,
        signal_id: Uuid,
        instrument: String,
        reason: String,
    },
    /// 포지션 보호 단계가 적용됨
    ProtectionTriggered {
        account_id: String,
        position_id: Uuid,
        instrument: String,
        stage: ProtectionStage,
        detail: String,
    },
    /// 포지션 전량 청산
    PositionClosed {
        account_id: String,
        position_id: Uuid,
        instrument: String,
        close_price: Decimal,
        closed_size: Decimal,
        reason: String,
    },
    /// 평가 사이클 누락 (평가 타임아웃)
    CycleMissed { account_id: String, reason: String },
}

impl PilotEvent {
    /// 발신자용 한 줄 요약.
    pub fn summary(&self) -> String {
        match self {
            PilotEvent::EngineStarted { account_count, .. } => {
                format!("Engine started ({} accounts)", account_count)
            }
            PilotEvent::EngineStopped { .. } => "Engine stopped".to_string(),
            PilotEvent::SignalGenerated {
                account_id,
                instrument,
                side,
                entry_price,
                ..
            } => format!(
                "[{}] signal {} {} @ {}",
                account_id, side, instrument, entry_price
            ),
            PilotEvent::SignalRejected {
                account_id,
                instrument,
                reason_code,
                ..
            } => format!("[{}] signal rejected {} ({})", account_id, instrument, reason_code),
            PilotEvent::OrderFilled {
                account_id,
                instrument,
                side,
                fill_price,
                size,
                ..
            } => format!(
                "[{}] filled {} {} x{} @ {}",
                account_id, side, instrument, size, fill_price
            ),
            PilotEvent::OrderRejected {
                account_id,
                instrument,
                reason,
                ..
            } => format!("[{}] order rejected {} ({})", account_id, instrument, reason),
            PilotEvent::ProtectionTriggered {
                account_id,
                instrument,
                stage,
                detail,
                ..
            } => format!("[{}] protection {} {} ({})", account_id, stage, instrument, detail),
            PilotEvent::PositionClosed {
                account_id,
                instrument,
                close_price,
                reason,
                ..
            } => format!(
                "[{}] closed {} @ {} ({})",
                account_id, instrument, close_price, reason
            ),
            PilotEvent::CycleMissed { account_id, reason } => {
                format!("[{}] cycle missed ({})", account_id, reason)
            }
        }
    }

    /// 이벤트 종류 이름 (로그 필드용).
    pub fn kind(&self) -> &'static str {
        match self {
            PilotEvent::EngineStarted { .. } => "engine_started",
            PilotEvent::EngineStopped { .. } => "engine_stopped",
            PilotEvent::SignalGenerated { .. } => "signal_generated",
            PilotEvent::SignalRejected { .. } => "signal_rejected",
            PilotEvent::OrderFilled { .. } => "order_filled",
            PilotEvent::OrderRejected { .. } => "order_rejected",
            PilotEvent::ProtectionTriggered { .. } => "protection_triggered",
            PilotEvent::PositionClosed { .. } => "position_closed",
            PilotEvent::CycleMissed { .. } => "cycle_missed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = PilotEvent::CycleMissed {
            account_id: "a1".to_string(),
            reason: "timeout".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "cycle_missed");
        assert_eq!(json["account_id"], "a1");
    }

    #[test]
    fn test_summary_contains_key_fields() {
        let event = PilotEvent::OrderFilled {
            account_id: "a1".to_string(),
            position_id: Uuid::new_v4(),
            instrument: "EUR_USD".to_string(),
            side: Side::Buy,
            fill_price: dec!(1.1002),
            size: dec!(10000),
        };

        let summary = event.summary();
        assert!(summary.contains("EUR_USD"));
        assert!(summary.contains("1.1002"));
    }
}
