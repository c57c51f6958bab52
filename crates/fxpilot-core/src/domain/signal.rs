//! 전략의 트레이딩 신호.
//!
//! 이 모듈은 전략이 생성하는 매매 신호 관련 타입을 정의합니다:
//! - `Signal` - 제안된 거래 (인스트루먼트, 방향, 진입/손절/익절)
//! - `SignalStatus` - 신호 생명주기 상태

use crate::domain::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 신호 생명주기 상태.
///
/// `Pending → Approved|Rejected → Submitted → Filled|Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    /// 생성됨, 리스크 승인 대기
    Pending,
    /// 리스크 승인됨
    Approved,
    /// 리스크 거부됨
    Rejected,
    /// 브로커에 제출됨
    Submitted,
    /// 체결됨
    Filled,
    /// 제출 실패 (터미널)
    Failed,
}

impl std::fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SignalStatus::Pending => "PENDING",
            SignalStatus::Approved => "APPROVED",
            SignalStatus::Rejected => "REJECTED",
            SignalStatus::Submitted => "SUBMITTED",
            SignalStatus::Filled => "FILLED",
            SignalStatus::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

/// 전략이 생성한 매매 신호.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// 고유 신호 ID (주문 멱등성 토큰으로도 사용)
    pub id: Uuid,
    /// 대상 계좌 ID
    pub account_id: String,
    /// 이 신호를 생성한 전략 ID
    pub strategy_id: String,
    /// 거래 인스트루먼트
    pub instrument: String,
    /// 신호 방향
    pub side: Side,
    /// 제안 진입 가격
    pub entry_price: Decimal,
    /// 손절 가격
    pub stop_loss: Decimal,
    /// 익절 가격
    pub take_profit: Decimal,
    /// 이 거래가 소비하는 리스크 (계좌 대비 %)
    pub risk_pct: Decimal,
    /// 신호 신뢰도 (0.0 ~ 1.0)
    pub confidence: f64,
    /// 생명주기 상태
    pub status: SignalStatus,
    /// 신호 생성 타임스탬프
    pub generated_at: DateTime<Utc>,
}

impl Signal {
    /// 새 신호를 생성합니다.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account_id: impl Into<String>,
        strategy_id: impl Into<String>,
        instrument: impl Into<String>,
        side: Side,
        entry_price: Decimal,
        stop_loss: Decimal,
        take_profit: Decimal,
        risk_pct: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: account_id.into(),
            strategy_id: strategy_id.into(),
            instrument: instrument.into(),
            side,
            entry_price,
            stop_loss,
            take_profit,
            risk_pct,
            confidence: 1.0,
            status: SignalStatus::Pending,
            generated_at: Utc::now(),
        }
    }

    /// 신뢰도를 설정합니다.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// 상태를 전이합니다.
    pub fn transition(&mut self, status: SignalStatus) {
        self.status = status;
    }

    /// 손절까지의 가격 거리를 반환합니다.
    pub fn stop_distance(&self) -> Decimal {
        match self.side {
            Side::Buy => self.entry_price - self.stop_loss,
            Side::Sell => self.stop_loss - self.entry_price,
        }
    }

    /// 손절/익절이 방향과 정합한지 확인합니다.
    pub fn is_coherent(&self) -> bool {
        match self.side {
            Side::Buy => self.stop_loss < self.entry_price && self.take_profit > self.entry_price,
            Side::Sell => self.stop_loss > self.entry_price && self.take_profit < self.entry_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signal_confidence_clamping() {
        let signal = Signal::new(
            "a1",
            "spread_guard",
            "EUR_USD",
            Side::Buy,
            dec!(1.1000),
            dec!(1.0950),
            dec!(1.1100),
            dec!(1),
        )
        .with_confidence(1.7);

        assert_eq!(signal.confidence, 1.0);
        assert_eq!(signal.status, SignalStatus::Pending);
    }

    #[test]
    fn test_signal_coherence() {
        let long = Signal::new(
            "a1",
            "s",
            "EUR_USD",
            Side::Buy,
            dec!(1.10),
            dec!(1.09),
            dec!(1.12),
            dec!(1),
        );
        assert!(long.is_coherent());
        assert_eq!(long.stop_distance(), dec!(0.01));

        let bad_short = Signal::new(
            "a1",
            "s",
            "EUR_USD",
            Side::Sell,
            dec!(1.10),
            dec!(1.09),
            dec!(1.12),
            dec!(1),
        );
        assert!(!bad_short.is_coherent());
    }
}
