//! 포지션 및 보호 단계.
//!
//! 이 모듈은 오픈 포지션 관련 타입을 정의합니다:
//! - `ProtectionStage` - 포지션 보호 상태 머신의 단계
//! - `Position` - 개별 포지션 엔티티
//!
//! 포지션은 체결 이후 보호 루프가 소유하며, 포지션별 락 아래에서만
//! 변경됩니다. 보호 단계는 전진만 하고 되돌아가지 않습니다.

use crate::domain::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 포지션 보호 상태 머신의 단계.
///
/// `None → Breakeven → Partial1 → Partial2 → Trailing → Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionStage {
    /// 보호 미적용
    None,
    /// 손절이 진입가 부근으로 이동됨
    Breakeven,
    /// 1차 부분청산 완료
    Partial1,
    /// 2차 부분청산 완료
    Partial2,
    /// 트레일링 스톱 모드
    Trailing,
    /// 전량 청산됨 (터미널)
    Closed,
}

impl ProtectionStage {
    /// 이 단계에서 `next`로의 전이가 전진인지 확인합니다.
    pub fn can_advance_to(&self, next: ProtectionStage) -> bool {
        next > *self
    }
}

impl std::fmt::Display for ProtectionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProtectionStage::None => "NONE",
            ProtectionStage::Breakeven => "BREAKEVEN",
            ProtectionStage::Partial1 => "PARTIAL1",
            ProtectionStage::Partial2 => "PARTIAL2",
            ProtectionStage::Trailing => "TRAILING",
            ProtectionStage::Closed => "CLOSED",
        };
        write!(f, "{}", s)
    }
}

/// 오픈 포지션.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// 내부 포지션 ID
    pub id: Uuid,
    /// 소유 계좌 ID
    pub account_id: String,
    /// 거래 인스트루먼트
    pub instrument: String,
    /// 포지션 방향
    pub side: Side,
    /// 진입 가격
    pub entry_price: Decimal,
    /// 현재 손절 가격
    pub current_stop_loss: Decimal,
    /// 익절 가격
    pub take_profit: Decimal,
    /// 현재 보유 수량
    pub size: Decimal,
    /// 진입 시 리스크 예약분 (%)
    pub risk_pct: Decimal,
    /// 포지션을 연 신호 ID
    pub signal_id: Uuid,
    /// 브로커 측 거래 ID (청산/스톱 수정에 사용)
    pub broker_trade_id: String,
    /// 보호 단계
    pub protection_stage: ProtectionStage,
    /// 오픈 타임스탬프
    pub opened_at: DateTime<Utc>,
    /// 마지막 업데이트 타임스탬프
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// 새 포지션을 생성합니다.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account_id: impl Into<String>,
        instrument: impl Into<String>,
        side: Side,
        entry_price: Decimal,
        stop_loss: Decimal,
        take_profit: Decimal,
        size: Decimal,
        risk_pct: Decimal,
        signal_id: Uuid,
        broker_trade_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id: account_id.into(),
            instrument: instrument.into(),
            side,
            entry_price,
            current_stop_loss: stop_loss,
            take_profit,
            size,
            risk_pct,
            signal_id,
            broker_trade_id: broker_trade_id.into(),
            protection_stage: ProtectionStage::None,
            opened_at: now,
            updated_at: now,
        }
    }

    /// 현재가 기준 유리한 가격 변동을 반환합니다 (양수 = 이익 방향).
    pub fn favorable_move(&self, current_price: Decimal) -> Decimal {
        match self.side {
            Side::Buy => current_price - self.entry_price,
            Side::Sell => self.entry_price - current_price,
        }
    }

    /// 현재가 기준 유리한 변동률(%)을 반환합니다.
    pub fn favorable_move_pct(&self, current_price: Decimal) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        self.favorable_move(current_price) / self.entry_price * Decimal::from(100)
    }

    /// 미실현 손익을 반환합니다.
    pub fn unrealized_pnl(&self, current_price: Decimal) -> Decimal {
        self.favorable_move(current_price) * self.size
    }

    /// 손절 가격에 도달했는지 확인합니다.
    pub fn stop_hit(&self, current_price: Decimal) -> bool {
        match self.side {
            Side::Buy => current_price <= self.current_stop_loss,
            Side::Sell => current_price >= self.current_stop_loss,
        }
    }

    /// 익절 가격에 도달했는지 확인합니다.
    pub fn take_profit_hit(&self, current_price: Decimal) -> bool {
        match self.side {
            Side::Buy => current_price >= self.take_profit,
            Side::Sell => current_price <= self.take_profit,
        }
    }

    /// 최대 보유 시간이 경과했는지 확인합니다.
    pub fn held_longer_than(&self, max_hold: chrono::Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.opened_at) >= max_hold
    }

    /// 제안된 손절가가 현재보다 유리한 방향인지 확인합니다.
    ///
    /// 트레일링 스톱은 유리한 방향으로만 래칫되며 절대 느슨해지지 않습니다.
    pub fn tightens_stop(&self, proposed_stop: Decimal) -> bool {
        match self.side {
            Side::Buy => proposed_stop > self.current_stop_loss,
            Side::Sell => proposed_stop < self.current_stop_loss,
        }
    }

    /// 포지션이 종료되었는지 확인합니다.
    pub fn is_closed(&self) -> bool {
        self.protection_stage == ProtectionStage::Closed || self.size.is_zero()
    }
}
