//! 시장 데이터 타입.
//!
//! 이 모듈은 시세 관련 타입을 정의합니다:
//! - `Side` - 매매 방향
//! - `MarketSnapshot` - 특정 시점의 호가 스냅샷

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 매매 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// 매수 (롱)
    Buy,
    /// 매도 (숏)
    Sell,
}

impl Side {
    /// 반대 방향을 반환합니다.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// 특정 시점의 호가 스냅샷.
///
/// 신선도 한계를 넘긴 스냅샷은 게이트웨이에서 거부됩니다.
/// 가격을 임의로 보간하거나 연장하지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// 거래 인스트루먼트 (예: "EUR_USD")
    pub instrument: String,
    /// 매수 호가
    pub bid: Decimal,
    /// 매도 호가
    pub ask: Decimal,
    /// 호가 타임스탬프
    pub timestamp: DateTime<Utc>,
}

impl MarketSnapshot {
    /// 새 스냅샷을 생성합니다.
    pub fn new(instrument: impl Into<String>, bid: Decimal, ask: Decimal) -> Self {
        Self {
            instrument: instrument.into(),
            bid,
            ask,
            timestamp: Utc::now(),
        }
    }

    /// 지정된 타임스탬프로 스냅샷을 생성합니다.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// 중간 가격을 반환합니다.
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }

    /// 스프레드를 반환합니다.
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }

    /// 스냅샷 나이를 반환합니다.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.timestamp)
    }

    /// 신선도 한계 내의 스냅샷인지 확인합니다.
    pub fn is_fresh(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        let age = self.age(now);
        age >= chrono::Duration::zero()
            && age <= chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_snapshot_mid_and_spread() {
        let snap = MarketSnapshot::new("EUR_USD", dec!(1.1000), dec!(1.1002));

        assert_eq!(snap.mid(), dec!(1.1001));
        assert_eq!(snap.spread(), dec!(0.0002));
    }

    #[test]
    fn test_snapshot_freshness() {
        let now = Utc::now();
        let fresh = MarketSnapshot::new("EUR_USD", dec!(1.1), dec!(1.1002))
            .with_timestamp(now - chrono::Duration::seconds(100));
        let stale = MarketSnapshot::new("EUR_USD", dec!(1.1), dec!(1.1002))
            .with_timestamp(now - chrono::Duration::seconds(400));

        let threshold = Duration::from_secs(300);
        assert!(fresh.is_fresh(threshold, now));
        assert!(!stale.is_fresh(threshold, now));
    }
}
