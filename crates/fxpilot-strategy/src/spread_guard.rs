//! 스프레드 가드 모멘텀 전략.
//!
//! 단순한 샘플 전략입니다:
//! - 스프레드가 한계를 넘는 인스트루먼트는 건너뜀 (체결 비용 가드)
//! - 직전 사이클 대비 중간가 변동이 문턱을 넘으면 그 방향으로 진입
//! - 이미 포지션이 있는 인스트루먼트는 평가하지 않음

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use fxpilot_core::{
    AccountConfig, MarketSnapshot, PilotResult, Position, Side, Signal,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::traits::Strategy;

/// 스프레드 가드 전략 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadGuardConfig {
    /// 허용 최대 스프레드 (중간가 대비 %)
    pub max_spread_pct: Decimal,
    /// 진입 문턱이 되는 중간가 변동률 (%)
    pub min_move_pct: Decimal,
    /// 진입가 대비 손절 거리 (%)
    pub stop_pct: Decimal,
    /// 진입가 대비 익절 거리 (%)
    pub take_profit_pct: Decimal,
    /// 신호가 소비하는 리스크 (%)
    pub risk_pct: Decimal,
}

impl Default for SpreadGuardConfig {
    fn default() -> Self {
        Self {
            max_spread_pct: dec!(0.05),
            min_move_pct: dec!(0.01),
            stop_pct: dec!(0.5),
            take_profit_pct: dec!(1.0),
            risk_pct: dec!(1),
        }
    }
}

/// 스프레드 가드 전략.
pub struct SpreadGuardStrategy {
    config: SpreadGuardConfig,
    /// 인스트루먼트별 직전 중간가 (전략 내부 메모리)
    last_mid: Mutex<HashMap<String, Decimal>>,
}

impl Default for SpreadGuardStrategy {
    fn default() -> Self {
        Self::new(SpreadGuardConfig::default())
    }
}

impl SpreadGuardStrategy {
    /// 설정으로 전략을 생성합니다.
    pub fn new(config: SpreadGuardConfig) -> Self {
        Self {
            config,
            last_mid: Mutex::new(HashMap::new()),
        }
    }

    /// 직전 중간가를 갱신하고 이전 값을 반환합니다.
    fn swap_last_mid(&self, instrument: &str, mid: Decimal) -> Option<Decimal> {
        let mut map = self.last_mid.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(instrument.to_string(), mid)
    }

    fn build_signal(
        &self,
        account: &AccountConfig,
        snap: &MarketSnapshot,
        side: Side,
        confidence: f64,
    ) -> Signal {
        let entry = match side {
            Side::Buy => snap.ask,
            Side::Sell => snap.bid,
        };
        let stop_offset = entry * self.config.stop_pct / Decimal::from(100);
        let tp_offset = entry * self.config.take_profit_pct / Decimal::from(100);
        let (stop_loss, take_profit) = match side {
            Side::Buy => (entry - stop_offset, entry + tp_offset),
            Side::Sell => (entry + stop_offset, entry - tp_offset),
        };
        let risk_pct = self.config.risk_pct.min(account.risk.max_risk_per_trade);

        Signal::new(
            account.id.clone(),
            self.id(),
            snap.instrument.clone(),
            side,
            entry,
            stop_loss,
            take_profit,
            risk_pct,
        )
        .with_confidence(confidence)
    }
}

#[async_trait]
impl Strategy for SpreadGuardStrategy {
    fn id(&self) -> &str {
        "spread_guard"
    }

    fn name(&self) -> &str {
        "Spread-guarded momentum"
    }

    async fn evaluate(
        &self,
        account: &AccountConfig,
        snapshots: &[MarketSnapshot],
        open_positions: &[Position],
    ) -> PilotResult<Option<Signal>> {
        for snap in snapshots {
            // 이미 포지션이 있는 인스트루먼트는 건너뜀
            if open_positions.iter().any(|p| p.instrument == snap.instrument) {
                continue;
            }

            let mid = snap.mid();
            if mid.is_zero() {
                continue;
            }

            let spread_pct = snap.spread() / mid * Decimal::from(100);
            if spread_pct > self.config.max_spread_pct {
                debug!(
                    instrument = %snap.instrument,
                    spread_pct = %spread_pct,
                    "Spread too wide, skipping instrument"
                );
                self.swap_last_mid(&snap.instrument, mid);
                continue;
            }

            let Some(prev_mid) = self.swap_last_mid(&snap.instrument, mid) else {
                // 첫 관측은 기준점만 기록
                continue;
            };

            let move_pct = (mid - prev_mid) / prev_mid * Decimal::from(100);
            let side = if move_pct >= self.config.min_move_pct {
                Side::Buy
            } else if move_pct <= -self.config.min_move_pct {
                Side::Sell
            } else {
                continue;
            };

            let strength = (move_pct.abs() / self.config.min_move_pct)
                .to_f64()
                .unwrap_or(1.0)
                .clamp(0.1, 1.0);
            let signal = self.build_signal(account, snap, side, strength);

            debug!(
                account_id = %account.id,
                instrument = %snap.instrument,
                side = %side,
                move_pct = %move_pct,
                "Momentum entry signal"
            );
            return Ok(Some(signal));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxpilot_core::RiskSettings;
    use uuid::Uuid;

    fn account() -> AccountConfig {
        AccountConfig {
            id: "a1".to_string(),
            strategy_id: "spread_guard".to_string(),
            instruments: vec!["EUR_USD".to_string()],
            risk: RiskSettings::default(),
            active: true,
        }
    }

    #[tokio::test]
    async fn test_wide_spread_is_skipped() {
        let strategy = SpreadGuardStrategy::default();
        // 스프레드 약 0.9% >> 한계 0.05%
        let snapshots = vec![MarketSnapshot::new("EUR_USD", dec!(1.1000), dec!(1.1100))];

        let first = strategy.evaluate(&account(), &snapshots, &[]).await.unwrap();
        let second = strategy.evaluate(&account(), &snapshots, &[]).await.unwrap();

        assert!(first.is_none());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_upward_move_emits_coherent_buy() {
        let strategy = SpreadGuardStrategy::default();
        let account = account();

        // 기준점 기록
        let warmup = vec![MarketSnapshot::new("EUR_USD", dec!(1.1000), dec!(1.1002))];
        assert!(strategy.evaluate(&account, &warmup, &[]).await.unwrap().is_none());

        // 중간가 +0.18% 상승
        let moved = vec![MarketSnapshot::new("EUR_USD", dec!(1.1020), dec!(1.1022))];
        let signal = strategy
            .evaluate(&account, &moved, &[])
            .await
            .unwrap()
            .expect("buy signal");

        assert_eq!(signal.side, Side::Buy);
        assert_eq!(signal.instrument, "EUR_USD");
        assert!(signal.is_coherent());
        assert_eq!(signal.risk_pct, dec!(1));
    }

    #[tokio::test]
    async fn test_open_position_blocks_new_entry() {
        let strategy = SpreadGuardStrategy::default();
        let account = account();

        let warmup = vec![MarketSnapshot::new("EUR_USD", dec!(1.1000), dec!(1.1002))];
        strategy.evaluate(&account, &warmup, &[]).await.unwrap();

        let open = Position::new(
            "a1",
            "EUR_USD",
            Side::Buy,
            dec!(1.1000),
            dec!(1.0950),
            dec!(1.1200),
            dec!(10000),
            dec!(1),
            Uuid::new_v4(),
            "t-1",
        );
        let moved = vec![MarketSnapshot::new("EUR_USD", dec!(1.1020), dec!(1.1022))];
        let signal = strategy.evaluate(&account, &moved, &[open]).await.unwrap();

        assert!(signal.is_none());
    }
}
