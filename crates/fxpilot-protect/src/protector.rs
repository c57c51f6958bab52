//! 포지션 보호 루프.
//!
//! 주기마다 모든 오픈 포지션을 점검합니다. 포지션별 락을 점검과
//! 브로커 주문 전체에 걸쳐 유지하므로 같은 포지션에 대한 동작이
//! 겹치지 않습니다. 단계 전이는 브로커 확인 후에만 기록되며,
//! 브로커 호출이 실패하면 마지막 확인된 단계에 머물렀다가 다음
//! 주기에 재시도합니다.
//!
//! 점검 순서:
//! 1. 청산 조건 (손절/익절 도달, 최대 보유 시간 경과)
//! 2. 대규모 수익 오버라이드 (단계와 무관)
//! 3. 단계 전진 (브레이크이븐 → 부분청산 → 트레일링)

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fxpilot_broker::{Broker, MarketDataGateway};
use fxpilot_core::{Position, ProtectionConfig, ProtectionStage, Side};
use fxpilot_notification::{EventSink, PilotEvent};
use fxpilot_risk::RiskGate;
use rust_decimal::Decimal;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::book::PositionBook;

/// 포지션 보호기.
pub struct PositionProtector {
    book: Arc<PositionBook>,
    broker: Arc<dyn Broker>,
    gateway: Arc<MarketDataGateway>,
    risk: Arc<RiskGate>,
    sink: EventSink,
    config: ProtectionConfig,
}

impl PositionProtector {
    /// 새 보호기를 생성합니다.
    pub fn new(
        book: Arc<PositionBook>,
        broker: Arc<dyn Broker>,
        gateway: Arc<MarketDataGateway>,
        risk: Arc<RiskGate>,
        sink: EventSink,
        config: ProtectionConfig,
    ) -> Self {
        Self {
            book,
            broker,
            gateway,
            risk,
            sink,
            config,
        }
    }

    /// 취소될 때까지 보호 루프를 실행합니다.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.cycle_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_secs = self.config.cycle_interval_secs,
            "Position protector started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Position protector stopping");
                    break;
                }
                _ = interval.tick() => {
                    self.cycle().await;
                }
            }
        }
    }

    /// 모든 오픈 포지션을 한 번 점검합니다.
    pub async fn cycle(&self) {
        let now = Utc::now();

        for id in self.book.ids().await {
            let Some(handle) = self.book.get(id).await else {
                continue;
            };

            // 점검과 주문 전체에 걸쳐 포지션 락 유지
            let mut position = handle.lock().await;
            if position.is_closed() {
                self.book.remove(id).await;
                continue;
            }

            let snap = match self.gateway.snapshot(&position.instrument).await {
                Ok(snap) => snap,
                Err(e) => {
                    debug!(
                        position_id = %position.id,
                        instrument = %position.instrument,
                        error = %e,
                        "No usable quote, skipping position this cycle"
                    );
                    continue;
                }
            };

            // 청산 방향의 가격: 롱은 매도(bid), 숏은 매수(ask)
            let exit_price = match position.side {
                Side::Buy => snap.bid,
                Side::Sell => snap.ask,
            };

            self.apply(&mut position, exit_price, now).await;
        }
    }

    async fn apply(&self, position: &mut Position, price: Decimal, now: DateTime<Utc>) {
        // 1. 청산 조건
        let close_reason = if position.stop_hit(price) {
            Some("stop_loss")
        } else if position.take_profit_hit(price) {
            Some("take_profit")
        } else if position.held_longer_than(self.config.max_hold(), now) {
            Some("max_hold")
        } else {
            None
        };
        if let Some(reason) = close_reason {
            self.close_all(position, reason).await;
            return;
        }

        // 2. 대규모 수익 오버라이드: 단계와 무관하게 즉시 부분청산
        if position.unrealized_pnl(price) >= self.config.large_gain_threshold {
            self.apply_large_gain(position, now).await;
            return;
        }

        // 3. 단계 전진 (주기당 한 단계)
        let move_pct = position.favorable_move_pct(price);
        match position.protection_stage {
            ProtectionStage::None if move_pct >= self.config.breakeven_trigger_pct => {
                self.apply_breakeven(position, now).await;
            }
            ProtectionStage::Breakeven if move_pct >= self.config.partial1_trigger_pct => {
                self.apply_partial(
                    position,
                    self.config.partial1_close_fraction,
                    ProtectionStage::Partial1,
                    now,
                )
                .await;
            }
            ProtectionStage::Partial1 if move_pct >= self.config.partial2_trigger_pct => {
                self.apply_partial(
                    position,
                    self.config.partial2_close_fraction,
                    ProtectionStage::Partial2,
                    now,
                )
                .await;
            }
            ProtectionStage::Partial2 if move_pct >= self.config.trailing_trigger_pct => {
                self.apply_trail(position, price, ProtectionStage::Trailing, now).await;
            }
            ProtectionStage::Trailing => {
                self.apply_trail(position, price, ProtectionStage::Trailing, now).await;
            }
            _ => {}
        }
    }

    /// 포지션 전량을 청산합니다.
    async fn close_all(&self, position: &mut Position, reason: &str) {
        let report = match self
            .broker
            .close_trade(&position.broker_trade_id, position.size)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    position_id = %position.id,
                    reason,
                    error = %e,
                    "Close failed, will retry next cycle"
                );
                return;
            }
        };

        position.size -= report.closed_size;
        if position.size > Decimal::ZERO {
            // 브로커가 일부만 청산함: 포지션을 열린 채로 두고 다음 주기에 재시도
            warn!(
                position_id = %position.id,
                reason,
                closed = %report.closed_size,
                remaining = %position.size,
                "Close was partial, will retry next cycle"
            );
            return;
        }

        position.protection_stage = ProtectionStage::Closed;
        self.finalize_close(position, report.close_price, report.closed_size, reason)
            .await;
    }

    async fn apply_large_gain(&self, position: &mut Position, now: DateTime<Utc>) {
        let close_size = position.size * self.config.large_gain_close_fraction;
        let report = match self
            .broker
            .close_trade(&position.broker_trade_id, close_size)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    position_id = %position.id,
                    error = %e,
                    "Large-gain close failed, will retry next cycle"
                );
                return;
            }
        };

        position.size -= report.closed_size;
        position.updated_at = now;

        info!(
            position_id = %position.id,
            closed_size = %report.closed_size,
            remaining = %position.size,
            "Large gain override applied"
        );
        self.sink.publish(PilotEvent::ProtectionTriggered {
            account_id: position.account_id.clone(),
            position_id: position.id,
            instrument: position.instrument.clone(),
            stage: position.protection_stage,
            detail: format!("large gain override, closed {}", report.closed_size),
        });

        if position.size.is_zero() {
            position.protection_stage = ProtectionStage::Closed;
            self.finalize_close(position, report.close_price, report.closed_size, "large_gain")
                .await;
        }
    }

    /// 손절을 진입가 부근으로 이동합니다.
    async fn apply_breakeven(&self, position: &mut Position, now: DateTime<Utc>) {
        let buffer = position.entry_price * self.config.breakeven_buffer_pct / Decimal::from(100);
        let stop = match position.side {
            Side::Buy => position.entry_price + buffer,
            Side::Sell => position.entry_price - buffer,
        };

        if position.tightens_stop(stop) {
            if let Err(e) = self.broker.modify_stop(&position.broker_trade_id, stop).await {
                warn!(
                    position_id = %position.id,
                    error = %e,
                    "Breakeven stop move failed, will retry next cycle"
                );
                return;
            }
            position.current_stop_loss = stop;
        }

        self.advance(position, ProtectionStage::Breakeven, now);
        self.sink.publish(PilotEvent::ProtectionTriggered {
            account_id: position.account_id.clone(),
            position_id: position.id,
            instrument: position.instrument.clone(),
            stage: position.protection_stage,
            detail: format!("stop moved to breakeven {}", position.current_stop_loss),
        });
    }

    /// 남은 수량의 일부를 청산하고 단계를 올립니다.
    async fn apply_partial(
        &self,
        position: &mut Position,
        fraction: Decimal,
        next: ProtectionStage,
        now: DateTime<Utc>,
    ) {
        let close_size = position.size * fraction;
        let report = match self
            .broker
            .close_trade(&position.broker_trade_id, close_size)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    position_id = %position.id,
                    stage = %next,
                    error = %e,
                    "Partial close failed, will retry next cycle"
                );
                return;
            }
        };

        position.size -= report.closed_size;
        self.advance(position, next, now);
        self.sink.publish(PilotEvent::ProtectionTriggered {
            account_id: position.account_id.clone(),
            position_id: position.id,
            instrument: position.instrument.clone(),
            stage: position.protection_stage,
            detail: format!("closed {}, remaining {}", report.closed_size, position.size),
        });

        if position.size.is_zero() {
            position.protection_stage = ProtectionStage::Closed;
            self.finalize_close(position, report.close_price, report.closed_size, "partial_close")
                .await;
        }
    }

    /// 트레일링 스톱을 래칫합니다. 절대 느슨해지지 않습니다.
    async fn apply_trail(
        &self,
        position: &mut Position,
        price: Decimal,
        next: ProtectionStage,
        now: DateTime<Utc>,
    ) {
        let distance = price * self.config.trailing_distance_pct / Decimal::from(100);
        let stop = match position.side {
            Side::Buy => price - distance,
            Side::Sell => price + distance,
        };

        if !position.tightens_stop(stop) {
            // 가격이 물러난 주기에는 스톱을 건드리지 않음
            self.advance(position, next, now);
            return;
        }

        if let Err(e) = self.broker.modify_stop(&position.broker_trade_id, stop).await {
            warn!(
                position_id = %position.id,
                error = %e,
                "Trailing stop move failed, will retry next cycle"
            );
            return;
        }

        position.current_stop_loss = stop;
        self.advance(position, next, now);
        self.sink.publish(PilotEvent::ProtectionTriggered {
            account_id: position.account_id.clone(),
            position_id: position.id,
            instrument: position.instrument.clone(),
            stage: position.protection_stage,
            detail: format!("trailing stop ratcheted to {}", stop),
        });
    }

    /// 단계를 전진시킵니다 (역행은 무시).
    fn advance(&self, position: &mut Position, next: ProtectionStage, now: DateTime<Utc>) {
        if position.protection_stage.can_advance_to(next) {
            debug!(
                position_id = %position.id,
                from = %position.protection_stage,
                to = %next,
                "Protection stage advanced"
            );
            position.protection_stage = next;
        }
        position.updated_at = now;
    }

    /// 전량 청산 후 장부/리스크/알림을 정리합니다.
    async fn finalize_close(
        &self,
        position: &Position,
        close_price: Decimal,
        closed_size: Decimal,
        reason: &str,
    ) {
        self.book.remove(position.id).await;
        self.risk
            .on_position_closed(&position.account_id, position.risk_pct)
            .await;

        info!(
            position_id = %position.id,
            account_id = %position.account_id,
            instrument = %position.instrument,
            close_price = %close_price,
            reason,
            "Position closed"
        );
        self.sink.publish(PilotEvent::PositionClosed {
            account_id: position.account_id.clone(),
            position_id: position.id,
            instrument: position.instrument.clone(),
            close_price,
            closed_size,
            reason: reason.to_string(),
        });
    }
}
