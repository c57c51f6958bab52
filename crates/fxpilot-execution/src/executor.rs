//! 주문 실행기.

use std::sync::Arc;

use fxpilot_broker::traits::{Broker, FillReport, OrderRequest};
use fxpilot_core::{AccountConfig, Position, RetryConfig, Signal, SignalStatus};
use fxpilot_notification::{EventSink, PilotEvent};
use fxpilot_protect::PositionBook;
use fxpilot_risk::{RiskGate, RiskReservation};
use rand::Rng;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 제출 시도 상태 (로그 추적용).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    /// 제출 전
    Pending,
    /// 브로커 호출 중
    Submitting,
    /// 체결됨
    Filled,
    /// 브로커가 거부함 (터미널)
    RejectedByBroker,
    /// 재시도 소진 또는 복구 불가 실패 (터미널)
    Failed,
}

impl std::fmt::Display for SubmitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SubmitState::Pending => "PENDING",
            SubmitState::Submitting => "SUBMITTING",
            SubmitState::Filled => "FILLED",
            SubmitState::RejectedByBroker => "REJECTED_BY_BROKER",
            SubmitState::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

/// 제출 결과.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// 체결되어 포지션이 열림
    Filled(Position),
    /// 브로커 거부 (예약 해제됨)
    RejectedByBroker { reason: String },
    /// 최종 실패 (예약 해제됨)
    Failed { reason: String },
}

/// 주문 실행기.
pub struct OrderExecutor {
    broker: Arc<dyn Broker>,
    book: Arc<PositionBook>,
    risk: Arc<RiskGate>,
    sink: EventSink,
    retry: RetryConfig,
}

impl OrderExecutor {
    /// 새 실행기를 생성합니다.
    pub fn new(
        broker: Arc<dyn Broker>,
        book: Arc<PositionBook>,
        risk: Arc<RiskGate>,
        sink: EventSink,
        retry: RetryConfig,
    ) -> Self {
        Self {
            broker,
            book,
            risk,
            sink,
            retry,
        }
    }

    /// 승인된 신호를 제출합니다.
    ///
    /// `reservation`은 이 호출이 소유합니다. 체결되면 예약이 포지션에
    /// 귀속되어 확정되고, 터미널 실패 경로에서는 정확히 한 번
    /// 보상 해제됩니다. 신호 상태는 결과에 따라 `Filled` 또는
    /// `Failed`로 전이됩니다.
    pub async fn submit(
        &self,
        account: &AccountConfig,
        signal: &mut Signal,
        reservation: RiskReservation,
    ) -> SubmitOutcome {
        let outcome = self.submit_inner(account, signal, reservation).await;
        let status = if matches!(outcome, SubmitOutcome::Filled(_)) {
            SignalStatus::Filled
        } else {
            SignalStatus::Failed
        };
        signal.transition(status);
        outcome
    }

    async fn submit_inner(
        &self,
        account: &AccountConfig,
        signal: &Signal,
        reservation: RiskReservation,
    ) -> SubmitOutcome {
        let size = match self.position_size(account, signal).await {
            Ok(size) => size,
            Err(reason) => {
                return self.fail(signal, reservation, SubmitState::Failed, reason).await;
            }
        };

        let request = OrderRequest {
            // 신호 ID가 곧 멱등성 토큰
            client_order_id: signal.id,
            account_id: account.id.clone(),
            instrument: signal.instrument.clone(),
            side: signal.side,
            size,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
        };

        debug!(
            signal_id = %signal.id,
            state = %SubmitState::Pending,
            size = %size,
            "Order prepared"
        );

        for attempt in 0..self.retry.max_attempts {
            if attempt > 0 {
                // 이전 시도가 타임아웃 후 실제로 체결됐을 수 있음
                match self.broker.find_fill(signal.id).await {
                    Ok(Some(fill)) => {
                        info!(
                            signal_id = %signal.id,
                            broker_trade_id = %fill.broker_trade_id,
                            "Previous attempt already filled, not resubmitting"
                        );
                        return self.finish_fill(account, signal, fill).await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        debug!(signal_id = %signal.id, error = %e, "Fill lookup failed");
                    }
                }

                let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=250));
                let delay = self.retry.backoff_delay(attempt - 1) + jitter;
                debug!(
                    signal_id = %signal.id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before resubmit"
                );
                tokio::time::sleep(delay).await;
            }

            debug!(
                signal_id = %signal.id,
                attempt,
                state = %SubmitState::Submitting,
                "Submitting order"
            );

            match self.broker.place_order(&request).await {
                Ok(fill) => return self.finish_fill(account, signal, fill).await,
                Err(e) if e.is_rejection() => {
                    return self
                        .fail(
                            signal,
                            reservation,
                            SubmitState::RejectedByBroker,
                            e.to_string(),
                        )
                        .await;
                }
                Err(e) if e.is_retryable() && attempt + 1 < self.retry.max_attempts => {
                    warn!(
                        signal_id = %signal.id,
                        attempt,
                        error = %e,
                        "Transient submit failure, will retry"
                    );
                }
                Err(e) => {
                    return self
                        .fail(signal, reservation, SubmitState::Failed, e.to_string())
                        .await;
                }
            }
        }

        // max_attempts = 0 설정 방어
        self.fail(
            signal,
            reservation,
            SubmitState::Failed,
            "no submit attempts configured".to_string(),
        )
        .await
    }

    /// 리스크 기반 포지션 크기를 계산합니다.
    ///
    /// 계좌 잔고의 `risk_pct`%를 손절 거리로 나눠 단위 수량을
    /// 구합니다. 정수 단위로 내림합니다.
    async fn position_size(
        &self,
        account: &AccountConfig,
        signal: &Signal,
    ) -> Result<Decimal, String> {
        let stop_distance = signal.stop_distance();
        if stop_distance <= Decimal::ZERO {
            return Err(format!(
                "signal {} has non-positive stop distance",
                signal.id
            ));
        }

        let summary = self
            .broker
            .get_account_summary(&account.id)
            .await
            .map_err(|e| format!("account summary unavailable: {}", e))?;

        let risk_amount = summary.balance * signal.risk_pct / Decimal::from(100);
        let size = (risk_amount / stop_distance).floor();
        if size <= Decimal::ZERO {
            return Err(format!("computed size {} is not tradable", size));
        }

        Ok(size)
    }

    /// 체결 처리: 포지션 생성, 장부 등록, 이벤트 발행.
    ///
    /// 예약은 여기서 포지션에 귀속되어 확정됩니다 (해제 없음).
    async fn finish_fill(
        &self,
        account: &AccountConfig,
        signal: &Signal,
        fill: FillReport,
    ) -> SubmitOutcome {
        let position = Position::new(
            account.id.clone(),
            signal.instrument.clone(),
            signal.side,
            fill.fill_price,
            signal.stop_loss,
            signal.take_profit,
            fill.filled_size,
            signal.risk_pct,
            signal.id,
            fill.broker_trade_id.clone(),
        );

        info!(
            signal_id = %signal.id,
            position_id = %position.id,
            state = %SubmitState::Filled,
            fill_price = %fill.fill_price,
            size = %fill.filled_size,
            "Order filled"
        );

        self.sink.publish(PilotEvent::OrderFilled {
            account_id: account.id.clone(),
            position_id: position.id,
            instrument: position.instrument.clone(),
            side: position.side,
            fill_price: fill.fill_price,
            size: fill.filled_size,
        });

        let result = position.clone();
        self.book.insert(position).await;
        SubmitOutcome::Filled(result)
    }

    /// 터미널 실패 처리: 예약 보상 해제 + 이벤트 발행.
    async fn fail(
        &self,
        signal: &Signal,
        reservation: RiskReservation,
        state: SubmitState,
        reason: String,
    ) -> SubmitOutcome {
        warn!(
            signal_id = %signal.id,
            state = %state,
            reason = %reason,
            "Order submission failed, releasing reservation"
        );

        // 토큰을 값으로 소비 -> 이중 해제는 불가능
        self.risk.release(reservation).await;

        self.sink.publish(PilotEvent::OrderRejected {
            account_id: signal.account_id.clone(),
            signal_id: signal.id,
            instrument: signal.instrument.clone(),
            reason: reason.clone(),
        });

        match state {
            SubmitState::RejectedByBroker => SubmitOutcome::RejectedByBroker { reason },
            _ => SubmitOutcome::Failed { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fxpilot_broker::sim::SimBroker;
    use fxpilot_core::{BlackoutConfig, RiskSettings, Side};
    use fxpilot_risk::RiskDecision;
    use rust_decimal_macros::dec;

    struct Fixture {
        broker: Arc<SimBroker>,
        book: Arc<PositionBook>,
        risk: Arc<RiskGate>,
        executor: OrderExecutor,
    }

    fn fixture(retry: RetryConfig) -> Fixture {
        let broker = Arc::new(SimBroker::new());
        let book = Arc::new(PositionBook::new());
        let risk = Arc::new(RiskGate::new(chrono_tz::UTC, BlackoutConfig::default()));
        let (sink, _handle) = EventSink::disabled();

        let executor = OrderExecutor::new(
            broker.clone(),
            book.clone(),
            risk.clone(),
            sink,
            retry,
        );

        Fixture {
            broker,
            book,
            risk,
            executor,
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 4,
            backoff_base_ms: 1,
            backoff_cap_ms: 2,
        }
    }

    fn account() -> AccountConfig {
        AccountConfig {
            id: "a1".to_string(),
            strategy_id: "spread_guard".to_string(),
            instruments: vec!["EUR_USD".to_string()],
            risk: RiskSettings::default(),
            active: true,
        }
    }

    fn signal() -> Signal {
        Signal::new(
            "a1",
            "spread_guard",
            "EUR_USD",
            Side::Buy,
            dec!(1.1002),
            dec!(1.0950),
            dec!(1.1200),
            dec!(1),
        )
    }

    async fn approve(fx: &Fixture, account: &AccountConfig, signal: &Signal) -> RiskReservation {
        match fx.risk.approve(account, signal, Utc::now()).await {
            RiskDecision::Approved(r) => r,
            RiskDecision::Rejected(r) => panic!("unexpected rejection: {}", r),
        }
    }

    #[tokio::test]
    async fn test_two_transient_failures_then_fill() {
        let fx = fixture(fast_retry());
        fx.broker.set_quote("EUR_USD", dec!(1.1000), dec!(1.1002)).await;

        let account = account();
        let mut signal = signal();
        fx.broker.script_fail_then_fill(signal.id, 2).await;

        let reservation = approve(&fx, &account, &signal).await;
        let outcome = fx.executor.submit(&account, &mut signal, reservation).await;

        assert!(matches!(outcome, SubmitOutcome::Filled(_)));
        assert_eq!(signal.status, SignalStatus::Filled);
        assert_eq!(fx.broker.place_order_call_count().await, 3);
        assert_eq!(fx.book.len().await, 1);

        // 예약은 해제되지 않고 포지션에 귀속됨
        let state = fx.risk.state_snapshot("a1").await.unwrap();
        assert_eq!(state.cumulative_risk_used, dec!(1));
        assert_eq!(state.open_positions, 1);
    }

    #[tokio::test]
    async fn test_broker_rejection_releases_reservation_once() {
        let fx = fixture(fast_retry());
        fx.broker.set_quote("EUR_USD", dec!(1.1000), dec!(1.1002)).await;

        let account = account();
        let mut signal = signal();
        fx.broker.script_reject(signal.id, "margin check failed").await;

        let reservation = approve(&fx, &account, &signal).await;
        let outcome = fx.executor.submit(&account, &mut signal, reservation).await;

        assert!(matches!(outcome, SubmitOutcome::RejectedByBroker { .. }));
        assert_eq!(signal.status, SignalStatus::Failed);
        // 재시도 없이 즉시 터미널
        assert_eq!(fx.broker.place_order_call_count().await, 1);
        assert!(fx.book.is_empty().await);

        let state = fx.risk.state_snapshot("a1").await.unwrap();
        assert_eq!(state.cumulative_risk_used, dec!(0));
        assert_eq!(state.open_positions, 0);
        // 체결되지 않은 시도는 일일 한도도 돌려받음
        assert_eq!(state.trades_today, 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_and_release() {
        let fx = fixture(RetryConfig {
            max_attempts: 2,
            backoff_base_ms: 1,
            backoff_cap_ms: 2,
        });
        fx.broker.set_quote("EUR_USD", dec!(1.1000), dec!(1.1002)).await;
        fx.broker.script_all_transient().await;

        let account = account();
        let mut signal = signal();
        let reservation = approve(&fx, &account, &signal).await;
        let outcome = fx.executor.submit(&account, &mut signal, reservation).await;

        assert!(matches!(outcome, SubmitOutcome::Failed { .. }));
        assert_eq!(fx.broker.place_order_call_count().await, 2);

        let state = fx.risk.state_snapshot("a1").await.unwrap();
        assert_eq!(state.cumulative_risk_used, dec!(0));
    }

    #[tokio::test]
    async fn test_position_size_from_risk_budget() {
        let fx = fixture(fast_retry());
        fx.broker.set_quote("EUR_USD", dec!(1.1000), dec!(1.1002)).await;

        let account = account();
        let mut signal = signal();
        let reservation = approve(&fx, &account, &signal).await;

        let outcome = fx.executor.submit(&account, &mut signal, reservation).await;
        let SubmitOutcome::Filled(position) = outcome else {
            panic!("expected fill");
        };

        // 잔고 100_000의 1% = 1_000을 손절 거리 0.0052로 나눠 내림
        let expected = (dec!(1000) / dec!(0.0052)).floor();
        assert_eq!(position.size, expected);
        assert_eq!(
            fx.broker.trade_remaining(&position.broker_trade_id).await,
            Some(expected)
        );
    }

    #[tokio::test]
    async fn test_incoherent_stop_distance_fails_fast() {
        let fx = fixture(fast_retry());
        fx.broker.set_quote("EUR_USD", dec!(1.1000), dec!(1.1002)).await;

        let account = account();
        let mut signal = signal();
        // 롱인데 손절이 진입가 위
        signal.stop_loss = dec!(1.1100);

        let reservation = approve(&fx, &account, &signal).await;
        let outcome = fx.executor.submit(&account, &mut signal, reservation).await;

        assert!(matches!(outcome, SubmitOutcome::Failed { .. }));
        assert_eq!(fx.broker.place_order_call_count().await, 0);

        let state = fx.risk.state_snapshot("a1").await.unwrap();
        assert_eq!(state.cumulative_risk_used, dec!(0));
    }
}
