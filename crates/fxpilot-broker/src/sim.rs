//! 시뮬레이션 브로커 구현.
//!
//! 테스트와 드라이런에 사용되는 인메모리 브로커입니다:
//! - 스크립트된 호가 주입
//! - N회 실패 후 성공하는 장애 스크립트 (재시도 경로 검증용)
//! - 제출된 주문 기록 (멱등성 검증용)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fxpilot_core::MarketSnapshot;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::traits::{AccountSummary, Broker, Candle, CloseReport, FillReport, OrderRequest};
use crate::{BrokerError, BrokerResult};

/// 주문 제출에 대한 스크립트된 응답.
#[derive(Debug, Clone)]
enum OrderScript {
    /// 항상 체결
    Fill,
    /// 남은 횟수만큼 일시 에러 후 체결
    FailThenFill(u32),
    /// 터미널 거부
    Reject(String),
}

/// 내부 오픈 거래 상태.
#[derive(Debug, Clone)]
struct SimTrade {
    client_order_id: Uuid,
    instrument: String,
    fill: FillReport,
    remaining_size: Decimal,
    stop_loss: Decimal,
}

#[derive(Default)]
struct SimState {
    quotes: HashMap<String, MarketSnapshot>,
    order_script: HashMap<Uuid, OrderScript>,
    default_script: Option<OrderScript>,
    trades: HashMap<String, SimTrade>,
    close_caps: HashMap<String, Decimal>,
    place_order_calls: u32,
    next_trade_seq: u64,
}

/// 시뮬레이션 브로커.
pub struct SimBroker {
    state: Mutex<SimState>,
}

impl Default for SimBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBroker {
    /// 새 시뮬레이션 브로커를 생성합니다.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState::default()),
        }
    }

    /// 인스트루먼트 호가를 설정합니다 (타임스탬프는 현재 시각).
    pub async fn set_quote(&self, instrument: &str, bid: Decimal, ask: Decimal) {
        let mut state = self.state.lock().await;
        state
            .quotes
            .insert(instrument.to_string(), MarketSnapshot::new(instrument, bid, ask));
    }

    /// 기존 호가의 타임스탬프를 과거로 밀어 오래된 시세를 만듭니다.
    pub async fn age_quote(&self, instrument: &str, age: chrono::Duration) {
        let mut state = self.state.lock().await;
        if let Some(snap) = state.quotes.get_mut(instrument) {
            snap.timestamp = Utc::now() - age;
        }
    }

    /// 특정 주문이 `failures`회 일시 실패 후 체결되도록 스크립트합니다.
    pub async fn script_fail_then_fill(&self, client_order_id: Uuid, failures: u32) {
        let mut state = self.state.lock().await;
        state
            .order_script
            .insert(client_order_id, OrderScript::FailThenFill(failures));
    }

    /// 특정 주문이 터미널 거부되도록 스크립트합니다.
    pub async fn script_reject(&self, client_order_id: Uuid, reason: impl Into<String>) {
        let mut state = self.state.lock().await;
        state
            .order_script
            .insert(client_order_id, OrderScript::Reject(reason.into()));
    }

    /// 모든 주문이 일시 실패하도록 기본 스크립트를 설정합니다.
    pub async fn script_all_transient(&self) {
        let mut state = self.state.lock().await;
        state.default_script = Some(OrderScript::FailThenFill(u32::MAX));
    }

    /// 다음 청산 한 번이 최대 `cap`까지만 체결되도록 스크립트합니다.
    pub async fn script_close_cap(&self, broker_trade_id: &str, cap: Decimal) {
        let mut state = self.state.lock().await;
        state.close_caps.insert(broker_trade_id.to_string(), cap);
    }

    /// place_order 호출 횟수를 반환합니다.
    pub async fn place_order_call_count(&self) -> u32 {
        self.state.lock().await.place_order_calls
    }

    /// 체결된 거래 수를 반환합니다.
    pub async fn open_trade_count(&self) -> usize {
        self.state.lock().await.trades.len()
    }

    /// 거래의 현재 손절 가격을 반환합니다 (검증용).
    pub async fn trade_stop(&self, broker_trade_id: &str) -> Option<Decimal> {
        self.state
            .lock()
            .await
            .trades
            .get(broker_trade_id)
            .map(|t| t.stop_loss)
    }

    /// 거래의 남은 수량을 반환합니다 (검증용).
    pub async fn trade_remaining(&self, broker_trade_id: &str) -> Option<Decimal> {
        self.state
            .lock()
            .await
            .trades
            .get(broker_trade_id)
            .map(|t| t.remaining_size)
    }
}

#[async_trait]
impl Broker for SimBroker {
    fn name(&self) -> &str {
        "sim"
    }

    async fn get_quote(&self, instrument: &str) -> BrokerResult<MarketSnapshot> {
        let state = self.state.lock().await;
        state
            .quotes
            .get(instrument)
            .cloned()
            .ok_or_else(|| BrokerError::Unavailable(format!("no quote for {}", instrument)))
    }

    async fn get_candles(&self, instrument: &str, count: u32) -> BrokerResult<Vec<Candle>> {
        // 시뮬레이션에서는 현재 호가를 평평한 캔들로 복제
        let state = self.state.lock().await;
        let snap = state
            .quotes
            .get(instrument)
            .ok_or_else(|| BrokerError::Unavailable(format!("no quote for {}", instrument)))?;

        let mid = snap.mid();
        let now = Utc::now();
        Ok((0..count)
            .map(|i| Candle {
                time: now - chrono::Duration::minutes(i64::from(count - i)),
                open: mid,
                high: mid,
                low: mid,
                close: mid,
                volume: Decimal::ZERO,
            })
            .collect())
    }

    async fn place_order(&self, request: &OrderRequest) -> BrokerResult<FillReport> {
        let mut state = self.state.lock().await;
        state.place_order_calls += 1;

        // 멱등성: 같은 클라이언트 주문 ID로 이미 체결된 거래는 다시 체결하지 않음
        if let Some(trade) = state
            .trades
            .values()
            .find(|t| t.client_order_id == request.client_order_id)
        {
            debug!(
                client_order_id = %request.client_order_id,
                "Duplicate order submission, returning existing fill"
            );
            return Ok(trade.fill.clone());
        }

        let script = state
            .order_script
            .get(&request.client_order_id)
            .cloned()
            .or_else(|| state.default_script.clone())
            .unwrap_or(OrderScript::Fill);

        match script {
            OrderScript::Reject(reason) => return Err(BrokerError::Rejected(reason)),
            OrderScript::FailThenFill(remaining) if remaining > 0 => {
                if remaining != u32::MAX {
                    state
                        .order_script
                        .insert(request.client_order_id, OrderScript::FailThenFill(remaining - 1));
                }
                return Err(BrokerError::Transient("simulated 503".to_string()));
            }
            _ => {}
        }

        let fill_price = state
            .quotes
            .get(&request.instrument)
            .map(|s| match request.side {
                fxpilot_core::Side::Buy => s.ask,
                fxpilot_core::Side::Sell => s.bid,
            })
            .unwrap_or(Decimal::ZERO);

        state.next_trade_seq += 1;
        let trade_id = format!("sim-{}", state.next_trade_seq);
        let fill = FillReport {
            broker_trade_id: trade_id.clone(),
            client_order_id: request.client_order_id,
            fill_price,
            filled_size: request.size,
            filled_at: Utc::now(),
        };

        state.trades.insert(
            trade_id,
            SimTrade {
                client_order_id: request.client_order_id,
                instrument: request.instrument.clone(),
                fill: fill.clone(),
                remaining_size: request.size,
                stop_loss: request.stop_loss,
            },
        );

        Ok(fill)
    }

    async fn find_fill(&self, client_order_id: Uuid) -> BrokerResult<Option<FillReport>> {
        let state = self.state.lock().await;
        Ok(state
            .trades
            .values()
            .find(|t| t.client_order_id == client_order_id)
            .map(|t| t.fill.clone()))
    }

    async fn close_trade(&self, broker_trade_id: &str, size: Decimal) -> BrokerResult<CloseReport> {
        let mut state = self.state.lock().await;

        let close_price = {
            let trade = state
                .trades
                .get(broker_trade_id)
                .ok_or_else(|| BrokerError::OrderNotFound(broker_trade_id.to_string()))?;
            state
                .quotes
                .get(&trade.instrument)
                .map(|s| s.mid())
                .unwrap_or(trade.fill.fill_price)
        };

        let cap = state.close_caps.remove(broker_trade_id);
        let trade = state
            .trades
            .get_mut(broker_trade_id)
            .ok_or_else(|| BrokerError::OrderNotFound(broker_trade_id.to_string()))?;

        let mut closed = size.min(trade.remaining_size);
        if let Some(cap) = cap {
            closed = closed.min(cap);
        }
        trade.remaining_size -= closed;

        let report = CloseReport {
            broker_trade_id: broker_trade_id.to_string(),
            close_price,
            closed_size: closed,
            realized_pnl: Decimal::ZERO,
        };

        if trade.remaining_size.is_zero() {
            state.trades.remove(broker_trade_id);
        }

        Ok(report)
    }

    async fn modify_stop(&self, broker_trade_id: &str, new_stop: Decimal) -> BrokerResult<()> {
        let mut state = self.state.lock().await;
        let trade = state
            .trades
            .get_mut(broker_trade_id)
            .ok_or_else(|| BrokerError::OrderNotFound(broker_trade_id.to_string()))?;
        trade.stop_loss = new_stop;
        Ok(())
    }

    async fn get_account_summary(&self, account_id: &str) -> BrokerResult<AccountSummary> {
        let state = self.state.lock().await;
        Ok(AccountSummary {
            account_id: account_id.to_string(),
            balance: Decimal::from(100_000),
            unrealized_pnl: Decimal::ZERO,
            open_trade_count: state.trades.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxpilot_core::Side;
    use rust_decimal_macros::dec;

    fn request() -> OrderRequest {
        OrderRequest {
            client_order_id: Uuid::new_v4(),
            account_id: "a1".to_string(),
            instrument: "EUR_USD".to_string(),
            side: Side::Buy,
            size: dec!(10000),
            stop_loss: dec!(1.0950),
            take_profit: dec!(1.1100),
        }
    }

    #[tokio::test]
    async fn test_fail_then_fill_script() {
        let broker = SimBroker::new();
        broker.set_quote("EUR_USD", dec!(1.1000), dec!(1.1002)).await;

        let req = request();
        broker.script_fail_then_fill(req.client_order_id, 2).await;

        assert!(broker.place_order(&req).await.is_err());
        assert!(broker.place_order(&req).await.is_err());
        let fill = broker.place_order(&req).await.unwrap();

        assert_eq!(fill.filled_size, dec!(10000));
        assert_eq!(broker.place_order_call_count().await, 3);
    }

    #[tokio::test]
    async fn test_duplicate_submission_returns_existing_fill() {
        let broker = SimBroker::new();
        broker.set_quote("EUR_USD", dec!(1.1000), dec!(1.1002)).await;

        let req = request();
        let first = broker.place_order(&req).await.unwrap();
        let second = broker.place_order(&req).await.unwrap();

        assert_eq!(first.broker_trade_id, second.broker_trade_id);
        assert_eq!(broker.open_trade_count().await, 1);
    }

    #[tokio::test]
    async fn test_partial_close_reduces_remaining() {
        let broker = SimBroker::new();
        broker.set_quote("EUR_USD", dec!(1.1000), dec!(1.1002)).await;

        let req = request();
        let fill = broker.place_order(&req).await.unwrap();

        let report = broker
            .close_trade(&fill.broker_trade_id, dec!(4000))
            .await
            .unwrap();

        assert_eq!(report.closed_size, dec!(4000));
        assert_eq!(
            broker.trade_remaining(&fill.broker_trade_id).await,
            Some(dec!(6000))
        );
    }

    #[tokio::test]
    async fn test_find_fill_by_client_order_id() {
        let broker = SimBroker::new();
        broker.set_quote("EUR_USD", dec!(1.1000), dec!(1.1002)).await;

        let req = request();
        assert!(broker.find_fill(req.client_order_id).await.unwrap().is_none());

        broker.place_order(&req).await.unwrap();
        let found = broker.find_fill(req.client_order_id).await.unwrap();

        assert!(found.is_some());
        assert_eq!(found.unwrap().client_order_id, req.client_order_id);
    }
}
