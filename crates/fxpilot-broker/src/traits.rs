//! 브로커 trait 정의.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fxpilot_core::{MarketSnapshot, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::BrokerResult;

/// 브로커에 제출할 주문 요청.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// 클라이언트 멱등성 토큰 (신호 ID)
    pub client_order_id: Uuid,
    /// 대상 계좌 ID
    pub account_id: String,
    /// 거래 인스트루먼트
    pub instrument: String,
    /// 매매 방향
    pub side: Side,
    /// 주문 수량
    pub size: Decimal,
    /// 첨부 손절 가격
    pub stop_loss: Decimal,
    /// 첨부 익절 가격
    pub take_profit: Decimal,
}

/// 체결 보고.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillReport {
    /// 브로커 측 거래 ID
    pub broker_trade_id: String,
    /// 클라이언트 멱등성 토큰
    pub client_order_id: Uuid,
    /// 체결 가격
    pub fill_price: Decimal,
    /// 체결 수량
    pub filled_size: Decimal,
    /// 체결 시각
    pub filled_at: DateTime<Utc>,
}

/// 포지션 청산 보고.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseReport {
    /// 브로커 측 거래 ID
    pub broker_trade_id: String,
    /// 청산 가격
    pub close_price: Decimal,
    /// 청산된 수량
    pub closed_size: Decimal,
    /// 실현 손익
    pub realized_pnl: Decimal,
}

/// 과거 캔들.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    /// 캔들 시작 시각
    pub time: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: Decimal,
}

/// 계좌 요약 정보.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
    /// 계좌 ID
    pub account_id: String,
    /// 계좌 잔고
    pub balance: Decimal,
    /// 미실현 손익
    pub unrealized_pnl: Decimal,
    /// 오픈 거래 수
    pub open_trade_count: usize,
}

/// 통합 브로커 인터페이스.
///
/// 와이어 포맷은 브로커별로 다르며 이 trait 뒤에 숨겨집니다.
/// 코어는 이 캐퍼빌리티 경계를 통해서만 브로커를 소비합니다.
#[async_trait]
pub trait Broker: Send + Sync {
    /// 브로커 이름 반환.
    fn name(&self) -> &str;

    // === 시장 데이터 ===

    /// 인스트루먼트의 현재 호가 조회.
    async fn get_quote(&self, instrument: &str) -> BrokerResult<MarketSnapshot>;

    /// 과거 캔들 조회.
    async fn get_candles(&self, instrument: &str, count: u32) -> BrokerResult<Vec<Candle>>;

    // === 주문 작업 ===

    /// 손절/익절이 첨부된 시장가 주문 제출.
    async fn place_order(&self, request: &OrderRequest) -> BrokerResult<FillReport>;

    /// 클라이언트 주문 ID로 기존 체결 조회 (멱등성 확인용).
    ///
    /// 재시도 전에 호출하여 이전 시도가 이미 체결됐는지 확인합니다.
    async fn find_fill(&self, client_order_id: Uuid) -> BrokerResult<Option<FillReport>>;

    /// 오픈 거래의 일부 또는 전량 청산.
    async fn close_trade(&self, broker_trade_id: &str, size: Decimal) -> BrokerResult<CloseReport>;

    /// 오픈 거래의 손절 가격 수정.
    async fn modify_stop(&self, broker_trade_id: &str, new_stop: Decimal) -> BrokerResult<()>;

    // === 계좌 작업 ===

    /// 계좌 요약 조회.
    async fn get_account_summary(&self, account_id: &str) -> BrokerResult<AccountSummary>;
}
