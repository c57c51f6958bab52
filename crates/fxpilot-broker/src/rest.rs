//! 브로커 REST 커넥터.
//!
//! HMAC-SHA256 서명 기반 REST 클라이언트입니다. 와이어 포맷은
//! 브로커별로 다르므로 커넥터는 의도적으로 얇게 유지하며,
//! HTTP 상태를 코어의 에러 분류로 매핑하는 역할만 합니다:
//! - 5xx / 전송 오류 -> `Transient` (재시도 대상)
//! - 401 -> `Unauthorized`, 429 -> `RateLimited`
//! - 기타 4xx -> `Rejected` (터미널)

use async_trait::async_trait;
use chrono::Utc;
use fxpilot_core::MarketSnapshot;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::traits::{AccountSummary, Broker, Candle, CloseReport, FillReport, OrderRequest};
use crate::{BrokerError, BrokerResult};

type HmacSha256 = Hmac<Sha256>;

/// REST 커넥터 설정.
#[derive(Debug, Clone)]
pub struct RestBrokerConfig {
    /// REST API 기본 URL
    pub base_url: String,
    /// API 키
    pub api_key: SecretString,
    /// 서명용 API 시크릿
    pub api_secret: SecretString,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl RestBrokerConfig {
    /// 환경 변수에서 설정을 생성합니다.
    pub fn from_env(base_url: impl Into<String>) -> Option<Self> {
        let api_key = std::env::var("FXPILOT_API_KEY").ok()?;
        let api_secret = std::env::var("FXPILOT_API_SECRET").ok()?;

        Some(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            request_timeout_secs: 10,
        })
    }
}

/// 호가 와이어 응답.
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    instrument: String,
    bid: Decimal,
    ask: Decimal,
    time: chrono::DateTime<Utc>,
}

/// 캔들 와이어 응답.
#[derive(Debug, Deserialize)]
struct CandlesResponse {
    candles: Vec<Candle>,
}

/// 주문 체결 와이어 응답.
#[derive(Debug, Deserialize)]
struct FillResponse {
    trade_id: String,
    client_order_id: Uuid,
    price: Decimal,
    units: Decimal,
    time: chrono::DateTime<Utc>,
}

impl From<FillResponse> for FillReport {
    fn from(r: FillResponse) -> Self {
        FillReport {
            broker_trade_id: r.trade_id,
            client_order_id: r.client_order_id,
            fill_price: r.price,
            filled_size: r.units,
            filled_at: r.time,
        }
    }
}

/// 청산 와이어 응답.
#[derive(Debug, Deserialize)]
struct CloseResponse {
    trade_id: String,
    price: Decimal,
    units: Decimal,
    realized_pnl: Decimal,
}

/// 계좌 요약 와이어 응답.
#[derive(Debug, Deserialize)]
struct AccountResponse {
    account_id: String,
    balance: Decimal,
    unrealized_pnl: Decimal,
    open_trade_count: usize,
}

/// HMAC 서명 REST 브로커.
pub struct RestBroker {
    config: RestBrokerConfig,
    client: Client,
}

impl RestBroker {
    /// 새 REST 브로커를 생성합니다.
    pub fn new(config: RestBrokerConfig) -> BrokerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BrokerError::Unavailable(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// 요청 서명을 생성합니다: HMAC-SHA256(timestamp + method + path + body).
    fn sign(&self, timestamp: &str, method: &Method, path: &str, body: &str) -> String {
        let payload = format!("{}{}{}{}", timestamp, method.as_str(), path, body);
        let mut mac = HmacSha256::new_from_slice(
            self.config.api_secret.expose_secret().as_bytes(),
        )
        .expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// 서명된 요청을 전송하고 응답을 역직렬화합니다.
    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> BrokerResult<T> {
        let url = format!("{}{}", self.config.base_url, path);
        let body_str = body
            .as_ref()
            .map(|b| b.to_string())
            .unwrap_or_default();
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = self.sign(&timestamp, &method, path, &body_str);

        let mut req = self
            .client
            .request(method, &url)
            .header("X-API-KEY", self.config.api_key.expose_secret())
            .header("X-TIMESTAMP", &timestamp)
            .header("X-SIGNATURE", &signature);

        if let Some(json) = body {
            req = req.json(&json);
        }

        let response = req.send().await?;
        let status = response.status();

        if status.is_success() {
            let parsed = response.json::<T>().await.map_err(|e| {
                BrokerError::ParseError(e.to_string())
            })?;
            return Ok(parsed);
        }

        let text = response.text().await.unwrap_or_default();
        warn!(path = %path, status = %status, body = %text, "Broker request failed");

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                BrokerError::Unauthorized(text)
            }
            StatusCode::TOO_MANY_REQUESTS => BrokerError::RateLimited,
            StatusCode::NOT_FOUND => BrokerError::OrderNotFound(text),
            s if s.is_server_error() => BrokerError::Transient(format!("{}: {}", status, text)),
            _ => BrokerError::Rejected(format!("{}: {}", status, text)),
        })
    }
}

#[async_trait]
impl Broker for RestBroker {
    fn name(&self) -> &str {
        "rest"
    }

    async fn get_quote(&self, instrument: &str) -> BrokerResult<MarketSnapshot> {
        let quote: QuoteResponse = self
            .request(Method::GET, &format!("/v1/quotes/{}", instrument), None)
            .await?;

        Ok(MarketSnapshot::new(quote.instrument, quote.bid, quote.ask)
            .with_timestamp(quote.time))
    }

    async fn get_candles(&self, instrument: &str, count: u32) -> BrokerResult<Vec<Candle>> {
        let response: CandlesResponse = self
            .request(
                Method::GET,
                &format!("/v1/candles/{}?count={}", instrument, count),
                None,
            )
            .await?;
        Ok(response.candles)
    }

    async fn place_order(&self, request: &OrderRequest) -> BrokerResult<FillReport> {
        debug!(
            client_order_id = %request.client_order_id,
            instrument = %request.instrument,
            side = %request.side,
            "Submitting order"
        );

        let body = serde_json::json!({
            "client_order_id": request.client_order_id,
            "account_id": request.account_id,
            "instrument": request.instrument,
            "side": request.side,
            "units": request.size,
            "stop_loss": request.stop_loss,
            "take_profit": request.take_profit,
            "type": "market",
        });

        let fill: FillResponse = self
            .request(Method::POST, "/v1/orders", Some(body))
            .await?;
        Ok(fill.into())
    }

    async fn find_fill(&self, client_order_id: Uuid) -> BrokerResult<Option<FillReport>> {
        let result: BrokerResult<FillResponse> = self
            .request(
                Method::GET,
                &format!("/v1/orders/by-client-id/{}", client_order_id),
                None,
            )
            .await;

        match result {
            Ok(fill) => Ok(Some(fill.into())),
            Err(BrokerError::OrderNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn close_trade(&self, broker_trade_id: &str, size: Decimal) -> BrokerResult<CloseReport> {
        let body = serde_json::json!({ "units": size });
        let response: CloseResponse = self
            .request(
                Method::POST,
                &format!("/v1/trades/{}/close", broker_trade_id),
                Some(body),
            )
            .await?;

        Ok(CloseReport {
            broker_trade_id: response.trade_id,
            close_price: response.price,
            closed_size: response.units,
            realized_pnl: response.realized_pnl,
        })
    }

    async fn modify_stop(&self, broker_trade_id: &str, new_stop: Decimal) -> BrokerResult<()> {
        let body = serde_json::json!({ "stop_loss": new_stop });
        let _: serde_json::Value = self
            .request(
                Method::PUT,
                &format!("/v1/trades/{}/stop", broker_trade_id),
                Some(body),
            )
            .await?;
        Ok(())
    }

    async fn get_account_summary(&self, account_id: &str) -> BrokerResult<AccountSummary> {
        let response: AccountResponse = self
            .request(
                Method::GET,
                &format!("/v1/accounts/{}/summary", account_id),
                None,
            )
            .await?;

        Ok(AccountSummary {
            account_id: response.account_id,
            balance: response.balance,
            unrealized_pnl: response.unrealized_pnl,
            open_trade_count: response.open_trade_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxpilot_core::Side;
    use rust_decimal_macros::dec;

    fn broker_for(server: &mockito::ServerGuard) -> RestBroker {
        RestBroker::new(RestBrokerConfig {
            base_url: server.url(),
            api_key: "test-key".to_string().into(),
            api_secret: "test-secret".to_string().into(),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_quote_parses_response() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/v1/quotes/EUR_USD")
            .with_status(200)
            .with_body(
                r#"{"instrument":"EUR_USD","bid":"1.1000","ask":"1.1002","time":"2026-08-27T10:00:00Z"}"#,
            )
            .create_async()
            .await;

        let broker = broker_for(&server);
        let snap = broker.get_quote("EUR_USD").await.unwrap();

        assert_eq!(snap.instrument, "EUR_USD");
        assert_eq!(snap.bid, dec!(1.1000));
        assert_eq!(snap.ask, dec!(1.1002));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_transient() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/v1/quotes/EUR_USD")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let broker = broker_for(&server);
        let err = broker.get_quote("EUR_USD").await.unwrap_err();

        assert!(matches!(err, BrokerError::Transient(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_client_error_maps_to_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/orders")
            .with_status(422)
            .with_body("invalid units")
            .create_async()
            .await;

        let broker = broker_for(&server);
        let request = OrderRequest {
            client_order_id: Uuid::new_v4(),
            account_id: "a1".to_string(),
            instrument: "EUR_USD".to_string(),
            side: Side::Buy,
            size: dec!(-1),
            stop_loss: dec!(1.0950),
            take_profit: dec!(1.1100),
        };
        let err = broker.place_order(&request).await.unwrap_err();

        assert!(matches!(err, BrokerError::Rejected(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_find_fill_returns_none_on_404() {
        let mut server = mockito::Server::new_async().await;
        let id = Uuid::new_v4();
        let _m = server
            .mock("GET", format!("/v1/orders/by-client-id/{}", id).as_str())
            .with_status(404)
            .with_body("no such order")
            .create_async()
            .await;

        let broker = broker_for(&server);
        let found = broker.find_fill(id).await.unwrap();

        assert!(found.is_none());
    }

    #[test]
    fn test_signature_is_deterministic() {
        let config = RestBrokerConfig {
            base_url: "http://localhost".to_string(),
            api_key: "k".to_string().into(),
            api_secret: "s".to_string().into(),
            request_timeout_secs: 5,
        };
        let broker = RestBroker::new(config).unwrap();

        let a = broker.sign("123", &Method::GET, "/v1/quotes/EUR_USD", "");
        let b = broker.sign("123", &Method::GET, "/v1/quotes/EUR_USD", "");
        let c = broker.sign("124", &Method::GET, "/v1/quotes/EUR_USD", "");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
