//! 시세 게이트웨이.
//!
//! 브로커에서 호가 스냅샷을 가져오고 신선도를 검증합니다.
//! 오래되었거나 조회 불가한 시세는 fail-closed로 거부합니다.
//! 가격을 임의로 만들어내거나 외삽하지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fxpilot_core::{MarketDataConfig, MarketSnapshot};
use tracing::{debug, warn};

use crate::traits::Broker;
use crate::{BrokerError, BrokerResult};

/// 신선도 검증이 포함된 시세 게이트웨이.
pub struct MarketDataGateway {
    broker: Arc<dyn Broker>,
    freshness_threshold: Duration,
}

impl MarketDataGateway {
    /// 새 게이트웨이를 생성합니다.
    pub fn new(broker: Arc<dyn Broker>, config: &MarketDataConfig) -> Self {
        Self {
            broker,
            freshness_threshold: config.freshness_threshold(),
        }
    }

    /// 신선도 한계를 직접 지정하여 생성합니다 (테스트용).
    pub fn with_threshold(broker: Arc<dyn Broker>, freshness_threshold: Duration) -> Self {
        Self {
            broker,
            freshness_threshold,
        }
    }

    /// 인스트루먼트의 검증된 스냅샷을 조회합니다.
    ///
    /// # Errors
    /// - `BrokerError::Stale` - 스냅샷이 신선도 한계를 초과
    /// - `BrokerError::Unavailable` - 브로커 조회 실패
    ///
    /// 호출자는 두 에러 모두 "이 사이클에서 해당 인스트루먼트 건너뜀"으로
    /// 처리해야 합니다.
    pub async fn snapshot(&self, instrument: &str) -> BrokerResult<MarketSnapshot> {
        let snap = self
            .broker
            .get_quote(instrument)
            .await
            .map_err(|e| match e {
                // 데이터 에러는 그대로, 나머지는 Unavailable로 정규화
                BrokerError::Stale { .. } => e,
                BrokerError::Unavailable(_) => e,
                other => BrokerError::Unavailable(other.to_string()),
            })?;

        let now = Utc::now();
        if !snap.is_fresh(self.freshness_threshold, now) {
            let age_secs = snap.age(now).num_seconds();
            warn!(
                instrument = %instrument,
                age_secs,
                threshold_secs = self.freshness_threshold.as_secs(),
                "Rejecting stale snapshot"
            );
            return Err(BrokerError::Stale {
                instrument: instrument.to_string(),
                age_secs,
            });
        }

        Ok(snap)
    }

    /// 여러 인스트루먼트의 스냅샷을 조회합니다.
    ///
    /// 실패한 인스트루먼트는 건너뛰고 성공분만 반환합니다.
    /// 전부 실패하면 빈 목록이 반환되며, 호출자는 이 사이클을 건너뜁니다.
    pub async fn snapshots(&self, instruments: &[String]) -> Vec<MarketSnapshot> {
        let mut result = Vec::with_capacity(instruments.len());

        for instrument in instruments {
            match self.snapshot(instrument).await {
                Ok(snap) => result.push(snap),
                Err(e) => {
                    debug!(
                        instrument = %instrument,
                        error = %e,
                        "Skipping instrument this cycle"
                    );
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBroker;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_fresh_snapshot_passes() {
        let broker = Arc::new(SimBroker::new());
        broker.set_quote("EUR_USD", dec!(1.1000), dec!(1.1002)).await;

        let gateway = MarketDataGateway::with_threshold(broker, Duration::from_secs(300));
        let snap = gateway.snapshot("EUR_USD").await.unwrap();

        assert_eq!(snap.instrument, "EUR_USD");
        assert_eq!(snap.bid, dec!(1.1000));
    }

    #[tokio::test]
    async fn test_stale_snapshot_rejected() {
        let broker = Arc::new(SimBroker::new());
        broker.set_quote("EUR_USD", dec!(1.1000), dec!(1.1002)).await;
        // 400초 묵은 시세, 한계는 300초
        broker
            .age_quote("EUR_USD", chrono::Duration::seconds(400))
            .await;

        let gateway = MarketDataGateway::with_threshold(broker, Duration::from_secs(300));
        let err = gateway.snapshot("EUR_USD").await.unwrap_err();

        assert!(matches!(err, BrokerError::Stale { .. }));
    }

    #[tokio::test]
    async fn test_unavailable_instrument_skipped_in_batch() {
        let broker = Arc::new(SimBroker::new());
        broker.set_quote("EUR_USD", dec!(1.1000), dec!(1.1002)).await;
        // GBP_USD는 시세 없음 -> Unavailable

        let gateway = MarketDataGateway::with_threshold(broker, Duration::from_secs(300));
        let snaps = gateway
            .snapshots(&["EUR_USD".to_string(), "GBP_USD".to_string()])
            .await;

        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].instrument, "EUR_USD");
    }
}
