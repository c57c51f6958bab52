//! 홀드 전략.

use async_trait::async_trait;
use fxpilot_core::{AccountConfig, MarketSnapshot, PilotResult, Position, Signal};

use crate::traits::Strategy;

/// 아무것도 거래하지 않는 전략.
///
/// 신규 계좌의 안전한 기본값이며 엔진 배선 테스트에도 사용됩니다.
pub struct HoldStrategy;

#[async_trait]
impl Strategy for HoldStrategy {
    fn id(&self) -> &str {
        "hold"
    }

    fn name(&self) -> &str {
        "Hold (no trading)"
    }

    async fn evaluate(
        &self,
        _account: &AccountConfig,
        _snapshots: &[MarketSnapshot],
        _open_positions: &[Position],
    ) -> PilotResult<Option<Signal>> {
        Ok(None)
    }
}
