//! 전략 trait 정의.

use async_trait::async_trait;
use fxpilot_core::{AccountConfig, MarketSnapshot, PilotResult, Position, Signal};

/// 매매 전략 인터페이스.
///
/// `evaluate`는 사이클마다 한 번 호출되며, 거래 기회가 없으면
/// `Ok(None)`을 반환합니다. 전략 에러는 해당 계좌의 이번 사이클만
/// 건너뛰게 하며 엔진을 중단시키지 않습니다.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// 전략 식별자 (계좌 설정의 `strategy_id`와 매칭).
    fn id(&self) -> &str;

    /// 사람이 읽을 전략 이름.
    fn name(&self) -> &str;

    /// 현재 시세로 계좌를 평가하여 신호를 생성합니다.
    async fn evaluate(
        &self,
        account: &AccountConfig,
        snapshots: &[MarketSnapshot],
        open_positions: &[Position],
    ) -> PilotResult<Option<Signal>>;
}
