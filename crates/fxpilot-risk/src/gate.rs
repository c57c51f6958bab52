//! 리스크 게이트 및 예약 토큰.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use fxpilot_core::{AccountConfig, BlackoutConfig, BlackoutWindow, Signal};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::state::RiskState;

/// 리스크 거부 사유.
///
/// 거부는 정상 동작이며 에러로 취급하지 않습니다. 규칙은 선언된
/// 순서대로 평가되고 첫 실패가 결과가 됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskRejection {
    /// 인스트루먼트가 뉴스 블랙아웃 구간에 있음
    NewsBlackout { instrument: String },
    /// 일일 거래 한도 도달
    DailyLimit { used: u32, limit: u32 },
    /// 동시 오픈 포지션 한도 도달
    PositionLimit { open: usize, limit: usize },
    /// 포트폴리오 누적 리스크 한도 초과
    PortfolioRisk { would_use: Decimal, limit: Decimal },
    /// 거래당 리스크 한도 초과
    PerTradeRisk { requested: Decimal, limit: Decimal },
}

impl RiskRejection {
    /// 로그/이벤트용 사유 코드.
    pub fn code(&self) -> &'static str {
        match self {
            RiskRejection::NewsBlackout { .. } => "NEWS_BLACKOUT",
            RiskRejection::DailyLimit { .. } => "DAILY_LIMIT",
            RiskRejection::PositionLimit { .. } => "POSITION_LIMIT",
            RiskRejection::PortfolioRisk { .. } => "PORTFOLIO_RISK",
            RiskRejection::PerTradeRisk { .. } => "PER_TRADE_RISK",
        }
    }
}

impl std::fmt::Display for RiskRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskRejection::NewsBlackout { instrument } => {
                write!(f, "NEWS_BLACKOUT: {} is inside a blackout window", instrument)
            }
            RiskRejection::DailyLimit { used, limit } => {
                write!(f, "DAILY_LIMIT: {}/{} trades used today", used, limit)
            }
            RiskRejection::PositionLimit { open, limit } => {
                write!(f, "POSITION_LIMIT: {}/{} positions open", open, limit)
            }
            RiskRejection::PortfolioRisk { would_use, limit } => {
                write!(f, "PORTFOLIO_RISK: would use {}% of {}% budget", would_use, limit)
            }
            RiskRejection::PerTradeRisk { requested, limit } => {
                write!(f, "PER_TRADE_RISK: requested {}% exceeds {}%", requested, limit)
            }
        }
    }
}

/// 일회성 리스크 예약 토큰.
///
/// 승인 시점에 예약된 예산을 나타냅니다. `Clone`이 아니며
/// `RiskGate::release`가 값으로 소비하므로 이중 해제는 컴파일되지
/// 않습니다. 체결 성공 시에는 토큰을 드롭하면 예약이 확정됩니다.
#[derive(Debug)]
pub struct RiskReservation {
    account_id: String,
    signal_id: Uuid,
    risk_pct: Decimal,
}

impl RiskReservation {
    /// 예약이 속한 계좌 ID.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// 예약을 만든 신호 ID.
    pub fn signal_id(&self) -> Uuid {
        self.signal_id
    }

    /// 예약된 리스크 (%).
    pub fn risk_pct(&self) -> Decimal {
        self.risk_pct
    }
}

/// 리스크 게이트 결정.
#[derive(Debug)]
pub enum RiskDecision {
    /// 승인됨, 예산 예약 완료
    Approved(RiskReservation),
    /// 거부됨
    Rejected(RiskRejection),
}

/// 계좌별 리스크 상태를 관리하는 게이트.
pub struct RiskGate {
    /// 계좌별 세분화 락. 바깥 RwLock은 맵 구조 변경에만 사용됩니다.
    states: RwLock<HashMap<String, Arc<Mutex<RiskState>>>>,
    blackouts: Vec<BlackoutWindow>,
    blackout_config: BlackoutConfig,
    trading_day_tz: Tz,
}

impl RiskGate {
    /// 새 게이트를 생성합니다.
    pub fn new(trading_day_tz: Tz, blackout_config: BlackoutConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            blackouts: Vec::new(),
            blackout_config,
            trading_day_tz,
        }
    }

    /// 블랙아웃 윈도우 목록을 설정합니다.
    pub fn with_blackouts(mut self, blackouts: Vec<BlackoutWindow>) -> Self {
        self.blackouts = blackouts;
        self
    }

    /// 계좌의 상태 락을 가져옵니다 (없으면 생성).
    async fn account_state(&self, account_id: &str) -> Arc<Mutex<RiskState>> {
        {
            let states = self.states.read().await;
            if let Some(state) = states.get(account_id) {
                return state.clone();
            }
        }

        let mut states = self.states.write().await;
        states
            .entry(account_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(RiskState::new(Utc::now(), self.trading_day_tz)))
            })
            .clone()
    }

    /// 신호를 평가하고, 승인 시 예산을 원자적으로 예약합니다.
    ///
    /// 규칙 순서: 블랙아웃 → 일일 한도 → 포지션 한도 → 포트폴리오
    /// 리스크 → 거래당 리스크. 예약은 계좌 락 아래에서 이뤄지므로
    /// 동시 승인이 예산을 초과 배정할 수 없습니다.
    pub async fn approve(
        &self,
        account: &AccountConfig,
        signal: &Signal,
        now: DateTime<Utc>,
    ) -> RiskDecision {
        // 1. 뉴스 블랙아웃 (계좌 상태와 무관)
        let pre = self.blackout_config.pre_buffer();
        let post = self.blackout_config.post_buffer();
        if self
            .blackouts
            .iter()
            .any(|w| w.blocks(&signal.instrument, now, pre, post))
        {
            return self.reject(
                signal,
                RiskRejection::NewsBlackout {
                    instrument: signal.instrument.clone(),
                },
            );
        }

        let state_lock = self.account_state(&account.id).await;
        let mut state = state_lock.lock().await;
        state.roll_trading_day(&account.id, now, self.trading_day_tz);

        // 2. 일일 거래 한도
        if state.trades_today >= account.risk.daily_trade_limit {
            return self.reject(
                signal,
                RiskRejection::DailyLimit {
                    used: state.trades_today,
                    limit: account.risk.daily_trade_limit,
                },
            );
        }

        // 3. 동시 포지션 한도
        if state.open_positions >= account.risk.max_positions {
            return self.reject(
                signal,
                RiskRejection::PositionLimit {
                    open: state.open_positions,
                    limit: account.risk.max_positions,
                },
            );
        }

        // 4. 포트폴리오 누적 리스크
        let would_use = state.cumulative_risk_used + signal.risk_pct;
        if would_use > account.risk.max_portfolio_risk {
            return self.reject(
                signal,
                RiskRejection::PortfolioRisk {
                    would_use,
                    limit: account.risk.max_portfolio_risk,
                },
            );
        }

        // 5. 거래당 리스크
        if signal.risk_pct > account.risk.max_risk_per_trade {
            return self.reject(
                signal,
                RiskRejection::PerTradeRisk {
                    requested: signal.risk_pct,
                    limit: account.risk.max_risk_per_trade,
                },
            );
        }

        // 승인: 락을 쥔 채로 예약까지 완료
        state.reserve(signal.risk_pct);
        info!(
            account_id = %account.id,
            signal_id = %signal.id,
            risk_pct = %signal.risk_pct,
            cumulative_risk = %state.cumulative_risk_used,
            "Signal approved, risk reserved"
        );

        RiskDecision::Approved(RiskReservation {
            account_id: account.id.clone(),
            signal_id: signal.id,
            risk_pct: signal.risk_pct,
        })
    }

    fn reject(&self, signal: &Signal, rejection: RiskRejection) -> RiskDecision {
        debug!(
            account_id = %signal.account_id,
            signal_id = %signal.id,
            reason = rejection.code(),
            "Signal rejected"
        );
        RiskDecision::Rejected(rejection)
    }

    /// 실패한 제출에 대한 보상 해제.
    ///
    /// 토큰을 값으로 소비하므로 정확히 한 번만 가능합니다.
    pub async fn release(&self, reservation: RiskReservation) {
        let state_lock = self.account_state(&reservation.account_id).await;
        let mut state = state_lock.lock().await;
        state.release(reservation.risk_pct);

        info!(
            account_id = %reservation.account_id,
            signal_id = %reservation.signal_id,
            risk_pct = %reservation.risk_pct,
            "Risk reservation released"
        );
    }

    /// 포지션 청산 시 예산을 반환합니다.
    pub async fn on_position_closed(&self, account_id: &str, risk_pct: Decimal) {
        let state_lock = self.account_state(account_id).await;
        let mut state = state_lock.lock().await;
        state.release(risk_pct);

        debug!(
            account_id = %account_id,
            risk_pct = %risk_pct,
            cumulative_risk = %state.cumulative_risk_used,
            "Position closed, risk budget freed"
        );
    }

    /// 현재 상태 스냅샷을 반환합니다 (조회/테스트용).
    pub async fn state_snapshot(&self, account_id: &str) -> Option<RiskState> {
        let states = self.states.read().await;
        match states.get(account_id) {
            Some(state) => Some(state.lock().await.clone()),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxpilot_core::{RiskSettings, Side};
    use rust_decimal_macros::dec;

    fn account(daily_limit: u32) -> AccountConfig {
        AccountConfig {
            id: "a1".to_string(),
            strategy_id: "spread_guard".to_string(),
            instruments: vec!["EUR_USD".to_string()],
            risk: RiskSettings {
                max_risk_per_trade: dec!(1),
                max_portfolio_risk: dec!(5),
                max_positions: 5,
                daily_trade_limit: daily_limit,
            },
            active: true,
        }
    }

    fn signal(risk_pct: Decimal) -> Signal {
        Signal::new(
            "a1",
            "spread_guard",
            "EUR_USD",
            Side::Buy,
            dec!(1.1000),
            dec!(1.0950),
            dec!(1.1100),
            risk_pct,
        )
    }

    fn gate() -> RiskGate {
        RiskGate::new(chrono_tz::UTC, BlackoutConfig::default())
    }

    #[tokio::test]
    async fn test_daily_limit_rejects_after_quota() {
        let gate = gate();
        let account = account(2);
        let now = Utc::now();

        for _ in 0..2 {
            match gate.approve(&account, &signal(dec!(1)), now).await {
                RiskDecision::Approved(_) => {}
                RiskDecision::Rejected(r) => panic!("unexpected rejection: {}", r),
            }
        }

        match gate.approve(&account, &signal(dec!(1)), now).await {
            RiskDecision::Rejected(RiskRejection::DailyLimit { used: 2, limit: 2 }) => {}
            other => panic!("expected daily limit rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_portfolio_budget_never_exceeded() {
        let gate = gate();
        let account = account(100);
        let now = Utc::now();

        // 예산 5%, 1%씩 10건 -> 정확히 5건 승인
        let mut approved = 0;
        for _ in 0..10 {
            if let RiskDecision::Approved(_) = gate.approve(&account, &signal(dec!(1)), now).await
            {
                approved += 1;
            }
        }

        assert_eq!(approved, 5);
        let state = gate.state_snapshot("a1").await.unwrap();
        assert_eq!(state.cumulative_risk_used, dec!(5));
    }

    #[tokio::test]
    async fn test_concurrent_approvals_respect_budget() {
        let gate = Arc::new(gate());
        let account = Arc::new(account(100));
        let now = Utc::now();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let gate = gate.clone();
            let account = account.clone();
            handles.push(tokio::spawn(async move {
                matches!(
                    gate.approve(&account, &signal(dec!(1)), now).await,
                    RiskDecision::Approved(_)
                )
            }));
        }

        let mut approved = 0;
        for handle in handles {
            if handle.await.unwrap() {
                approved += 1;
            }
        }

        assert_eq!(approved, 5);
        let state = gate.state_snapshot("a1").await.unwrap();
        assert!(state.cumulative_risk_used <= dec!(5));
    }

    #[tokio::test]
    async fn test_release_frees_budget_for_next_signal() {
        let gate = gate();
        let account = account(100);
        let now = Utc::now();

        let mut reservations = Vec::new();
        for _ in 0..5 {
            if let RiskDecision::Approved(r) = gate.approve(&account, &signal(dec!(1)), now).await
            {
                reservations.push(r);
            }
        }

        // 예산 소진
        assert!(matches!(
            gate.approve(&account, &signal(dec!(1)), now).await,
            RiskDecision::Rejected(RiskRejection::PortfolioRisk { .. })
        ));

        gate.release(reservations.pop().unwrap()).await;

        assert!(matches!(
            gate.approve(&account, &signal(dec!(1)), now).await,
            RiskDecision::Approved(_)
        ));
    }

    #[tokio::test]
    async fn test_release_returns_daily_slot() {
        let gate = gate();
        let account = account(1);
        let now = Utc::now();

        let reservation = match gate.approve(&account, &signal(dec!(1)), now).await {
            RiskDecision::Approved(r) => r,
            RiskDecision::Rejected(r) => panic!("unexpected rejection: {}", r),
        };

        // 제출 실패 보상: 하루 1건 한도가 그대로 돌아와야 함
        gate.release(reservation).await;
        let state = gate.state_snapshot("a1").await.unwrap();
        assert_eq!(state.trades_today, 0);

        assert!(matches!(
            gate.approve(&account, &signal(dec!(1)), now).await,
            RiskDecision::Approved(_)
        ));
    }

    #[tokio::test]
    async fn test_blackout_rejection_with_buffers() {
        let now = Utc::now();
        // 이벤트는 10분 뒤 시작이지만 pre 버퍼 15분에 걸림
        let window = BlackoutWindow {
            instruments: vec!["EUR_USD".to_string()],
            start: now + chrono::Duration::minutes(10),
            end: now + chrono::Duration::minutes(40),
            description: "NFP".to_string(),
        };
        let gate = RiskGate::new(chrono_tz::UTC, BlackoutConfig::default())
            .with_blackouts(vec![window]);
        let account = account(100);

        match gate.approve(&account, &signal(dec!(1)), now).await {
            RiskDecision::Rejected(RiskRejection::NewsBlackout { instrument }) => {
                assert_eq!(instrument, "EUR_USD");
            }
            other => panic!("expected blackout rejection, got {:?}", other),
        }

        // 블랙아웃 거부는 예산을 소비하지 않음
        assert!(gate.state_snapshot("a1").await.is_none());
    }

    proptest::proptest! {
        // 임의의 승인/해제 시퀀스에서도 누적 리스크가 예산을 넘지 않음
        #[test]
        fn prop_cumulative_risk_never_exceeds_budget(
            risks in proptest::collection::vec(1u32..=300, 1..40),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();

            rt.block_on(async {
                let gate = gate();
                let mut account = account(1_000);
                account.risk.max_risk_per_trade = dec!(3);
                let now = Utc::now();
                let mut reservations = Vec::new();

                for (i, cents) in risks.into_iter().enumerate() {
                    let risk = Decimal::new(i64::from(cents), 2);
                    match gate.approve(&account, &signal(risk), now).await {
                        RiskDecision::Approved(r) => reservations.push(r),
                        RiskDecision::Rejected(_) => {}
                    }

                    // 가끔 해제를 섞어 보상 경로도 검증
                    if i % 3 == 0 {
                        if let Some(r) = reservations.pop() {
                            gate.release(r).await;
                        }
                    }

                    let state = gate.state_snapshot("a1").await.unwrap();
                    assert!(state.cumulative_risk_used <= account.risk.max_portfolio_risk);
                    assert!(state.cumulative_risk_used >= Decimal::ZERO);
                }
            });
        }
    }

    #[tokio::test]
    async fn test_per_trade_limit_checked_last() {
        let gate = gate();
        let account = account(100);
        let now = Utc::now();

        // 2% > 거래당 한도 1%지만 포트폴리오 5%에는 들어감
        match gate.approve(&account, &signal(dec!(2)), now).await {
            RiskDecision::Rejected(RiskRejection::PerTradeRisk { requested, limit }) => {
                assert_eq!(requested, dec!(2));
                assert_eq!(limit, dec!(1));
            }
            other => panic!("expected per-trade rejection, got {:?}", other),
        }
    }
}
