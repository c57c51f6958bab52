//! 계좌 설정 및 레지스트리.
//!
//! 이 모듈은 브로커 계좌 관련 타입을 정의합니다:
//! - `RiskSettings` - 계좌별 리스크 한도
//! - `AccountConfig` - 검증된 계좌 설정 (로드 후 불변)
//! - `AccountRegistry` - 계좌 목록 및 조회

use crate::error::{PilotError, PilotResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 계좌별 리스크 한도 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSettings {
    /// 거래당 최대 리스크 (계좌 대비 %)
    pub max_risk_per_trade: Decimal,
    /// 포트폴리오 전체 최대 누적 리스크 (%)
    pub max_portfolio_risk: Decimal,
    /// 최대 동시 오픈 포지션 수
    pub max_positions: usize,
    /// 일일 최대 거래 횟수
    pub daily_trade_limit: u32,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            max_risk_per_trade: Decimal::new(1, 0),   // 1%
            max_portfolio_risk: Decimal::new(5, 0),   // 5%
            max_positions: 5,
            daily_trade_limit: 10,
        }
    }
}

/// 검증된 계좌 설정.
///
/// 로드 시점에 검증되며 이후 불변입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// 계좌 고유 ID
    pub id: String,
    /// 이 계좌에 바인딩된 전략 ID
    pub strategy_id: String,
    /// 평가 대상 인스트루먼트 목록
    pub instruments: Vec<String>,
    /// 리스크 한도 설정
    pub risk: RiskSettings,
    /// 활성화 여부
    pub active: bool,
}

impl AccountConfig {
    /// 설정 유효성을 검증합니다.
    pub fn validate(&self) -> PilotResult<()> {
        if self.id.trim().is_empty() {
            return Err(PilotError::InvalidInput("account id is empty".to_string()));
        }
        if self.strategy_id.trim().is_empty() {
            return Err(PilotError::InvalidInput(format!(
                "account {}: strategy id is empty",
                self.id
            )));
        }
        if self.instruments.is_empty() {
            return Err(PilotError::InvalidInput(format!(
                "account {}: instrument list is empty",
                self.id
            )));
        }
        if self.risk.max_risk_per_trade <= Decimal::ZERO
            || self.risk.max_portfolio_risk <= Decimal::ZERO
        {
            return Err(PilotError::InvalidInput(format!(
                "account {}: risk limits must be positive",
                self.id
            )));
        }
        if self.risk.max_risk_per_trade > self.risk.max_portfolio_risk {
            return Err(PilotError::InvalidInput(format!(
                "account {}: per-trade risk exceeds portfolio risk",
                self.id
            )));
        }
        if self.risk.max_positions == 0 || self.risk.daily_trade_limit == 0 {
            return Err(PilotError::InvalidInput(format!(
                "account {}: position/trade limits must be positive",
                self.id
            )));
        }
        Ok(())
    }
}

/// 검증된 계좌 목록.
///
/// 외부 입력(설정 파일 파싱 등)에서 만들어진 계좌 목록을 받아
/// 검증 후 보관합니다. 원본 파싱은 이 크레이트의 범위 밖입니다.
#[derive(Debug, Clone, Default)]
pub struct AccountRegistry {
    accounts: HashMap<String, AccountConfig>,
}

impl AccountRegistry {
    /// 계좌 목록으로부터 레지스트리를 생성합니다.
    ///
    /// 모든 계좌를 검증하며, 중복 ID는 거부합니다.
    pub fn new(accounts: Vec<AccountConfig>) -> PilotResult<Self> {
        let mut map = HashMap::with_capacity(accounts.len());

        for account in accounts {
            account.validate()?;
            if map.contains_key(&account.id) {
                return Err(PilotError::InvalidInput(format!(
                    "duplicate account id: {}",
                    account.id
                )));
            }
            map.insert(account.id.clone(), account);
        }

        Ok(Self { accounts: map })
    }

    /// ID로 계좌를 조회합니다.
    pub fn get(&self, id: &str) -> Option<&AccountConfig> {
        self.accounts.get(id)
    }

    /// 활성 계좌 목록을 반환합니다.
    pub fn active_accounts(&self) -> Vec<&AccountConfig> {
        let mut active: Vec<_> = self.accounts.values().filter(|a| a.active).collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        active
    }

    /// 전체 계좌 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// 레지스트리가 비었는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
