//! 트레이딩 플랜 파일.
//!
//! 계좌 목록과 블랙아웃 윈도우는 앱 설정과 분리된 TOML 파일로
//! 관리합니다. 로드 시점에 검증되며 실행 중에는 불변입니다.

use std::path::Path;

use fxpilot_core::{AccountConfig, AccountRegistry, BlackoutWindow, PilotError, PilotResult};
use serde::Deserialize;
use tracing::info;

/// 계좌와 블랙아웃 윈도우를 담는 플랜 파일.
#[derive(Debug, Deserialize)]
pub struct TradingPlan {
    /// 운용 계좌 목록
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    /// 예정된 블랙아웃 윈도우
    #[serde(default)]
    pub blackouts: Vec<BlackoutWindow>,
}

impl TradingPlan {
    /// TOML 파일에서 플랜을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> PilotResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PilotError::Config(format!(
                "cannot read plan file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let plan: TradingPlan = toml::from_str(&raw)
            .map_err(|e| PilotError::Config(format!("invalid plan file: {}", e)))?;

        info!(
            accounts = plan.accounts.len(),
            blackouts = plan.blackouts.len(),
            "Trading plan loaded"
        );
        Ok(plan)
    }

    /// 계좌 목록을 검증된 레지스트리로 변환합니다.
    pub fn into_registry(self) -> PilotResult<(AccountRegistry, Vec<BlackoutWindow>)> {
        let registry = AccountRegistry::new(self.accounts)?;
        Ok((registry, self.blackouts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_parses_accounts_and_blackouts() {
        let raw = r#"
            [[accounts]]
            id = "demo-1"
            strategy_id = "spread_guard"
            instruments = ["EUR_USD", "GBP_USD"]
            active = true

            [accounts.risk]
            max_risk_per_trade = "1"
            max_portfolio_risk = "5"
            max_positions = 5
            daily_trade_limit = 10

            [[blackouts]]
            instruments = ["EUR_USD"]
            start = "2026-09-04T12:30:00Z"
            end = "2026-09-04T13:00:00Z"
            description = "NFP"
        "#;

        let plan: TradingPlan = toml::from_str(raw).unwrap();
        assert_eq!(plan.accounts.len(), 1);
        assert_eq!(plan.blackouts.len(), 1);

        let (registry, blackouts) = plan.into_registry().unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(blackouts[0].description, "NFP");
    }

    #[test]
    fn test_invalid_account_rejected_at_load() {
        let raw = r#"
            [[accounts]]
            id = "demo-1"
            strategy_id = ""
            instruments = ["EUR_USD"]
            active = true

            [accounts.risk]
            max_risk_per_trade = "1"
            max_portfolio_risk = "5"
            max_positions = 5
            daily_trade_limit = 10
        "#;

        let plan: TradingPlan = toml::from_str(raw).unwrap();
        assert!(plan.into_registry().is_err());
    }
}
