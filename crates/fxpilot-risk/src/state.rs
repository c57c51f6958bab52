//! 계좌별 리스크 상태.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use tracing::info;

/// 계좌 하나의 누적 리스크 상태.
///
/// 계좌 락 아래에서만 변경됩니다. 일일 거래 횟수는 설정된 타임존의
/// 거래일이 바뀌면 초기화되고, 오픈 포지션 수와 사용 중 리스크는
/// 포지션 수명에 묶여 있으므로 날짜와 무관하게 유지됩니다.
#[derive(Debug, Clone)]
pub struct RiskState {
    /// 오늘 거래일의 거래 횟수
    pub trades_today: u32,
    /// 현재 오픈 포지션 수
    pub open_positions: usize,
    /// 예약되어 사용 중인 누적 리스크 (%)
    pub cumulative_risk_used: Decimal,
    /// 현재 거래일 (설정 타임존 기준)
    pub trading_day: NaiveDate,
}

impl RiskState {
    /// 주어진 시각의 거래일로 초기 상태를 생성합니다.
    pub fn new(now: DateTime<Utc>, tz: Tz) -> Self {
        Self {
            trades_today: 0,
            open_positions: 0,
            cumulative_risk_used: Decimal::ZERO,
            trading_day: now.with_timezone(&tz).date_naive(),
        }
    }

    /// 거래일이 바뀌었으면 일일 카운터를 초기화합니다.
    pub fn roll_trading_day(&mut self, account_id: &str, now: DateTime<Utc>, tz: Tz) {
        let today = now.with_timezone(&tz).date_naive();
        if today != self.trading_day {
            info!(
                account_id = %account_id,
                previous_day = %self.trading_day,
                new_day = %today,
                trades = self.trades_today,
                "Trading day rolled over, resetting daily counters"
            );
            self.trading_day = today;
            self.trades_today = 0;
        }
    }

    /// 리스크 예산을 예약합니다 (승인 경로 전용).
    pub fn reserve(&mut self, risk_pct: Decimal) {
        self.trades_today += 1;
        self.open_positions += 1;
        self.cumulative_risk_used += risk_pct;
    }

    /// 실패한 제출에 대한 보상 해제.
    ///
    /// 예약이 잡은 것을 전부 되돌립니다: 일일 거래 횟수, 포지션
    /// 슬롯, 리스크 예산. 체결되지 않은 시도는 일일 한도를 소모하지
    /// 않습니다.
    pub fn release(&mut self, risk_pct: Decimal) {
        self.trades_today = self.trades_today.saturating_sub(1);
        self.open_positions = self.open_positions.saturating_sub(1);
        self.cumulative_risk_used = (self.cumulative_risk_used - risk_pct).max(Decimal::ZERO);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_roll_resets_daily_count_only() {
        let tz = chrono_tz::UTC;
        let day1 = "2026-08-26T23:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let day2 = "2026-08-27T01:00:00Z".parse::<DateTime<Utc>>().unwrap();

        let mut state = RiskState::new(day1, tz);
        state.reserve(dec!(1));
        state.reserve(dec!(2));
        assert_eq!(state.trades_today, 2);

        state.roll_trading_day("a1", day2, tz);

        assert_eq!(state.trades_today, 0);
        // 포지션과 리스크 예산은 유지
        assert_eq!(state.open_positions, 2);
        assert_eq!(state.cumulative_risk_used, dec!(3));
    }

    #[test]
    fn test_timezone_shifts_day_boundary() {
        // UTC 23:00 = 뉴욕 19:00, 아직 같은 날
        let tz: Tz = "America/New_York".parse().unwrap();
        let utc_late = "2026-08-26T23:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let utc_next = "2026-08-27T03:00:00Z".parse::<DateTime<Utc>>().unwrap();

        let mut state = RiskState::new(utc_late, tz);
        state.reserve(dec!(1));

        // 뉴욕 기준 여전히 8/26 저녁이므로 초기화 안 됨
        state.roll_trading_day("a1", utc_next, tz);
        assert_eq!(state.trades_today, 1);
    }

    #[test]
    fn test_release_never_goes_negative() {
        let mut state = RiskState::new(Utc::now(), chrono_tz::UTC);
        state.release(dec!(5));

        assert_eq!(state.trades_today, 0);
        assert_eq!(state.open_positions, 0);
        assert_eq!(state.cumulative_risk_used, dec!(0));
    }

    #[test]
    fn test_release_undoes_full_reservation() {
        let mut state = RiskState::new(Utc::now(), chrono_tz::UTC);
        state.reserve(dec!(1));
        state.release(dec!(1));

        assert_eq!(state.trades_today, 0);
        assert_eq!(state.open_positions, 0);
        assert_eq!(state.cumulative_risk_used, dec!(0));
    }
}
