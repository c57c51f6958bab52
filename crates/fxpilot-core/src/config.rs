//! 설정 관리.
//!
//! 이 모듈은 엔진 애플리케이션 설정을 정의하고 관리합니다.
//! 스케줄링 간격, 시세 신선도 한계, 재시도 정책, 포지션 보호 임계값 등
//! 모든 수치 파라미터는 상수가 아닌 설정값입니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 스케줄러 설정
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// 시세 게이트웨이 설정
    #[serde(default)]
    pub market_data: MarketDataConfig,
    /// 주문 재시도 정책
    #[serde(default)]
    pub retry: RetryConfig,
    /// 포지션 보호 설정
    #[serde(default)]
    pub protection: ProtectionConfig,
    /// 블랙아웃 버퍼 설정
    #[serde(default)]
    pub blackout: BlackoutConfig,
    /// 알림 설정
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// 리스크 일일 초기화 기준 타임존 (IANA 이름)
    #[serde(default = "default_trading_day_tz")]
    pub trading_day_tz: String,
}

fn default_trading_day_tz() -> String {
    "UTC".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            scheduler: SchedulerConfig::default(),
            market_data: MarketDataConfig::default(),
            retry: RetryConfig::default(),
            protection: ProtectionConfig::default(),
            blackout: BlackoutConfig::default(),
            notifications: NotificationConfig::default(),
            trading_day_tz: default_trading_day_tz(),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 스케줄러 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// 평가 틱 간격 (초)
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    /// 계좌당 평가 타임아웃 (초)
    #[serde(default = "default_eval_timeout")]
    pub eval_timeout_secs: u64,
    /// 종료 시 인플라이트 태스크 유예 기간 (초)
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_tick_interval() -> u64 {
    60
}
fn default_eval_timeout() -> u64 {
    30
}
fn default_shutdown_grace() -> u64 {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            eval_timeout_secs: default_eval_timeout(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

impl SchedulerConfig {
    /// 틱 간격을 Duration으로 반환.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    /// 평가 타임아웃을 Duration으로 반환.
    pub fn eval_timeout(&self) -> Duration {
        Duration::from_secs(self.eval_timeout_secs)
    }

    /// 종료 유예 기간을 Duration으로 반환.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// 시세 게이트웨이 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketDataConfig {
    /// 스냅샷 신선도 한계 (초). 이보다 오래된 시세는 거부됩니다.
    #[serde(default = "default_freshness")]
    pub freshness_threshold_secs: u64,
    /// 브로커 호출 타임아웃 (초)
    #[serde(default = "default_broker_timeout")]
    pub request_timeout_secs: u64,
}

fn default_freshness() -> u64 {
    300
}
fn default_broker_timeout() -> u64 {
    10
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            freshness_threshold_secs: default_freshness(),
            request_timeout_secs: default_broker_timeout(),
        }
    }
}

impl MarketDataConfig {
    /// 신선도 한계를 Duration으로 반환.
    pub fn freshness_threshold(&self) -> Duration {
        Duration::from_secs(self.freshness_threshold_secs)
    }
}

/// 주문 제출 재시도 정책.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// 최대 제출 시도 횟수
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 백오프 시작 간격 (밀리초)
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    /// 백오프 상한 (밀리초)
    #[serde(default = "default_backoff_cap")]
    pub backoff_cap_ms: u64,
}

fn default_max_attempts() -> u32 {
    4
}
fn default_backoff_base() -> u64 {
    1_000
}
fn default_backoff_cap() -> u64 {
    8_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            backoff_cap_ms: default_backoff_cap(),
        }
    }
}

impl RetryConfig {
    /// n번째 시도(0부터) 이후 대기할 백오프 간격을 계산합니다.
    ///
    /// 지수 증가하며 상한에서 잘립니다. 지터는 호출부에서 더합니다.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.backoff_base_ms.saturating_mul(1u64 << attempt.min(16));
        Duration::from_millis(exp.min(self.backoff_cap_ms))
    }
}

/// 포지션 보호 설정.
///
/// 브레이크이븐/부분청산/트레일링 단계 임계값은 소스 문서마다 달라
/// 전부 설정 파라미터로 취급합니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProtectionConfig {
    /// 보호 루프 주기 (초)
    #[serde(default = "default_protect_interval")]
    pub cycle_interval_secs: u64,
    /// 브레이크이븐 전환 임계값 (진입가 대비 유리한 %)
    pub breakeven_trigger_pct: Decimal,
    /// 브레이크이븐 시 진입가에 더하는 버퍼 (%)
    pub breakeven_buffer_pct: Decimal,
    /// 1차 부분청산 임계값 (%)
    pub partial1_trigger_pct: Decimal,
    /// 1차 부분청산 비율 (남은 수량 대비)
    pub partial1_close_fraction: Decimal,
    /// 2차 부분청산 임계값 (%)
    pub partial2_trigger_pct: Decimal,
    /// 2차 부분청산 비율 (남은 수량 대비)
    pub partial2_close_fraction: Decimal,
    /// 트레일링 전환 임계값 (%)
    pub trailing_trigger_pct: Decimal,
    /// 트레일링 스톱 거리 (%)
    pub trailing_distance_pct: Decimal,
    /// 대규모 수익 오버라이드 임계값 (미실현 손익 절대값)
    pub large_gain_threshold: Decimal,
    /// 오버라이드 시 청산 비율 (남은 수량 대비)
    pub large_gain_close_fraction: Decimal,
    /// 최대 보유 시간 (초). 경과 시 무조건 청산.
    #[serde(default = "default_max_hold")]
    pub max_hold_secs: u64,
}

fn default_protect_interval() -> u64 {
    30
}
fn default_max_hold() -> u64 {
    86_400
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_protect_interval(),
            breakeven_trigger_pct: Decimal::new(5, 1),      // 0.5%
            breakeven_buffer_pct: Decimal::new(5, 2),       // 0.05%
            partial1_trigger_pct: Decimal::new(10, 1),      // 1.0%
            partial1_close_fraction: Decimal::new(33, 2),   // 33%
            partial2_trigger_pct: Decimal::new(20, 1),      // 2.0%
            partial2_close_fraction: Decimal::new(50, 2),   // 50%
            trailing_trigger_pct: Decimal::new(30, 1),      // 3.0%
            trailing_distance_pct: Decimal::new(10, 1),     // 1.0%
            large_gain_threshold: Decimal::new(500, 0),
            large_gain_close_fraction: Decimal::new(70, 2), // 70%
            max_hold_secs: default_max_hold(),
        }
    }
}

impl ProtectionConfig {
    /// 보호 루프 주기를 Duration으로 반환.
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    /// 최대 보유 시간을 chrono Duration으로 반환.
    pub fn max_hold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_hold_secs as i64)
    }
}

/// 뉴스 블랙아웃 버퍼 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlackoutConfig {
    /// 이벤트 시작 전 버퍼 (초)
    #[serde(default = "default_pre_buffer")]
    pub pre_buffer_secs: u64,
    /// 이벤트 종료 후 버퍼 (초)
    #[serde(default = "default_post_buffer")]
    pub post_buffer_secs: u64,
}

fn default_pre_buffer() -> u64 {
    900
}
fn default_post_buffer() -> u64 {
    900
}

impl Default for BlackoutConfig {
    fn default() -> Self {
        Self {
            pre_buffer_secs: default_pre_buffer(),
            post_buffer_secs: default_post_buffer(),
        }
    }
}

impl BlackoutConfig {
    /// 시작 전 버퍼를 chrono Duration으로 반환.
    pub fn pre_buffer(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.pre_buffer_secs as i64)
    }

    /// 종료 후 버퍼를 chrono Duration으로 반환.
    pub fn post_buffer(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.post_buffer_secs as i64)
    }
}

/// 알림 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// 알림 활성화 여부
    pub enabled: bool,
    /// 텔레그램 설정
    #[serde(default)]
    pub telegram: TelegramNotifyConfig,
    /// 이벤트 채널 버퍼 크기
    #[serde(default = "default_event_buffer")]
    pub event_buffer_size: usize,
}

fn default_event_buffer() -> usize {
    256
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            telegram: TelegramNotifyConfig::default(),
            event_buffer_size: default_event_buffer(),
        }
    }
}

/// 텔레그램 알림 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TelegramNotifyConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 봇 토큰
    #[serde(default)]
    pub bot_token: String,
    /// 채팅 ID
    #[serde(default)]
    pub chat_id: String,
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드 (예: FXPILOT__SCHEDULER__TICK_INTERVAL_SECS)
            .add_source(
                config::Environment::with_prefix("FXPILOT")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_backoff_delay_exponential_with_cap() {
        let retry = RetryConfig::default();

        assert_eq!(retry.backoff_delay(0), Duration::from_millis(1_000));
        assert_eq!(retry.backoff_delay(1), Duration::from_millis(2_000));
        assert_eq!(retry.backoff_delay(2), Duration::from_millis(4_000));
        // 상한에서 잘림
        assert_eq!(retry.backoff_delay(3), Duration::from_millis(8_000));
        assert_eq!(retry.backoff_delay(10), Duration::from_millis(8_000));
    }

    #[test]
    fn test_protection_defaults_are_sane() {
        let p = ProtectionConfig::default();

        assert!(p.breakeven_trigger_pct < p.partial1_trigger_pct);
        assert!(p.partial1_trigger_pct < p.partial2_trigger_pct);
        assert!(p.partial2_trigger_pct < p.trailing_trigger_pct);
        assert_eq!(p.large_gain_close_fraction, dec!(0.70));
    }

    #[test]
    fn test_default_config_loads_without_file() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.scheduler.tick_interval_secs, 60);
        assert_eq!(config.market_data.freshness_threshold_secs, 300);
    }
}
