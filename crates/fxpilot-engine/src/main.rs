//! FxPilot 자동매매 엔진 실행 파일.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use fxpilot_broker::{Broker, MarketDataGateway, RestBroker, RestBrokerConfig, SimBroker};
use fxpilot_core::{init_logging, AppConfig, LogConfig};
use fxpilot_engine::{Scheduler, TradingPlan};
use fxpilot_execution::OrderExecutor;
use fxpilot_notification::{
    EventSink, LogSender, NotificationSender, PilotEvent, TelegramSender,
};
use fxpilot_protect::{PositionBook, PositionProtector};
use fxpilot_risk::RiskGate;
use fxpilot_strategy::{HoldStrategy, SpreadGuardStrategy, StrategyRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load_default().context("설정 로드 실패")?;
    let log_config = LogConfig::new(&config.logging.level)
        .with_format(config.logging.format.parse().unwrap_or_default());
    init_logging(log_config).map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    let plan_path =
        std::env::var("FXPILOT_PLAN_FILE").unwrap_or_else(|_| "config/plan.toml".to_string());
    let plan = TradingPlan::load(&plan_path)?;
    let (accounts, blackouts) = plan.into_registry()?;
    let accounts = Arc::new(accounts);
    if accounts.is_empty() {
        anyhow::bail!("플랜에 계좌가 없습니다: {}", plan_path);
    }

    // 브로커: 접속 정보가 없으면 시뮬레이션 브로커로 드라이런
    let broker: Arc<dyn Broker> = match std::env::var("FXPILOT_BROKER_URL") {
        Ok(base_url) => {
            let mut rest_config = RestBrokerConfig::from_env(base_url)
                .context("FXPILOT_API_KEY / FXPILOT_API_SECRET 환경 변수가 필요합니다")?;
            rest_config.request_timeout_secs = config.market_data.request_timeout_secs;
            Arc::new(RestBroker::new(rest_config)?)
        }
        Err(_) => {
            warn!("FXPILOT_BROKER_URL 미설정, 시뮬레이션 브로커로 실행합니다");
            Arc::new(SimBroker::new())
        }
    };
    info!(broker = broker.name(), accounts = accounts.len(), "Engine wiring up");

    let trading_day_tz: chrono_tz::Tz = config
        .trading_day_tz
        .parse()
        .map_err(|e| anyhow::anyhow!("잘못된 타임존 {}: {}", config.trading_day_tz, e))?;

    let gateway = Arc::new(MarketDataGateway::new(broker.clone(), &config.market_data));
    let risk = Arc::new(
        RiskGate::new(trading_day_tz, config.blackout.clone()).with_blackouts(blackouts),
    );
    let book = Arc::new(PositionBook::new());

    let mut senders: Vec<Arc<dyn NotificationSender>> = vec![Arc::new(LogSender)];
    if config.notifications.enabled {
        senders.push(Arc::new(TelegramSender::new(&config.notifications.telegram)));
    }
    let (sink, _sink_handle) = EventSink::spawn(senders, config.notifications.event_buffer_size);

    let executor = Arc::new(OrderExecutor::new(
        broker.clone(),
        book.clone(),
        risk.clone(),
        sink.clone(),
        config.retry.clone(),
    ));

    let mut strategies = StrategyRegistry::new();
    strategies.register(Arc::new(HoldStrategy))?;
    strategies.register(Arc::new(SpreadGuardStrategy::default()))?;
    let strategies = Arc::new(strategies);

    let scheduler = Arc::new(Scheduler::new(
        accounts.clone(),
        strategies,
        gateway.clone(),
        risk.clone(),
        executor,
        book.clone(),
        sink.clone(),
        config.scheduler.clone(),
    ));
    let protector = Arc::new(PositionProtector::new(
        book,
        broker,
        gateway,
        risk,
        sink.clone(),
        config.protection.clone(),
    ));

    sink.publish(PilotEvent::EngineStarted {
        account_count: accounts.len(),
        started_at: Utc::now(),
    });

    let cancel = CancellationToken::new();
    let scheduler_handle = tokio::spawn(scheduler.run(cancel.clone()));
    let protector_cancel = cancel.clone();
    let protector_handle = tokio::spawn(async move { protector.run(protector_cancel).await });

    tokio::signal::ctrl_c()
        .await
        .context("종료 시그널 대기 실패")?;
    info!("Shutdown signal received");
    cancel.cancel();

    let _ = scheduler_handle.await;
    let _ = protector_handle.await;

    sink.publish(PilotEvent::EngineStopped {
        stopped_at: Utc::now(),
    });
    // 싱크가 남은 이벤트를 내보낼 시간
    tokio::time::sleep(Duration::from_millis(200)).await;

    info!("Engine stopped");
    Ok(())
}
