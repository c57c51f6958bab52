//! 평가 스케줄러.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use fxpilot_broker::MarketDataGateway;
use fxpilot_core::{AccountConfig, AccountRegistry, SchedulerConfig, Signal};
use fxpilot_execution::OrderExecutor;
use fxpilot_notification::{EventSink, PilotEvent};
use fxpilot_protect::PositionBook;
use fxpilot_risk::{RiskDecision, RiskGate};
use fxpilot_strategy::StrategyRegistry;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 고정 간격 평가 스케줄러.
///
/// 틱마다 활성 계좌별로 평가 태스크를 하나씩 띄웁니다. 계좌당
/// 동시 평가는 최대 하나이며, 이전 평가가 끝나지 않은 계좌의 틱은
/// 큐잉 없이 건너뜁니다. 태스크 안의 모든 에러는 태스크 경계에서
/// 잡혀 로그와 이벤트로만 남습니다.
pub struct Scheduler {
    accounts: Arc<AccountRegistry>,
    strategies: Arc<StrategyRegistry>,
    gateway: Arc<MarketDataGateway>,
    risk: Arc<RiskGate>,
    executor: Arc<OrderExecutor>,
    book: Arc<PositionBook>,
    sink: EventSink,
    config: SchedulerConfig,
    in_flight: Mutex<HashSet<String>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// 새 스케줄러를 생성합니다.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        accounts: Arc<AccountRegistry>,
        strategies: Arc<StrategyRegistry>,
        gateway: Arc<MarketDataGateway>,
        risk: Arc<RiskGate>,
        executor: Arc<OrderExecutor>,
        book: Arc<PositionBook>,
        sink: EventSink,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            accounts,
            strategies,
            gateway,
            risk,
            executor,
            book,
            sink,
            config,
            in_flight: Mutex::new(HashSet::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// 취소될 때까지 스케줄러 루프를 실행합니다.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.tick_interval());
        // 밀린 틱은 몰아서 실행하지 않고 버림
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            tick_secs = self.config.tick_interval_secs,
            accounts = self.accounts.len(),
            "Scheduler started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Scheduler stopping");
                    break;
                }
                _ = interval.tick() => {
                    self.clone().dispatch_tick().await;
                }
            }
        }

        self.drain().await;
    }

    /// 틱 하나를 처리합니다: 활성 계좌마다 평가 태스크 생성.
    async fn dispatch_tick(self: Arc<Self>) {
        // 끝난 태스크의 핸들은 더 들고 있지 않음
        self.tasks.lock().await.retain(|h| !h.is_finished());

        let accounts: Vec<AccountConfig> = self
            .accounts
            .active_accounts()
            .into_iter()
            .cloned()
            .collect();

        for account in accounts {
            {
                let mut in_flight = self.in_flight.lock().await;
                if !in_flight.insert(account.id.clone()) {
                    // 이전 평가가 아직 실행 중 -> 이 틱은 큐잉 없이 건너뜀
                    debug!(account_id = %account.id, "Evaluation still in flight, skipping tick");
                    continue;
                }
            }

            let this = self.clone();
            let handle = tokio::spawn(async move {
                let account_id = account.id.clone();
                this.evaluate_account(&account).await;
                this.in_flight.lock().await.remove(&account_id);
            });
            self.tasks.lock().await.push(handle);
        }
    }

    /// 계좌 하나를 평가합니다: 시세 -> 전략 -> 리스크 -> 제출.
    ///
    /// 타임아웃은 시세 조회와 전략 평가까지만 적용됩니다. 승인 이후의
    /// 제출 구간은 중간에 끊기면 예약이 해제되지 못한 채 샐 수 있으므로
    /// 타임아웃 대상에서 제외합니다. 모든 실패는 여기서 소비됩니다.
    async fn evaluate_account(&self, account: &AccountConfig) {
        let evaluation = tokio::time::timeout(
            self.config.eval_timeout(),
            self.prepare_signal(account),
        );
        let signal = match evaluation.await {
            Ok(Some(signal)) => signal,
            Ok(None) => return,
            Err(_) => {
                warn!(
                    account_id = %account.id,
                    timeout_secs = self.config.eval_timeout_secs,
                    "Evaluation timed out"
                );
                self.sink.publish(PilotEvent::CycleMissed {
                    account_id: account.id.clone(),
                    reason: "evaluation timeout".to_string(),
                });
                return;
            }
        };

        self.handle_signal(account, signal).await;
    }

    /// 시세를 모으고 전략을 평가해 신호를 만듭니다.
    async fn prepare_signal(&self, account: &AccountConfig) -> Option<Signal> {
        let snapshots = self.gateway.snapshots(&account.instruments).await;
        if snapshots.is_empty() {
            // 신선한 시세가 하나도 없으면 이번 사이클은 조용히 포기 (fail-closed)
            debug!(account_id = %account.id, "No usable snapshots, skipping cycle");
            return None;
        }

        let Some(strategy) = self.strategies.get(&account.strategy_id) else {
            error!(
                account_id = %account.id,
                strategy_id = %account.strategy_id,
                "Account references unknown strategy"
            );
            return None;
        };

        let open_positions = self.book.for_account(&account.id).await;

        match strategy
            .evaluate(account, &snapshots, &open_positions)
            .await
        {
            Ok(signal) => signal,
            Err(e) => {
                warn!(
                    account_id = %account.id,
                    strategy_id = %account.strategy_id,
                    error = %e,
                    "Strategy evaluation failed"
                );
                None
            }
        }
    }

    /// 신호를 리스크 게이트와 실행기로 넘깁니다. 승인은 항상 제출보다
    /// 먼저 일어납니다.
    async fn handle_signal(&self, account: &AccountConfig, mut signal: Signal) {
        info!(
            account_id = %account.id,
            signal_id = %signal.id,
            instrument = %signal.instrument,
            side = %signal.side,
            entry = %signal.entry_price,
            "Signal generated"
        );
        self.sink.publish(PilotEvent::SignalGenerated {
            account_id: account.id.clone(),
            strategy_id: signal.strategy_id.clone(),
            signal_id: signal.id,
            instrument: signal.instrument.clone(),
            side: signal.side,
            entry_price: signal.entry_price,
        });

        let reservation = match self.risk.approve(account, &signal, Utc::now()).await {
            RiskDecision::Approved(reservation) => {
                signal.transition(fxpilot_core::SignalStatus::Approved);
                reservation
            }
            RiskDecision::Rejected(rejection) => {
                signal.transition(fxpilot_core::SignalStatus::Rejected);
                self.sink.publish(PilotEvent::SignalRejected {
                    account_id: account.id.clone(),
                    signal_id: signal.id,
                    instrument: signal.instrument.clone(),
                    reason_code: rejection.code().to_string(),
                    reason: rejection.to_string(),
                });
                return;
            }
        };

        signal.transition(fxpilot_core::SignalStatus::Submitted);
        let outcome = self.executor.submit(account, &mut signal, reservation).await;
        debug!(
            account_id = %account.id,
            signal_id = %signal.id,
            status = %signal.status,
            outcome = ?outcome,
            "Submission finished"
        );
    }

    /// 종료 시 인플라이트 평가가 끝나기를 유예 시간만큼 기다린 뒤,
    /// 그래도 남은 태스크는 강제 중단합니다.
    async fn drain(&self) {
        let grace = self.config.shutdown_grace();
        let deadline = tokio::time::Instant::now() + grace;

        loop {
            if self.in_flight.lock().await.is_empty() {
                info!("All in-flight evaluations finished");
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                let remaining = self.in_flight.lock().await.len();
                warn!(remaining, "Shutdown grace elapsed, aborting remaining evaluations");
                for handle in self.tasks.lock().await.drain(..) {
                    handle.abort();
                }
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    }
}
