//! 엔진 배선 및 스케줄러.
//!
//! 고정 간격 스케줄러가 활성 계좌마다 평가 태스크를 띄우고,
//! 보호 루프가 오픈 포지션을 관리합니다. 두 루프 모두
//! `CancellationToken`으로 협조적으로 종료됩니다.

pub mod plan;
pub mod scheduler;

pub use plan::TradingPlan;
pub use scheduler::Scheduler;
