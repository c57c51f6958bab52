//! 리스크 게이트.
//!
//! 승인된 신호만 주문 실행으로 넘어갑니다. 게이트는 계좌별 리스크
//! 상태를 추적하며, 승인과 동시에 리스크 예산을 원자적으로 예약합니다.
//! 거부는 에러가 아니라 정상적인 값입니다.

pub mod gate;
pub mod state;

pub use gate::{RiskDecision, RiskGate, RiskRejection, RiskReservation};
pub use state::RiskState;
