//! 주문 실행.
//!
//! 승인된 신호를 브로커 주문으로 바꿉니다. 일시 에러는 지수 백오프로
//! 재시도하고, 재제출 전에는 멱등성 토큰으로 기존 체결 여부를
//! 확인합니다. 최종 실패 시에는 리스크 예약을 정확히 한 번
//! 보상 해제합니다.

pub mod executor;

pub use executor::{OrderExecutor, SubmitOutcome, SubmitState};
