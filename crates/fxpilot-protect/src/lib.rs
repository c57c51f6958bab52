//! 포지션 보호.
//!
//! 체결된 포지션은 보호 루프가 주기적으로 점검하며, 수익 구간에 따라
//! 손절 이동과 부분청산 단계를 적용합니다. 단계는 전진만 하며,
//! 브로커 확인 전에는 어떤 단계 전이도 기록되지 않습니다.

pub mod book;
pub mod protector;

pub use book::PositionBook;
pub use protector::PositionProtector;
