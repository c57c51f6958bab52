//! 전략 캐퍼빌리티 및 레지스트리.
//!
//! 전략은 계좌 설정, 시세 스냅샷, 오픈 포지션을 입력으로 받아
//! 선택적으로 매매 신호를 생성합니다. 코어 상태를 변경하지 않으며,
//! 내부 메모리(예: 직전 가격)는 전략 자신이 관리합니다.

pub mod hold;
pub mod registry;
pub mod spread_guard;
pub mod traits;

pub use hold::HoldStrategy;
pub use registry::StrategyRegistry;
pub use spread_guard::{SpreadGuardConfig, SpreadGuardStrategy};
pub use traits::Strategy;
