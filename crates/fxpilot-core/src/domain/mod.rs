//! 핵심 도메인 모델.

pub mod account;
pub mod blackout;
pub mod market;
pub mod position;
pub mod signal;

pub use account::*;
pub use blackout::*;
pub use market::*;
pub use position::*;
pub use signal::*;
