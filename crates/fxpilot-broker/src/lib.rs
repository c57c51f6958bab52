//! # FxPilot Broker
//!
//! 브로커 연동 계층을 제공합니다:
//! - `Broker` - 브로커 REST API 캐퍼빌리티 trait
//! - `MarketDataGateway` - 신선도 검증이 포함된 시세 게이트웨이 (fail-closed)
//! - `RestBroker` - HMAC 서명 기반 REST 커넥터
//! - `SimBroker` - 테스트/드라이런용 인메모리 브로커

pub mod error;
pub mod gateway;
pub mod rest;
pub mod sim;
pub mod traits;

pub use error::{BrokerError, BrokerResult};
pub use gateway::MarketDataGateway;
pub use rest::{RestBroker, RestBrokerConfig};
pub use sim::SimBroker;
pub use traits::*;
