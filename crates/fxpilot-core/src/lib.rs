//! # FxPilot Core
//!
//! 자동매매 엔진의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 계좌 설정 및 리스크 설정
//! - 시세 스냅샷
//! - 매매 신호 및 생명주기
//! - 포지션 및 보호 단계
//! - 뉴스 블랙아웃 윈도우
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
