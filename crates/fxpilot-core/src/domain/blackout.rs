//! 뉴스 블랙아웃 윈도우.
//!
//! 예정된 시장 이벤트 전후로 신규 진입을 차단하는 시간 구간입니다.
//! 읽기 전용 참조 데이터이며, 갱신 메커니즘은 범위 밖입니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 블랙아웃 윈도우.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackoutWindow {
    /// 영향을 받는 인스트루먼트 목록
    pub instruments: Vec<String>,
    /// 이벤트 시작 시각
    pub start: DateTime<Utc>,
    /// 이벤트 종료 시각
    pub end: DateTime<Utc>,
    /// 이벤트 설명 (로그용)
    #[serde(default)]
    pub description: String,
}

impl BlackoutWindow {
    /// 새 블랙아웃 윈도우를 생성합니다.
    pub fn new(instruments: Vec<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            instruments,
            start,
            end,
            description: String::new(),
        }
    }

    /// 설명을 설정합니다.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 버퍼가 적용된 구간 `[start - pre, end + post]` 안에서
    /// 해당 인스트루먼트의 진입을 차단하는지 확인합니다.
    pub fn blocks(
        &self,
        instrument: &str,
        at: DateTime<Utc>,
        pre_buffer: chrono::Duration,
        post_buffer: chrono::Duration,
    ) -> bool {
        if !self.instruments.iter().any(|i| i == instrument) {
            return false;
        }
        at >= self.start - pre_buffer && at <= self.end + post_buffer
    }
}
