//! 전략 레지스트리.

use std::collections::HashMap;
use std::sync::Arc;

use fxpilot_core::{PilotError, PilotResult};
use tracing::info;

use crate::traits::Strategy;

/// 전략 ID -> 구현체 매핑.
///
/// 기동 시점에 채워지며 이후 읽기 전용으로 사용됩니다.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 전략을 등록합니다. 중복 ID는 거부됩니다.
    pub fn register(&mut self, strategy: Arc<dyn Strategy>) -> PilotResult<()> {
        let id = strategy.id().to_string();
        if self.strategies.contains_key(&id) {
            return Err(PilotError::Strategy(format!(
                "duplicate strategy id: {}",
                id
            )));
        }

        info!(strategy_id = %id, name = %strategy.name(), "Strategy registered");
        self.strategies.insert(id, strategy);
        Ok(())
    }

    /// ID로 전략을 조회합니다.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Strategy>> {
        self.strategies.get(id).cloned()
    }

    /// 등록된 전략 ID 목록을 반환합니다 (정렬됨).
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.strategies.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// 등록된 전략 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// 레지스트리가 비었는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
