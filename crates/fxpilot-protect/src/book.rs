//! 오픈 포지션 장부.

use std::collections::HashMap;
use std::sync::Arc;

use fxpilot_core::Position;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

/// 오픈 포지션 장부.
///
/// 포지션별 세분화 락을 제공합니다. 보호 루프는 점검과 주문을
/// 하나의 락 구간 안에서 수행하므로, 같은 포지션에 대한 점검이
/// 겹치지 않습니다.
#[derive(Default)]
pub struct PositionBook {
    positions: RwLock<HashMap<Uuid, Arc<Mutex<Position>>>>,
}

impl PositionBook {
    /// 빈 장부를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 체결된 포지션을 장부에 추가합니다.
    pub async fn insert(&self, position: Position) -> Arc<Mutex<Position>> {
        info!(
            position_id = %position.id,
            account_id = %position.account_id,
            instrument = %position.instrument,
            size = %position.size,
            "Position opened"
        );

        let id = position.id;
        let handle = Arc::new(Mutex::new(position));
        self.positions.write().await.insert(id, handle.clone());
        handle
    }

    /// ID로 포지션 핸들을 조회합니다.
    pub async fn get(&self, id: Uuid) -> Option<Arc<Mutex<Position>>> {
        self.positions.read().await.get(&id).cloned()
    }

    /// 청산된 포지션을 장부에서 제거합니다.
    pub async fn remove(&self, id: Uuid) -> Option<Arc<Mutex<Position>>> {
        self.positions.write().await.remove(&id)
    }

    /// 현재 포지션 ID 목록의 스냅샷을 반환합니다.
    pub async fn ids(&self) -> Vec<Uuid> {
        self.positions.read().await.keys().copied().collect()
    }

    /// 계좌의 오픈 포지션 사본 목록을 반환합니다 (전략 입력용).
    pub async fn for_account(&self, account_id: &str) -> Vec<Position> {
        let handles: Vec<_> = self.positions.read().await.values().cloned().collect();

        let mut result = Vec::new();
        for handle in handles {
            let position = handle.lock().await;
            if position.account_id == account_id {
                result.push(position.clone());
            }
        }
        result
    }

    /// 오픈 포지션 수를 반환합니다.
    pub async fn len(&self) -> usize {
        self.positions.read().await.len()
    }

    /// 장부가 비었는지 확인합니다.
    pub async fn is_empty(&self) -> bool {
        self.positions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxpilot_core::Side;
    use rust_decimal_macros::dec;

    fn position(account_id: &str) -> Position {
        Position::new(
            account_id,
            "EUR_USD",
            Side::Buy,
            dec!(1.1000),
            dec!(1.0950),
            dec!(1.1200),
            dec!(10000),
            dec!(1),
            Uuid::new_v4(),
            "t-1",
        )
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let book = PositionBook::new();
        let handle = book.insert(position("a1")).await;
        let id = handle.lock().await.id;

        assert_eq!(book.len().await, 1);
        assert!(book.get(id).await.is_some());

        book.remove(id).await;
        assert!(book.is_empty().await);
    }

    #[tokio::test]
    async fn test_for_account_filters_by_owner() {
        let book = PositionBook::new();
        book.insert(position("a1")).await;
        book.insert(position("a1")).await;
        book.insert(position("a2")).await;

        assert_eq!(book.for_account("a1").await.len(), 2);
        assert_eq!(book.for_account("a2").await.len(), 1);
        assert_eq!(book.for_account("a3").await.len(), 0);
    }
}
