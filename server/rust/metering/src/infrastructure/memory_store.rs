use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::repository::counter_store::{CounterDecision, UsageCounterStore};

/// インメモリ実装の使用量カウンターストア。
/// 開発・テスト用で、プロセスを越えてカウントは共有されない。
#[derive(Default)]
pub struct InMemoryUsageCounterStore {
    counters: RwLock<HashMap<String, u64>>,
}

impl InMemoryUsageCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageCounterStore for InMemoryUsageCounterStore {
    async fn increment_with_ceiling(
        &self,
        key: &str,
        ceiling: u64,
    ) -> anyhow::Result<CounterDecision> {
        // 比較と増分は同じ write ロックの中で行う
        let mut counters = self.counters.write().await;
        let current = counters.get(key).copied().unwrap_or(0);
        if current >= ceiling {
            return Ok(CounterDecision {
                admitted: false,
                count: current,
            });
        }
        let next = current + 1;
        counters.insert(key.to_string(), next);
        Ok(CounterDecision {
            admitted: true,
            count: next,
        })
    }

    async fn get(&self, key: &str) -> anyhow::Result<u64> {
        let counters = self.counters.read().await;
        Ok(counters.get(key).copied().unwrap_or(0))
    }
}
