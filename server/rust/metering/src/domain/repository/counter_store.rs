use async_trait::async_trait;

/// 上限付きインクリメントの結果。admitted=false のとき count は増分前の値。
#[derive(Debug, Clone, Copy)]
pub struct CounterDecision {
    pub admitted: bool,
    pub count: u64,
}

/// 日次使用量カウンターの永続化ポート。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageCounterStore: Send + Sync {
    /// カウンターが ceiling 未満なら 1 増やして admitted=true を返す。
    /// 読んでから書くのではなく、比較と増分を単一の原子的操作として行うこと。
    async fn increment_with_ceiling(&self, key: &str, ceiling: u64)
        -> anyhow::Result<CounterDecision>;

    /// 現在値を返す。キーが存在しなければ 0。
    async fn get(&self, key: &str) -> anyhow::Result<u64>;
}
