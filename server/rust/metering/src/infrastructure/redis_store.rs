use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::domain::repository::counter_store::{CounterDecision, UsageCounterStore};

/// 上限チェックと増分を単一の往復で原子的に行う Lua スクリプト。
/// KEYS[1]: カウンターキー, ARGV[1]: 上限, ARGV[2]: 有効期限（秒）
/// 戻り値: {admitted, count}
const CEILING_INCR_SCRIPT: &str = r"
local count = tonumber(redis.call('GET', KEYS[1]) or '0')
local admitted = 0
if count < tonumber(ARGV[1]) then
    count = redis.call('INCR', KEYS[1])
    if count == 1 then
        redis.call('EXPIRE', KEYS[1], ARGV[2])
    end
    admitted = 1
end
return {admitted, count}
";

/// キーの有効期限。日付はキー自体に含まれるため、期限は掃除のためだけにある。
/// 翌日いっぱいまで残せば日付境界をまたぐ読み取りにも十分。
const KEY_TTL_SECONDS: i64 = 2 * 24 * 60 * 60;

/// Redis 実装の使用量カウンターストア
pub struct RedisUsageCounterStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisUsageCounterStore {
    pub fn new(conn: ConnectionManager, key_prefix: String) -> Self {
        Self { conn, key_prefix }
    }

    fn make_key(&self, key: &str) -> String {
        build_key(&self.key_prefix, key)
    }
}

fn build_key(prefix: &str, key: &str) -> String {
    format!("{}{}", prefix, key)
}

#[async_trait]
impl UsageCounterStore for RedisUsageCounterStore {
    async fn increment_with_ceiling(
        &self,
        key: &str,
        ceiling: u64,
    ) -> anyhow::Result<CounterDecision> {
        let redis_key = self.make_key(key);
        let result: Vec<i64> = redis::Script::new(CEILING_INCR_SCRIPT)
            .key(&redis_key)
            .arg(ceiling)
            .arg(KEY_TTL_SECONDS)
            .invoke_async(&mut self.conn.clone())
            .await?;

        if result.len() < 2 {
            return Err(anyhow::anyhow!("unexpected Lua script result"));
        }

        Ok(CounterDecision {
            admitted: result[0] == 1,
            count: result[1].max(0) as u64,
        })
    }

    async fn get(&self, key: &str) -> anyhow::Result<u64> {
        let redis_key = self.make_key(key);
        let count: Option<u64> = redis::cmd("GET")
            .arg(&redis_key)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(count.unwrap_or(0))
    }
}
