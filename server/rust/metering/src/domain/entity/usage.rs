use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// 使用量を計上する主体。認証済みユーザーは ID で、未認証の呼び出し元は
/// ネットワークアドレスでバケットされる（NAT 配下の共有は許容済みのトレードオフ）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    User(String),
    Ip(String),
}

impl Identity {
    /// ユーザー ID があればそれを優先し、なければ呼び出し元アドレスにフォールバックする。
    pub fn resolve(user_id: Option<&str>, remote_addr: Option<&str>) -> Option<Self> {
        match user_id {
            Some(id) if !id.trim().is_empty() => Some(Identity::User(id.trim().to_string())),
            _ => remote_addr
                .filter(|a| !a.is_empty())
                .map(|a| Identity::Ip(a.to_string())),
        }
    }

    /// 正準形 `user:{id}` / `ip:{addr}` からパースする。
    pub fn parse(s: &str) -> Option<Self> {
        let (kind, rest) = s.split_once(':')?;
        if rest.is_empty() {
            return None;
        }
        match kind {
            "user" => Some(Identity::User(rest.to_string())),
            "ip" => Some(Identity::Ip(rest.to_string())),
            _ => None,
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identity::User(id) => write!(f, "user:{}", id),
            Identity::Ip(addr) => write!(f, "ip:{}", addr),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuotaClass {
    Generation,
    Chat,
}

impl QuotaClass {
    pub fn as_str(&self) -> &str {
        match self {
            QuotaClass::Generation => "generation",
            QuotaClass::Chat => "chat",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "generation" => Some(QuotaClass::Generation),
            "chat" => Some(QuotaClass::Chat),
            _ => None,
        }
    }
}

/// 無料プランのクラス別 1 日あたり上限。起動時に設定から固定される。
#[derive(Debug, Clone, Copy)]
pub struct QuotaLimits {
    pub generation: u64,
    pub chat: u64,
}

impl QuotaLimits {
    pub fn limit_for(&self, class: QuotaClass) -> u64 {
        match class {
            QuotaClass::Generation => self.generation,
            QuotaClass::Chat => self.chat,
        }
    }
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            generation: 10,
            chat: 50,
        }
    }
}

/// (クラス, 主体, UTC 日付) から日次カウンターのストレージキーを生成する。
/// 日付がキーに含まれるため、UTC の日付切り替わりでカウンターは自然にゼロから始まる。
pub fn day_key(class: QuotaClass, identity: &Identity, date: NaiveDate) -> String {
    format!("{}:{}:{}", class.as_str(), identity, date.format("%Y%m%d"))
}

fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive().succ_opt().unwrap_or(NaiveDate::MAX);
    tomorrow.and_time(NaiveTime::MIN).and_utc()
}

/// チェック&消費の結果。allowed=false のとき current は増分前の値のまま。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageDecision {
    pub allowed: bool,
    pub current: u64,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl UsageDecision {
    pub fn new(allowed: bool, current: u64, limit: u64, now: DateTime<Utc>) -> Self {
        let remaining = if current >= limit { 0 } else { limit - current };
        Self {
            allowed,
            current,
            limit,
            remaining,
            reset_at: next_utc_midnight(now),
        }
    }
}

/// 読み取り専用の使用量スナップショット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub current: u64,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl UsageSnapshot {
    pub fn new(current: u64, limit: u64, now: DateTime<Utc>) -> Self {
        let remaining = if current >= limit { 0 } else { limit - current };
        Self {
            current,
            limit,
            remaining,
            reset_at: next_utc_midnight(now),
        }
    }
}
