use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::TokenError;

type HmacSha256 = Hmac<Sha256>;

/// デフォルトのトークン有効期間（15分）。
pub const DEFAULT_TTL_SECONDS: i64 = 900;

/// SHA-256 HMAC の16進表現の長さ。署名部がこの長さでないトークンは
/// HMAC を計算するまでもなく不正。
const SIGNATURE_HEX_LEN: usize = 64;

/// IssuedToken は発行済みトークンとその失効時刻。
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// TokenSigner は `{expires_at_ms}:{signature}` 形式の短命署名トークンを発行・検証する。
///
/// - expires_at_ms は Unix ミリ秒の10進文字列
/// - signature は expires_at_ms 文字列に対する HMAC-SHA256 の16進表現
///
/// 検証は失効・改ざん・形式不正のすべてで false を返し、panic しない。
/// 失効以外のリプレイ対策は持たない（単一運用者の管理シークレット向け）。
#[derive(Clone)]
pub struct TokenSigner {
    secret: String,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenSigner {
    /// new は署名器を構築する。空のシークレットと非正の TTL は拒否する。
    pub fn new(secret: impl Into<String>, ttl_seconds: i64) -> Result<Self, TokenError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        if ttl_seconds <= 0 {
            return Err(TokenError::InvalidTtl(ttl_seconds));
        }
        Ok(Self {
            secret,
            ttl: Duration::seconds(ttl_seconds),
        })
    }

    /// issue は現在時刻から TTL 後に失効するトークンを発行する。
    pub fn issue(&self) -> IssuedToken {
        self.issue_at(Utc::now())
    }

    fn issue_at(&self, now: DateTime<Utc>) -> IssuedToken {
        let expires_at = now + self.ttl;
        let expiry = expires_at.timestamp_millis().to_string();
        let signature = sign(&self.secret, &expiry);
        IssuedToken {
            token: format!("{}:{}", expiry, signature),
            expires_at,
        }
    }

    /// verify はトークンを検証する。失効・改ざん・形式不正はすべて false。
    pub fn verify(&self, token: &str) -> bool {
        self.verify_at(token, Utc::now())
    }

    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        let (expiry, signature) = match token.split_once(':') {
            Some(parts) => parts,
            None => return false,
        };

        // 失効時刻部は issue が出力する形式（ASCII 数字のみ）だけを受け付ける。
        // パース後に再文字列化して署名するのではなく受信した文字列をそのまま署名対象に
        // するため、"+123" や "0123" のような別表記は署名不一致として弾かれる。
        if expiry.is_empty() || !expiry.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        let expires_at_ms = match expiry.parse::<i64>() {
            Ok(ms) => ms,
            // 桁あふれ
            Err(_) => return false,
        };
        if now.timestamp_millis() >= expires_at_ms {
            return false;
        }

        if signature.len() != SIGNATURE_HEX_LEN {
            return false;
        }
        let expected = sign(&self.secret, expiry);
        constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }

    /// secret_matches は候補文字列を設定済みシークレットと定数時間で比較する。
    /// 管理ログインのパスワード照合に使う。
    pub fn secret_matches(&self, candidate: &str) -> bool {
        constant_time_eq(self.secret.as_bytes(), candidate.as_bytes())
    }
}

fn sign(secret: &str, payload: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
