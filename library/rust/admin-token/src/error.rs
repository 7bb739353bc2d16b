/// TokenError は署名器の構成エラーを表す。
/// シークレット未設定のままトークンを発行することを防ぐため、構築時に検証する。
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("signing secret must not be empty")]
    EmptySecret,

    #[error("token ttl must be positive, got {0}")]
    InvalidTtl(i64),
}
