use serde::Deserialize;

/// アプリケーション設定
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub admin: Option<AdminConfig>,
    #[serde(default)]
    pub log: LogConfig,
}

/// アプリ情報
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// サーバー設定
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Redis 設定。未設定の場合はインメモリカウンターで起動する。
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

/// クラス別の 1 日あたり上限
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_generation_limit")]
    pub generation: u64,
    #[serde(default = "default_chat_limit")]
    pub chat: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            generation: default_generation_limit(),
            chat: default_chat_limit(),
        }
    }
}

/// 管理者サーフェス設定。未設定なら管理者ルートはマウントされない。
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: i64,
}

/// ログ設定
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8099
}

fn default_key_prefix() -> String {
    "usage:".to_string()
}

fn default_generation_limit() -> u64 {
    10
}

fn default_chat_limit() -> u64 {
    50
}

fn default_token_ttl_seconds() -> i64 {
    planforge_admin_token::DEFAULT_TTL_SECONDS
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Config {
    /// YAML ファイルから設定を読み込む。
    /// 環境変数 PLANFORGE_ADMIN_SECRET が設定されていればファイルの値を上書きする。
    pub fn load(path: &str) -> anyhow::Result<Config> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        apply_admin_secret(&mut config, std::env::var("PLANFORGE_ADMIN_SECRET").ok());
        Ok(config)
    }
}

fn apply_admin_secret(config: &mut Config, secret: Option<String>) {
    if let Some(secret) = secret {
        match config.admin.as_mut() {
            Some(admin) => admin.secret = secret,
            None => {
                config.admin = Some(AdminConfig {
                    secret,
                    token_ttl_seconds: default_token_ttl_seconds(),
                });
            }
        }
    }
}
