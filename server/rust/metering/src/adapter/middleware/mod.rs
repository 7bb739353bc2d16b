pub mod admin_auth;
pub mod http_metrics;
