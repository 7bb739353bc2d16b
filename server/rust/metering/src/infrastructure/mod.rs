pub mod config;
pub mod memory_store;
pub mod metrics;
pub mod redis_store;
pub mod telemetry;
