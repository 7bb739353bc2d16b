use std::net::SocketAddr;
use std::sync::Arc;

use planforge_admin_token::TokenSigner;
use planforge_metering_server::adapter::handler::{self, AdminState, AppState};
use planforge_metering_server::domain::entity::QuotaLimits;
use planforge_metering_server::domain::repository::UsageCounterStore;
use planforge_metering_server::infrastructure::config::Config;
use planforge_metering_server::infrastructure::memory_store::InMemoryUsageCounterStore;
use planforge_metering_server::infrastructure::metrics::Metrics;
use planforge_metering_server::infrastructure::redis_store::RedisUsageCounterStore;
use planforge_metering_server::infrastructure::telemetry;
use planforge_metering_server::usecase::{
    ConsumeUsageUseCase, GetUsageUseCase, IssueAdminTokenUseCase,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/config.yaml".to_string());
    let config = Config::load(&config_path)?;

    telemetry::init_telemetry(&config.log.level, &config.log.format);

    tracing::info!(
        name = %config.app.name,
        version = %config.app.version,
        environment = %config.app.environment,
        "starting metering server"
    );

    let store = build_store(&config).await;

    let limits = QuotaLimits {
        generation: config.limits.generation,
        chat: config.limits.chat,
    };
    tracing::info!(
        generation = limits.generation,
        chat = limits.chat,
        "daily limits loaded"
    );

    let metrics = Arc::new(Metrics::new(&config.app.name));
    let mut state = AppState::new(
        Arc::new(ConsumeUsageUseCase::new(store.clone(), limits)),
        Arc::new(GetUsageUseCase::new(store, limits)),
        metrics,
    );

    match config.admin.as_ref() {
        Some(admin) => {
            // 空のシークレットは TokenSigner が拒否するため、ここで起動が止まる
            let signer = Arc::new(TokenSigner::new(
                admin.secret.clone(),
                admin.token_ttl_seconds,
            )?);
            state = state.with_admin(AdminState {
                issue_token: Arc::new(IssueAdminTokenUseCase::new(signer.clone())),
                signer,
            });
            tracing::info!("admin surface enabled");
        }
        None => {
            tracing::warn!("no admin secret configured, admin routes are not mounted");
        }
    }

    let app = handler::router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn build_store(config: &Config) -> Arc<dyn UsageCounterStore> {
    match config.redis.as_ref() {
        Some(redis_config) => match redis::Client::open(redis_config.url.clone()) {
            Ok(client) => match redis::aio::ConnectionManager::new(client).await {
                Ok(conn) => {
                    tracing::info!("connected to Redis, usage counters are durable");
                    Arc::new(RedisUsageCounterStore::new(
                        conn,
                        redis_config.key_prefix.clone(),
                    ))
                }
                Err(e) => {
                    tracing::warn!(
                        "failed to connect to Redis ({}), falling back to in-memory usage counters",
                        e
                    );
                    Arc::new(InMemoryUsageCounterStore::new())
                }
            },
            Err(e) => {
                tracing::warn!(
                    "invalid Redis URL ({}), falling back to in-memory usage counters",
                    e
                );
                Arc::new(InMemoryUsageCounterStore::new())
            }
        },
        None => {
            tracing::info!("no redis configuration found, using in-memory usage counters");
            Arc::new(InMemoryUsageCounterStore::new())
        }
    }
}
