pub mod admin_handler;
pub mod health;
pub mod usage_handler;

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use planforge_admin_token::TokenSigner;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::adapter::middleware::{admin_auth, http_metrics};
use crate::infrastructure::metrics::Metrics;
use crate::usecase::{ConsumeUsageUseCase, GetUsageUseCase, IssueAdminTokenUseCase};

/// 共通のエラー応答封筒
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub request_id: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
                request_id: uuid::Uuid::new_v4().to_string(),
            },
        }
    }
}

/// ハンドラー間で共有される状態
#[derive(Clone)]
pub struct AppState {
    pub consume_usage: Arc<ConsumeUsageUseCase>,
    pub get_usage: Arc<GetUsageUseCase>,
    pub admin: Option<AdminState>,
    pub metrics: Arc<Metrics>,
}

/// 管理者サーフェスの状態。admin 設定があるときだけ存在する。
#[derive(Clone)]
pub struct AdminState {
    pub issue_token: Arc<IssueAdminTokenUseCase>,
    pub signer: Arc<TokenSigner>,
}

impl AppState {
    pub fn new(
        consume_usage: Arc<ConsumeUsageUseCase>,
        get_usage: Arc<GetUsageUseCase>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            consume_usage,
            get_usage,
            admin: None,
            metrics,
        }
    }

    pub fn with_admin(mut self, admin: AdminState) -> Self {
        self.admin = Some(admin);
        self
    }
}

/// ルーターを構築する。admin 状態が無ければ管理者ルートはマウントされない。
pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/usage/check", post(usage_handler::check_usage))
        .route("/api/v1/usage", get(usage_handler::get_usage));

    if let Some(admin) = &state.admin {
        let auth_state = admin_auth::AdminAuthState {
            signer: admin.signer.clone(),
            metrics: state.metrics.clone(),
        };
        router = router
            .route("/api/v1/admin/login", post(admin_handler::login))
            .route(
                "/api/v1/admin/usage",
                get(admin_handler::get_identity_usage).route_layer(
                    axum::middleware::from_fn_with_state(
                        auth_state,
                        admin_auth::require_admin_token,
                    ),
                ),
            );
    }

    router
        .layer(axum::middleware::from_fn_with_state(
            state.metrics.clone(),
            http_metrics::track_requests,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.metrics.gather(),
    )
}
