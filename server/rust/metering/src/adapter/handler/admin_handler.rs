use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::adapter::handler::{AppState, ErrorResponse};
use crate::domain::entity::{Identity, QuotaClass};
use crate::usecase::get_usage::{GetUsageError, GetUsageInput};
use crate::usecase::issue_admin_token::{IssueAdminTokenError, IssueAdminTokenInput};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminUsageQuery {
    pub identity: String,
    pub class: String,
}

/// POST /api/v1/admin/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> impl IntoResponse {
    let admin = match &state.admin {
        Some(admin) => admin,
        None => {
            // admin 設定が無いときこのルートはマウントされない
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new(
                    "SVC_ADMIN_NOT_CONFIGURED",
                    "admin surface is not configured",
                )),
            )
                .into_response();
        }
    };

    match admin
        .issue_token
        .execute(IssueAdminTokenInput {
            password: body.password,
        }) {
        Ok(issued) => {
            tracing::info!("admin token issued");
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "token": issued.token,
                    "expires_at": issued.expires_at,
                })),
            )
                .into_response()
        }
        Err(IssueAdminTokenError::InvalidCredentials) => {
            tracing::warn!("admin login rejected");
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(
                    "SVC_ADMIN_UNAUTHORIZED",
                    "invalid credentials",
                )),
            )
                .into_response()
        }
    }
}

/// GET /api/v1/admin/usage
pub async fn get_identity_usage(
    State(state): State<AppState>,
    Query(query): Query<AdminUsageQuery>,
) -> impl IntoResponse {
    let class = match QuotaClass::from_str(&query.class) {
        Some(class) => class,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    "SVC_METERING_VALIDATION",
                    &format!("unknown quota class: {}", query.class),
                )),
            )
                .into_response();
        }
    };

    let identity = match Identity::parse(&query.identity) {
        Some(identity) => identity,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    "SVC_METERING_VALIDATION",
                    "identity must be in user:{id} or ip:{addr} form",
                )),
            )
                .into_response();
        }
    };

    match state
        .get_usage
        .execute(GetUsageInput {
            identity: identity.clone(),
            class,
        })
        .await
    {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "identity": identity.to_string(),
                "class": class.as_str(),
                "usage": snapshot,
            })),
        )
            .into_response(),
        Err(GetUsageError::StoreUnavailable(message)) => {
            tracing::error!("usage counter store unavailable: {}", message);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new(
                    "SVC_METERING_STORE_UNAVAILABLE",
                    "usage counter store is unavailable",
                )),
            )
                .into_response()
        }
    }
}
