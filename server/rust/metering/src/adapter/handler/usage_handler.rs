use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::adapter::handler::{AppState, ErrorResponse};
use crate::domain::entity::{Identity, QuotaClass, UsageDecision};
use crate::usecase::consume_usage::{ConsumeUsageError, ConsumeUsageInput};
use crate::usecase::get_usage::{GetUsageError, GetUsageInput};

#[derive(Debug, Deserialize)]
pub struct CheckUsageRequest {
    pub class: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetUsageQuery {
    pub class: String,
    pub user_id: Option<String>,
}

/// POST /api/v1/usage/check
pub async fn check_usage(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(body): Json<CheckUsageRequest>,
) -> impl IntoResponse {
    let class = match QuotaClass::from_str(&body.class) {
        Some(class) => class,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    "SVC_METERING_VALIDATION",
                    &format!("unknown quota class: {}", body.class),
                )),
            )
                .into_response();
        }
    };

    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let identity = match resolve_identity(body.user_id.as_deref(), &headers, peer) {
        Some(identity) => identity,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    "SVC_METERING_VALIDATION",
                    "caller identity could not be determined",
                )),
            )
                .into_response();
        }
    };

    match state
        .consume_usage
        .execute(ConsumeUsageInput {
            identity: identity.clone(),
            class,
        })
        .await
    {
        Ok(decision) if decision.allowed => {
            state.metrics.record_usage_check(class.as_str(), "allowed");
            tracing::info!(
                class = class.as_str(),
                identity = %identity,
                current = decision.current,
                "usage admitted"
            );
            (StatusCode::OK, Json(decision)).into_response()
        }
        Ok(decision) => {
            state.metrics.record_usage_check(class.as_str(), "denied");
            tracing::info!(
                class = class.as_str(),
                identity = %identity,
                limit = decision.limit,
                "usage denied, daily limit reached"
            );
            let envelope = ErrorResponse::new(
                "SVC_METERING_QUOTA_EXCEEDED",
                &exceeded_message(class, &decision),
            );
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": envelope.error,
                    "usage": decision,
                })),
            )
                .into_response()
        }
        Err(ConsumeUsageError::StoreUnavailable(message)) => {
            state.metrics.record_usage_check(class.as_str(), "error");
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

/// GET /api/v1/usage
pub async fn get_usage(
    State(state): State<AppState>,
    Query(query): Query<GetUsageQuery>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
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

    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let identity = match resolve_identity(query.user_id.as_deref(), &headers, peer) {
        Some(identity) => identity,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    "SVC_METERING_VALIDATION",
                    "caller identity could not be determined",
                )),
            )
                .into_response();
        }
    };

    match state
        .get_usage
        .execute(GetUsageInput { identity, class })
        .await
    {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
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

/// ユーザー ID があればそれを、なければ X-Forwarded-For の先頭ホップ、
/// それも無ければソケットのピアアドレスで主体を決める。
fn resolve_identity(
    user_id: Option<&str>,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> Option<Identity> {
    let remote = forwarded_client_ip(headers).or_else(|| peer.map(|addr| addr.ip().to_string()));
    Identity::resolve(user_id, remote.as_deref())
}

fn forwarded_client_ip(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("x-forwarded-for")?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    // IP として解釈できない値は採用しない
    first.parse::<IpAddr>().ok().map(|ip| ip.to_string())
}

fn exceeded_message(class: QuotaClass, decision: &UsageDecision) -> String {
    format!(
        "daily {} limit reached ({}/{}), upgrade to Pro to continue",
        class.as_str(),
        decision.current,
        decision.limit
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::handler::{router, AppState};
    use crate::domain::entity::QuotaLimits;
    use crate::domain::repository::counter_store::MockUsageCounterStore;
    use crate::infrastructure::metrics::Metrics;
    use crate::usecase::{ConsumeUsageUseCase, GetUsageUseCase};
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state_with_store(store: MockUsageCounterStore) -> AppState {
        let store: Arc<dyn crate::domain::repository::UsageCounterStore> = Arc::new(store);
        let limits = QuotaLimits::default();
        AppState::new(
            Arc::new(ConsumeUsageUseCase::new(store.clone(), limits)),
            Arc::new(GetUsageUseCase::new(store, limits)),
            Arc::new(Metrics::new("test-metering")),
        )
    }

    #[test]
    fn test_resolve_identity_prefers_user_id() {
        let headers = HeaderMap::new();
        let peer = Some("203.0.113.7:443".parse().unwrap());
        assert_eq!(
            resolve_identity(Some("user-42"), &headers, peer),
            Some(Identity::User("user-42".to_string()))
        );
    }

    #[test]
    fn test_resolve_identity_uses_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        let peer = Some("10.0.0.1:443".parse().unwrap());
        assert_eq!(
            resolve_identity(None, &headers, peer),
            Some(Identity::Ip("203.0.113.7".to_string()))
        );
    }

    #[test]
    fn test_resolve_identity_ignores_unparseable_forwarded_value() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "not-an-ip".parse().unwrap());
        let peer = Some("198.51.100.2:443".parse().unwrap());
        assert_eq!(
            resolve_identity(None, &headers, peer),
            Some(Identity::Ip("198.51.100.2".to_string()))
        );
    }

    #[test]
    fn test_resolve_identity_none_without_any_source() {
        let headers = HeaderMap::new();
        assert_eq!(resolve_identity(None, &headers, None), None);
    }

    #[test]
    fn test_exceeded_message_mentions_upgrade() {
        let decision = UsageDecision::new(false, 10, 10, Utc::now());
        let message = exceeded_message(QuotaClass::Generation, &decision);
        assert!(message.contains("generation"));
        assert!(message.contains("10/10"));
        assert!(message.contains("upgrade"));
    }

    #[tokio::test]
    async fn test_check_usage_rejects_unknown_class() {
        // ストアに expect を立てない。バリデーションで弾かれるので呼ばれないはず
        let app = router(state_with_store(MockUsageCounterStore::new()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/usage/check")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"class":"export","user_id":"user-42"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "SVC_METERING_VALIDATION");
        assert!(json["error"]["request_id"].is_string());
    }

    #[tokio::test]
    async fn test_check_usage_returns_503_when_store_is_down() {
        let mut mock = MockUsageCounterStore::new();
        mock.expect_increment_with_ceiling()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("connection refused")));
        let app = router(state_with_store(mock));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/usage/check")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"class":"generation","user_id":"user-42"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "SVC_METERING_STORE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_get_usage_returns_503_when_store_is_down() {
        let mut mock = MockUsageCounterStore::new();
        mock.expect_get()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("connection refused")));
        let app = router(state_with_store(mock));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/usage?class=chat&user_id=user-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
