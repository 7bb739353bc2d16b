use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use planforge_admin_token::TokenSigner;

use crate::adapter::handler::ErrorResponse;
use crate::infrastructure::metrics::Metrics;

/// 管理者ルートを守るミドルウェアの状態
#[derive(Clone)]
pub struct AdminAuthState {
    pub signer: Arc<TokenSigner>,
    pub metrics: Arc<Metrics>,
}

/// Authorization: Bearer のトークンを検証する。
/// 失敗理由（欠落・不正形式・期限切れ・改竄）は応答から区別できないこと。
pub async fn require_admin_token(
    State(state): State<AdminAuthState>,
    req: Request,
    next: Next,
) -> Response {
    let accepted = match extract_bearer_token(req.headers()) {
        Some(token) => state.signer.verify(&token),
        None => false,
    };

    if accepted {
        state.metrics.record_admin_verification("accepted");
        return next.run(req).await;
    }

    state.metrics.record_admin_verification("rejected");
    tracing::warn!("admin request rejected");
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(
            "SVC_ADMIN_UNAUTHORIZED",
            "Authentication is required. Please provide a valid Bearer token.",
        )),
    )
        .into_response()
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn guarded_router(signer: Arc<TokenSigner>) -> Router {
        let state = AdminAuthState {
            signer,
            metrics: Arc::new(Metrics::new("test-metering")),
        };
        Router::new().route(
            "/guarded",
            get(|| async { "ok" }).route_layer(axum::middleware::from_fn_with_state(
                state,
                require_admin_token,
            )),
        )
    }

    fn signer(ttl_seconds: i64) -> Arc<TokenSigner> {
        Arc::new(TokenSigner::new("test-secret", ttl_seconds).unwrap())
    }

    async fn response_body(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn test_extract_bearer_token_missing_header() {
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_extract_bearer_token_wrong_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic abc123".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_extract_bearer_token_empty_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn test_valid_token_passes_through() {
        let signer = signer(900);
        let token = signer.issue().token;
        let app = guarded_router(signer);

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/guarded")
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_header_is_rejected() {
        let app = guarded_router(signer(900));
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/guarded")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_rejection_does_not_reveal_failure_reason() {
        let signer = signer(1);
        let expired = signer.issue().token;
        tokio::time::sleep(std::time::Duration::from_millis(1200)).await;

        let mut tampered = signer.issue().token;
        let flipped = if tampered.ends_with('0') { '1' } else { '0' };
        tampered.pop();
        tampered.push(flipped);

        let mut bodies = Vec::new();
        for token in [expired, tampered, "garbage".to_string()] {
            let app = guarded_router(signer.clone());
            let response = app
                .oneshot(
                    HttpRequest::builder()
                        .uri("/guarded")
                        .header("authorization", format!("Bearer {}", token))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            bodies.push(response_body(response).await);
        }

        // request_id 以外は全ケースで同一の封筒を返す
        for body in &bodies {
            assert_eq!(body["error"]["code"], bodies[0]["error"]["code"]);
            assert_eq!(body["error"]["message"], bodies[0]["error"]["message"]);
        }
    }
}
