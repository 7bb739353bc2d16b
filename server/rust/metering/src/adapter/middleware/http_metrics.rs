use std::sync::Arc;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::infrastructure::metrics::Metrics;

/// リクエスト数をメソッド・ルート・ステータス別に数える。
/// パスはマッチしたルートテンプレートを使い、生の URI は使わない。
pub async fn track_requests(
    State(metrics): State<Arc<Metrics>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().to_string();
    let path = match req.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_string(),
        None => req.uri().path().to_string(),
    };

    let response = next.run(req).await;

    metrics.record_http_request(&method, &path, response.status().as_str());
    response
}
