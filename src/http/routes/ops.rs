//! 运维路由
//!
//! - GET /healthz：存活检查
//! - GET /metrics：Prometheus 抓取端点，指标未启用时返回 503

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::http::HttpServerState;
use crate::infra::metrics;

pub fn create_route() -> Router<HttpServerState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(prometheus_metrics))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn prometheus_metrics() -> Response {
    match metrics::render_metrics() {
        Some(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics disabled").into_response(),
    }
}
