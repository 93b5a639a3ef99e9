//! HTTP 路由模块
//!
//! 路由结构：
//! - `POST /`        - Firestore 文档事件入口（CloudEvent）
//! - `GET /healthz`  - 存活检查
//! - `GET /metrics`  - Prometheus 指标

pub mod events;
pub mod ops;

use axum::Router;
use crate::http::HttpServerState;

/// 创建所有路由
pub fn create_routes() -> Router<HttpServerState> {
    Router::new()
        .merge(events::create_route())     // POST /
        .merge(ops::create_route())        // GET /healthz, GET /metrics
}
