//! HTTP 服务器 - 使用 Axum 接收事件

use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::Result;
use crate::http::routes;
use crate::service::WelcomeService;
use crate::trigger::DocumentPattern;

/// HTTP 服务器共享状态
#[derive(Clone)]
pub struct HttpServerState {
    pub welcome_service: Arc<WelcomeService>,
    pub document_pattern: Arc<DocumentPattern>,
}

impl HttpServerState {
    pub fn new(welcome_service: Arc<WelcomeService>, document_pattern: DocumentPattern) -> Self {
        Self {
            welcome_service,
            document_pattern: Arc::new(document_pattern),
        }
    }
}

/// 构建路由
pub fn build_router(state: HttpServerState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP 事件服务器
pub struct EventHttpServer {
    state: HttpServerState,
    bind_address: String,
}

impl EventHttpServer {
    pub fn new(state: HttpServerState, bind_address: String) -> Self {
        Self { state, bind_address }
    }

    /// 启动服务器，`shutdown` 完成后优雅退出
    pub async fn start<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = build_router(self.state.clone());

        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;

        info!("🌐 HTTP 事件入口启动在 {}", self.bind_address);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
