//! HTTP 服务器模块 - 使用 Axum 提供事件入口
//!
//! 功能包括：
//! - Firestore 文档创建事件接收
//! - 存活检查
//! - Prometheus 指标

pub mod routes;
pub mod server;

pub use server::{build_router, EventHttpServer, HttpServerState};
