//! 事件入口指标测试（独立进程：安装全局 Prometheus Recorder）

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use fertilityshare_notifier::http::{build_router, HttpServerState};
use fertilityshare_notifier::infra::metrics;
use fertilityshare_notifier::push::MockProvider;
use fertilityshare_notifier::service::{WelcomeService, WelcomeTemplate};
use fertilityshare_notifier::trigger::{DocumentPattern, DOCUMENT_CREATED_EVENT_TYPE};

#[tokio::test]
async fn test_event_without_document_path_counts_as_rejected() {
    metrics::init().unwrap();

    let provider = Arc::new(MockProvider::new());
    let service = WelcomeService::new(provider.clone(), WelcomeTemplate::default());
    let pattern = DocumentPattern::parse("device_tokens/{tokenId}").unwrap();
    let app = build_router(HttpServerState::new(Arc::new(service), pattern));

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .header("ce-id", "evt-np")
        .header("ce-type", DOCUMENT_CREATED_EVENT_TYPE)
        .body(Body::from("{}"))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(provider.send_count(), 0);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(
        text.contains(r#"notifier_events_total{result="rejected"} 1"#),
        "{}",
        text
    );
}
