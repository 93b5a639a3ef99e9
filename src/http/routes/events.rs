//! 事件入口路由
//!
//! 路由：POST /
//!
//! 事件分发运行时以 CloudEvent 投递 Firestore 文档创建事件。
//! 只要欢迎推送服务处理过事件就返回 200（包括发送失败），避免运行时重投；
//! 不关心的事件返回 204；格式错误返回 400。

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, ServerError};
use crate::http::HttpServerState;
use crate::infra::metrics;
use crate::push::DeliveryOutcome;
use crate::trigger::{classify, TriggerDecision, TriggerEnvelope};

/// 创建事件路由
pub fn create_route() -> Router<HttpServerState> {
    Router::new().route("/", post(receive_event))
}

/// 事件处理回执
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventAck {
    pub event_id: String,
    pub token_id: String,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

async fn receive_event(
    State(state): State<HttpServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let event = match TriggerEnvelope::from_http(&headers, &body)
        .and_then(|envelope| classify(envelope, &state.document_pattern))
        .map_err(reject)?
    {
        TriggerDecision::Created(event) => event,
        TriggerDecision::Ignored(reason) => {
            debug!("[EVENTS] Event ignored: {}", reason);
            metrics::record_event("ignored");
            return Ok(StatusCode::NO_CONTENT.into_response());
        }
    };

    metrics::record_event("created");
    let outcome = state.welcome_service.on_token_created(&event).await;

    let message_id = match &outcome {
        DeliveryOutcome::Sent(id) => Some(id.to_string()),
        DeliveryOutcome::Failed(_) | DeliveryOutcome::Duplicate => None,
    };

    Ok((
        StatusCode::OK,
        Json(EventAck {
            event_id: event.event_id,
            token_id: event.token_id,
            outcome: outcome.as_str().to_string(),
            message_id,
        }),
    )
        .into_response())
}

fn reject(e: ServerError) -> ServerError {
    warn!("[EVENTS] Rejected malformed event: {}", e);
    metrics::record_event("rejected");
    e
}
