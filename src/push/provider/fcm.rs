use crate::error::{Result, ServerError};
use crate::push::provider::credentials::AccessTokenSource;
use crate::push::provider::provider_trait::PushProvider;
use crate::push::types::{MessageId, PushMessage};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

pub const DEFAULT_FCM_API_BASE_URL: &str = "https://fcm.googleapis.com";

/// FCM (Firebase Cloud Messaging) Provider
///
/// 使用 FCM HTTP v1 API
pub struct FcmProvider {
    client: Client,
    api_base_url: String,
    project_id: String,
    credentials: AccessTokenSource,
}

#[derive(Debug, Deserialize)]
struct FcmSendResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FcmErrorEnvelope {
    error: FcmErrorBody,
}

#[derive(Debug, Deserialize)]
struct FcmErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<FcmErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct FcmErrorDetail {
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

impl FcmProvider {
    /// 创建新的 FCM Provider
    ///
    /// # 参数
    /// - client: 共享的 HTTP client（超时在构建 client 时设置）
    /// - project_id: Firebase 项目 ID
    /// - credentials: OAuth 2.0 access token 来源
    pub fn new(client: Client, project_id: String, credentials: AccessTokenSource) -> Self {
        Self {
            client,
            api_base_url: DEFAULT_FCM_API_BASE_URL.to_string(),
            project_id,
            credentials,
        }
    }

    /// 覆盖 API 地址（测试或代理）
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.api_base_url, self.project_id
        )
    }

    /// 构建 FCM 消息 payload
    fn build_fcm_payload(&self, message: &PushMessage) -> serde_json::Value {
        let mut payload = json!({
            "message": {
                "notification": {
                    "title": message.notification.title,
                    "body": message.notification.body
                }
            }
        });
        if let Some(token) = &message.token {
            payload["message"]["token"] = json!(token);
        }
        payload
    }
}

/// 解析 FCM 错误响应，优先使用 details 中的 errorCode（UNREGISTERED 等）
fn parse_fcm_error(status: u16, error_text: &str) -> ServerError {
    match serde_json::from_str::<FcmErrorEnvelope>(error_text) {
        Ok(envelope) => {
            let code = envelope
                .error
                .details
                .iter()
                .find_map(|d| d.error_code.clone())
                .unwrap_or(envelope.error.status);
            ServerError::push_rejected(status, code, envelope.error.message)
        }
        Err(_) => ServerError::push_rejected(status, "UNKNOWN", error_text),
    }
}

#[async_trait]
impl PushProvider for FcmProvider {
    async fn send(&self, message: &PushMessage) -> Result<MessageId> {
        let access_token = self.credentials.access_token().await?;
        let payload = self.build_fcm_payload(message);

        info!(
            "[FCM] Sending push: project_id={}, token={}",
            self.project_id,
            message.token_hint()
        );

        let response = self
            .client
            .post(self.send_url())
            .bearer_auth(access_token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: FcmSendResponse = response
                .json()
                .await
                .map_err(|e| ServerError::Serialization(format!("invalid FCM response: {}", e)))?;
            Ok(MessageId(body.name))
        } else {
            let error_text = response.text().await.unwrap_or_default();
            error!(
                "[FCM] Push failed: status={}, error={}",
                status, error_text
            );
            Err(parse_fcm_error(status.as_u16(), &error_text))
        }
    }

    fn name(&self) -> &'static str {
        "fcm"
    }
}
