use serde::{Deserialize, Serialize};
use std::fmt;

/// 通知内容（标题 + 正文）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

/// 推送消息
///
/// 与推送平台的发送接口一一对应：`{ notification: { title, body }, token }`。
/// `token` 为空时照常发送，由推送平台拒绝。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushMessage {
    pub notification: Notification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl PushMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>, token: Option<String>) -> Self {
        Self {
            notification: Notification {
                title: title.into(),
                body: body.into(),
            },
            token,
        }
    }

    /// 日志中使用的 token 摘要，避免完整 token 落盘
    pub fn token_hint(&self) -> String {
        match &self.token {
            None => "<none>".to_string(),
            Some(t) if t.chars().count() <= 8 => t.clone(),
            Some(t) => {
                let head: String = t.chars().take(8).collect();
                format!("{}…", head)
            }
        }
    }
}

/// 推送平台返回的投递确认 ID
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        MessageId(s.to_string())
    }
}

/// 一次欢迎推送的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// 推送平台已接收
    Sent(MessageId),
    /// 发送失败（已记录日志，不重试）
    Failed(String),
    /// 同一条创建事件已经尝试过，本次跳过
    Duplicate,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Sent(_) => "sent",
            DeliveryOutcome::Failed(_) => "failed",
            DeliveryOutcome::Duplicate => "duplicate",
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_to_send_shape() {
        let message = PushMessage::new("t", "b", Some("abc123".to_string()));
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "notification": { "title": "t", "body": "b" },
                "token": "abc123"
            })
        );
    }

    #[test]
    fn test_missing_token_is_omitted() {
        let message = PushMessage::new("t", "b", None);
        let value = serde_json::to_value(&message).unwrap();
        assert!(value.get("token").is_none());
    }

    #[test]
    fn test_token_hint_truncates() {
        let message = PushMessage::new("t", "b", Some("abcdefghijklmnop".to_string()));
        assert_eq!(message.token_hint(), "abcdefgh…");
        assert_eq!(PushMessage::new("t", "b", None).token_hint(), "<none>");
    }
}
