use crate::error::Result;
use crate::push::types::{MessageId, PushMessage};
use async_trait::async_trait;

/// Push Provider Trait（推送提供者接口）
///
/// 每次调用只发送一条消息，不做重试。
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// 发送推送，成功时返回推送平台的确认 ID
    async fn send(&self, message: &PushMessage) -> Result<MessageId>;

    /// Provider 名称（日志和指标使用）
    fn name(&self) -> &'static str;
}
