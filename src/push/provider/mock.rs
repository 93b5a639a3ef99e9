use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;
use crate::push::provider::provider_trait::PushProvider;
use crate::push::types::{MessageId, PushMessage};
use crate::error::{Result, ServerError};

/// Mock Provider（用于 dry-run 和测试）
///
/// 不调用真实 API，只打印日志。
/// 默认返回 `msg-1`、`msg-2` ... 形式的确认 ID。
pub struct MockProvider {
    /// dry-run 时为 None，不保留任何消息
    sent: Option<Mutex<Vec<PushMessage>>>,
    attempts: AtomicU64,
    counter: AtomicU64,
    failure: Option<ServerError>,
}

impl MockProvider {
    /// 记录所有收到的消息（测试用）
    pub fn new() -> Self {
        Self {
            sent: Some(Mutex::new(Vec::new())),
            attempts: AtomicU64::new(0),
            counter: AtomicU64::new(0),
            failure: None,
        }
    }

    /// 只打印日志、不保留消息（长时间运行的 dry-run 服务用）
    pub fn dry_run() -> Self {
        Self {
            sent: None,
            ..Self::new()
        }
    }

    /// 每次发送都返回给定错误
    pub fn failing(error: ServerError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new()
        }
    }

    /// 已收到的消息（含失败的）；dry-run 模式下为空
    pub fn sent_messages(&self) -> Vec<PushMessage> {
        self.sent
            .as_ref()
            .map(|sent| sent.lock().clone())
            .unwrap_or_default()
    }

    /// 发送调用次数（含失败的）
    pub fn send_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst) as usize
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushProvider for MockProvider {
    async fn send(&self, message: &PushMessage) -> Result<MessageId> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(sent) = &self.sent {
            sent.lock().push(message.clone());
        }

        info!(
            "[MOCK PUSH] Sending push: token={}, title={}",
            message.token_hint(),
            message.notification.title
        );

        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        // 与推送平台一致：没有 token 的消息会被拒绝
        if message.token.as_deref().map_or(true, str::is_empty) {
            return Err(ServerError::push_rejected(
                400,
                "INVALID_ARGUMENT",
                "The registration token is not a valid FCM registration token",
            ));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MessageId(format!("msg-{}", n)))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
