//! 欢迎推送服务
//!
//! 新设备 token 记录创建后发送一次欢迎推送。
//! 发送失败只记录日志，不重试，也不会让事件处理失败。

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::infra::metrics;
use crate::push::{DeliveryLedger, DeliveryOutcome, PushMessage, PushProvider};
use crate::trigger::DocumentCreatedEvent;

pub const WELCOME_TITLE: &str = "Welcome to Fertilityshare!";
pub const WELCOME_BODY: &str = "Thank you for joining our community. We are glad to have you here!";

/// 欢迎推送文案
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WelcomeTemplate {
    pub title: String,
    pub body: String,
}

impl Default for WelcomeTemplate {
    fn default() -> Self {
        Self {
            title: WELCOME_TITLE.to_string(),
            body: WELCOME_BODY.to_string(),
        }
    }
}

impl WelcomeTemplate {
    pub fn message_for(&self, token: Option<String>) -> PushMessage {
        PushMessage::new(self.title.clone(), self.body.clone(), token)
    }
}

/// 欢迎推送服务
pub struct WelcomeService {
    provider: Arc<dyn PushProvider>,
    template: WelcomeTemplate,
    ledger: Option<Arc<DeliveryLedger>>,
}

impl WelcomeService {
    pub fn new(provider: Arc<dyn PushProvider>, template: WelcomeTemplate) -> Self {
        Self {
            provider,
            template,
            ledger: None,
        }
    }

    /// 启用重投去重
    pub fn with_ledger(mut self, ledger: Arc<DeliveryLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn template(&self) -> &WelcomeTemplate {
        &self.template
    }

    /// 处理一条 token 创建事件
    ///
    /// 最多调用一次 provider.send；无论结果如何都正常返回。
    pub async fn on_token_created(&self, event: &DocumentCreatedEvent) -> DeliveryOutcome {
        if let Some(ledger) = &self.ledger {
            let key = event.delivery_key();
            if !ledger.try_mark(&key).await {
                warn!(
                    "[WELCOME] Duplicate creation event skipped: event_id={}, key={}",
                    event.event_id, key
                );
                metrics::record_welcome_send(self.provider.name(), "duplicate");
                return DeliveryOutcome::Duplicate;
            }
        }

        let message = self.template.message_for(event.record.token.clone());

        debug!(
            "[WELCOME] Sending welcome notification: event_id={}, token_id={}, token={}",
            event.event_id,
            event.token_id,
            message.token_hint()
        );

        let started = Instant::now();
        let result = self.provider.send(&message).await;
        metrics::record_send_duration(self.provider.name(), started.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(message_id) => {
                info!("Successfully sent message: {}", message_id);
                DeliveryOutcome::Sent(message_id)
            }
            Err(e) => {
                error!(
                    "Error sending message: {} (event_id={}, token_id={})",
                    e, event.event_id, event.token_id
                );
                DeliveryOutcome::Failed(e.to_string())
            }
        };

        metrics::record_welcome_send(self.provider.name(), outcome.as_str());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use crate::push::{MessageId, MockProvider};
    use crate::trigger::TokenRecord;
    use parking_lot::Mutex;
    use std::io;
    use std::time::Duration;

    const SUCCESS_LOG: &str = "Successfully sent message:";
    const FAILURE_LOG: &str = "Error sending message:";

    /// 收集 fmt 输出的内存缓冲
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn lines_containing(&self, needle: &str) -> Vec<String> {
            String::from_utf8_lossy(&self.0.lock())
                .lines()
                .filter(|line| line.contains(needle))
                .map(str::to_string)
                .collect()
        }
    }

    fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    fn event(token: Option<&str>) -> DocumentCreatedEvent {
        DocumentCreatedEvent {
            event_id: "evt-1".to_string(),
            document: "documents/device_tokens/tok-1".to_string(),
            token_id: "tok-1".to_string(),
            create_time: Some("2024-05-01T10:00:00Z".to_string()),
            record: TokenRecord {
                token: token.map(str::to_string),
            },
        }
    }

    #[tokio::test]
    async fn test_sends_fixed_welcome_message_once() {
        let provider = Arc::new(MockProvider::new());
        let service = WelcomeService::new(provider.clone(), WelcomeTemplate::default());

        let outcome = service.on_token_created(&event(Some("abc123"))).await;

        assert_eq!(outcome, DeliveryOutcome::Sent(MessageId::from("msg-1")));
        assert_eq!(
            provider.sent_messages(),
            vec![PushMessage::new(
                "Welcome to Fertilityshare!",
                "Thank you for joining our community. We are glad to have you here!",
                Some("abc123".to_string()),
            )]
        );
    }

    #[tokio::test]
    async fn test_send_failure_is_swallowed() {
        let provider = Arc::new(MockProvider::failing(ServerError::push_rejected(
            404,
            "registration-token-not-registered",
            "",
        )));
        let service = WelcomeService::new(provider.clone(), WelcomeTemplate::default());

        let outcome = service.on_token_created(&event(Some("bad-token"))).await;

        match outcome {
            DeliveryOutcome::Failed(detail) => {
                assert!(detail.contains("registration-token-not-registered"))
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(provider.send_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_token_still_attempts_send() {
        let provider = Arc::new(MockProvider::new());
        let service = WelcomeService::new(provider.clone(), WelcomeTemplate::default());

        let outcome = service.on_token_created(&event(None)).await;

        assert!(matches!(outcome, DeliveryOutcome::Failed(_)));
        assert_eq!(provider.send_count(), 1);
        assert_eq!(provider.sent_messages()[0].token, None);
    }

    #[tokio::test]
    async fn test_redelivery_without_ledger_sends_again() {
        let provider = Arc::new(MockProvider::new());
        let service = WelcomeService::new(provider.clone(), WelcomeTemplate::default());

        service.on_token_created(&event(Some("abc123"))).await;
        service.on_token_created(&event(Some("abc123"))).await;

        assert_eq!(provider.send_count(), 2);
    }

    #[tokio::test]
    async fn test_redelivery_with_ledger_is_skipped() {
        let provider = Arc::new(MockProvider::new());
        let ledger = Arc::new(DeliveryLedger::new(Duration::from_secs(60), 100));
        let service = WelcomeService::new(provider.clone(), WelcomeTemplate::default())
            .with_ledger(ledger);

        let first = service.on_token_created(&event(Some("abc123"))).await;
        let second = service.on_token_created(&event(Some("abc123"))).await;

        assert!(first.is_sent());
        assert_eq!(second, DeliveryOutcome::Duplicate);
        assert_eq!(provider.send_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_attempt_is_not_retried_on_redelivery() {
        let provider = Arc::new(MockProvider::failing(ServerError::Network(
            "connection reset".to_string(),
        )));
        let ledger = Arc::new(DeliveryLedger::new(Duration::from_secs(60), 100));
        let service = WelcomeService::new(provider.clone(), WelcomeTemplate::default())
            .with_ledger(ledger);

        service.on_token_created(&event(Some("abc123"))).await;
        let second = service.on_token_created(&event(Some("abc123"))).await;

        assert_eq!(second, DeliveryOutcome::Duplicate);
        assert_eq!(provider.send_count(), 1);
    }

    #[tokio::test]
    async fn test_custom_template() {
        let provider = Arc::new(MockProvider::new());
        let template = WelcomeTemplate {
            title: "Hi".to_string(),
            body: "Welcome aboard".to_string(),
        };
        let service = WelcomeService::new(provider.clone(), template);

        service.on_token_created(&event(Some("abc123"))).await;

        let sent = provider.sent_messages();
        assert_eq!(sent[0].notification.title, "Hi");
        assert_eq!(sent[0].notification.body, "Welcome aboard");
    }

    #[tokio::test]
    async fn test_success_logs_message_id_once() {
        let (logs, _guard) = capture_logs();
        let service = WelcomeService::new(Arc::new(MockProvider::new()), WelcomeTemplate::default());

        service.on_token_created(&event(Some("abc123"))).await;

        let success = logs.lines_containing(SUCCESS_LOG);
        assert_eq!(success.len(), 1);
        assert!(success[0].contains("Successfully sent message: msg-1"));
        assert!(logs.lines_containing(FAILURE_LOG).is_empty());
    }

    #[tokio::test]
    async fn test_rejection_logs_error_detail_once() {
        let (logs, _guard) = capture_logs();
        let provider = Arc::new(MockProvider::failing(ServerError::push_rejected(
            404,
            "registration-token-not-registered",
            "",
        )));
        let service = WelcomeService::new(provider, WelcomeTemplate::default());

        service.on_token_created(&event(Some("bad-token"))).await;

        let failure = logs.lines_containing(FAILURE_LOG);
        assert_eq!(failure.len(), 1);
        assert!(failure[0].contains("registration-token-not-registered"));
        assert!(logs.lines_containing(SUCCESS_LOG).is_empty());
    }

    #[tokio::test]
    async fn test_missing_token_logs_failure_only() {
        let (logs, _guard) = capture_logs();
        let service = WelcomeService::new(Arc::new(MockProvider::new()), WelcomeTemplate::default());

        service.on_token_created(&event(None)).await;

        let failure = logs.lines_containing(FAILURE_LOG);
        assert_eq!(failure.len(), 1);
        assert!(failure[0].contains("INVALID_ARGUMENT"));
        assert!(logs.lines_containing(SUCCESS_LOG).is_empty());
    }
}
