use moka::future::Cache;
use std::time::Duration;

/// 投递尝试记录
///
/// 以创建事件的标识为 key，记录已经尝试过的欢迎推送。
/// 事件重投时命中记录则跳过发送。只在当前进程内有效，
/// 多实例或重启后仍可能重复发送。
pub struct DeliveryLedger {
    attempts: Cache<String, ()>,
}

impl DeliveryLedger {
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        let attempts = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self { attempts }
    }

    /// 标记一次投递尝试；首次标记返回 true，已存在返回 false
    pub async fn try_mark(&self, key: &str) -> bool {
        self.attempts
            .entry(key.to_string())
            .or_insert(())
            .await
            .is_fresh()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.attempts.get(key).await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_mark_is_rejected() {
        let ledger = DeliveryLedger::new(Duration::from_secs(60), 100);

        assert!(ledger.try_mark("device_tokens/a@2024-01-01T00:00:00Z").await);
        assert!(!ledger.try_mark("device_tokens/a@2024-01-01T00:00:00Z").await);
        assert!(ledger.try_mark("device_tokens/b@2024-01-01T00:00:00Z").await);
        assert!(ledger.contains("device_tokens/a@2024-01-01T00:00:00Z").await);
    }

    #[tokio::test]
    async fn test_marks_expire() {
        let ledger = DeliveryLedger::new(Duration::from_millis(50), 100);

        assert!(ledger.try_mark("evt-1").await);
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(ledger.try_mark("evt-1").await);
    }
}
