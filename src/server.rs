//! 服务装配
//!
//! 进程启动时只构建一次推送客户端（HTTP client + 凭证），
//! 以 `Arc<dyn PushProvider>` 注入欢迎推送服务，之后只读共享。

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::NotifierConfig;
use crate::error::{Result, ServerError};
use crate::http::{EventHttpServer, HttpServerState};
use crate::infra::metrics;
use crate::push::provider::{AccessTokenSource, FcmProvider, MockProvider, PushProvider, ServiceAccountKey};
use crate::push::DeliveryLedger;
use crate::service::{WelcomeService, WelcomeTemplate};
use crate::trigger::DocumentPattern;

/// 通知服务
pub struct NotifierServer {
    config: NotifierConfig,
    state: HttpServerState,
}

impl NotifierServer {
    pub async fn new(config: NotifierConfig) -> Result<Self> {
        let provider = build_provider(&config)?;
        info!("📨 Push provider: {}", provider.name());

        let document_pattern = DocumentPattern::parse(&config.trigger.document_pattern)?;

        let template = WelcomeTemplate {
            title: config.welcome.title.clone(),
            body: config.welcome.body.clone(),
        };
        let mut welcome_service = WelcomeService::new(provider, template);
        if config.delivery.dedup_enabled {
            welcome_service = welcome_service.with_ledger(Arc::new(DeliveryLedger::new(
                config.delivery.dedup_ttl(),
                config.delivery.dedup_max_entries,
            )));
        } else {
            warn!("⚠️ 重投去重已关闭，事件重投可能导致重复推送");
        }

        if config.enable_metrics && !metrics::is_initialized() {
            if let Err(e) = metrics::init() {
                warn!("⚠️ Prometheus 指标初始化失败: {}", e);
            }
        }

        let state = HttpServerState::new(Arc::new(welcome_service), document_pattern);

        Ok(Self { config, state })
    }

    pub fn state(&self) -> &HttpServerState {
        &self.state
    }

    /// 运行服务，收到 Ctrl+C / SIGTERM 后优雅退出
    pub async fn run(&self) -> Result<()> {
        let http_server = EventHttpServer::new(self.state.clone(), self.config.bind_address());
        http_server.start(shutdown_signal()).await?;
        info!("👋 服务已停止");
        Ok(())
    }
}

/// 根据配置构建推送 Provider
pub fn build_provider(config: &NotifierConfig) -> Result<Arc<dyn PushProvider>> {
    if config.dry_run {
        warn!("🔧 Dry-run 模式：使用 Mock Provider，不会真正发送推送");
        return Ok(Arc::new(MockProvider::dry_run()));
    }

    let client = reqwest::Client::builder()
        .timeout(config.fcm.request_timeout())
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| ServerError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

    let (credentials, key_project_id) = if let Some(token) = &config.fcm.access_token {
        (AccessTokenSource::from_static(token.clone()), None)
    } else if let Some(path) = &config.fcm.credentials_file {
        let key = ServiceAccountKey::from_file(path)?;
        let project_id = key.project_id.clone();
        info!("🔑 Service account: {}", key.client_email);
        (AccessTokenSource::from_service_account(key, client.clone())?, project_id)
    } else {
        return Err(ServerError::Configuration(
            "FCM 凭证未配置：请设置 fcm.credentials_file / GOOGLE_APPLICATION_CREDENTIALS 或 fcm.access_token，或使用 --dry-run".to_string(),
        ));
    };

    let project_id = config
        .fcm
        .project_id
        .clone()
        .or(key_project_id)
        .ok_or_else(|| ServerError::Configuration("FCM project_id 未配置".to_string()))?;

    let provider = FcmProvider::new(client, project_id, credentials)
        .with_api_base_url(config.fcm.api_base_url.clone());
    Ok(Arc::new(provider))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 收到退出信号，开始优雅退出");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_uses_mock() {
        let config = NotifierConfig {
            dry_run: true,
            ..NotifierConfig::default()
        };
        assert_eq!(build_provider(&config).unwrap().name(), "mock");
    }

    #[test]
    fn test_missing_credentials_is_configuration_error() {
        let result = build_provider(&NotifierConfig::default());
        assert!(matches!(result, Err(ServerError::Configuration(_))));
    }

    #[test]
    fn test_static_token_requires_project_id() {
        let mut config = NotifierConfig::default();
        config.fcm.access_token = Some("ya29.token".to_string());
        assert!(matches!(
            build_provider(&config),
            Err(ServerError::Configuration(_))
        ));

        config.fcm.project_id = Some("fs-prod".to_string());
        assert_eq!(build_provider(&config).unwrap().name(), "fcm");
    }

    #[tokio::test]
    async fn test_invalid_pattern_fails_startup() {
        let mut config = NotifierConfig {
            dry_run: true,
            ..NotifierConfig::default()
        };
        config.trigger.document_pattern = "device_tokens/{}".to_string();
        assert!(NotifierServer::new(config).await.is_err());
    }
}
