use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use serde::{Deserialize, Serialize};
use anyhow::{Result, Context};

use crate::push::provider::fcm::DEFAULT_FCM_API_BASE_URL;
use crate::service::{WELCOME_BODY, WELCOME_TITLE};

/// 服务配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotifierConfig {
    /// 服务监听地址
    pub host: String,
    /// 服务监听端口
    pub port: u16,
    /// FCM 配置
    pub fcm: FcmConfig,
    /// 欢迎推送文案
    pub welcome: WelcomeConfig,
    /// 触发器配置
    pub trigger: TriggerConfig,
    /// 投递去重配置
    pub delivery: DeliveryConfig,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 使用 Mock Provider，不真正发送
    pub dry_run: bool,
    /// 启用 Prometheus 指标
    pub enable_metrics: bool,
}

/// FCM 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FcmConfig {
    /// Firebase 项目 ID（未配置时取 service account 中的 project_id）
    pub project_id: Option<String>,
    /// Service account JSON 密钥路径
    pub credentials_file: Option<String>,
    /// 静态 access token（优先于 credentials_file）
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    /// FCM API 地址
    pub api_base_url: String,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            credentials_file: None,
            access_token: None,
            api_base_url: DEFAULT_FCM_API_BASE_URL.to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl FcmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 欢迎推送文案
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WelcomeConfig {
    pub title: String,
    pub body: String,
}

impl Default for WelcomeConfig {
    fn default() -> Self {
        Self {
            title: WELCOME_TITLE.to_string(),
            body: WELCOME_BODY.to_string(),
        }
    }
}

/// 触发器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerConfig {
    /// 监听的文档路径模式
    pub document_pattern: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            document_pattern: "device_tokens/{tokenId}".to_string(),
        }
    }
}

/// 投递去重配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryConfig {
    /// 同一创建事件重投时是否跳过
    pub dedup_enabled: bool,
    /// 去重记录保留时间（秒）
    pub dedup_ttl_secs: u64,
    /// 去重记录上限
    pub dedup_max_entries: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            dedup_enabled: true,
            dedup_ttl_secs: 3600,
            dedup_max_entries: 100_000,
        }
    }
}

impl DeliveryConfig {
    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_secs)
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: Option<String>,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: None,
            file: None,
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            fcm: FcmConfig::default(),
            welcome: WelcomeConfig::default(),
            trigger: TriggerConfig::default(),
            delivery: DeliveryConfig::default(),
            logging: LoggingConfig::default(),
            dry_run: false,
            enable_metrics: false,
        }
    }
}

impl NotifierConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 从 TOML 文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("无法读取配置文件: {:?}", path.as_ref()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let toml_config: TomlConfig = toml::from_str(content)
            .with_context(|| "配置文件格式错误")?;
        Ok(toml_config.into())
    }

    /// 从环境变量加载配置
    pub fn merge_from_env(&mut self) -> Result<()> {
        self.merge_from_vars(|key| env::var(key).ok())
    }

    /// 按给定的变量查找函数合并配置（NOTIFIER_ 前缀 + Google Cloud 标准变量）
    pub fn merge_from_vars<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("NOTIFIER_HOST") {
            self.host = host;
        }
        // Cloud Run 注入 PORT，显式的 NOTIFIER_PORT 优先
        if let Some(port) = var("NOTIFIER_PORT").or_else(|| var("PORT")) {
            self.port = port
                .parse()
                .with_context(|| format!("端口格式错误: {}", port))?;
        }
        if let Some(level) = var("NOTIFIER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("NOTIFIER_LOG_FORMAT") {
            self.logging.format = Some(format);
        }

        if let Some(project_id) = var("NOTIFIER_FCM_PROJECT_ID").or_else(|| var("GOOGLE_CLOUD_PROJECT")) {
            self.fcm.project_id = Some(project_id);
        }
        if let Some(credentials) = var("GOOGLE_APPLICATION_CREDENTIALS") {
            self.fcm.credentials_file = Some(credentials);
        }
        if let Some(token) = var("NOTIFIER_FCM_ACCESS_TOKEN") {
            self.fcm.access_token = Some(token);
        }
        if let Some(base_url) = var("NOTIFIER_FCM_API_BASE_URL") {
            self.fcm.api_base_url = base_url;
        }

        if let Some(dry_run) = var("NOTIFIER_DRY_RUN") {
            self.dry_run = matches!(dry_run.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        Ok(())
    }

    /// 从命令行参数合并配置
    pub fn merge_from_cli(&mut self, cli: &crate::cli::Cli) {
        if let Some(host) = &cli.host {
            self.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(project_id) = &cli.project_id {
            self.fcm.project_id = Some(project_id.clone());
        }
        if let Some(credentials) = &cli.credentials {
            self.fcm.credentials_file = Some(credentials.clone());
        }
        if cli.dry_run {
            self.dry_run = true;
        }
        if cli.enable_metrics {
            self.enable_metrics = true;
        }
        if let Some(level) = cli.get_log_level() {
            self.logging.level = level;
        }
        if let Some(format) = cli.get_log_format() {
            self.logging.format = Some(format);
        }
        if let Some(file) = &cli.log_file {
            self.logging.file = Some(file.clone());
        }
    }

    /// 加载配置（按优先级：命令行 > 环境变量 > 配置文件 > 默认值）
    pub fn load(cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if let Some(config_file) = &cli.config_file {
            if Path::new(config_file).exists() {
                info!("📄 从配置文件加载: {}", config_file);
                Self::from_toml_file(config_file)?
            } else {
                tracing::warn!("⚠️ 配置文件不存在: {}", config_file);
                Self::new()
            }
        } else if Path::new("config.toml").exists() {
            info!("📄 从默认配置文件加载: config.toml");
            Self::from_toml_file("config.toml")?
        } else {
            Self::new()
        };

        config.merge_from_env()?;
        config.merge_from_cli(cli);

        Ok(config)
    }
}

/// 日志初始化前读取的 [logging] 段
#[derive(Debug, Default)]
pub struct EarlyLoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
    pub file: Option<String>,
}

/// 只读取配置文件的 [logging] 段（日志系统初始化之前调用，读取失败时静默返回默认值）
pub fn load_early_logging_config(config_file: Option<&str>) -> EarlyLoggingConfig {
    let path = config_file.unwrap_or("config.toml");
    let Ok(content) = fs::read_to_string(path) else {
        return EarlyLoggingConfig::default();
    };

    match toml::from_str::<TomlConfig>(&content) {
        Ok(TomlConfig { logging: Some(logging), .. }) => EarlyLoggingConfig {
            level: logging.level,
            format: logging.format,
            file: logging.file,
        },
        _ => EarlyLoggingConfig::default(),
    }
}

/// TOML 配置文件结构（用于反序列化）
#[derive(Debug, Deserialize)]
struct TomlConfig {
    server: Option<TomlServerConfig>,
    fcm: Option<TomlFcmConfig>,
    welcome: Option<TomlWelcomeConfig>,
    trigger: Option<TomlTriggerConfig>,
    delivery: Option<TomlDeliveryConfig>,
    logging: Option<TomlLoggingConfig>,
}

#[derive(Debug, Deserialize)]
struct TomlServerConfig {
    host: Option<String>,
    port: Option<u16>,
    dry_run: Option<bool>,
    enable_metrics: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct TomlFcmConfig {
    project_id: Option<String>,
    credentials_file: Option<String>,
    access_token: Option<String>,
    api_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TomlWelcomeConfig {
    title: Option<String>,
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlTriggerConfig {
    document_pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlDeliveryConfig {
    dedup_enabled: Option<bool>,
    dedup_ttl_secs: Option<u64>,
    dedup_max_entries: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TomlLoggingConfig {
    level: Option<String>,
    format: Option<String>,
    file: Option<String>,
}

impl From<TomlConfig> for NotifierConfig {
    fn from(toml: TomlConfig) -> Self {
        let mut config = Self::default();

        if let Some(server) = toml.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
            if let Some(dry_run) = server.dry_run {
                config.dry_run = dry_run;
            }
            if let Some(enable_metrics) = server.enable_metrics {
                config.enable_metrics = enable_metrics;
            }
        }

        if let Some(fcm) = toml.fcm {
            config.fcm.project_id = fcm.project_id.or(config.fcm.project_id);
            config.fcm.credentials_file = fcm.credentials_file.or(config.fcm.credentials_file);
            config.fcm.access_token = fcm.access_token.or(config.fcm.access_token);
            if let Some(api_base_url) = fcm.api_base_url {
                config.fcm.api_base_url = api_base_url;
            }
            if let Some(timeout) = fcm.request_timeout_secs {
                config.fcm.request_timeout_secs = timeout;
            }
        }

        if let Some(welcome) = toml.welcome {
            if let Some(title) = welcome.title {
                config.welcome.title = title;
            }
            if let Some(body) = welcome.body {
                config.welcome.body = body;
            }
        }

        if let Some(pattern) = toml.trigger.and_then(|t| t.document_pattern) {
            config.trigger.document_pattern = pattern;
        }

        if let Some(delivery) = toml.delivery {
            if let Some(enabled) = delivery.dedup_enabled {
                config.delivery.dedup_enabled = enabled;
            }
            if let Some(ttl) = delivery.dedup_ttl_secs {
                config.delivery.dedup_ttl_secs = ttl;
            }
            if let Some(max) = delivery.dedup_max_entries {
                config.delivery.dedup_max_entries = max;
            }
        }

        if let Some(logging) = toml.logging {
            if let Some(level) = logging.level {
                config.logging.level = level;
            }
            config.logging.format = logging.format;
            config.logging.file = logging.file;
        }

        config
    }
}

/// 默认配置文件内容（generate-config 使用）
pub const DEFAULT_CONFIG_TOML: &str = r#"# Fertilityshare Notifier 配置文件
# 此文件由 fertilityshare-notifier generate-config 生成

[server]
host = "0.0.0.0"
port = 8080
dry_run = false
enable_metrics = false

[fcm]
# 未配置时取 service account 中的 project_id
# project_id = "fertilityshare"
# credentials_file = "./service-account.json"
api_base_url = "https://fcm.googleapis.com"
request_timeout_secs = 30

[welcome]
title = "Welcome to Fertilityshare!"
body = "Thank you for joining our community. We are glad to have you here!"

[trigger]
document_pattern = "device_tokens/{tokenId}"

[delivery]
dedup_enabled = true
dedup_ttl_secs = 3600
dedup_max_entries = 100000

[logging]
level = "info"
format = "compact"
# file = "./logs/notifier.log"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_toml_round_trips_defaults() {
        let config = NotifierConfig::from_toml_str(DEFAULT_CONFIG_TOML).unwrap();
        let mut expected = NotifierConfig::default();
        expected.logging.format = Some("compact".to_string());
        assert_eq!(config, expected);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = NotifierConfig::from_toml_str(
            r#"
            [fcm]
            project_id = "fs-prod"

            [delivery]
            dedup_enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.fcm.project_id.as_deref(), Some("fs-prod"));
        assert!(!config.delivery.dedup_enabled);
        assert_eq!(config.delivery.dedup_ttl_secs, 3600);
        assert_eq!(config.welcome.title, WELCOME_TITLE);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(NotifierConfig::from_toml_str("[server\nport = 1").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PORT", "9000"),
            ("GOOGLE_CLOUD_PROJECT", "fs-cloud"),
            ("GOOGLE_APPLICATION_CREDENTIALS", "/secrets/sa.json"),
            ("NOTIFIER_DRY_RUN", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = NotifierConfig::default();
        config
            .merge_from_vars(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.fcm.project_id.as_deref(), Some("fs-cloud"));
        assert_eq!(config.fcm.credentials_file.as_deref(), Some("/secrets/sa.json"));
        assert!(config.dry_run);
    }

    #[test]
    fn test_notifier_port_wins_over_port() {
        let mut config = NotifierConfig::default();
        config
            .merge_from_vars(|k| match k {
                "PORT" => Some("9000".to_string()),
                "NOTIFIER_PORT" => Some("9100".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.port, 9100);
    }

    #[test]
    fn test_bad_port_is_error() {
        let mut config = NotifierConfig::default();
        let result = config.merge_from_vars(|k| (k == "PORT").then(|| "http".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut config = NotifierConfig::default();
        config
            .merge_from_vars(|k| (k == "GOOGLE_CLOUD_PROJECT").then(|| "from-env".to_string()))
            .unwrap();

        let cli = crate::cli::Cli {
            project_id: Some("from-cli".to_string()),
            port: Some(7070),
            ..Default::default()
        };
        config.merge_from_cli(&cli);

        assert_eq!(config.fcm.project_id.as_deref(), Some("from-cli"));
        assert_eq!(config.port, 7070);
        assert_eq!(config.bind_address(), "0.0.0.0:7070");
    }

    #[test]
    fn test_access_token_not_shown() {
        let mut config = NotifierConfig::default();
        config.fcm.access_token = Some("ya29.secret".to_string());
        let shown = serde_json::to_string(&config).unwrap();
        assert!(!shown.contains("ya29.secret"));
    }
}
