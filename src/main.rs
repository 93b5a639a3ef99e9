use anyhow::{Context, Result};
use fertilityshare_notifier::{
    cli::{Cli, Commands},
    config::{self, NotifierConfig},
    logging, NotifierServer,
};
use std::fs;
use std::process;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载 .env 文件（如果存在）
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Some(command) = &cli.command {
        match command {
            Commands::GenerateConfig { path } => return generate_config(path),
            Commands::ValidateConfig { path } => return validate_config(path),
            Commands::ShowConfig => return show_config(&cli),
        }
    }

    // 快速读取 config.toml 的 [logging] 段（不加载完整配置）
    let early_log = config::load_early_logging_config(cli.config_file.as_deref());

    // 合并日志配置（优先级：CLI > 环境变量 > config.toml > 默认值）
    let log_level = cli
        .get_log_level()
        .or_else(|| std::env::var("NOTIFIER_LOG_LEVEL").ok())
        .or(early_log.level)
        .unwrap_or_else(|| "info".to_string());
    let log_format = cli
        .get_log_format()
        .or_else(|| std::env::var("NOTIFIER_LOG_FORMAT").ok())
        .or(early_log.format);
    let log_file = cli.log_file.clone().or(early_log.file);

    let _log_guard =
        logging::init_logging(&log_level, log_format.as_deref(), log_file.as_deref(), cli.quiet)?;

    tracing::info!("🚀 Fertilityshare Notifier starting...");

    let config = NotifierConfig::load(&cli).context("加载配置失败")?;

    tracing::info!("📊 Notifier Configuration:");
    tracing::info!("  - Listen: {}", config.bind_address());
    tracing::info!(
        "  - FCM Project: {}",
        config.fcm.project_id.as_deref().unwrap_or("<from credentials>")
    );
    tracing::info!("  - Document Pattern: {}", config.trigger.document_pattern);
    tracing::info!(
        "  - Redelivery Dedup: {} (ttl {}s)",
        config.delivery.dedup_enabled,
        config.delivery.dedup_ttl_secs
    );
    tracing::info!("  - Dry Run: {}", config.dry_run);
    tracing::info!("  - Metrics: {}", config.enable_metrics);
    tracing::info!("  - Log Level: {}", log_level);

    let server = match NotifierServer::new(config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("❌ 服务初始化失败: {}", e);
            tracing::error!("💡 请检查 FCM 凭证、项目 ID 和触发器配置后重试");
            process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        tracing::error!("❌ 服务运行失败: {}", e);
        process::exit(1);
    }

    Ok(())
}

/// 生成默认配置文件
fn generate_config(path: &str) -> Result<()> {
    fs::write(path, config::DEFAULT_CONFIG_TOML)
        .with_context(|| format!("无法写入配置文件: {}", path))?;

    println!("✅ 配置文件已生成: {}", path);
    Ok(())
}

/// 验证配置文件
fn validate_config(path: &str) -> Result<()> {
    let config = NotifierConfig::from_toml_file(path)
        .with_context(|| format!("配置文件验证失败: {}", path))?;

    fertilityshare_notifier::trigger::DocumentPattern::parse(&config.trigger.document_pattern)
        .with_context(|| format!("触发器路径模式无效: {}", config.trigger.document_pattern))?;

    println!("✅ 配置文件有效: {}", path);
    println!("📊 配置摘要:");
    println!("  - Listen: {}", config.bind_address());
    println!("  - Document Pattern: {}", config.trigger.document_pattern);
    println!("  - Dedup: {}", config.delivery.dedup_enabled);

    Ok(())
}

/// 显示最终配置（合并后的配置）
fn show_config(cli: &Cli) -> Result<()> {
    logging::init_logging("info", None, None, false)?;

    let config = NotifierConfig::load(cli).context("加载配置失败")?;

    println!("📊 最终配置（合并后的配置）:");
    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}
