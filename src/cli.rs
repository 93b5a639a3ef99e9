use clap::{Parser, Subcommand};

impl Cli {
    /// 解析命令行参数
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

/// Fertilityshare Notifier - 新设备 token 欢迎推送服务
#[derive(Parser, Debug, Default)]
#[command(name = "fertilityshare-notifier")]
#[command(version)]
#[command(about = "接收 device_tokens 文档创建事件并发送欢迎推送", long_about = None)]
pub struct Cli {
    /// 配置文件路径
    #[arg(long, value_name = "FILE", help = "指定配置文件路径")]
    pub config_file: Option<String>,

    /// 服务监听地址
    #[arg(long, value_name = "ADDRESS", help = "服务监听地址")]
    pub host: Option<String>,

    /// 服务监听端口
    #[arg(long, value_name = "PORT", help = "HTTP 事件入口端口")]
    pub port: Option<u16>,

    /// Firebase 项目 ID
    #[arg(long, value_name = "ID", help = "Firebase / Google Cloud 项目 ID")]
    pub project_id: Option<String>,

    /// Service account 密钥文件
    #[arg(long, value_name = "FILE", help = "Google service account JSON 密钥路径")]
    pub credentials: Option<String>,

    /// 不调用 FCM，只打印日志
    #[arg(long, help = "使用 Mock Provider，不真正发送推送")]
    pub dry_run: bool,

    /// 启用监控指标
    #[arg(long, help = "启用 Prometheus 监控指标")]
    pub enable_metrics: bool,

    /// 日志级别
    #[arg(
        long,
        value_name = "LEVEL",
        help = "日志级别: trace, debug, info, warn, error"
    )]
    pub log_level: Option<String>,

    /// 日志格式
    #[arg(long, value_name = "FORMAT", help = "日志格式: pretty, json, compact")]
    pub log_format: Option<String>,

    /// 日志文件路径
    #[arg(long, value_name = "PATH", help = "日志输出文件路径")]
    pub log_file: Option<String>,

    /// 详细输出（可重复使用：-v, -vv, -vvv）
    #[arg(short, action = clap::ArgAction::Count, help = "详细输出级别")]
    pub verbose: u8,

    /// 静默模式
    #[arg(long, short = 'q', help = "静默模式（只输出错误）")]
    pub quiet: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 生成默认配置文件
    GenerateConfig {
        /// 输出文件路径
        #[arg(value_name = "PATH", default_value = "config.toml")]
        path: String,
    },
    /// 验证配置文件
    ValidateConfig {
        /// 配置文件路径
        #[arg(value_name = "PATH", default_value = "config.toml")]
        path: String,
    },
    /// 显示最终配置（合并后的配置）
    ShowConfig,
}

impl Cli {
    /// 获取日志级别（考虑 verbose 和 quiet）
    pub fn get_log_level(&self) -> Option<String> {
        if self.quiet {
            return Some("error".to_string());
        }

        if let Some(level) = &self.log_level {
            return Some(level.clone());
        }

        match self.verbose {
            0 => None,
            1 => Some("info".to_string()),
            2 => Some("debug".to_string()),
            _ => Some("trace".to_string()),
        }
    }

    /// 获取日志格式
    pub fn get_log_format(&self) -> Option<String> {
        self.log_format.clone()
    }
}
