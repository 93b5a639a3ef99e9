use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};
use anyhow::{anyhow, Result};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// 初始化日志系统
///
/// 配置了日志文件时额外写入文件（不滚动，无 ANSI 颜色）；
/// 返回的 guard 需要持有到进程退出，否则缓冲中的日志会丢失。
pub fn init_logging(
    log_level: &str,
    log_format: Option<&str>,
    log_file: Option<&str>,
    quiet: bool,
) -> Result<Option<WorkerGuard>> {
    let level = if quiet { "error" } else { log_level };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers: Vec<BoxedLayer> = Vec::new();

    // 标准输出
    layers.push(match log_format {
        Some("json") => fmt::layer().json().boxed(),
        Some("pretty") | Some("dev") => fmt::layer().pretty().boxed(),
        _ => fmt::layer().compact().boxed(),
    });

    let guard = match log_file {
        Some(path) => {
            let path = Path::new(path);
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow!("日志文件路径无效: {:?}", path))?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(fmt::layer().with_ansi(false).with_writer(writer).boxed());
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;

    Ok(guard)
}
