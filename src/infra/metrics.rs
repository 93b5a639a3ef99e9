//! Prometheus 指标：事件接收量、欢迎推送结果与耗时
//!
//! 通过 `init()` 安装全局 Recorder，通过 HTTP GET `/metrics` 暴露抓取端点。
//! 未初始化时记录调用为空操作。

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::OnceLock;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// 指标名称
const COUNTER_EVENTS_TOTAL: &str = "notifier_events_total";
const COUNTER_WELCOME_SENDS: &str = "notifier_welcome_sends_total";
const HISTOGRAM_SEND_DURATION: &str = "notifier_send_duration_seconds";

/// 初始化 Prometheus 指标（安装全局 Recorder）。
/// 仅需在进程内调用一次；重复调用会返回 Err。
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    HANDLE
        .set(handle)
        .map_err(|_| "metrics already initialized")?;
    Ok(())
}

pub fn is_initialized() -> bool {
    HANDLE.get().is_some()
}

/// 渲染当前指标为 Prometheus 文本格式
pub fn render_metrics() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

/// 记录一次事件入口调用（result: created / ignored / rejected）
pub fn record_event(result: &'static str) {
    metrics::counter!(COUNTER_EVENTS_TOTAL, "result" => result).increment(1);
}

/// 记录一次欢迎推送结果（outcome: sent / failed / duplicate）
pub fn record_welcome_send(provider: &'static str, outcome: &'static str) {
    metrics::counter!(COUNTER_WELCOME_SENDS, "provider" => provider, "outcome" => outcome)
        .increment(1);
}

pub fn record_send_duration(provider: &'static str, duration_secs: f64) {
    metrics::histogram!(HISTOGRAM_SEND_DURATION, "provider" => provider).record(duration_secs);
}
