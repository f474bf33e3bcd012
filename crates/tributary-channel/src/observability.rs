//! `Logger` 契约到 `tracing` 的桥接。
//!
//! # 教案式说明
//! - **意图（Why）**：核心 crate 只依赖注入的 [`Logger`]，宿主若已使用 `tracing` 生态，
//!   通过 [`TracingLogger`] 即可把通道、网关与缓冲池的日志汇入同一订阅器；
//! - **逻辑（How）**：按 [`LogSeverity`] 选择对应的 `tracing` 宏，固定 target 为 [`TRACING_TARGET`]；
//!   结构化字段渲染为 `key=value` 序列写入 `fields`，记录自带的 target 写入 `origin`；
//! - **契约（What）**：[`install_tracing_subscriber`] 只应在进程启动时调用一次，重复调用返回错误而非覆盖。

use core::fmt::Write as _;

use thiserror::Error;
use tracing::dispatcher;
use tracing_subscriber::EnvFilter;
use tributary_core::{LogField, LogRecord, LogSeverity, Logger};

/// 桥接日志统一使用的 `tracing` target。
pub const TRACING_TARGET: &str = "tributary";

/// 把结构化日志转发给当前 `tracing` 订阅器。
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

macro_rules! emit {
    ($level:ident, $record:expr, $fields:expr) => {
        tracing::$level!(
            target: TRACING_TARGET,
            origin = $record.target.unwrap_or(""),
            fields = %$fields,
            "{}",
            $record.message
        )
    };
}

impl Logger for TracingLogger {
    fn log(&self, record: &LogRecord<'_>) {
        let fields = render_fields(record.attributes);
        match record.severity {
            LogSeverity::Trace => emit!(trace, record, fields),
            LogSeverity::Debug => emit!(debug, record, fields),
            LogSeverity::Info => emit!(info, record, fields),
            LogSeverity::Warn => emit!(warn, record, fields),
            LogSeverity::Error => emit!(error, record, fields),
        }
    }
}

fn render_fields(attributes: LogField<'_>) -> String {
    let mut rendered = String::new();
    for (index, attribute) in attributes.iter().enumerate() {
        if index > 0 {
            rendered.push(' ');
        }
        // 写入 String 不会失败。
        let _ = write!(rendered, "{}={}", attribute.key(), attribute.value());
    }
    rendered
}

/// 安装全局订阅器时可能出现的错误。
#[derive(Debug, Error)]
pub enum SubscriberInstallError {
    /// 进程中已存在全局 `tracing` 订阅器。
    #[error("a global tracing subscriber is already installed")]
    AlreadySet,
    #[error("failed to install tracing subscriber: {0}")]
    SetGlobalDefault(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// 安装 `fmt` 订阅器，过滤规则取自 `RUST_LOG`，缺省为 `info`。
pub fn install_tracing_subscriber() -> Result<(), SubscriberInstallError> {
    if dispatcher::has_been_set() {
        return Err(SubscriberInstallError::AlreadySet);
    }
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
