//! 结构化日志契约。
//!
//! # 设计缘起（Why）
//! - 通道核心不持有全局日志器：代理、网关与缓冲池在构造时接收 `Arc<dyn Logger>`，
//!   日志副作用不参与任何控制流决策；
//! - 宿主可以桥接到 `tracing`（见 `tributary-channel::observability::TracingLogger`）、
//!   或在测试中替换为记录型实现。
//!
//! # 契约约束（What）
//! - 属性键为 `'static` 低基数字符串，值为少量原始类型；
//! - [`Logger::log`] 应尽量非阻塞，且不得 panic。

use alloc::borrow::Cow;
use core::fmt;

/// 日志级别。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// 结构化字段的取值。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeValue<'a> {
    Str(Cow<'a, str>),
    U64(u64),
    I64(i64),
    Bool(bool),
}

impl fmt::Display for AttributeValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Str(value) => f.write_str(value),
            AttributeValue::U64(value) => write!(f, "{value}"),
            AttributeValue::I64(value) => write!(f, "{value}"),
            AttributeValue::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl<'a> From<&'a str> for AttributeValue<'a> {
    fn from(value: &'a str) -> Self {
        AttributeValue::Str(Cow::Borrowed(value))
    }
}

impl From<alloc::string::String> for AttributeValue<'_> {
    fn from(value: alloc::string::String) -> Self {
        AttributeValue::Str(Cow::Owned(value))
    }
}

impl From<u64> for AttributeValue<'_> {
    fn from(value: u64) -> Self {
        AttributeValue::U64(value)
    }
}

impl From<usize> for AttributeValue<'_> {
    fn from(value: usize) -> Self {
        AttributeValue::U64(value as u64)
    }
}

impl From<i64> for AttributeValue<'_> {
    fn from(value: i64) -> Self {
        AttributeValue::I64(value)
    }
}

impl From<bool> for AttributeValue<'_> {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

/// 单个结构化字段。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogAttribute<'a> {
    key: &'static str,
    value: AttributeValue<'a>,
}

impl<'a> LogAttribute<'a> {
    pub fn new(key: &'static str, value: impl Into<AttributeValue<'a>>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn value(&self) -> &AttributeValue<'a> {
        &self.value
    }
}

/// 字段集合以切片传递，调用期间有效即可。
pub type LogField<'a> = &'a [LogAttribute<'a>];

/// 单条结构化日志记录。
///
/// # 逻辑解析（How）
/// - `message` 使用 `Cow`，静态文本零分配，动态文本按需构建；
/// - `target` 对齐 `tracing` 的 target 概念，缺省时由实现决定。
#[derive(Debug)]
pub struct LogRecord<'a> {
    pub message: Cow<'a, str>,
    pub severity: LogSeverity,
    pub target: Option<&'a str>,
    pub attributes: LogField<'a>,
}

impl<'a> LogRecord<'a> {
    pub fn new(
        message: impl Into<Cow<'a, str>>,
        severity: LogSeverity,
        target: Option<&'a str>,
        attributes: LogField<'a>,
    ) -> Self {
        Self {
            message: message.into(),
            severity,
            target,
            attributes,
        }
    }

    /// 按键查找字段。
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue<'a>> {
        self.attributes
            .iter()
            .find(|attr| attr.key == key)
            .map(|attr| &attr.value)
    }
}

/// 日志接口的核心契约。
///
/// # 逻辑解析（How）
/// - `log` 为唯一必需方法；
/// - `debug`/`info`/`warn`/`error` 及其 `_with_fields` 变体内部构造 [`LogRecord`] 再调用 `log`，
///   所有路径共享同一出口。
pub trait Logger: Send + Sync + 'static {
    /// 提交结构化日志。
    fn log(&self, record: &LogRecord<'_>);

    fn debug(&self, message: &str) {
        self.debug_with_fields(message, &[]);
    }

    fn debug_with_fields(&self, message: &str, attributes: LogField<'_>) {
        self.log(&LogRecord::new(message, LogSeverity::Debug, None, attributes));
    }

    fn info(&self, message: &str) {
        self.info_with_fields(message, &[]);
    }

    fn info_with_fields(&self, message: &str, attributes: LogField<'_>) {
        self.log(&LogRecord::new(message, LogSeverity::Info, None, attributes));
    }

    fn warn(&self, message: &str) {
        self.warn_with_fields(message, &[]);
    }

    fn warn_with_fields(&self, message: &str, attributes: LogField<'_>) {
        self.log(&LogRecord::new(message, LogSeverity::Warn, None, attributes));
    }

    fn error(&self, message: &str) {
        self.error_with_fields(message, &[]);
    }

    fn error_with_fields(&self, message: &str, attributes: LogField<'_>) {
        self.log(&LogRecord::new(message, LogSeverity::Error, None, attributes));
    }
}

/// 吞掉所有日志的实现，作为未注入日志器时的缺省值。
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _record: &LogRecord<'_>) {}
}

/// 日志字段键名，通道、网关与缓冲池共用。
pub mod keys {
    pub const CODE: &str = "code";
    pub const JOB_ID: &str = "job.id";
    pub const CHANNEL_ID: &str = "channel.id";
    pub const CONNECTED_CHANNEL_ID: &str = "channel.connected_id";
    pub const SEQUENCE_NUMBER: &str = "envelope.sequence";
    pub const REMAINING_BYTES: &str = "buffer.remaining";
    pub const RECYCLED_BUFFERS: &str = "buffer.recycled";
    pub const DROPPED_EVENTS: &str = "event.dropped";
    pub const ERROR: &str = "error";
    pub const POOL_CAPACITY: &str = "pool.capacity";
    pub const POOL_BUFFER_SIZE: &str = "pool.buffer_size";
}
