//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为通道核心的外部失败（传输、缓冲池、分发器、配置）提供统一错误域；
//! - 本地簿记类问题（一致性违例）不进入错误域，只以日志呈现，调用方无从据此采取不同的恢复动作。
//!
//! ## 设计要求（What）
//! - 错误实现 `thiserror::Error`，并且是 `Clone`：同一传输错误既要交给消费端，也可能写入日志；
//! - 每个变体映射到 [`codes`] 中 `<领域>.<语义>` 形式的稳定错误码。

use alloc::string::{String, ToString};
use std::io;

use thiserror::Error;

use crate::ids::ChannelId;

/// 稳定错误码集合。
///
/// 错误码遵循 `<领域>.<语义>` 命名约定，方便在跨组件日志中检索与聚合。
pub mod codes {
    /// 传输层 I/O 失败。
    pub const TRANSPORT_IO: &str = "transport.io";
    /// 阻塞等待缓冲时被中断。
    pub const POOL_INTERRUPTED: &str = "pool.interrupted";
    /// 请求的最小容量超过池的单块上限。
    pub const POOL_BUFFER_TOO_LARGE: &str = "pool.buffer_too_large";
    /// 缓冲池已关闭。
    pub const POOL_CLOSED: &str = "pool.closed";
    /// 分发器拒绝或无法投递信封。
    pub const DISPATCH_FAILED: &str = "dispatch.failed";
    /// 配置非法。
    pub const CONFIGURATION_INVALID: &str = "configuration.invalid";
    /// 通道协议被违反（仅作为日志字段出现，不构成错误返回）。
    pub const CHANNEL_CONSISTENCY_VIOLATION: &str = "channel.consistency_violation";
    /// 消费端释放缓冲时仍有未读字节（仅日志）。
    pub const CHANNEL_UNCONSUMED_BYTES: &str = "channel.unconsumed_bytes";
    /// 同一通道标识被重复注册到网关。
    pub const CHANNEL_ALREADY_REGISTERED: &str = "channel.already_registered";
    /// 信封指向未在网关注册的通道（仅日志）。
    pub const CHANNEL_UNKNOWN: &str = "channel.unknown";
}

/// 通道核心的错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：把源自本组件之外的失败（网络、缓冲池、分发器）以可区分的形态交还给调用方，
///   尤其是阻塞获取缓冲时的中断必须与 I/O 失败区分开；
/// - **契约 (What)**：所有变体 `Send + Sync + Clone + 'static`，可以跨线程作为数据传递，
///   而不是跨线程“抛出”；
/// - **执行逻辑 (How)**：`std::io::Error` 不可克隆，转换时保留 `ErrorKind` 与文本描述。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// 传输层 I/O 失败。
    #[error("transport I/O failure ({kind:?}): {detail}")]
    Io { kind: io::ErrorKind, detail: String },

    /// 阻塞等待缓冲的线程被中断。
    #[error("interrupted while waiting for a buffer")]
    Interrupted,

    /// 请求容量超过池的单块上限。
    #[error("requested buffer of {requested} bytes exceeds the pool maximum of {max} bytes")]
    BufferTooLarge { requested: usize, max: usize },

    /// 缓冲池已关闭，不再发放缓冲。
    #[error("buffer pool is closed")]
    PoolClosed,

    /// 分发器未能投递信封。
    #[error("envelope dispatch failed: {detail}")]
    Dispatch { detail: String },

    /// 配置非法。
    #[error("invalid configuration: {detail}")]
    Configuration { detail: String },

    /// 网关中已存在同一标识的通道。
    #[error("channel {channel_id} is already registered")]
    ChannelAlreadyRegistered { channel_id: ChannelId },
}

impl ChannelError {
    /// 构造 I/O 错误，便于传输层在没有 `std::io::Error` 实例时直接上报。
    pub fn io(kind: io::ErrorKind, detail: impl Into<String>) -> Self {
        Self::Io {
            kind,
            detail: detail.into(),
        }
    }

    pub fn dispatch(detail: impl Into<String>) -> Self {
        Self::Dispatch {
            detail: detail.into(),
        }
    }

    pub fn configuration(detail: impl Into<String>) -> Self {
        Self::Configuration {
            detail: detail.into(),
        }
    }

    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            ChannelError::Io { .. } => codes::TRANSPORT_IO,
            ChannelError::Interrupted => codes::POOL_INTERRUPTED,
            ChannelError::BufferTooLarge { .. } => codes::POOL_BUFFER_TOO_LARGE,
            ChannelError::PoolClosed => codes::POOL_CLOSED,
            ChannelError::Dispatch { .. } => codes::DISPATCH_FAILED,
            ChannelError::Configuration { .. } => codes::CONFIGURATION_INVALID,
            ChannelError::ChannelAlreadyRegistered { .. } => codes::CHANNEL_ALREADY_REGISTERED,
        }
    }

    /// 是否为中断；调用方据此决定放弃还是重试阻塞请求。
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ChannelError::Interrupted)
    }
}

impl From<io::Error> for ChannelError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::Interrupted {
            return ChannelError::Interrupted;
        }
        ChannelError::Io {
            kind: err.kind(),
            detail: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ChannelError {
    fn from(err: toml::de::Error) -> Self {
        ChannelError::Configuration {
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_keeps_kind_and_message() {
        let err = ChannelError::from(io::Error::new(io::ErrorKind::ConnectionReset, "peer reset"));
        assert_eq!(err.code(), codes::TRANSPORT_IO);
        match err {
            ChannelError::Io { kind, detail } => {
                assert_eq!(kind, io::ErrorKind::ConnectionReset);
                assert_eq!(detail, "peer reset");
            }
            other => panic!("期望 I/O 错误，实际为 {other:?}"),
        }
    }

    #[test]
    fn io_interrupted_maps_to_distinguishable_variant() {
        let err = ChannelError::from(io::Error::from(io::ErrorKind::Interrupted));
        assert!(err.is_interrupted());
        assert_eq!(err.code(), codes::POOL_INTERRUPTED);
    }
}
