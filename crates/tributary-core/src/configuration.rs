//! 通道与缓冲池配置。
//!
//! # 教案式说明
//! - **意图（Why）**：宿主以 TOML 描述通道行为与池容量，所有字段均有默认值，空文档即可得到可用配置；
//! - **逻辑（How）**：`serde` 反序列化后调用 [`TributaryConfig::validate`] 校验取值范围；
//! - **契约（What）**：非法取值返回 [`ChannelError::Configuration`]，不会 panic。
//!
//! ```toml
//! [channel]
//! activate_upstream_on_create = true
//! report_unconsumed_bytes = true
//!
//! [pool]
//! buffer_size = 32768
//! capacity = 256
//! shared = true
//! interrupt_poll_interval_ms = 10
//! ```

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// 顶层配置。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TributaryConfig {
    pub channel: ChannelConfig,
    pub pool: PoolConfig,
}

impl TributaryConfig {
    /// 解析并校验 TOML 文本。
    pub fn from_toml_str(source: &str) -> Result<Self, ChannelError> {
        let config: TributaryConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChannelError> {
        self.pool.validate()
    }
}

/// 输入通道代理的行为开关。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelConfig {
    /// 构造代理时是否立即向上游发送 `Activate` 事件。
    pub activate_upstream_on_create: bool,
    /// 释放缓冲时若仍有未读字节是否记录告警。
    pub report_unconsumed_bytes: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            activate_upstream_on_create: true,
            report_unconsumed_bytes: true,
        }
    }
}

/// 有界缓冲池的容量参数。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// 单块缓冲字节数，同时是 `max_buffer_size()`。
    pub buffer_size: usize,
    /// 同时在外的缓冲块上限。
    pub capacity: usize,
    /// 池是否被多个通道共享。
    pub shared: bool,
    /// 阻塞等待方检查中断令牌的间隔。
    pub interrupt_poll_interval_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            buffer_size: 32 * 1024,
            capacity: 256,
            shared: true,
            interrupt_poll_interval_ms: 10,
        }
    }
}

impl PoolConfig {
    pub fn interrupt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.interrupt_poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ChannelError> {
        if self.buffer_size == 0 {
            return Err(ChannelError::configuration("pool.buffer_size must be positive"));
        }
        if self.capacity == 0 {
            return Err(ChannelError::configuration("pool.capacity must be positive"));
        }
        if self.interrupt_poll_interval_ms == 0 {
            return Err(ChannelError::configuration(
                "pool.interrupt_poll_interval_ms must be positive",
            ));
        }
        Ok(())
    }
}
