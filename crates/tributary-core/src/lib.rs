#![deny(unsafe_code)]
#![doc = "tributary-core: 数据流引擎点对点通道接收端的核心契约。"]
#![doc = ""]
#![doc = "本 crate 只定义类型与能力接口：信封、控制事件、池化缓冲、缓冲提供者、本地消费端与分发器，"]
#![doc = "以及错误域、结构化日志契约与配置。具体的缓冲池位于 `tributary-buffer`，"]
#![doc = "信封队列与通道代理位于 `tributary-channel`。"]

extern crate alloc;

pub mod buffer;
pub mod configuration;
pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod event;
pub mod ids;
pub mod observability;
pub mod provider;
/// 测试桩命名空间，集中暴露记录型与空实现，供各 crate 的集成测试复用。
pub mod test_stubs;

pub use buffer::ChannelBuffer;
pub use configuration::{ChannelConfig, PoolConfig, TributaryConfig};
pub use endpoint::{EnvelopeDispatcher, InputChannelEndpoint};
pub use envelope::Envelope;
pub use error::{ChannelError, codes};
pub use event::{ChannelEvent, EventList, UserEvent};
pub use ids::{ChannelId, JobId};
pub use observability::{AttributeValue, LogAttribute, LogField, LogRecord, LogSeverity, Logger};
pub use provider::{BufferProvider, Interruption};

/// 统一的结果别名。
pub type Result<T, E = ChannelError> = core::result::Result<T, E>;
