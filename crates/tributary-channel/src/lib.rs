#![deny(unsafe_code)]
#![doc = "tributary-channel: 输入通道接收端的信封队列、通道代理与输入网关。"]
#![doc = ""]
#![doc = "网络层经 [`ChannelContext::queue_envelope`] 交付信封，消费任务经 [`InputChannelBroker`]"]
#![doc = "以两阶段租约获取并归还缓冲，控制事件经 [`UpstreamDispatch`] 逆向送达上游输出通道。"]
#![doc = "日志通过注入的 `tributary_core::Logger` 输出，[`observability::TracingLogger`] 将其桥接到 `tracing`。"]

mod broker;
mod capability;
mod dispatch;
mod gate;
pub mod observability;
mod queue;
mod sync;

pub use broker::{BufferLease, InputChannelContext};
pub use capability::{ChannelContext, InputChannelBroker};
pub use dispatch::{UPSTREAM_SEQUENCE_NUMBER, UpstreamDispatch};
pub use gate::InputGateContext;
pub use queue::{ChannelStatistics, EnvelopeQueue, PeekedHead, ReleaseViolation};
