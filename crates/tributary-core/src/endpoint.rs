//! 通道代理消费的两类外部能力：本地消费端与信封分发器。
//!
//! # 教案式说明
//! - **意图（Why）**：代理既不拥有消费端也不拥有传输层，只通过这两个窄接口与它们交互，
//!   组合关系以 `Arc<dyn …>` 注入，而不是继承。
//! - **契约（What）**：
//!   - [`InputChannelEndpoint`] 的回调全部同步执行，且在调用线程上完成；
//!     `on_data_may_be_available` 只是“再试一次”的提示，允许虚假唤醒；
//!   - [`EnvelopeDispatcher`] 只负责把信封交给传输层，失败以 [`ChannelError`] 返回。

use crate::{
    envelope::Envelope,
    error::ChannelError,
    event::ChannelEvent,
    ids::{ChannelId, JobId},
};

/// 输入通道在本地的消费端（读取输入的任务）。
pub trait InputChannelEndpoint: Send + Sync {
    /// 按信封内顺序交付一个控制事件。
    fn on_event(&self, event: &ChannelEvent);

    /// 提示消费端重新尝试获取缓冲；可能是虚假提示。
    fn on_data_may_be_available(&self);

    /// 网络层报告了该通道的传输失败。
    fn on_transport_error(&self, error: &ChannelError);

    fn channel_id(&self) -> ChannelId;

    /// 与本通道配对的上游输出通道。
    fn connected_channel_id(&self) -> ChannelId;

    fn job_id(&self) -> JobId;

    /// 方向标记；输入端恒为 `true`，保留该方法以便路由层统一处理两种方向。
    fn is_input_channel(&self) -> bool {
        true
    }
}

/// 把信封路由到配对通道的分发器。
pub trait EnvelopeDispatcher: Send + Sync {
    /// 提交一个从输入通道发出的信封（通常是仅含控制事件的上行信封）。
    fn dispatch_from_input_channel(&self, envelope: Envelope) -> Result<(), ChannelError>;
}
