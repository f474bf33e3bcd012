//! 通道代理对外暴露的两个窄能力接口。
//!
//! # 教案式说明
//! - **意图（Why）**：同一个代理对象同时服务三类调用方：读取输入的消费任务、负责寻址与投递的路由层、
//!   以及需要缓冲的本地通道实现。按调用方拆成 [`InputChannelBroker`]、[`ChannelContext`] 与
//!   `tributary_core::BufferProvider` 三个接口，调用方只能看到自己需要的那一面。
//! - **契约（What）**：
//!   - `InputChannelBroker` 的获取 / 释放是单消费者协议，不得在两个线程上交错调用；
//!   - `ChannelContext::queue_envelope` 可被任意数量的生产者线程并发调用；
//!   - 两个接口都不通过返回值报告本地一致性违例，违例只进入日志。

use tributary_core::{ChannelError, ChannelEvent, ChannelId, Envelope, JobId};

use crate::broker::BufferLease;

/// 消费任务使用的缓冲获取协议。
pub trait InputChannelBroker {
    /// 取得下一个待消费缓冲的租约。
    ///
    /// 队首为纯控制信封时，将其移出队列并按序重放事件，然后返回 `None`；
    /// 队首携带缓冲时，先重放其事件，再返回指向该信封的租约，信封留在队列中直到被释放。
    fn fetch_next_buffer(&self) -> Option<BufferLease<'_>>;

    /// 结束对当前缓冲的消费：出队并把缓冲归还给池。
    fn release_current_buffer(&self);

    /// 通过分发器向配对的上游输出通道发送一个控制事件，不经过本地队列。
    fn send_event_upstream(&self, event: ChannelEvent) -> Result<(), ChannelError>;
}

/// 路由层与网络层使用的通道上下文。
pub trait ChannelContext: Send + Sync {
    fn channel_id(&self) -> ChannelId;

    fn connected_channel_id(&self) -> ChannelId;

    fn job_id(&self) -> JobId;

    fn is_input_channel(&self) -> bool;

    /// 网络层交付一个新信封：入队后无条件通知消费端。
    fn queue_envelope(&self, envelope: Envelope);

    /// 网络层报告传输失败：先交给消费端，再发出与入队相同的通知。
    fn report_transport_error(&self, error: ChannelError);

    /// 清空队列并回收所有排队中的缓冲。
    fn release_all_resources(&self);
}
