use alloc::boxed::Box;

use crate::{
    buffer::ChannelBuffer,
    event::{ChannelEvent, EventList},
    ids::{ChannelId, JobId},
};

/// 网络层投递的最小传输单元：可选的数据缓冲 + 有序控制事件。
///
/// # 教案式说明
/// - **意图（Why）**：数据与控制信号共享同一条有序通路，消费端才能观察到“事件不晚于同信封缓冲”的顺序保证。
/// - **契约（What）**：
///   - `sequence_number` 由外部协作方分配，本 crate 视其为不透明序号；上行临时信封固定为 0；
///   - `buffer` 为 `None` 时是纯控制信封，入队后绝不会作为“待消费缓冲”暴露给消费端；
///   - 入队后信封视为不可变，唯一例外是通道代理在首次借出时取走事件列表用于重放。
/// - **风险（Trade-offs）**：信封直接丢弃而未回收缓冲时，缓冲依赖其自身的 `Drop` 归还容量；
///   正常路径应始终经由 [`ChannelBuffer::recycle`]。
#[derive(Debug)]
pub struct Envelope {
    sequence_number: u64,
    job_id: JobId,
    channel_id: ChannelId,
    buffer: Option<Box<dyn ChannelBuffer>>,
    events: EventList,
}

impl Envelope {
    /// 创建不含缓冲与事件的空信封。
    pub fn new(sequence_number: u64, job_id: JobId, channel_id: ChannelId) -> Self {
        Self {
            sequence_number,
            job_id,
            channel_id,
            buffer: None,
            events: EventList::new(),
        }
    }

    /// 附加数据缓冲；已存在的缓冲会先被回收。
    pub fn with_buffer(mut self, buffer: Box<dyn ChannelBuffer>) -> Self {
        if let Some(previous) = self.buffer.replace(buffer) {
            previous.recycle();
        }
        self
    }

    pub fn with_event(mut self, event: ChannelEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn with_events(mut self, events: EventList) -> Self {
        for event in events {
            self.events.push(event);
        }
        self
    }

    pub fn add_event(&mut self, event: ChannelEvent) {
        self.events.push(event);
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn has_buffer(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn buffer(&self) -> Option<&dyn ChannelBuffer> {
        self.buffer.as_deref()
    }

    pub fn buffer_mut(&mut self) -> Option<&mut (dyn ChannelBuffer + 'static)> {
        self.buffer.as_deref_mut()
    }

    /// 信封是否携带由池内存承载的缓冲。
    pub fn is_backed_by_memory(&self) -> bool {
        self.buffer
            .as_deref()
            .is_some_and(|buffer| buffer.is_backed_by_memory())
    }

    pub fn events(&self) -> &EventList {
        &self.events
    }

    /// 取走事件列表，信封内留下空列表。
    pub fn take_events(&mut self) -> EventList {
        self.events.take()
    }

    pub fn take_buffer(&mut self) -> Option<Box<dyn ChannelBuffer>> {
        self.buffer.take()
    }

    /// 拆解为缓冲与事件两部分。
    pub fn into_parts(self) -> (Option<Box<dyn ChannelBuffer>>, EventList) {
        (self.buffer, self.events)
    }
}
