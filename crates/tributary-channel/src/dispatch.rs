use std::sync::Arc;

use tributary_core::{
    ChannelError, ChannelEvent, ChannelId, Envelope, EnvelopeDispatcher, EventList, JobId,
};

/// 上行临时信封固定使用的序号。
pub const UPSTREAM_SEQUENCE_NUMBER: u64 = 0;

/// 输入通道向配对输出通道发送控制事件的出站路径。
///
/// # 教案式说明
/// - **意图（Why）**：激活、关闭等信号需要逆着数据方向送达上游；这条路径只负责构造信封并交给分发器，
///   严格出站，从不触碰本地信封队列。
/// - **逻辑（How）**：每个事件封装为一个临时信封：序号为 [`UPSTREAM_SEQUENCE_NUMBER`]、无缓冲、
///   单元素事件列表，作业与通道标识取自本通道。
/// - **契约（What）**：分发失败原样返回给调用方，本路径不重试。
#[derive(Clone)]
pub struct UpstreamDispatch {
    dispatcher: Arc<dyn EnvelopeDispatcher>,
    job_id: JobId,
    channel_id: ChannelId,
}

impl UpstreamDispatch {
    pub fn new(dispatcher: Arc<dyn EnvelopeDispatcher>, job_id: JobId, channel_id: ChannelId) -> Self {
        Self {
            dispatcher,
            job_id,
            channel_id,
        }
    }

    /// 构造承载单个事件的临时信封。
    pub fn ephemeral_envelope(&self, event: ChannelEvent) -> Envelope {
        Envelope::new(UPSTREAM_SEQUENCE_NUMBER, self.job_id, self.channel_id)
            .with_events(EventList::single(event))
    }

    pub fn send(&self, event: ChannelEvent) -> Result<(), ChannelError> {
        self.dispatcher
            .dispatch_from_input_channel(self.ephemeral_envelope(event))
    }
}

impl core::fmt::Debug for UpstreamDispatch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UpstreamDispatch")
            .field("job_id", &self.job_id)
            .field("channel_id", &self.channel_id)
            .finish_non_exhaustive()
    }
}
