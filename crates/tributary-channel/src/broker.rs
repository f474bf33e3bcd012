use std::sync::Arc;

use tributary_core::{
    BufferProvider, ChannelBuffer, ChannelConfig, ChannelError, ChannelEvent, ChannelId,
    Envelope, EnvelopeDispatcher, EventList, InputChannelEndpoint, Interruption, JobId,
    LogAttribute, Logger, codes, observability::keys,
};

use crate::{
    capability::{ChannelContext, InputChannelBroker},
    dispatch::UpstreamDispatch,
    queue::{ChannelStatistics, EnvelopeQueue, PeekedHead, ReleaseViolation},
};

/// `InputChannelContext` 是单个输入通道的接收端代理。
///
/// # 教案式说明
/// - **意图（Why）**：网络层、消费任务与缓冲池在此交汇。代理拥有信封队列，
///   引用（而非拥有）缓冲提供者与本地消费端，负责缓冲的获取、消费与归还，
///   纯控制信封的自动剔除，事件重放，上行事件派发，传输错误上报与拆除时的排空回收。
/// - **逻辑（How）**：
///   - 获取采用两阶段租约：[`fetch_next_buffer`](InputChannelBroker::fetch_next_buffer) 只把队首标记为借出，
///     信封留在队列中，直到 [`release_current_buffer`](InputChannelBroker::release_current_buffer) 出队并回收；
///   - 事件在锁内取出、锁外重放，消费端回调期间生产者不会被阻塞；
///   - 入队与上报错误都以“先改状态、后通知”的顺序执行，消费端必须容忍虚假通知。
/// - **契约（What）**：
///   - 构造时（按配置）向上游发送一次 [`ChannelEvent::Activate`]，失败只记录错误日志；
///   - 一致性违例（空队列释放、未借出即释放、未读完即释放）只写日志，从不 panic 或返回错误；
///   - 每个经由租约消费的缓冲恰好回收一次。
/// - **风险（Trade-offs）**：获取 / 释放是单消费者协议；两个消费线程交错调用会被视为违例并记录，
///   但无法阻止它们读取同一个借出缓冲。
pub struct InputChannelContext {
    endpoint: Arc<dyn InputChannelEndpoint>,
    upstream: UpstreamDispatch,
    provider: Arc<dyn BufferProvider>,
    logger: Arc<dyn Logger>,
    config: ChannelConfig,
    queue: EnvelopeQueue,
}

impl InputChannelContext {
    pub fn new(
        config: ChannelConfig,
        endpoint: Arc<dyn InputChannelEndpoint>,
        dispatcher: Arc<dyn EnvelopeDispatcher>,
        provider: Arc<dyn BufferProvider>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let upstream = UpstreamDispatch::new(dispatcher, endpoint.job_id(), endpoint.channel_id());
        let context = Self {
            endpoint,
            upstream,
            provider,
            logger,
            config,
            queue: EnvelopeQueue::new(),
        };
        if context.config.activate_upstream_on_create {
            context.activate_upstream();
        }
        context
    }

    /// 向上游发送 `Activate`；失败只记录错误日志。
    pub(crate) fn activate_upstream(&self) {
        if let Err(err) = self.upstream.send(ChannelEvent::Activate) {
            self.logger.error_with_fields(
                "failed to activate upstream output channel",
                &[
                    LogAttribute::new(keys::CODE, err.code()),
                    LogAttribute::new(keys::ERROR, err.to_string()),
                    LogAttribute::new(keys::JOB_ID, self.job_id().to_string()),
                    LogAttribute::new(keys::CHANNEL_ID, self.channel_id().to_string()),
                    LogAttribute::new(
                        keys::CONNECTED_CHANNEL_ID,
                        self.connected_channel_id().to_string(),
                    ),
                ],
            );
        }
    }

    fn replay(&self, events: EventList) {
        for event in &events {
            self.endpoint.on_event(event);
        }
    }

    fn report_violation(&self, message: &str) {
        self.logger.error_with_fields(
            message,
            &[
                LogAttribute::new(keys::CODE, codes::CHANNEL_CONSISTENCY_VIOLATION),
                LogAttribute::new(keys::CHANNEL_ID, self.channel_id().to_string()),
            ],
        );
    }

    /// 排队中的信封数。
    pub fn number_of_queued_envelopes(&self) -> usize {
        self.queue.len()
    }

    /// 排队中由池内存承载的缓冲数。
    pub fn number_of_queued_memory_buffers(&self) -> usize {
        self.queue.count_buffer_backed()
    }

    pub fn statistics(&self) -> ChannelStatistics {
        self.queue.statistics()
    }
}

impl InputChannelBroker for InputChannelContext {
    fn fetch_next_buffer(&self) -> Option<BufferLease<'_>> {
        match self.queue.peek_or_drop_if_empty_payload() {
            PeekedHead::Empty => None,
            PeekedHead::Dropped(mut envelope) => {
                self.replay(envelope.take_events());
                None
            }
            PeekedHead::Lent {
                sequence_number,
                generation,
                events,
            } => {
                self.replay(events);
                Some(BufferLease {
                    context: self,
                    sequence_number,
                    generation,
                })
            }
        }
    }

    fn release_current_buffer(&self) {
        self.finish_release(self.queue.release_head());
    }

    fn send_event_upstream(&self, event: ChannelEvent) -> Result<(), ChannelError> {
        self.upstream.send(event)
    }
}

impl InputChannelContext {
    /// 回收已出队的借出信封；出队失败只记录违例。
    fn finish_release(&self, released: Result<Envelope, ReleaseViolation>) {
        let envelope = match released {
            Ok(envelope) => envelope,
            Err(violation) => {
                self.report_violation(violation.describe());
                return;
            }
        };
        let sequence_number = envelope.sequence_number();
        let (buffer, _) = envelope.into_parts();
        let Some(buffer) = buffer else {
            self.report_violation("released envelope carried no buffer");
            return;
        };

        let remaining = buffer.remaining();
        if remaining > 0 && self.config.report_unconsumed_bytes {
            self.logger.warn_with_fields(
                "consumer released a buffer with unconsumed bytes",
                &[
                    LogAttribute::new(keys::CODE, codes::CHANNEL_UNCONSUMED_BYTES),
                    LogAttribute::new(keys::REMAINING_BYTES, remaining),
                    LogAttribute::new(keys::SEQUENCE_NUMBER, sequence_number),
                    LogAttribute::new(keys::CHANNEL_ID, self.channel_id().to_string()),
                ],
            );
        }
        buffer.recycle();
    }
}

impl ChannelContext for InputChannelContext {
    fn channel_id(&self) -> ChannelId {
        self.endpoint.channel_id()
    }

    fn connected_channel_id(&self) -> ChannelId {
        self.endpoint.connected_channel_id()
    }

    fn job_id(&self) -> JobId {
        self.endpoint.job_id()
    }

    fn is_input_channel(&self) -> bool {
        self.endpoint.is_input_channel()
    }

    fn queue_envelope(&self, envelope: Envelope) {
        self.queue.push(envelope);
        self.endpoint.on_data_may_be_available();
    }

    fn report_transport_error(&self, error: ChannelError) {
        self.endpoint.on_transport_error(&error);
        self.endpoint.on_data_may_be_available();
    }

    /// 排空队列后在锁外回收缓冲。被排空信封上的事件不会重放，只计入日志。
    fn release_all_resources(&self) {
        let drained = self.queue.drain_all();
        if drained.is_empty() {
            return;
        }
        let mut recycled = 0usize;
        let mut dropped_events = 0usize;
        for envelope in drained {
            let (buffer, events) = envelope.into_parts();
            dropped_events += events.len();
            if let Some(buffer) = buffer {
                buffer.recycle();
                recycled += 1;
            }
        }
        self.logger.debug_with_fields(
            "released queued envelopes",
            &[
                LogAttribute::new(keys::RECYCLED_BUFFERS, recycled),
                LogAttribute::new(keys::DROPPED_EVENTS, dropped_events),
                LogAttribute::new(keys::CHANNEL_ID, self.channel_id().to_string()),
            ],
        );
    }
}

impl BufferProvider for InputChannelContext {
    fn request_buffer(&self, min_size: usize) -> Result<Option<Box<dyn ChannelBuffer>>, ChannelError> {
        self.provider.request_buffer(min_size)
    }

    fn request_buffer_blocking(
        &self,
        min_size: usize,
        interruption: &Interruption,
    ) -> Result<Box<dyn ChannelBuffer>, ChannelError> {
        self.provider.request_buffer_blocking(min_size, interruption)
    }

    fn max_buffer_size(&self) -> usize {
        self.provider.max_buffer_size()
    }

    fn is_shared(&self) -> bool {
        self.provider.is_shared()
    }
}

impl core::fmt::Debug for InputChannelContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InputChannelContext")
            .field("job_id", &self.job_id())
            .field("channel_id", &self.channel_id())
            .field("connected_channel_id", &self.connected_channel_id())
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

/// 指向队首借出信封的缓冲租约。
///
/// 租约不持有缓冲：每次读取都短暂加锁并访问仍在队列中的信封。
/// 丢弃租约而不释放时信封保持借出状态，消费端可再次获取并继续读取。
///
/// 租约以借出代数识别信封，序号由外部分配、可能重复，不参与识别。
/// 信封已被释放或拆除后，读取返回空结果，释放只记录违例，不会触及之后借出的信封。
#[must_use = "释放租约才能把缓冲归还给池"]
pub struct BufferLease<'a> {
    context: &'a InputChannelContext,
    sequence_number: u64,
    generation: u64,
}

impl BufferLease<'_> {
    /// 借出信封的序号。
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn remaining(&self) -> usize {
        self.with_buffer(|buffer| buffer.remaining()).unwrap_or(0)
    }

    /// 复制至多 `dst.len()` 字节并推进游标，返回实际字节数。
    pub fn read(&self, dst: &mut [u8]) -> usize {
        self.with_buffer(|buffer| buffer.copy_to_slice(dst))
            .unwrap_or(0)
    }

    /// 在锁内查看当前可读切片，不推进游标。
    pub fn with_chunk<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        self.with_buffer(|buffer| f(buffer.chunk()))
    }

    /// 跳过 `count` 字节，超过剩余长度时钳制到末尾。
    pub fn advance(&self, count: usize) {
        self.with_buffer(|buffer| buffer.advance(count));
    }

    /// 结束消费并归还缓冲。
    ///
    /// 与 [`InputChannelBroker::release_current_buffer`] 不同，只有租约指向的信封仍在队首时才出队。
    pub fn release(self) {
        self.context
            .finish_release(self.context.queue.release_head_if(self.generation));
    }

    fn with_buffer<R>(&self, f: impl FnOnce(&mut dyn ChannelBuffer) -> R) -> Option<R> {
        self.context.queue.with_lent_buffer(self.generation, f)
    }
}

impl core::fmt::Debug for BufferLease<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BufferLease")
            .field("sequence_number", &self.sequence_number)
            .field("generation", &self.generation)
            .field("remaining", &self.remaining())
            .finish()
    }
}
