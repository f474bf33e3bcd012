use std::collections::VecDeque;

use tributary_core::{ChannelBuffer, Envelope, EventList};

use crate::sync::{Mutex, MutexGuard};

/// 单个输入通道的信封 FIFO。
///
/// # 教案式说明
/// - **意图（Why）**：网络接收线程（多生产者）与消费任务（单消费者）在此唯一的竞争点交汇，
///   所有“先看再改”的组合操作都必须在一次加锁内完成，避免两个线程同时决定丢弃同一个队首。
/// - **逻辑（How）**：
///   - `VecDeque` 保存信封，插入顺序即交付顺序即消费顺序；
///   - `head_lent` 记录队首信封的缓冲是否已借给消费端，借出后只有 [`release_head`](Self::release_head)
///     或代数匹配的 [`release_head_if`](Self::release_head_if) 能把它出队；
///   - `lend_generation` 在每次首次借出时递增，租约凭代数而非外部分配的序号识别自己的信封；
///   - 入队时记下信封是否由池内存承载，`memory_backed` 按记录增减，不依赖缓冲在出队时的回答。
/// - **契约（What）**：
///   - 队列不设长度上限，内存约束由缓冲池负责；
///   - 纯控制信封（无缓冲）永远不会被借出，只会在窥视时被直接移除并交还调用方重放事件；
///   - 统计值是最终一致的快照，仅在没有入队 / 出队进行中时精确。
pub struct EnvelopeQueue {
    state: Mutex<QueueState>,
}

struct QueuedEnvelope {
    envelope: Envelope,
    memory_backed: bool,
}

#[derive(Default)]
struct QueueState {
    envelopes: VecDeque<QueuedEnvelope>,
    head_lent: bool,
    lend_generation: u64,
    memory_backed: usize,
}

impl QueueState {
    fn pop_front(&mut self) -> Option<Envelope> {
        let queued = self.envelopes.pop_front()?;
        self.head_lent = false;
        if queued.memory_backed {
            self.memory_backed -= 1;
        }
        Some(queued.envelope)
    }

    fn lent_head(&mut self, generation: u64) -> Option<&mut Envelope> {
        if !self.head_lent || self.lend_generation != generation {
            return None;
        }
        self.envelopes.front_mut().map(|queued| &mut queued.envelope)
    }
}

/// [`EnvelopeQueue::peek_or_drop_if_empty_payload`] 的结果。
#[derive(Debug)]
pub enum PeekedHead {
    /// 队列为空。
    Empty,
    /// 队首是纯控制信封，已被移出队列；调用方负责重放其事件。
    Dropped(Envelope),
    /// 队首携带缓冲，已标记为借出但仍留在队列中。
    ///
    /// `events` 只在首次借出时非空；重复借出同一信封不会再次交出事件，`generation` 保持不变。
    Lent {
        sequence_number: u64,
        generation: u64,
        events: EventList,
    },
}

/// 队首无法按协议出队的原因，仅用于日志。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReleaseViolation {
    /// 队列为空。
    EmptyQueue,
    /// 队首缓冲从未被借出。
    HeadNotLent,
    /// 租约对应的信封已出队，队首是之后借出的另一个信封。
    StaleLease,
}

impl ReleaseViolation {
    pub fn describe(self) -> &'static str {
        match self {
            ReleaseViolation::EmptyQueue => "release called on an empty envelope queue",
            ReleaseViolation::HeadNotLent => "release called while no buffer is lent to the consumer",
            ReleaseViolation::StaleLease => "release called through a lease whose envelope was already released",
        }
    }
}

/// 队列的监控快照。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelStatistics {
    /// 排队中的信封数。
    pub queued_envelopes: usize,
    /// 排队中由池内存承载的缓冲数。
    pub queued_memory_buffers: usize,
}

impl ChannelStatistics {
    /// 逐项相加，供网关汇总多个通道。
    pub fn merge(self, other: ChannelStatistics) -> ChannelStatistics {
        ChannelStatistics {
            queued_envelopes: self.queued_envelopes + other.queued_envelopes,
            queued_memory_buffers: self.queued_memory_buffers + other.queued_memory_buffers,
        }
    }
}

impl EnvelopeQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock()
    }

    /// 追加到队尾。
    pub fn push(&self, envelope: Envelope) {
        let memory_backed = envelope.is_backed_by_memory();
        let mut state = self.lock();
        if memory_backed {
            state.memory_backed += 1;
        }
        state.envelopes.push_back(QueuedEnvelope {
            envelope,
            memory_backed,
        });
    }

    /// 窥视队首：纯控制信封立即出队并返回，携带缓冲的信封留在队中并标记为借出。
    ///
    /// 首次借出时事件列表从信封中取走并随结果返回，因此事件恰好交付一次。
    pub fn peek_or_drop_if_empty_payload(&self) -> PeekedHead {
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(head) = state.envelopes.front_mut() else {
            return PeekedHead::Empty;
        };
        let head = &mut head.envelope;
        if !head.has_buffer() {
            return match state.pop_front() {
                Some(envelope) => PeekedHead::Dropped(envelope),
                None => PeekedHead::Empty,
            };
        }
        let sequence_number = head.sequence_number();
        if state.head_lent {
            return PeekedHead::Lent {
                sequence_number,
                generation: state.lend_generation,
                events: EventList::new(),
            };
        }
        let events = head.take_events();
        state.head_lent = true;
        state.lend_generation = state.lend_generation.wrapping_add(1);
        PeekedHead::Lent {
            sequence_number,
            generation: state.lend_generation,
            events,
        }
    }

    /// 无条件移出队首。
    pub fn pop(&self) -> Option<Envelope> {
        self.lock().pop_front()
    }

    /// 移出已借出的队首；队列为空或队首未借出时不做任何修改。
    pub fn release_head(&self) -> Result<Envelope, ReleaseViolation> {
        let mut state = self.lock();
        if state.envelopes.is_empty() {
            return Err(ReleaseViolation::EmptyQueue);
        }
        if !state.head_lent {
            return Err(ReleaseViolation::HeadNotLent);
        }
        state.pop_front().ok_or(ReleaseViolation::EmptyQueue)
    }

    /// 仅当队首仍是第 `generation` 次借出的信封时出队。
    pub fn release_head_if(&self, generation: u64) -> Result<Envelope, ReleaseViolation> {
        let mut state = self.lock();
        if state.envelopes.is_empty() {
            return Err(ReleaseViolation::EmptyQueue);
        }
        if !state.head_lent {
            return Err(ReleaseViolation::HeadNotLent);
        }
        if state.lend_generation != generation {
            return Err(ReleaseViolation::StaleLease);
        }
        state.pop_front().ok_or(ReleaseViolation::EmptyQueue)
    }

    /// 在锁内访问第 `generation` 次借出的队首缓冲；该信封已出队时返回 `None`。
    ///
    /// 闭包运行期间生产者无法入队，应保持简短。
    pub fn with_lent_buffer<R>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut dyn ChannelBuffer) -> R,
    ) -> Option<R> {
        let mut state = self.lock();
        let head = state.lent_head(generation)?;
        let buffer: &mut dyn ChannelBuffer = head.buffer_mut()?;
        Some(f(buffer))
    }

    /// 一次性取出全部信封，仅用于拆除。
    pub fn drain_all(&self) -> Vec<Envelope> {
        let mut state = self.lock();
        state.head_lent = false;
        state.memory_backed = 0;
        state
            .envelopes
            .drain(..)
            .map(|queued| queued.envelope)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().envelopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().envelopes.is_empty()
    }

    /// 排队中由池内存承载的缓冲数，按入队时的记录统计。
    pub fn count_buffer_backed(&self) -> usize {
        self.lock().memory_backed
    }

    /// 在同一次加锁内读取两项监控值。
    pub fn statistics(&self) -> ChannelStatistics {
        let state = self.lock();
        ChannelStatistics {
            queued_envelopes: state.envelopes.len(),
            queued_memory_buffers: state.memory_backed,
        }
    }
}

impl Default for EnvelopeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for EnvelopeQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.lock();
        f.debug_struct("EnvelopeQueue")
            .field("queued_envelopes", &state.envelopes.len())
            .field("queued_memory_buffers", &state.memory_backed)
            .field("head_lent", &state.head_lent)
            .field("lend_generation", &state.lend_generation)
            .finish()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    use super::*;
    use tributary_core::{
        ChannelEvent, ChannelId, JobId,
        test_stubs::channel::{RecycleLedger, TrackedBuffer},
    };

    fn envelope(seq: u64) -> Envelope {
        Envelope::new(seq, JobId::from(7), ChannelId::from(9))
    }

    fn recycle_all(queue: &EnvelopeQueue) {
        for envelope in queue.drain_all() {
            if let (Some(buffer), _) = envelope.into_parts() {
                buffer.recycle();
            }
        }
    }

    #[test]
    fn event_only_head_is_dropped_on_peek() {
        let queue = EnvelopeQueue::new();
        queue.push(envelope(1).with_event(ChannelEvent::Activate));
        match queue.peek_or_drop_if_empty_payload() {
            PeekedHead::Dropped(dropped) => assert_eq!(dropped.sequence_number(), 1),
            other => panic!("纯控制信封应被移除，实际为 {other:?}"),
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn buffer_head_stays_queued_and_events_are_taken_once() {
        let ledger = RecycleLedger::new();
        let queue = EnvelopeQueue::new();
        queue.push(
            envelope(1)
                .with_buffer(TrackedBuffer::boxed(&ledger, 1, 8))
                .with_event(ChannelEvent::Close),
        );

        let PeekedHead::Lent { events, .. } = queue.peek_or_drop_if_empty_payload() else {
            panic!("携带缓冲的信封应被借出");
        };
        assert_eq!(events.len(), 1);
        let PeekedHead::Lent { events, .. } = queue.peek_or_drop_if_empty_payload() else {
            panic!("重复借出应返回同一信封");
        };
        assert!(events.is_empty(), "事件只应交出一次");
        assert_eq!(queue.len(), 1);
        recycle_all(&queue);
    }

    #[test]
    fn release_requires_a_lent_head() {
        let ledger = RecycleLedger::new();
        let queue = EnvelopeQueue::new();
        assert_eq!(queue.release_head().unwrap_err(), ReleaseViolation::EmptyQueue);

        queue.push(envelope(1).with_buffer(TrackedBuffer::boxed(&ledger, 1, 8)));
        assert_eq!(queue.release_head().unwrap_err(), ReleaseViolation::HeadNotLent);
        assert_eq!(queue.len(), 1, "违例不得修改队列");

        queue.peek_or_drop_if_empty_payload();
        let released = queue.release_head().expect("借出后应可出队");
        assert_eq!(released.sequence_number(), 1);
        released.into_parts().0.expect("缓冲仍在信封中").recycle();
        assert_eq!(ledger.times_recycled(1), 1);
    }

    #[test]
    fn lent_buffer_access_checks_lend_generation() {
        let ledger = RecycleLedger::new();
        let queue = EnvelopeQueue::new();
        queue.push(envelope(0).with_buffer(TrackedBuffer::boxed(&ledger, 1, 4)));
        queue.push(envelope(0).with_buffer(TrackedBuffer::boxed(&ledger, 2, 9)));
        assert_eq!(queue.with_lent_buffer(1, |buffer| buffer.remaining()), None);

        let PeekedHead::Lent { generation, .. } = queue.peek_or_drop_if_empty_payload() else {
            panic!("携带缓冲的信封应被借出");
        };
        assert_eq!(queue.with_lent_buffer(generation, |buffer| buffer.remaining()), Some(4));
        queue.release_head_if(generation).expect("代数匹配").into_parts().0.expect("携带缓冲").recycle();

        let PeekedHead::Lent { generation: next, .. } = queue.peek_or_drop_if_empty_payload() else {
            panic!("第二个信封应被借出");
        };
        assert_ne!(next, generation, "序号相同的信封仍须以不同代数借出");
        assert_eq!(queue.with_lent_buffer(generation, |buffer| buffer.remaining()), None);
        assert_eq!(queue.release_head_if(generation).unwrap_err(), ReleaseViolation::StaleLease);
        assert_eq!(queue.with_lent_buffer(next, |buffer| buffer.remaining()), Some(9));
        recycle_all(&queue);
        assert_eq!(ledger.times_recycled(2), 1);
    }

    #[test]
    fn statistics_track_memory_backed_envelopes() {
        let ledger = RecycleLedger::new();
        let queue = EnvelopeQueue::new();
        queue.push(envelope(1).with_buffer(TrackedBuffer::boxed(&ledger, 1, 4)));
        queue.push(envelope(2).with_event(ChannelEvent::Activate));
        queue.push(envelope(3).with_buffer(TrackedBuffer::boxed(&ledger, 3, 4)));
        assert_eq!(
            queue.statistics(),
            ChannelStatistics {
                queued_envelopes: 3,
                queued_memory_buffers: 2,
            }
        );

        let popped = queue.pop().expect("队首存在");
        popped.into_parts().0.expect("首个信封携带缓冲").recycle();
        assert_eq!(queue.count_buffer_backed(), 1);
        recycle_all(&queue);
        assert_eq!(queue.statistics(), ChannelStatistics::default());
    }

    #[test]
    fn buffers_outside_pool_memory_are_not_counted() {
        let ledger = RecycleLedger::new();
        let queue = EnvelopeQueue::new();
        queue.push(envelope(1).with_buffer(TrackedBuffer::boxed(&ledger, 1, 4)));
        queue.push(envelope(2).with_buffer(TrackedBuffer::boxed_unpooled(&ledger, 2, 4)));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.count_buffer_backed(), 1);

        queue.pop().expect("队首存在").into_parts().0.expect("携带缓冲").recycle();
        queue.pop().expect("队首存在").into_parts().0.expect("携带缓冲").recycle();
        assert_eq!(queue.statistics(), ChannelStatistics::default());
    }

    /// 回答会随外部开关变化的缓冲。
    struct FlippingBuffer {
        backed: Arc<AtomicBool>,
    }

    impl ChannelBuffer for FlippingBuffer {
        fn remaining(&self) -> usize {
            0
        }

        fn capacity(&self) -> usize {
            0
        }

        fn chunk(&self) -> &[u8] {
            &[]
        }

        fn advance(&mut self, _count: usize) {}

        fn is_backed_by_memory(&self) -> bool {
            self.backed.load(Ordering::Acquire)
        }

        fn recycle(self: Box<Self>) {}
    }

    #[test]
    fn memory_count_uses_the_answer_recorded_at_push() {
        let backed = Arc::new(AtomicBool::new(true));
        let queue = EnvelopeQueue::new();
        queue.push(envelope(1).with_buffer(Box::new(FlippingBuffer {
            backed: backed.clone(),
        })));
        assert_eq!(queue.count_buffer_backed(), 1);

        backed.store(false, Ordering::Release);
        let popped = queue.pop().expect("队首存在");
        assert_eq!(queue.count_buffer_backed(), 0);
        popped.into_parts().0.expect("携带缓冲").recycle();

        queue.push(envelope(2).with_buffer(Box::new(FlippingBuffer {
            backed: backed.clone(),
        })));
        assert_eq!(queue.count_buffer_backed(), 0);
        backed.store(true, Ordering::Release);
        queue.pop().expect("队首存在").into_parts().0.expect("携带缓冲").recycle();
        assert_eq!(queue.count_buffer_backed(), 0);
    }
}
