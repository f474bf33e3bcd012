//! 测试桩命名空间，集中提供契约的 `Noop` / 记录型实现。
//!
//! # 设计定位（Why）
//! - 代理、网关与缓冲池的测试都需要满足 `Logger`、`InputChannelEndpoint`、`EnvelopeDispatcher`
//!   与 `ChannelBuffer` 契约；统一出口避免在各测试文件中重复定义桩类型，接口演进时也只需单点修改。
//!
//! # 契约说明（What）
//! - 桩对象只用于测试与示例；记录型实现以 `parking_lot::Mutex` 保护内部状态，可跨线程共享。

pub mod observability {
    //! `Logger` 的空实现与记录型实现。

    use alloc::{string::String, vec::Vec};

    use parking_lot::Mutex;

    pub use crate::observability::NoopLogger;
    use crate::observability::{LogRecord, LogSeverity, Logger};

    /// 记录下来的日志，字段值统一转为字符串便于断言。
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct OwnedLogRecord {
        pub severity: LogSeverity,
        pub message: String,
        pub attributes: Vec<(&'static str, String)>,
    }

    impl OwnedLogRecord {
        pub fn attribute(&self, key: &str) -> Option<&str> {
            self.attributes
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        }
    }

    /// 把每条日志复制保存，供测试断言一致性违例等日志路径。
    #[derive(Debug, Default)]
    pub struct RecordingLogger {
        records: Mutex<Vec<OwnedLogRecord>>,
    }

    impl RecordingLogger {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn records(&self) -> Vec<OwnedLogRecord> {
            self.records.lock().clone()
        }

        /// 指定级别的日志条数。
        pub fn count(&self, severity: LogSeverity) -> usize {
            self.records
                .lock()
                .iter()
                .filter(|record| record.severity == severity)
                .count()
        }

        /// 携带给定错误码字段的日志条数。
        pub fn count_code(&self, code: &str) -> usize {
            self.records
                .lock()
                .iter()
                .filter(|record| record.attribute(crate::observability::keys::CODE) == Some(code))
                .count()
        }

        pub fn clear(&self) {
            self.records.lock().clear();
        }
    }

    impl Logger for RecordingLogger {
        fn log(&self, record: &LogRecord<'_>) {
            let owned = OwnedLogRecord {
                severity: record.severity,
                message: record.message.as_ref().into(),
                attributes: record
                    .attributes
                    .iter()
                    .map(|attr| (attr.key(), alloc::format!("{}", attr.value())))
                    .collect(),
            };
            self.records.lock().push(owned);
        }
    }
}

pub mod channel {
    //! 通道协作方的记录型桩：可追踪回收的缓冲、记录回调的消费端、记录投递的分发器。

    use alloc::{boxed::Box, sync::Arc, vec, vec::Vec};
    use core::sync::atomic::{AtomicUsize, Ordering};
    use std::io;

    use parking_lot::Mutex;

    use crate::{
        buffer::ChannelBuffer,
        endpoint::{EnvelopeDispatcher, InputChannelEndpoint},
        envelope::Envelope,
        error::ChannelError,
        event::ChannelEvent,
        ids::{ChannelId, JobId},
    };

    /// 多个 [`TrackedBuffer`] 共享的回收账本。
    #[derive(Clone, Debug, Default)]
    pub struct RecycleLedger {
        inner: Arc<LedgerInner>,
    }

    #[derive(Debug, Default)]
    struct LedgerInner {
        recycled: Mutex<Vec<u64>>,
        dropped_without_recycle: AtomicUsize,
    }

    impl RecycleLedger {
        pub fn new() -> Self {
            Self::default()
        }

        /// 按回收先后排列的缓冲编号。
        pub fn recycled_ids(&self) -> Vec<u64> {
            self.inner.recycled.lock().clone()
        }

        pub fn recycled_count(&self) -> usize {
            self.inner.recycled.lock().len()
        }

        /// 某编号被回收的次数；“恰好一次”断言的依据。
        pub fn times_recycled(&self, id: u64) -> usize {
            self.inner
                .recycled
                .lock()
                .iter()
                .filter(|recycled| **recycled == id)
                .count()
        }

        /// 未经 `recycle` 就被丢弃的缓冲数，即泄漏数。
        pub fn leaked_count(&self) -> usize {
            self.inner.dropped_without_recycle.load(Ordering::Acquire)
        }
    }

    /// 记录自身回收情况的测试缓冲。
    #[derive(Debug)]
    pub struct TrackedBuffer {
        id: u64,
        data: Vec<u8>,
        position: usize,
        ledger: RecycleLedger,
        recycled: bool,
        memory_backed: bool,
    }

    impl TrackedBuffer {
        /// 创建 `len` 字节、内容为 `id` 低 8 位的缓冲。
        pub fn new(ledger: &RecycleLedger, id: u64, len: usize) -> Self {
            Self {
                id,
                data: vec![id as u8; len],
                position: 0,
                ledger: ledger.clone(),
                recycled: false,
                memory_backed: true,
            }
        }

        pub fn boxed(ledger: &RecycleLedger, id: u64, len: usize) -> Box<dyn ChannelBuffer> {
            Box::new(Self::new(ledger, id, len))
        }

        /// 不由池内存承载的变体，例如直接指向文件区段的缓冲。
        pub fn boxed_unpooled(ledger: &RecycleLedger, id: u64, len: usize) -> Box<dyn ChannelBuffer> {
            let mut buffer = Self::new(ledger, id, len);
            buffer.memory_backed = false;
            Box::new(buffer)
        }

        pub fn id(&self) -> u64 {
            self.id
        }
    }

    impl ChannelBuffer for TrackedBuffer {
        fn remaining(&self) -> usize {
            self.data.len() - self.position
        }

        fn capacity(&self) -> usize {
            self.data.len()
        }

        fn chunk(&self) -> &[u8] {
            &self.data[self.position..]
        }

        fn advance(&mut self, count: usize) {
            self.position = (self.position + count).min(self.data.len());
        }

        fn is_backed_by_memory(&self) -> bool {
            self.memory_backed
        }

        fn recycle(mut self: Box<Self>) {
            self.recycled = true;
            self.ledger.inner.recycled.lock().push(self.id);
        }
    }

    impl Drop for TrackedBuffer {
        fn drop(&mut self) {
            if !self.recycled {
                self.ledger
                    .inner
                    .dropped_without_recycle
                    .fetch_add(1, Ordering::AcqRel);
            }
        }
    }

    /// 消费端观察到的回调，按发生顺序记录。
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum EndpointSignal {
        Event(ChannelEvent),
        DataMayBeAvailable,
        TransportError(ChannelError),
    }

    /// 记录所有回调的消费端。
    #[derive(Debug)]
    pub struct RecordingEndpoint {
        job_id: JobId,
        channel_id: ChannelId,
        connected_channel_id: ChannelId,
        signals: Mutex<Vec<EndpointSignal>>,
        notifications: AtomicUsize,
    }

    impl RecordingEndpoint {
        pub fn new(job_id: JobId, channel_id: ChannelId, connected_channel_id: ChannelId) -> Self {
            Self {
                job_id,
                channel_id,
                connected_channel_id,
                signals: Mutex::new(Vec::new()),
                notifications: AtomicUsize::new(0),
            }
        }

        pub fn signals(&self) -> Vec<EndpointSignal> {
            self.signals.lock().clone()
        }

        pub fn events(&self) -> Vec<ChannelEvent> {
            self.signals
                .lock()
                .iter()
                .filter_map(|signal| match signal {
                    EndpointSignal::Event(event) => Some(event.clone()),
                    _ => None,
                })
                .collect()
        }

        pub fn transport_errors(&self) -> Vec<ChannelError> {
            self.signals
                .lock()
                .iter()
                .filter_map(|signal| match signal {
                    EndpointSignal::TransportError(err) => Some(err.clone()),
                    _ => None,
                })
                .collect()
        }

        /// `on_data_may_be_available` 被调用的次数。
        pub fn notifications(&self) -> usize {
            self.notifications.load(Ordering::Acquire)
        }
    }

    impl InputChannelEndpoint for RecordingEndpoint {
        fn on_event(&self, event: &ChannelEvent) {
            self.signals.lock().push(EndpointSignal::Event(event.clone()));
        }

        fn on_data_may_be_available(&self) {
            self.notifications.fetch_add(1, Ordering::AcqRel);
            self.signals.lock().push(EndpointSignal::DataMayBeAvailable);
        }

        fn on_transport_error(&self, error: &ChannelError) {
            self.signals
                .lock()
                .push(EndpointSignal::TransportError(error.clone()));
        }

        fn channel_id(&self) -> ChannelId {
            self.channel_id
        }

        fn connected_channel_id(&self) -> ChannelId {
            self.connected_channel_id
        }

        fn job_id(&self) -> JobId {
            self.job_id
        }
    }

    /// 上行信封的摘要；信封本身不可克隆。
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct DispatchedEnvelope {
        pub sequence_number: u64,
        pub job_id: JobId,
        pub channel_id: ChannelId,
        pub had_buffer: bool,
        pub events: Vec<ChannelEvent>,
    }

    /// 记录所有投递的分发器。
    #[derive(Debug, Default)]
    pub struct RecordingDispatcher {
        dispatched: Mutex<Vec<DispatchedEnvelope>>,
    }

    impl RecordingDispatcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn dispatched(&self) -> Vec<DispatchedEnvelope> {
            self.dispatched.lock().clone()
        }
    }

    impl EnvelopeDispatcher for RecordingDispatcher {
        fn dispatch_from_input_channel(&self, envelope: Envelope) -> Result<(), ChannelError> {
            let summary = DispatchedEnvelope {
                sequence_number: envelope.sequence_number(),
                job_id: envelope.job_id(),
                channel_id: envelope.channel_id(),
                had_buffer: envelope.has_buffer(),
                events: envelope.events().iter().cloned().collect(),
            };
            self.dispatched.lock().push(summary);
            Ok(())
        }
    }

    /// 每次投递都以 I/O 错误失败的分发器。
    #[derive(Debug, Default)]
    pub struct FailingDispatcher {
        attempts: AtomicUsize,
    }

    impl FailingDispatcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::Acquire)
        }
    }

    impl EnvelopeDispatcher for FailingDispatcher {
        fn dispatch_from_input_channel(&self, _envelope: Envelope) -> Result<(), ChannelError> {
            self.attempts.fetch_add(1, Ordering::AcqRel);
            Err(ChannelError::io(io::ErrorKind::BrokenPipe, "dispatcher offline"))
        }
    }
}
