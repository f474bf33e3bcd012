use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use bytes::BytesMut;
use parking_lot::{Condvar, Mutex};
use tributary_core::{
    BufferProvider, ChannelBuffer, ChannelError, Interruption, LogAttribute, Logger, PoolConfig,
    observability::{NoopLogger, keys},
};

use crate::pooled_buffer::{BufferRecycler, PooledBuffer, ReclaimedBuffer};

/// `BoundedBufferPool` 是容量受限、可阻塞的缓冲池。
///
/// # 模块角色（Why）
/// - 作为 `tributary-core::BufferProvider` 的默认实现，为同一任务槽内的全部通道提供统一的缓冲来源；
/// - 容量上限即背压：同时在外的缓冲达到 `capacity` 后，非阻塞请求返回 `Ok(None)`，
///   阻塞请求挂起直到有缓冲被回收或等待方被中断。
///
/// # 核心机制（How）
/// - `parking_lot::Mutex<PoolState>` 保护自由链表与在外计数，`Condvar` 在回收时唤醒一个等待方；
/// - 阻塞等待以 `interrupt_poll_interval` 为周期醒来检查 [`Interruption`]，中断以
///   [`ChannelError::Interrupted`] 返回而不是被吞掉；
/// - `PoolMetrics` 以原子计数记录失败请求与回收次数，供 [`statistics`](Self::statistics) 快照。
///
/// # 契约说明（What）
/// - **线程安全**：`Clone` 共享同一内部状态，满足 `Send + Sync + 'static`；
/// - **前置条件**：`PoolConfig` 已通过 `validate`；
/// - **后置条件**：发放的缓冲容量恰为 `buffer_size`，回收后立即可被下一位请求方复用。
#[derive(Clone)]
pub struct BoundedBufferPool {
    inner: Arc<PoolInner>,
}

/// 池的统计快照，各字段在同一次加锁内读取。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStatistics {
    pub buffer_size: usize,
    pub capacity: usize,
    /// 已向系统申请过的内存块数量。
    pub allocated: usize,
    /// 已发放、尚未回收的缓冲数量。
    pub outstanding: usize,
    /// 自由链表中可立即复用的内存块数量。
    pub available: usize,
    /// 正在阻塞等待的请求方数量。
    pub blocked_waiters: usize,
    /// 因池耗尽而返回空的非阻塞请求次数。
    pub failed_requests: u64,
    /// 累计回收次数。
    pub recycled: u64,
}

impl BoundedBufferPool {
    /// 按配置创建池；配置非法时返回 [`ChannelError::Configuration`]。
    pub fn new(config: PoolConfig) -> Result<Self, ChannelError> {
        Self::with_logger(config, Arc::new(NoopLogger))
    }

    pub fn with_logger(config: PoolConfig, logger: Arc<dyn Logger>) -> Result<Self, ChannelError> {
        config.validate()?;
        logger.debug_with_fields(
            "bounded buffer pool created",
            &[
                LogAttribute::new(keys::POOL_BUFFER_SIZE, config.buffer_size),
                LogAttribute::new(keys::POOL_CAPACITY, config.capacity),
            ],
        );
        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                state: Mutex::new(PoolState::default()),
                available: Condvar::new(),
                metrics: PoolMetrics::default(),
                logger,
            }),
        })
    }

    /// 分配一个可写缓冲；池耗尽时返回 `Ok(None)`。
    pub fn try_acquire(&self, min_size: usize) -> Result<Option<PooledBuffer>, ChannelError> {
        self.inner.check_size(min_size)?;
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(ChannelError::PoolClosed);
        }
        if state.outstanding >= self.inner.config.capacity {
            self.inner.metrics.failed_requests.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }
        let raw = self.inner.take_block(&mut state);
        drop(state);
        Ok(Some(self.wrap(raw)))
    }

    /// 阻塞分配一个可写缓冲，直到有容量或 `interruption` 被触发。
    pub fn acquire_blocking(
        &self,
        min_size: usize,
        interruption: &Interruption,
    ) -> Result<PooledBuffer, ChannelError> {
        self.inner.check_size(min_size)?;
        let poll = self.inner.config.interrupt_poll_interval();
        let mut state = self.inner.state.lock();
        loop {
            if state.closed {
                return Err(ChannelError::PoolClosed);
            }
            if state.outstanding < self.inner.config.capacity {
                let raw = self.inner.take_block(&mut state);
                drop(state);
                return Ok(self.wrap(raw));
            }
            if interruption.is_interrupted() {
                drop(state);
                self.inner
                    .logger
                    .debug("blocking buffer request interrupted");
                return Err(ChannelError::Interrupted);
            }
            state.waiters += 1;
            self.inner.available.wait_for(&mut state, poll);
            state.waiters -= 1;
        }
    }

    /// 关闭池：唤醒全部等待方并令后续请求返回 [`ChannelError::PoolClosed`]。
    /// 已发放的缓冲仍可正常回收。
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        state.free_list.clear();
        drop(state);
        self.inner.available.notify_all();
        self.inner.logger.info("bounded buffer pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn statistics(&self) -> PoolStatistics {
        let state = self.inner.state.lock();
        PoolStatistics {
            buffer_size: self.inner.config.buffer_size,
            capacity: self.inner.config.capacity,
            allocated: state.allocated,
            outstanding: state.outstanding,
            available: state.free_list.len(),
            blocked_waiters: state.waiters,
            failed_requests: self.inner.metrics.failed_requests.load(Ordering::Relaxed),
            recycled: self.inner.metrics.recycled.load(Ordering::Relaxed),
        }
    }

    fn wrap(&self, raw: BytesMut) -> PooledBuffer {
        let recycler: Arc<dyn BufferRecycler> = self.inner.clone();
        PooledBuffer::new(raw, self.inner.config.buffer_size, recycler)
    }
}

impl BufferProvider for BoundedBufferPool {
    fn request_buffer(&self, min_size: usize) -> Result<Option<Box<dyn ChannelBuffer>>, ChannelError> {
        Ok(self.try_acquire(min_size)?.map(PooledBuffer::into_boxed))
    }

    fn request_buffer_blocking(
        &self,
        min_size: usize,
        interruption: &Interruption,
    ) -> Result<Box<dyn ChannelBuffer>, ChannelError> {
        self.acquire_blocking(min_size, interruption)
            .map(PooledBuffer::into_boxed)
    }

    fn max_buffer_size(&self) -> usize {
        self.inner.config.buffer_size
    }

    fn is_shared(&self) -> bool {
        self.inner.config.shared
    }
}

impl core::fmt::Debug for BoundedBufferPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BoundedBufferPool")
            .field("config", &self.inner.config)
            .field("statistics", &self.statistics())
            .finish()
    }
}

#[derive(Default)]
struct PoolState {
    free_list: Vec<BytesMut>,
    allocated: usize,
    outstanding: usize,
    waiters: usize,
    closed: bool,
}

struct PoolInner {
    config: PoolConfig,
    state: Mutex<PoolState>,
    available: Condvar,
    metrics: PoolMetrics,
    logger: Arc<dyn Logger>,
}

impl PoolInner {
    fn check_size(&self, min_size: usize) -> Result<(), ChannelError> {
        if min_size > self.config.buffer_size {
            return Err(ChannelError::BufferTooLarge {
                requested: min_size,
                max: self.config.buffer_size,
            });
        }
        Ok(())
    }

    /// 从自由链表或堆上取出一块内存；调用方已确认仍有容量。
    fn take_block(&self, state: &mut PoolState) -> BytesMut {
        state.outstanding += 1;
        match state.free_list.pop() {
            Some(block) => block,
            None => {
                state.allocated += 1;
                BytesMut::with_capacity(self.config.buffer_size)
            }
        }
    }
}

impl BufferRecycler for PoolInner {
    fn reclaim(&self, reclaimed: ReclaimedBuffer) {
        self.metrics.recycled.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        state.outstanding = state.outstanding.saturating_sub(1);
        match reclaimed.into_buffer() {
            Some(mut block) if !state.closed => {
                block.clear();
                if block.capacity() < self.config.buffer_size {
                    block.reserve(self.config.buffer_size);
                }
                state.free_list.push(block);
            }
            _ => {
                state.allocated = state.allocated.saturating_sub(1);
            }
        }
        drop(state);
        self.available.notify_one();
    }
}

#[derive(Default)]
struct PoolMetrics {
    failed_requests: AtomicU64,
    recycled: AtomicU64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(capacity: usize) -> PoolConfig {
        PoolConfig {
            buffer_size: 64,
            capacity,
            shared: false,
            interrupt_poll_interval_ms: 1,
        }
    }

    #[test]
    fn exhausted_pool_returns_none_without_blocking() {
        let pool = BoundedBufferPool::new(config(1)).expect("合法配置");
        let first = pool.request_buffer(16).expect("请求不应失败");
        assert!(first.is_some());
        let second = pool.request_buffer(16).expect("请求不应失败");
        assert!(second.is_none(), "容量耗尽时非阻塞请求应返回空");
        assert_eq!(pool.statistics().failed_requests, 1);
    }

    #[test]
    fn recycled_block_is_reused() {
        let pool = BoundedBufferPool::new(config(1)).expect("合法配置");
        pool.request_buffer(64)
            .expect("请求不应失败")
            .expect("首个缓冲")
            .recycle();
        let stats = pool.statistics();
        assert_eq!(stats.outstanding, 0);
        assert_eq!(stats.available, 1);
        let _again = pool.request_buffer(64).expect("请求不应失败").expect("复用缓冲");
        assert_eq!(pool.statistics().allocated, 1, "复用不应触发新的分配");
    }

    #[test]
    fn oversized_request_is_rejected() {
        let pool = BoundedBufferPool::new(config(1)).expect("合法配置");
        let err = pool.request_buffer(65).unwrap_err();
        assert_eq!(err, ChannelError::BufferTooLarge { requested: 65, max: 64 });
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let err = BoundedBufferPool::new(config(0)).unwrap_err();
        assert!(matches!(err, ChannelError::Configuration { .. }));
    }
}
