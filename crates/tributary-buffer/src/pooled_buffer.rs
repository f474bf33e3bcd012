use core::mem;
use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};
use tributary_core::{ChannelBuffer, ChannelError};

/// `BufferRecycler` 描述缓冲池在租借结束时的回收入口。
///
/// # 设计初衷（Why）
/// - `BufferProvider` 契约只覆盖“租借”一侧；归还容量的方式由池自行决定。
///   通过该接口，`PooledBuffer` 在生命周期结束时统一通知池，上层组件无需散落自定义回收逻辑。
///
/// # 契约定义（What）
/// - 同一租约只会触发一次 `reclaim`；
/// - 实现必须线程安全，且不得 panic：`reclaim` 运行在 `Drop` 路径上。
pub trait BufferRecycler: Send + Sync + 'static {
    /// 归还一次租约。
    fn reclaim(&self, reclaimed: ReclaimedBuffer);
}

/// 一次回收动作所携带的上下文。
///
/// - `capacity`：租约的容量上限，与池发放时一致；
/// - `buffer`：夺回的底层 `BytesMut`，池可直接放回自由链表；为 `None` 时池只更新计数。
#[derive(Debug)]
pub struct ReclaimedBuffer {
    capacity: usize,
    buffer: Option<BytesMut>,
}

impl ReclaimedBuffer {
    pub fn new(capacity: usize, buffer: Option<BytesMut>) -> Self {
        Self { capacity, buffer }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 消耗结构并返回可复用的 `BytesMut`。
    pub fn into_buffer(self) -> Option<BytesMut> {
        self.buffer
    }
}

/// `Lease` 追踪一次租借，并在 `Drop` 时恰好回收一次。
struct Lease {
    recycler: Arc<dyn BufferRecycler>,
    capacity: usize,
    buffer: Option<BytesMut>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        let buffer = self.buffer.take();
        self.recycler
            .reclaim(ReclaimedBuffer::new(self.capacity, buffer));
    }
}

/// `PooledBuffer` 是有界池发放的定长缓冲。
///
/// # 设计动机（Why）
/// - 生产者（网络接收线程）先顺序写入负载，再把缓冲装进信封交给通道；
///   消费端经 [`ChannelBuffer`] 读取并推进游标，最后由通道代理调用 `recycle`。
///
/// # 架构关系（How）
/// - `data` 保存已写入、未读取的字节；读取通过 `Buf::advance` 推进起点；
/// - `limit` 是租约容量，写入不得超过它，池的字节上限因此不会被悄悄突破；
/// - `lease` 在缓冲销毁时收到底层 `BytesMut`，并通知池。
///
/// # 契约说明（What）
/// - `recycle` 与直接丢弃走同一条回收路径，池必然收到且仅收到一次 `reclaim`；
/// - `advance` 超过剩余字节时钳制到末尾。
pub struct PooledBuffer {
    data: BytesMut,
    limit: usize,
    written: usize,
    lease: Lease,
}

impl PooledBuffer {
    /// 使用池分配的 `BytesMut` 与回收句柄创建缓冲，租约容量取 `limit`。
    pub fn new(data: BytesMut, limit: usize, recycler: Arc<dyn BufferRecycler>) -> Self {
        Self {
            data,
            limit,
            written: 0,
            lease: Lease {
                recycler,
                capacity: limit,
                buffer: None,
            },
        }
    }

    /// 剩余可写字节数。
    pub fn remaining_mut(&self) -> usize {
        self.limit - self.written
    }

    /// 累计写入的字节数（含已被读取的部分）。
    pub fn written(&self) -> usize {
        self.written
    }

    /// 顺序追加负载；超过租约容量时拒绝写入且不修改缓冲。
    pub fn put_slice(&mut self, src: &[u8]) -> Result<(), ChannelError> {
        if src.len() > self.remaining_mut() {
            return Err(ChannelError::BufferTooLarge {
                requested: self.written + src.len(),
                max: self.limit,
            });
        }
        self.data.put_slice(src);
        self.written += src.len();
        Ok(())
    }

    /// 转为 trait 对象，便于装入信封。
    pub fn into_boxed(self) -> Box<dyn ChannelBuffer> {
        Box::new(self)
    }
}

impl ChannelBuffer for PooledBuffer {
    fn remaining(&self) -> usize {
        self.data.len()
    }

    fn capacity(&self) -> usize {
        self.limit
    }

    fn chunk(&self) -> &[u8] {
        &self.data[..]
    }

    fn advance(&mut self, count: usize) {
        let count = count.min(self.data.len());
        self.data.advance(count);
    }

    fn recycle(self: Box<Self>) {
        drop(self);
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let mut data = mem::take(&mut self.data);
        data.clear();
        self.lease.buffer = Some(data);
    }
}

impl core::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("remaining", &self.data.len())
            .field("written", &self.written)
            .field("limit", &self.limit)
            .finish()
    }
}
