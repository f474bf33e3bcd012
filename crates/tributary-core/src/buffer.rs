//! 池化缓冲契约。
//!
//! # 模块定位（Why）
//! - 通道核心只关心“还剩多少字节可读”与“如何归还”，不解释缓冲内容；
//!   因此契约只暴露读取游标与一次性回收入口，具体内存策略由 `tributary-buffer` 等实现落地。
//!
//! # 契约说明（What）
//! - **独占所有权**：缓冲以 `Box<dyn ChannelBuffer>` 形式流转，任一时刻只属于一个信封、一个队列；
//! - **回收恰好一次**：[`ChannelBuffer::recycle`] 消耗句柄，类型系统保证不会重复回收；
//! - **越界读取**：`advance` 超过 `remaining` 时实现应钳制到末尾并自行记录缺陷，不得 panic。

use alloc::boxed::Box;
use core::fmt;

/// 在输入通道中流转的池化缓冲。
pub trait ChannelBuffer: Send + 'static {
    /// 尚未被消费的字节数。
    fn remaining(&self) -> usize;

    /// 缓冲在池中占用的容量。
    fn capacity(&self) -> usize;

    /// 当前可直接读取的连续切片，长度等于 `remaining()`。
    fn chunk(&self) -> &[u8];

    /// 消费前 `count` 字节；超过剩余长度时钳制。
    fn advance(&mut self, count: usize);

    /// 缓冲是否由池内存承载；监控面据此统计“内存背书”的排队缓冲数。
    fn is_backed_by_memory(&self) -> bool {
        true
    }

    /// 将剩余字节复制进 `dst` 并推进游标，返回实际复制的字节数。
    fn copy_to_slice(&mut self, dst: &mut [u8]) -> usize {
        let count = dst.len().min(self.remaining());
        dst[..count].copy_from_slice(&self.chunk()[..count]);
        self.advance(count);
        count
    }

    /// 把缓冲归还给所属的池。
    fn recycle(self: Box<Self>);
}

impl fmt::Debug for dyn ChannelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelBuffer")
            .field("remaining", &self.remaining())
            .field("capacity", &self.capacity())
            .field("backed_by_memory", &self.is_backed_by_memory())
            .finish()
    }
}
