#![deny(unsafe_code)]

//! `tributary-buffer` 提供面向 `BufferProvider` 契约的有界缓冲池。
//!
//! # 模块定位（Why）
//! - `tributary-core` 只定义“非阻塞 / 阻塞获取 + 一次性回收”的契约；本 crate 以 `bytes::BytesMut`
//!   落地实体，使通道与传输层可以在不关心内存策略的前提下获取池化缓冲；
//! - 池的容量上限就是整条流水线的背压来源：耗尽时非阻塞请求立即返回空，阻塞请求挂起。
//!
//! # 设计概要（How）
//! - `pooled_buffer` 模块实现 `PooledBuffer`：生产者顺序写入，消费端经 `ChannelBuffer` 读取；
//! - 通过 `BufferRecycler` trait 把回收钩子显式化，`Drop` 阶段经由 `Lease` 恰好通知一次所属池；
//! - `pool` 模块实现 `BoundedBufferPool`：自由链表复用内存块，条件变量唤醒阻塞等待方。

mod pool;
mod pooled_buffer;

pub use pool::{BoundedBufferPool, PoolStatistics};
pub use pooled_buffer::{BufferRecycler, PooledBuffer, ReclaimedBuffer};
