//! 缓冲提供者契约与中断令牌。
//!
//! # 设计概要（How）
//! - [`BufferProvider`] 约束“非阻塞 / 阻塞”两种获取模式以及池元数据；这是整条流水线唯一的背压来源：
//!   池耗尽时需要缓冲组装数据的生产者会停顿，进而拖慢整个阶段。
//! - [`Interruption`] 取代宿主线程的中断机制：阻塞等待方定期检查令牌，一旦触发即以
//!   [`ChannelError::Interrupted`] 返回，绝不吞掉。
//!
//! # 契约说明（What）
//! - 本层不设超时；需要超时的调用方自行在外层配合 [`Interruption`] 实现。
//! - `is_shared()` 为 `true` 时，其他通道可能同时消耗或补充同一个池，实现者不得假设独占。

use alloc::{boxed::Box, sync::Arc};
use core::sync::atomic::{AtomicBool, Ordering};

use crate::{buffer::ChannelBuffer, error::ChannelError};

/// 可克隆的中断令牌。
///
/// 所有克隆共享同一标记；`interrupt` 之后对应的阻塞请求会在下一个检查点返回
/// [`ChannelError::Interrupted`]。
#[derive(Clone, Debug, Default)]
pub struct Interruption {
    flag: Arc<AtomicBool>,
}

impl Interruption {
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发中断，返回此前是否已处于中断状态。
    pub fn interrupt(&self) -> bool {
        self.flag.swap(true, Ordering::AcqRel)
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// 清除中断标记，令牌可被再次使用。
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// 有界缓冲池对通道暴露的获取能力。
///
/// # 教案式说明
/// - **意图（Why）**：通道代理与本地通道实现都只依赖这一窄接口，池的分配与淘汰策略完全外置；
/// - **契约（What）**：
///   - `request_buffer`：立即返回；池耗尽时返回 `Ok(None)`；
///   - `request_buffer_blocking`：挂起直至有缓冲可用，或 `interruption` 被触发时返回
///     [`ChannelError::Interrupted`]；
///   - 两者在 `min_size > max_buffer_size()` 时返回 [`ChannelError::BufferTooLarge`]；
///   - 返回的缓冲必须恰好被回收一次。
pub trait BufferProvider: Send + Sync {
    fn request_buffer(&self, min_size: usize) -> Result<Option<Box<dyn ChannelBuffer>>, ChannelError>;

    fn request_buffer_blocking(
        &self,
        min_size: usize,
        interruption: &Interruption,
    ) -> Result<Box<dyn ChannelBuffer>, ChannelError>;

    /// 单块缓冲的最大字节数。
    fn max_buffer_size(&self) -> usize;

    /// 池是否被多个通道或任务共享。
    fn is_shared(&self) -> bool;
}

impl<P: BufferProvider + ?Sized> BufferProvider for Arc<P> {
    fn request_buffer(&self, min_size: usize) -> Result<Option<Box<dyn ChannelBuffer>>, ChannelError> {
        (**self).request_buffer(min_size)
    }

    fn request_buffer_blocking(
        &self,
        min_size: usize,
        interruption: &Interruption,
    ) -> Result<Box<dyn ChannelBuffer>, ChannelError> {
        (**self).request_buffer_blocking(min_size, interruption)
    }

    fn max_buffer_size(&self) -> usize {
        (**self).max_buffer_size()
    }

    fn is_shared(&self) -> bool {
        (**self).is_shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interruption_is_shared_between_clones() {
        let token = Interruption::new();
        let observer = token.clone();
        assert!(!observer.is_interrupted());
        assert!(!token.interrupt(), "首次中断应返回此前未中断");
        assert!(observer.is_interrupted());
        assert!(token.interrupt(), "重复中断应返回 true");
        observer.reset();
        assert!(!token.is_interrupted());
    }
}
