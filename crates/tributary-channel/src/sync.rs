//! 队列锁的同步原语垫片。
//!
//! 常规构建使用 `parking_lot::Mutex`；以 `--cfg loom` 构建时切换到 `loom::sync::Mutex`，
//! 让模型检查覆盖信封队列的全部加锁路径。两种实现对外暴露相同的 `lock()` 签名。

#[cfg(not(loom))]
pub(crate) use parking_lot::{Mutex, MutexGuard};

#[cfg(loom)]
pub(crate) use self::loom_mutex::{Mutex, MutexGuard};

#[cfg(loom)]
mod loom_mutex {
    use std::sync::PoisonError;

    pub(crate) type MutexGuard<'a, T> = loom::sync::MutexGuard<'a, T>;

    pub(crate) struct Mutex<T>(loom::sync::Mutex<T>);

    impl<T> Mutex<T> {
        pub(crate) fn new(value: T) -> Self {
            Self(loom::sync::Mutex::new(value))
        }

        /// 与 `parking_lot` 一致：不暴露中毒状态。
        pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
            self.0.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }
}
