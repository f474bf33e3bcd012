//! 输入网关上下文：同一任务输入网关下全部输入通道的注册表。
//!
//! # 教案式说明
//! - **意图（Why）**：一个任务的输入网关聚合多个输入通道，它们共享同一个缓冲池与分发器；
//!   网络层只知道信封上的通道标识，需要一个并发安全的注册表把信封路由到对应的通道代理。
//! - **逻辑（How）**：
//!   - `DashMap<ChannelId, Arc<InputChannelContext>>` 保存注册表，注册时以 `Entry` 原子地拒绝重复标识；
//!   - 注册的代理与网关共用同一个 `Arc<dyn BufferProvider>`，网关自身也以委托方式实现该能力；
//!   - 注销与整体拆除先把代理移出注册表，再在分片锁之外排空其队列。
//! - **契约（What）**：
//!   - 路由到未注册通道的信封会被丢弃：缓冲立即回收，事件不交付，并记录告警；
//!   - [`statistics`](InputGateContext::statistics) 是各通道快照的逐项之和，不保证跨通道原子。

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use tributary_core::{
    BufferProvider, ChannelBuffer, ChannelConfig, ChannelError, ChannelId, Envelope,
    EnvelopeDispatcher, InputChannelEndpoint, Interruption, LogAttribute, Logger, codes,
    observability::keys,
};

use crate::{broker::InputChannelContext, capability::ChannelContext, queue::ChannelStatistics};

pub struct InputGateContext {
    config: ChannelConfig,
    provider: Arc<dyn BufferProvider>,
    dispatcher: Arc<dyn EnvelopeDispatcher>,
    logger: Arc<dyn Logger>,
    channels: DashMap<ChannelId, Arc<InputChannelContext>>,
}

impl InputGateContext {
    pub fn new(
        config: ChannelConfig,
        provider: Arc<dyn BufferProvider>,
        dispatcher: Arc<dyn EnvelopeDispatcher>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            config,
            provider,
            dispatcher,
            logger,
            channels: DashMap::new(),
        }
    }

    /// 为消费端创建通道代理并注册。
    ///
    /// 标识已存在时返回 [`ChannelError::ChannelAlreadyRegistered`]，不会创建代理，
    /// 因此也不会向上游发送激活事件。激活在插入完成、分片锁释放之后发送，
    /// 分发器因此可以同步回调网关。
    pub fn register_channel(
        &self,
        endpoint: Arc<dyn InputChannelEndpoint>,
    ) -> Result<Arc<InputChannelContext>, ChannelError> {
        let channel_id = endpoint.channel_id();
        let context = match self.channels.entry(channel_id) {
            Entry::Occupied(_) => {
                return Err(ChannelError::ChannelAlreadyRegistered { channel_id });
            }
            Entry::Vacant(vacant) => {
                let deferred = ChannelConfig {
                    activate_upstream_on_create: false,
                    ..self.config.clone()
                };
                let context = Arc::new(InputChannelContext::new(
                    deferred,
                    endpoint,
                    self.dispatcher.clone(),
                    self.provider.clone(),
                    self.logger.clone(),
                ));
                vacant.insert(context.clone());
                context
            }
        };
        if self.config.activate_upstream_on_create {
            context.activate_upstream();
        }
        Ok(context)
    }

    pub fn lookup(&self, channel_id: ChannelId) -> Option<Arc<InputChannelContext>> {
        self.channels
            .get(&channel_id)
            .map(|entry| entry.value().clone())
    }

    /// 按信封上的通道标识入队；目标未注册时回收缓冲并返回 `false`。
    ///
    /// 与 [`unregister_channel`](Self::unregister_channel) 并发时，信封可能落入刚被移出注册表的代理，
    /// 此时由本方法再次排空该代理并返回 `false`。
    pub fn route_envelope(&self, envelope: Envelope) -> bool {
        let channel_id = envelope.channel_id();
        if let Some(context) = self.lookup(channel_id) {
            return self.queue_on(&context, envelope);
        }
        let sequence_number = envelope.sequence_number();
        let (buffer, events) = envelope.into_parts();
        if let Some(buffer) = buffer {
            buffer.recycle();
        }
        self.logger.warn_with_fields(
            "dropped envelope addressed to an unregistered channel",
            &[
                LogAttribute::new(keys::CODE, codes::CHANNEL_UNKNOWN),
                LogAttribute::new(keys::CHANNEL_ID, channel_id.to_string()),
                LogAttribute::new(keys::SEQUENCE_NUMBER, sequence_number),
                LogAttribute::new(keys::DROPPED_EVENTS, events.len()),
            ],
        );
        false
    }

    /// 入队后确认代理仍是注册表中的那一个；否则注销方可能已完成排空，由这里补排。
    fn queue_on(&self, context: &Arc<InputChannelContext>, envelope: Envelope) -> bool {
        let channel_id = envelope.channel_id();
        context.queue_envelope(envelope);
        let still_registered = self
            .lookup(channel_id)
            .is_some_and(|current| Arc::ptr_eq(&current, context));
        if !still_registered {
            context.release_all_resources();
        }
        still_registered
    }

    /// 注销通道并排空其队列；通道不存在时返回 `false`。
    pub fn unregister_channel(&self, channel_id: ChannelId) -> bool {
        match self.channels.remove(&channel_id) {
            Some((_, context)) => {
                context.release_all_resources();
                true
            }
            None => false,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// 汇总所有通道的排队信封数与内存缓冲数。
    pub fn statistics(&self) -> ChannelStatistics {
        self.registered()
            .iter()
            .map(|context| context.statistics())
            .fold(ChannelStatistics::default(), ChannelStatistics::merge)
    }

    /// 注销并排空全部通道。
    pub fn release_all_resources(&self) {
        let channel_ids: Vec<ChannelId> = self.channels.iter().map(|entry| *entry.key()).collect();
        for channel_id in channel_ids {
            self.unregister_channel(channel_id);
        }
    }

    /// 注册表快照；克隆 `Arc` 后立即释放分片锁。
    fn registered(&self) -> Vec<Arc<InputChannelContext>> {
        self.channels
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl BufferProvider for InputGateContext {
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

impl core::fmt::Debug for InputGateContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InputGateContext")
            .field("channels", &self.channels.len())
            .field("statistics", &self.statistics())
            .finish_non_exhaustive()
    }
}
