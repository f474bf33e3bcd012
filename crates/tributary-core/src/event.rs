//! 通道控制事件。
//!
//! # 教案式说明
//! - **意图（Why）**：控制事件与数据缓冲共用信封，但语义独立：事件必须按列表顺序交付给消费端，
//!   且不依赖缓冲是否存在。
//! - **逻辑（How）**：[`ChannelEvent`] 为封闭枚举，框架内置 `Activate`/`Close` 两类通道级信号，
//!   应用自定义事件统一落入 [`UserEvent`]，由 `kind` 区分语义、`payload` 携带零拷贝字节。
//! - **契约（What）**：[`EventList`] 保持插入顺序，不去重、不排序。

use alloc::{borrow::Cow, vec, vec::Vec};
use core::slice;

use bytes::Bytes;

/// 通道级控制事件。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelEvent {
    /// 输入端已就绪，请求上游输出端开始发送数据；通道建立时由代理自动发送一次。
    Activate,
    /// 通道关闭请求或关闭确认。
    Close,
    /// 应用自定义事件。
    User(UserEvent),
}

impl ChannelEvent {
    /// 构造应用自定义事件的便捷入口。
    pub fn user(kind: impl Into<Cow<'static, str>>, payload: impl Into<Bytes>) -> Self {
        Self::User(UserEvent::new(kind, payload))
    }

    /// 返回事件的稳定名称，用作日志字段。
    pub fn name(&self) -> &str {
        match self {
            ChannelEvent::Activate => "activate",
            ChannelEvent::Close => "close",
            ChannelEvent::User(event) => event.kind(),
        }
    }
}

/// 应用自定义事件。
///
/// `kind` 应为低基数的稳定字符串（例如 `"checkpoint.barrier"`），`payload` 的编码由应用自行约定。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserEvent {
    kind: Cow<'static, str>,
    payload: Bytes,
}

impl UserEvent {
    pub fn new(kind: impl Into<Cow<'static, str>>, payload: impl Into<Bytes>) -> Self {
        Self {
            kind: kind.into(),
            payload: payload.into(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

/// 有序事件列表。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventList {
    events: Vec<ChannelEvent>,
}

impl EventList {
    pub fn new() -> Self {
        Self::default()
    }

    /// 只包含一个事件的列表，供上行临时信封使用。
    pub fn single(event: ChannelEvent) -> Self {
        Self {
            events: vec![event],
        }
    }

    pub fn push(&mut self, event: ChannelEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, ChannelEvent> {
        self.events.iter()
    }

    /// 取走全部事件并留下空列表。
    pub fn take(&mut self) -> EventList {
        EventList {
            events: core::mem::take(&mut self.events),
        }
    }
}

impl FromIterator<ChannelEvent> for EventList {
    fn from_iter<I: IntoIterator<Item = ChannelEvent>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for EventList {
    type Item = ChannelEvent;
    type IntoIter = vec::IntoIter<ChannelEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a EventList {
    type Item = &'a ChannelEvent;
    type IntoIter = slice::Iter<'a, ChannelEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_list_preserves_insertion_order() {
        let list: EventList = [
            ChannelEvent::Activate,
            ChannelEvent::user("barrier", &b"1"[..]),
            ChannelEvent::Close,
        ]
        .into_iter()
        .collect();
        let names: Vec<&str> = list.iter().map(ChannelEvent::name).collect();
        assert_eq!(names, ["activate", "barrier", "close"]);
    }

    #[test]
    fn take_leaves_empty_list_behind() {
        let mut list = EventList::single(ChannelEvent::Activate);
        let taken = list.take();
        assert!(list.is_empty());
        assert_eq!(taken.len(), 1);
    }
}
