//! 核心契约的性质测试。
//!
//! # 测试目标（Why）
//! - 标识的 `Display` 输出是日志检索键，任意取值下都必须是可逆的定宽十六进制；
//! - 池配置校验只接受全部为正的取值，错误码固定为配置类错误。

use proptest::prelude::*;
use tributary_core::{ChannelEvent, ChannelId, EventList, JobId, PoolConfig, codes};

proptest! {
    #[test]
    fn id_display_is_reversible_fixed_width_hex(raw in any::<u128>()) {
        let rendered = ChannelId::from(raw).to_string();
        prop_assert_eq!(rendered.len(), 32);
        prop_assert_eq!(u128::from_str_radix(&rendered, 16).ok(), Some(raw));
        prop_assert_eq!(JobId::from(raw).to_string(), rendered);
    }

    #[test]
    fn pool_validation_accepts_only_positive_values(
        buffer_size in 0usize..4,
        capacity in 0usize..4,
        interrupt_poll_interval_ms in 0u64..4,
    ) {
        let config = PoolConfig {
            buffer_size,
            capacity,
            shared: false,
            interrupt_poll_interval_ms,
        };
        let all_positive = buffer_size > 0 && capacity > 0 && interrupt_poll_interval_ms > 0;
        match config.validate() {
            Ok(()) => prop_assert!(all_positive),
            Err(err) => {
                prop_assert!(!all_positive);
                prop_assert_eq!(err.code(), codes::CONFIGURATION_INVALID);
            }
        }
    }

    #[test]
    fn event_list_take_moves_every_event_in_order(names in proptest::collection::vec("[a-z]{1,6}", 0..12)) {
        let mut list = EventList::new();
        for name in &names {
            list.push(ChannelEvent::user(name.clone(), &b""[..]));
        }
        let taken = list.take();
        prop_assert!(list.is_empty());
        let observed: Vec<String> = taken.iter().map(|event| event.name().to_owned()).collect();
        prop_assert_eq!(observed, names);
    }
}
