//! 作业与通道标识。
//!
//! # 教案式说明
//! - **意图（Why）**：路由层依据 `(JobId, ChannelId)` 为信封寻址；标识必须可复制、可哈希、可序列化，
//!   才能同时充当映射键与日志字段。
//! - **契约（What）**：两者都是对 `u128` 的不透明封装，`Display` 输出固定 32 位小写十六进制，
//!   保证跨进程日志可检索。

use core::fmt;

use serde::{Deserialize, Serialize};

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u128);

        impl $name {
            /// 由原始数值构造标识。
            pub const fn from_u128(raw: u128) -> Self {
                Self(raw)
            }

            /// 返回底层数值。
            pub const fn as_u128(self) -> u128 {
                self.0
            }
        }

        impl From<u128> for $name {
            fn from(raw: u128) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:032x}", self.0)
            }
        }
    };
}

opaque_id!(
    /// 运行中作业的标识，由作业图调度层分配。
    JobId
);

opaque_id!(
    /// 单个通道端点的标识；输入端与其上游输出端各自持有不同的 `ChannelId`。
    ChannelId
);
