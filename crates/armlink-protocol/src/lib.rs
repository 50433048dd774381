//! # Armlink Protocol
//!
//! 机械臂实时状态推送流的协议定义（无 IO 依赖）
//!
//! ## 模块
//!
//! - `frame`: 帧结构、帧编码与校验和
//! - `decoder`: 有状态的字节流解帧器（同步标记重同步、长度定界重组）
//! - `layout`: 声明式字段偏移表与通用解码例程
//! - `sample`: 解码后的遥测快照
//!
//! ## 帧格式
//!
//! ```text
//! offset  0      2        3         5                5+N        5+N+2
//!         +------+--------+---------+----------------+----------+
//!         | 5A5A | 计数器 | 长度 N  |   N 字节载荷    | 校验和   |
//!         +------+--------+---------+----------------+----------+
//!                 u8       u16 LE                     u16 LE
//! ```
//!
//! ## 字节序
//!
//! 与 CAN 协议不同，推送流全部使用小端字节序（Little-Endian）。

pub mod decoder;
pub mod frame;
pub mod layout;
pub mod sample;

pub use decoder::{DecoderConfig, DecoderStats, FrameDecoder};
pub use frame::{ChecksumPolicy, Frame, checksum};
pub use layout::{Channel, FieldKind, FieldSpec, TelemetryLayout};
pub use sample::TelemetrySample;

use thiserror::Error;

/// 同步标记（帧头）
pub const SYNC_MARKER: [u8; 2] = [0x5A, 0x5A];

/// 帧头长度：同步标记(2) + 帧计数器(1) + 载荷长度(2)
pub const HEADER_LEN: usize = 5;

/// 尾部校验和长度
pub const CHECKSUM_LEN: usize = 2;

/// 载荷长度字段在帧内的偏移
pub const LENGTH_OFFSET: usize = 3;

/// 默认允许的最大载荷长度
///
/// 控制器实际状态包约 1KB，超过此值的长度字段视为失步。
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 2048;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Payload too short: need {required} bytes, got {actual}")]
    PayloadTooShort { required: usize, actual: usize },

    #[error("Checksum mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_constants() {
        assert_eq!(SYNC_MARKER.len() + 1 + 2, HEADER_LEN);
        assert_eq!(LENGTH_OFFSET + 2, HEADER_LEN);
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::PayloadTooShort {
            required: 322,
            actual: 23,
        };
        assert_eq!(err.to_string(), "Payload too short: need 322 bytes, got 23");

        let err = ProtocolError::ChecksumMismatch {
            expected: 0x1234,
            actual: 0x00FF,
        };
        assert!(err.to_string().contains("0x1234"));
        assert!(err.to_string().contains("0x00FF"));
    }
}
