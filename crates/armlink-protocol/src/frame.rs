//! 推送流帧定义与编码
//!
//! 帧结构手动打包/解包（`bytes` 库），不依赖结构体内存布局。

use crate::{CHECKSUM_LEN, HEADER_LEN, ProtocolError, SYNC_MARKER};
use bytes::{BufMut, Bytes, BytesMut};

/// 校验和处理策略
///
/// 控制器发送的尾部校验和在历史实现中从未被校验，
/// 默认 `Ignore` 以保持兼容；`Verify` 会丢弃校验失败的帧。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ChecksumPolicy {
    /// 读取但不校验
    #[default]
    Ignore,
    /// 校验，失败则丢帧
    Verify,
}

/// 计算校验和：所有字节按 u16 回绕累加
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)))
}

/// 一个完整的推送流帧
///
/// 只有在 `5 + N + 2` 个字节全部到达后才会由解帧器产出。
/// `payload` 为 `Bytes`，克隆零拷贝。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 帧计数器（控制器递增，仅供诊断）
    pub counter: u8,
    /// 载荷字节（长度即帧头声明的 N）
    pub payload: Bytes,
    /// 尾部校验和（小端）
    pub checksum: u16,
}

impl Frame {
    /// 构造一帧并计算正确的校验和
    pub fn new(counter: u8, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let mut frame = Self {
            counter,
            payload,
            checksum: 0,
        };
        frame.checksum = frame.expected_checksum();
        frame
    }

    /// 帧在线路上占用的总字节数
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.payload.len() + CHECKSUM_LEN
    }

    /// 按帧头 + 载荷计算期望的校验和
    pub fn expected_checksum(&self) -> u16 {
        let len = self.payload.len() as u16;
        let header = [
            SYNC_MARKER[0],
            SYNC_MARKER[1],
            self.counter,
            len.to_le_bytes()[0],
            len.to_le_bytes()[1],
        ];
        checksum(&header).wrapping_add(checksum(&self.payload))
    }

    /// 校验尾部校验和
    pub fn verify(&self) -> Result<(), ProtocolError> {
        let expected = self.expected_checksum();
        if expected == self.checksum {
            Ok(())
        } else {
            Err(ProtocolError::ChecksumMismatch {
                expected,
                actual: self.checksum,
            })
        }
    }

    /// 编码到缓冲区
    ///
    /// 载荷超过 u16 范围时返回错误。
    pub fn encode_to(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        let len = u16::try_from(self.payload.len()).map_err(|_| {
            ProtocolError::InvalidFrame(format!(
                "payload of {} bytes does not fit the u16 length field",
                self.payload.len()
            ))
        })?;

        buf.reserve(self.wire_len());
        buf.put_slice(&SYNC_MARKER);
        buf.put_u8(self.counter);
        buf.put_u16_le(len);
        buf.put_slice(&self.payload);
        buf.put_u16_le(self.checksum);
        Ok(())
    }

    /// 编码为独立的字节序列
    pub fn to_bytes(&self) -> Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        self.encode_to(&mut buf)?;
        Ok(buf.freeze())
    }
}
