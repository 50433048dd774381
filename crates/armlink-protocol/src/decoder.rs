//! 推送流解帧器
//!
//! TCP 不保留消息边界，`FrameDecoder` 负责把任意切分的字节流还原为帧序列：
//!
//! 1. 查找同步标记 `0x5A 0x5A`，标记之前的字节一律丢弃（失步恢复）
//! 2. 找不到标记时只保留最后一个 `0x5A`（可能是跨读取边界的半个标记）
//! 3. 至少 5 字节才读取长度字段，至少 `5 + N + 2` 字节才切出一帧
//! 4. 单次 `feed` 可以产出多帧（socket 突发）
//!
//! 无论输入如何切分，产出的帧序列完全一致（切分不变性）。

use crate::frame::{ChecksumPolicy, Frame, checksum};
use crate::{CHECKSUM_LEN, DEFAULT_MAX_PAYLOAD_LEN, HEADER_LEN, LENGTH_OFFSET, SYNC_MARKER};
use bytes::{Buf, BytesMut};

/// 解帧器配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// 允许的最大载荷长度，超过即视为长度字段损坏
    pub max_payload_len: usize,
    /// 校验和策略
    pub checksum: ChecksumPolicy,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            checksum: ChecksumPolicy::Ignore,
        }
    }
}

/// 解帧统计（单调递增计数器）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// 成功产出的帧数
    pub frames: u64,
    /// 被丢弃的字节数（噪声、失步数据、假标记）
    pub bytes_discarded: u64,
    /// 在同步标记之前发现垃圾数据的次数
    pub resyncs: u64,
    /// 长度字段越界次数
    pub length_faults: u64,
    /// 校验和失败次数（仅 `ChecksumPolicy::Verify`）
    pub checksum_failures: u64,
}

impl DecoderStats {
    /// 协议故障总数（失步 + 长度越界 + 校验失败）
    pub fn protocol_faults(&self) -> u64 {
        self.resyncs + self.length_faults + self.checksum_failures
    }
}

/// 有状态的字节流解帧器
///
/// 内部缓冲区为 `BytesMut`：尾部追加，头部裁剪。
/// 缓冲区上限为 `5 + max_payload_len + 2` 加上一次读取的字节数。
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    config: DecoderConfig,
    stats: DecoderStats,
}

impl FrameDecoder {
    /// 使用默认配置创建解帧器
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(HEADER_LEN + config.max_payload_len + CHECKSUM_LEN),
            config,
            stats: DecoderStats::default(),
        }
    }

    /// 追加字节并返回本次可以完整解出的所有帧
    ///
    /// 返回的帧恰好消费它们占用的字节，未完成的帧留在缓冲区等待后续数据。
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame() {
            frames.push(frame);
        }
        frames
    }

    /// 当前缓冲的字节数
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// 统计快照
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// 清空缓冲区（重连时使用），统计保留
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match find_sync(&self.buf) {
                None => {
                    // 只保留可能是半个同步标记的最后一个字节
                    let keep = usize::from(self.buf.last() == Some(&SYNC_MARKER[0]));
                    let drop = self.buf.len() - keep;
                    self.discard(drop);
                    return None;
                },
                Some(0) => {},
                Some(pos) => {
                    self.stats.resyncs += 1;
                    self.discard(pos);
                },
            }

            if self.buf.len() < HEADER_LEN {
                return None;
            }

            let declared =
                u16::from_le_bytes([self.buf[LENGTH_OFFSET], self.buf[LENGTH_OFFSET + 1]]) as usize;
            if declared > self.config.max_payload_len {
                // 假标记：跳过它的第一个字节后重新扫描
                self.stats.length_faults += 1;
                self.discard(1);
                continue;
            }

            let total = HEADER_LEN + declared + CHECKSUM_LEN;
            if self.buf.len() < total {
                return None;
            }

            if self.config.checksum == ChecksumPolicy::Verify {
                let body = HEADER_LEN + declared;
                let trailer = u16::from_le_bytes([self.buf[body], self.buf[body + 1]]);
                if checksum(&self.buf[..body]) != trailer {
                    // 同长度越界：跳过标记的第一个字节后重新扫描
                    self.stats.checksum_failures += 1;
                    self.discard(1);
                    continue;
                }
            }

            let mut raw = self.buf.split_to(total).freeze();
            let counter = raw[2];
            raw.advance(HEADER_LEN);
            let payload = raw.split_to(declared);
            let checksum = raw.get_u16_le();

            self.stats.frames += 1;
            return Some(Frame {
                counter,
                payload,
                checksum,
            });
        }
    }

    fn discard(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        self.buf.advance(n);
        self.stats.bytes_discarded += n as u64;
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn find_sync(buf: &[u8]) -> Option<usize> {
    buf.windows(SYNC_MARKER.len())
        .position(|window| window == SYNC_MARKER)
}
