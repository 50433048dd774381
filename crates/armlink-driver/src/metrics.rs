//! 遥测管线指标
//!
//! 原子计数器，遥测线程写入，任意线程读取快照，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 遥测管线实时指标
///
/// ```rust
/// use armlink_driver::PipelineMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = PipelineMetrics::new();
/// metrics.frames_decoded.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().frames_decoded, 1);
/// ```
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// 推送流接收的总字节数
    pub bytes_received: AtomicU64,

    /// 成功切出的帧数
    pub frames_decoded: AtomicU64,

    /// 载荷解码失败（被丢弃）的帧数
    pub decode_faults: AtomicU64,

    /// 失步/长度越界/校验失败次数
    pub protocol_faults: AtomicU64,

    /// 实际发布到总线的样本数
    pub samples_published: AtomicU64,

    /// 被 last-known-good 替换的关节读数个数
    pub zero_substitutions: AtomicU64,

    /// 轮询模式下的控制器查询次数
    pub poll_calls: AtomicU64,

    /// 轮询模式下失败的查询次数
    pub poll_failures: AtomicU64,

    /// 控制器报告的非零故障码次数
    pub controller_faults: AtomicU64,

    /// 已建立的遥测会话数（含重连）
    pub sessions: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取所有计数器的快照
    ///
    /// 不同计数器之间可能有微小的时间差（`Ordering::Relaxed`）。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            decode_faults: self.decode_faults.load(Ordering::Relaxed),
            protocol_faults: self.protocol_faults.load(Ordering::Relaxed),
            samples_published: self.samples_published.load(Ordering::Relaxed),
            zero_substitutions: self.zero_substitutions.load(Ordering::Relaxed),
            poll_calls: self.poll_calls.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
            controller_faults: self.controller_faults.load(Ordering::Relaxed),
            sessions: self.sessions.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.bytes_received.store(0, Ordering::Relaxed);
        self.frames_decoded.store(0, Ordering::Relaxed);
        self.decode_faults.store(0, Ordering::Relaxed);
        self.protocol_faults.store(0, Ordering::Relaxed);
        self.samples_published.store(0, Ordering::Relaxed);
        self.zero_substitutions.store(0, Ordering::Relaxed);
        self.poll_calls.store(0, Ordering::Relaxed);
        self.poll_failures.store(0, Ordering::Relaxed);
        self.controller_faults.store(0, Ordering::Relaxed);
        self.sessions.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
    pub bytes_received: u64,
    pub frames_decoded: u64,
    pub decode_faults: u64,
    pub protocol_faults: u64,
    pub samples_published: u64,
    pub zero_substitutions: u64,
    pub poll_calls: u64,
    pub poll_failures: u64,
    pub controller_faults: u64,
    pub sessions: u64,
}

impl MetricsSnapshot {
    /// 发布率：已发布样本占已解码帧的百分比
    ///
    /// 限速生效时远小于 100。`frames_decoded` 为 0 时返回 0.0。
    pub fn publish_ratio(&self) -> f64 {
        if self.frames_decoded == 0 {
            return 0.0;
        }
        (self.samples_published as f64 / self.frames_decoded as f64) * 100.0
    }

    /// 轮询失败率（百分比）
    pub fn poll_failure_rate(&self) -> f64 {
        if self.poll_calls == 0 {
            return 0.0;
        }
        (self.poll_failures as f64 / self.poll_calls as f64) * 100.0
    }
}
