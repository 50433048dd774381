//! 活性统计模块
//!
//! 在固定时间窗口内统计读取次数与"真正发生变化"的次数，
//! 用于判断上游是否在产生新数据，还是在重复发送陈旧帧。

use std::time::{Duration, Instant};

/// 默认报告周期
pub const DEFAULT_LIVENESS_INTERVAL: Duration = Duration::from_secs(1);

/// 一个统计窗口的报告
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LivenessReport {
    /// 总读取次数（含失败的轮询）
    pub reads: u64,
    /// 有效读取次数（关节 1-3 均非零）
    pub valid_reads: u64,
    /// 与前一次观测不同的次数（逐元素比较，无容差）
    pub unique_updates: u64,
    /// 每秒唯一更新数（Hz）
    pub unique_rate: f64,
    /// 窗口实际时长
    pub elapsed: Duration,
}

#[derive(Debug)]
struct LivenessWindow {
    reads: u64,
    valid_reads: u64,
    unique_updates: u64,
    start: Instant,
}

impl LivenessWindow {
    fn new(start: Instant) -> Self {
        Self {
            reads: 0,
            valid_reads: 0,
            unique_updates: 0,
            start,
        }
    }
}

/// 活性统计
///
/// 由遥测线程独占，不跨线程共享。
#[derive(Debug)]
pub struct LivenessTracker {
    interval: Duration,
    window: LivenessWindow,
    // 跨窗口保留，新窗口的第一次观测仍与上一窗口最后的值比较
    previous: Option<[f64; 6]>,
}

impl LivenessTracker {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            window: LivenessWindow::new(now),
            previous: None,
        }
    }

    /// 记录一次成功观测
    pub fn observe(&mut self, joints: &[f64; 6]) {
        self.window.reads += 1;

        if joints[0] != 0.0 && joints[1] != 0.0 && joints[2] != 0.0 {
            self.window.valid_reads += 1;
        }

        if self.previous.as_ref() != Some(joints) {
            self.window.unique_updates += 1;
            self.previous = Some(*joints);
        }
    }

    /// 记录一次失败的读取（只计入总读取数）
    pub fn observe_failure(&mut self) {
        self.window.reads += 1;
    }

    /// 窗口到期时生成报告并开始新窗口
    pub fn maybe_report(&mut self, now: Instant) -> Option<LivenessReport> {
        let elapsed = now.saturating_duration_since(self.window.start);
        if elapsed < self.interval {
            return None;
        }

        // 避免除零（至少 1ms）
        let secs = elapsed.as_secs_f64().max(0.001);
        let report = LivenessReport {
            reads: self.window.reads,
            valid_reads: self.window.valid_reads,
            unique_updates: self.window.unique_updates,
            unique_rate: self.window.unique_updates as f64 / secs,
            elapsed,
        };

        self.window = LivenessWindow::new(now);
        Some(report)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_updates_counted() {
        let t0 = Instant::now();
        let mut tracker = LivenessTracker::new(Duration::from_secs(1), t0);

        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut b = a;
        b[5] = 6.5;
        let mut c = b;
        c[0] = 1.1;
        let mut d = c;
        d[3] = 4.2;

        for joints in [a, a, a, b, b, c, c, c, d, d] {
            tracker.observe(&joints);
        }

        assert!(tracker.maybe_report(t0 + Duration::from_millis(500)).is_none());

        let report = tracker.maybe_report(t0 + Duration::from_secs(2)).unwrap();
        assert_eq!(report.reads, 10);
        assert_eq!(report.valid_reads, 10);
        assert_eq!(report.unique_updates, 4);
        assert!((report.unique_rate - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_resets_but_keeps_previous() {
        let t0 = Instant::now();
        let mut tracker = LivenessTracker::new(Duration::from_secs(1), t0);
        tracker.observe(&[1.0; 6]);
        tracker.maybe_report(t0 + Duration::from_secs(1)).unwrap();

        // 同样的值，新窗口不算唯一更新
        tracker.observe(&[1.0; 6]);
        let report = tracker.maybe_report(t0 + Duration::from_secs(2)).unwrap();
        assert_eq!(report.reads, 1);
        assert_eq!(report.unique_updates, 0);
        assert_eq!(report.unique_rate, 0.0);
    }

    #[test]
    fn test_valid_reads_require_first_three_joints() {
        let t0 = Instant::now();
        let mut tracker = LivenessTracker::new(Duration::from_secs(1), t0);
        tracker.observe(&[1.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
        tracker.observe(&[1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
        tracker.observe_failure();

        let report = tracker.maybe_report(t0 + Duration::from_secs(1)).unwrap();
        assert_eq!(report.reads, 3);
        assert_eq!(report.valid_reads, 1);
        assert_eq!(report.unique_updates, 2);
    }
}
