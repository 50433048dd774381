//! 固定节拍调度器
//!
//! 推送模式下用于限制发布频率，轮询模式下用于驱动轮询节拍。
//!
//! # 漂移校正
//!
//! 每次触发后 `next_tick += interval`；如果推进后仍落后于 `now`
//! （消费者太慢，错过了一个或多个节拍），直接重置为 `now + interval`，
//! 不补发积压的节拍。代价是错过的节拍被静默丢弃，换来输出频率始终不超过上限。

use crate::error::DriverError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 频率上下限
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimits {
    pub min_hz: f64,
    pub max_hz: f64,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            min_hz: 0.1,
            max_hz: 1000.0,
        }
    }
}

impl RateLimits {
    /// 检查上下限本身是否合法
    pub fn validate(&self) -> Result<(), DriverError> {
        if !(self.min_hz.is_finite() && self.max_hz.is_finite())
            || self.min_hz <= 0.0
            || self.min_hz > self.max_hz
        {
            return Err(DriverError::InvalidConfig(format!(
                "rate limits must satisfy 0 < min <= max, got [{}, {}]",
                self.min_hz, self.max_hz
            )));
        }
        Ok(())
    }

    pub fn clamp(&self, hz: f64) -> f64 {
        hz.clamp(self.min_hz, self.max_hz)
    }
}

/// 线程安全的频率配置句柄
///
/// 命令路径通过它修改遥测频率，遥测路径在每次调度决策时读取。
/// 内部以纳秒间隔存储在 `AtomicU64` 中，无锁。
#[derive(Debug, Clone)]
pub struct RateControl {
    interval_ns: Arc<AtomicU64>,
    limits: RateLimits,
}

impl RateControl {
    /// 创建句柄，初始频率按上下限钳位
    pub fn new(hz: f64, limits: RateLimits) -> Result<Self, DriverError> {
        limits.validate()?;
        let control = Self {
            interval_ns: Arc::new(AtomicU64::new(0)),
            limits,
        };
        control.configure(hz)?;
        Ok(control)
    }

    /// 修改目标频率，返回钳位后的实际频率
    ///
    /// 新间隔在下一次调度决策时生效，不追溯已排定的节拍。
    pub fn configure(&self, hz: f64) -> Result<f64, DriverError> {
        if !hz.is_finite() {
            return Err(DriverError::InvalidRate(format!("{} Hz is not finite", hz)));
        }
        let effective = self.limits.clamp(hz);
        let interval = Duration::from_secs_f64(1.0 / effective);
        // Release: 配对 interval() 中的 Acquire
        self.interval_ns
            .store(interval.as_nanos() as u64, Ordering::Release);
        Ok(effective)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_nanos(self.interval_ns.load(Ordering::Acquire))
    }

    pub fn hz(&self) -> f64 {
        1.0 / self.interval().as_secs_f64()
    }

    pub fn limits(&self) -> RateLimits {
        self.limits
    }
}

/// 漂移校正的节拍调度器
///
/// `ScheduleState`（`next_tick`）由遥测线程独占。
#[derive(Debug)]
pub struct RateScheduler {
    control: RateControl,
    next_tick: Option<Instant>,
}

impl RateScheduler {
    pub fn new(control: RateControl) -> Self {
        Self {
            control,
            next_tick: None,
        }
    }

    /// 修改频率（等价于通过共享句柄修改）
    pub fn configure(&mut self, hz: f64) -> Result<f64, DriverError> {
        self.control.configure(hz)
    }

    /// 是否到达节拍；到达时推进 `next_tick`
    ///
    /// 第一次调用总是触发。
    pub fn should_fire(&mut self, now: Instant) -> bool {
        let interval = self.control.interval();
        match self.next_tick {
            None => {
                self.next_tick = Some(now + interval);
                true
            },
            Some(next) if now >= next => {
                let mut advanced = next + interval;
                if advanced < now {
                    // 错过了节拍：重新对齐，不补发
                    advanced = now + interval;
                }
                self.next_tick = Some(advanced);
                true
            },
            Some(_) => false,
        }
    }

    /// 距离下一个节拍的时间（已到期返回 0）
    pub fn time_until_next(&self, now: Instant) -> Duration {
        match self.next_tick {
            Some(next) => next.saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    pub fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }

    pub fn control(&self) -> &RateControl {
        &self.control
    }

    /// 清除排定的节拍，下一次调用立即触发
    pub fn reset(&mut self) {
        self.next_tick = None;
    }
}
