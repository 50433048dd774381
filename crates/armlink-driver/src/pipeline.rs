//! 遥测管线
//!
//! 两种遥测来源共用同一套下游处理（零值抑制、活性统计、限速发布）：
//!
//! - **推送模式**（[`StreamPipeline`] + [`stream_loop`]）：消费控制器的实时状态 TCP 流，
//!   解帧、按固定偏移解码，每个节拍只发布最新的一帧（latest-wins）
//! - **轮询模式**（[`PollPipeline`] + [`poll_loop`]）：按节拍主动查询控制器，
//!   查询失败时回退到上一次的有效值
//!
//! 两个循环都只在有界阻塞操作之间检查 `is_running`，停止延迟不超过一次读超时。

use crate::controller::RobotController;
use crate::error::{ControllerError, DriverError, TelemetryFault};
use crate::liveness::{DEFAULT_LIVENESS_INTERVAL, LivenessTracker};
use crate::metrics::PipelineMetrics;
use crate::sampler::{ALL_JOINTS_MASK, TelemetrySampler};
use crate::scheduler::{RateControl, RateScheduler};
use crate::sink::{TelemetrySink, TelemetryUpdate};
use armlink_protocol::{
    DecoderConfig, DecoderStats, FrameDecoder, TelemetryLayout, TelemetrySample,
};
use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// 管线配置
///
/// # Example
///
/// ```
/// use armlink_driver::PipelineConfig;
/// use std::time::Duration;
///
/// let config = PipelineConfig {
///     read_timeout: Duration::from_millis(20),
///     ..Default::default()
/// };
/// assert_eq!(config.read_chunk, 4096);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// 推送流读超时（也是停止响应的上限）
    pub read_timeout: Duration,
    /// 单次读取的最大字节数
    pub read_chunk: usize,
    /// 两次调度之间的最长空闲睡眠
    pub idle_sleep: Duration,
    /// 活性统计周期
    pub liveness_interval: Duration,
    /// 解帧器配置
    pub decoder: DecoderConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(50),
            read_chunk: 4096,
            idle_sleep: Duration::from_micros(500),
            liveness_interval: DEFAULT_LIVENESS_INTERVAL,
            decoder: DecoderConfig::default(),
        }
    }
}

/// 推送模式管线状态
///
/// 生命周期等于一次 TCP 会话：重连时整体重建，last-known-good 随之清零。
pub struct StreamPipeline<S> {
    decoder: FrameDecoder,
    layout: TelemetryLayout,
    sampler: TelemetrySampler,
    liveness: LivenessTracker,
    scheduler: RateScheduler,
    metrics: Arc<PipelineMetrics>,
    sink: S,
    /// 尚未发布的最新更新（新帧覆盖旧帧）
    pending: Option<TelemetryUpdate>,
    sequence: u64,
    last_stats: DecoderStats,
    /// 当前是否处于失步区间（一个区间只报告一次）
    desynced: bool,
    span_discarded: u64,
}

impl<S: TelemetrySink> StreamPipeline<S> {
    pub fn new(
        config: &PipelineConfig,
        rate: RateControl,
        metrics: Arc<PipelineMetrics>,
        sink: S,
        now: Instant,
    ) -> Self {
        Self::with_layout(config, TelemetryLayout::standard(), rate, metrics, sink, now)
    }

    /// 使用自定义字段表
    pub fn with_layout(
        config: &PipelineConfig,
        layout: TelemetryLayout,
        rate: RateControl,
        metrics: Arc<PipelineMetrics>,
        sink: S,
        now: Instant,
    ) -> Self {
        Self {
            decoder: FrameDecoder::with_config(config.decoder),
            layout,
            sampler: TelemetrySampler::new(),
            liveness: LivenessTracker::new(config.liveness_interval, now),
            scheduler: RateScheduler::new(rate),
            metrics,
            sink,
            pending: None,
            sequence: 0,
            last_stats: DecoderStats::default(),
            desynced: false,
            span_discarded: 0,
        }
    }

    /// 处理一段新到达的字节
    ///
    /// 解出的每一帧都会更新 last-known-good 和活性统计，
    /// 但只有最新的一帧会在下一个节拍被发布。
    pub fn ingest(&mut self, bytes: &[u8], now: Instant) {
        self.metrics
            .bytes_received
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);

        let frames = self.decoder.feed(bytes);
        self.track_desync();

        for frame in &frames {
            self.metrics.frames_decoded.fetch_add(1, Ordering::Relaxed);
            trace!(
                "Frame #{} decoded, {} payload bytes",
                frame.counter,
                frame.payload.len()
            );

            match self.layout.decode(&frame.payload) {
                Ok(sample) => self.accept(sample),
                Err(e) => {
                    self.metrics.decode_faults.fetch_add(1, Ordering::Relaxed);
                    warn!("Dropping frame #{}: {}", frame.counter, e);
                    self.sink.report_fault(&TelemetryFault::Decode(e));
                },
            }
        }

        if !frames.is_empty() && self.desynced {
            info!(
                "Stream resynchronized after {} discarded bytes",
                self.span_discarded
            );
            self.desynced = false;
            self.span_discarded = 0;
        }

        self.tick(now);
    }

    /// 调度检查：活性报告 + 到点发布
    ///
    /// 读超时（没有新数据）时也要调用，保证活性报告按时产出。
    pub fn tick(&mut self, now: Instant) {
        if let Some(report) = self.liveness.maybe_report(now) {
            debug!(
                "Liveness: {} reads, {} unique ({:.1} Hz)",
                report.reads, report.unique_updates, report.unique_rate
            );
            self.sink.report_liveness(&report);
        }

        if self.pending.is_none() || !self.scheduler.should_fire(now) {
            return;
        }
        if let Some(update) = self.pending.take() {
            self.sink.publish(&update);
            self.metrics.samples_published.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn accept(&mut self, mut sample: TelemetrySample) {
        self.liveness.observe(&sample.joints);

        let filtered = self.sampler.filter(&sample.joints);
        if filtered.substituted_mask != 0 {
            self.metrics
                .zero_substitutions
                .fetch_add(u64::from(filtered.substituted_mask.count_ones()), Ordering::Relaxed);
        }
        sample.joints = filtered.joints;

        self.sequence += 1;
        self.pending = Some(TelemetryUpdate {
            sample,
            substituted_mask: filtered.substituted_mask,
            sequence: self.sequence,
        });
    }

    fn track_desync(&mut self) {
        let stats = self.decoder.stats();
        let discarded = stats.bytes_discarded - self.last_stats.bytes_discarded;
        let faults = stats.protocol_faults() - self.last_stats.protocol_faults();
        self.last_stats = stats;

        if faults > 0 {
            self.metrics
                .protocol_faults
                .fetch_add(faults, Ordering::Relaxed);
        }
        if discarded == 0 {
            return;
        }

        self.span_discarded += discarded;
        if !self.desynced {
            self.desynced = true;
            warn!("Stream desynchronized, {} bytes discarded", discarded);
            self.sink
                .report_fault(&TelemetryFault::Protocol { discarded });
        }
    }

    /// 处理一次传输层故障（会话即将结束）
    pub fn report_transport(&mut self, reason: impl Into<String>) {
        self.sink
            .report_fault(&TelemetryFault::Transport(reason.into()));
    }

    pub fn decoder_stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    pub fn buffered_len(&self) -> usize {
        self.decoder.buffered_len()
    }

    pub fn last_known_good(&self) -> [f64; 6] {
        self.sampler.last_known_good()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

/// 推送模式主循环
///
/// `reader` 必须已经设置了读超时（如 `TcpStream::set_read_timeout`），
/// 否则停止信号只能在下一次收到数据时才被发现。
///
/// # 返回
///
/// - `Ok(())`：`is_running` 被清除，正常退出
/// - `Err(DriverError::StreamClosed)`：对端关闭连接
/// - `Err(DriverError::Io(_))`：其他不可恢复的读错误
///
/// 后两种情况都会先通过 sink 报告 `TelemetryFault::Transport`。
pub fn stream_loop<R: Read, S: TelemetrySink>(
    mut reader: R,
    pipeline: &mut StreamPipeline<S>,
    config: &PipelineConfig,
    is_running: &AtomicBool,
) -> Result<(), DriverError> {
    let mut buf = vec![0u8; config.read_chunk.max(1)];

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("Telemetry thread: is_running flag is false, exiting");
            return Ok(());
        }

        match reader.read(&mut buf) {
            Ok(0) => {
                error!("Telemetry stream closed by peer");
                pipeline.report_transport("stream closed by peer");
                return Err(DriverError::StreamClosed);
            },
            Ok(n) => pipeline.ingest(&buf[..n], Instant::now()),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                // 读超时：没有新数据，照常调度
                pipeline.tick(Instant::now());
            },
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                error!("Telemetry stream read error: {}", e);
                pipeline.report_transport(e.to_string());
                return Err(e.into());
            },
        }
    }
}

/// 轮询模式管线状态
pub struct PollPipeline<S> {
    controller: Arc<dyn RobotController>,
    sampler: TelemetrySampler,
    liveness: LivenessTracker,
    scheduler: RateScheduler,
    metrics: Arc<PipelineMetrics>,
    sink: S,
    /// 上一次成功读到的各通道值（joints 除外，joints 由 sampler 负责）
    last: TelemetrySample,
    sequence: u64,
}

impl<S: TelemetrySink> PollPipeline<S> {
    pub fn new(
        controller: Arc<dyn RobotController>,
        config: &PipelineConfig,
        rate: RateControl,
        metrics: Arc<PipelineMetrics>,
        sink: S,
        now: Instant,
    ) -> Self {
        Self {
            controller,
            sampler: TelemetrySampler::new(),
            liveness: LivenessTracker::new(config.liveness_interval, now),
            scheduler: RateScheduler::new(rate),
            metrics,
            sink,
            last: TelemetrySample::default(),
            sequence: 0,
        }
    }

    /// 到达节拍时查询控制器并发布，返回本次是否触发
    pub fn tick(&mut self, now: Instant) -> bool {
        let fired = self.scheduler.should_fire(now);
        if fired {
            let update = self.poll_once();
            self.sink.publish(&update);
            self.metrics.samples_published.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(report) = self.liveness.maybe_report(now) {
            debug!(
                "Liveness: {} reads ({} valid), {} unique ({:.1} Hz)",
                report.reads, report.valid_reads, report.unique_updates, report.unique_rate
            );
            self.sink.report_liveness(&report);
        }

        fired
    }

    /// 查询一轮全部通道
    ///
    /// 任一通道失败都不会中断本轮：该通道沿用上一次的值，
    /// 本轮第一个失败作为故障报告。
    pub fn poll_once(&mut self) -> TelemetryUpdate {
        let controller = Arc::clone(&self.controller);
        let mut round_fault: Option<ControllerError> = None;
        let mut sample = self.last;
        let mut substituted_mask = 0u8;

        match self.call(|| controller.joint_positions(), &mut round_fault) {
            Some(joints) => {
                self.liveness.observe(&joints);
                let filtered = self.sampler.filter(&joints);
                if filtered.substituted_mask != 0 {
                    self.metrics.zero_substitutions.fetch_add(
                        u64::from(filtered.substituted_mask.count_ones()),
                        Ordering::Relaxed,
                    );
                }
                substituted_mask = filtered.substituted_mask;
                sample.joints = filtered.joints;
            },
            None => {
                self.liveness.observe_failure();
                substituted_mask = ALL_JOINTS_MASK;
                sample.joints = self.sampler.last_known_good();
            },
        }

        if let Some(pose) = self.call(|| controller.tool_pose(), &mut round_fault) {
            sample.tool_pose = pose;
        }
        if let Some(loads) = self.call(|| controller.joint_loads(), &mut round_fault) {
            sample.joint_loads = loads;
        }
        if let Some(ft) = self.call(|| controller.force_torque(), &mut round_fault) {
            sample.force_torque = ft;
        }
        if let Some(codes) = self.call(|| controller.error_code(), &mut round_fault) {
            sample.main_code = codes.main;
            sample.sub_code = codes.sub;
        }

        if let Some(err) = round_fault {
            warn!("Poll round degraded, using last known values: {}", err);
            self.sink.report_fault(&TelemetryFault::from(err));
        }

        self.last = sample;
        self.sequence += 1;
        TelemetryUpdate {
            sample,
            substituted_mask,
            sequence: self.sequence,
        }
    }

    fn call<T>(
        &self,
        query: impl FnOnce() -> Result<T, ControllerError>,
        round_fault: &mut Option<ControllerError>,
    ) -> Option<T> {
        self.metrics.poll_calls.fetch_add(1, Ordering::Relaxed);
        match query() {
            Ok(value) => Some(value),
            Err(err) => {
                self.metrics.poll_failures.fetch_add(1, Ordering::Relaxed);
                if matches!(err, ControllerError::Fault { .. }) {
                    self.metrics
                        .controller_faults
                        .fetch_add(1, Ordering::Relaxed);
                }
                round_fault.get_or_insert(err);
                None
            },
        }
    }

    /// 距离下一个节拍的时间
    pub fn time_until_next(&self, now: Instant) -> Duration {
        self.scheduler.time_until_next(now)
    }

    pub fn last_known_good(&self) -> [f64; 6] {
        self.sampler.last_known_good()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

/// 轮询模式主循环
///
/// 节拍之间的睡眠不超过 `config.idle_sleep`，保证停止信号能被及时发现；
/// 控制器调用本身不可中断。
pub fn poll_loop<S: TelemetrySink>(
    pipeline: &mut PollPipeline<S>,
    config: &PipelineConfig,
    is_running: &AtomicBool,
) {
    while is_running.load(Ordering::Acquire) {
        pipeline.tick(Instant::now());

        let wait = pipeline
            .time_until_next(Instant::now())
            .min(config.idle_sleep);
        if !wait.is_zero() {
            // spin_sleep 提供微秒级精度（相比 thread::sleep 的 1-2ms）
            spin_sleep::sleep(wait);
        }
    }
    trace!("Telemetry thread: is_running flag is false, exiting");
}
