//! 桥接运行时：线程装配与生命周期
//!
//! 两个具名线程：
//!
//! - `command`：总线接收 → 解析 → 控制器调用
//! - `telemetry`：推送流会话（断线重连）或轮询循环 → 总线发布
//!
//! 两条路径只共享控制器（自行串行化）、消息总线和 [`RateControl`]。
//! 停止时清除 `is_running`，两个线程在各自下一次有界阻塞返回后退出。

use crate::bus::MessageBus;
use crate::config::{BridgeConfig, TelemetryMode};
use crate::dispatcher::{ControlDispatcher, command_loop};
use crate::error::BridgeError;
use crate::publisher::BusTelemetrySink;
use armlink_driver::{
    MetricsSnapshot, PipelineMetrics, PollPipeline, RateControl, RobotController, StreamPipeline,
    TelemetryFault, TelemetrySink, poll_loop, stream_loop,
};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, trace, warn};

/// 重连等待时检查停止信号的粒度
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// 桥接程序（尚未启动）
pub struct Bridge {
    config: BridgeConfig,
    controller: Arc<dyn RobotController>,
    bus: Arc<dyn MessageBus>,
    rate: RateControl,
    metrics: Arc<PipelineMetrics>,
    is_running: Arc<AtomicBool>,
}

impl Bridge {
    pub fn new(
        config: BridgeConfig,
        controller: Arc<dyn RobotController>,
        bus: Arc<dyn MessageBus>,
    ) -> Result<Self, BridgeError> {
        config.validate()?;
        let rate = RateControl::new(config.telemetry.rate_hz, config.rate_limits())?;
        Ok(Self {
            config,
            controller,
            bus,
            rate,
            metrics: Arc::new(PipelineMetrics::new()),
            is_running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// 遥测频率句柄（与命令路径共享）
    pub fn rate_control(&self) -> RateControl {
        self.rate.clone()
    }

    /// 运行标志，清除即请求停止（可交给信号处理器）
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.is_running)
    }

    /// 启动命令线程和遥测线程
    pub fn start(self) -> Result<BridgeHandle, BridgeError> {
        info!(
            "Starting bridge: telemetry {:?} at {} Hz, commands on {}",
            self.config.telemetry.mode,
            self.rate.hz(),
            self.config.bus.listen
        );

        let command = {
            let dispatcher = ControlDispatcher::new(
                Arc::clone(&self.controller),
                self.rate.clone(),
                Arc::clone(&self.bus),
            );
            let bus = Arc::clone(&self.bus);
            let timeout = self.config.receive_timeout();
            let running = Arc::clone(&self.is_running);
            thread::Builder::new()
                .name("command".into())
                .spawn(move || command_loop(bus.as_ref(), &dispatcher, timeout, &running))
                .map_err(BridgeError::Spawn)?
        };

        let telemetry = {
            let ctx = TelemetryContext {
                config: self.config.clone(),
                controller: Arc::clone(&self.controller),
                bus: Arc::clone(&self.bus),
                rate: self.rate.clone(),
                metrics: Arc::clone(&self.metrics),
                is_running: Arc::clone(&self.is_running),
            };
            match thread::Builder::new()
                .name("telemetry".into())
                .spawn(move || ctx.run())
            {
                Ok(handle) => handle,
                Err(e) => {
                    self.is_running.store(false, Ordering::Release);
                    let _ = command.join();
                    return Err(BridgeError::Spawn(e));
                },
            }
        };

        Ok(BridgeHandle {
            is_running: self.is_running,
            metrics: self.metrics,
            rate: self.rate,
            command: Some(command),
            telemetry: Some(telemetry),
        })
    }
}

/// 运行中的桥接程序
///
/// Drop 时自动停止并等待线程退出。
pub struct BridgeHandle {
    is_running: Arc<AtomicBool>,
    metrics: Arc<PipelineMetrics>,
    rate: RateControl,
    command: Option<JoinHandle<()>>,
    telemetry: Option<JoinHandle<()>>,
}

impl BridgeHandle {
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// 请求停止（不等待）
    pub fn stop(&self) {
        self.is_running.store(false, Ordering::Release);
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn rate_control(&self) -> &RateControl {
        &self.rate
    }

    /// 等待两个线程退出（需要先 `stop` 或由外部清除运行标志）
    pub fn join(mut self) {
        self.join_threads();
    }

    /// 停止并等待退出
    pub fn shutdown(mut self) {
        self.stop();
        self.join_threads();
    }

    fn join_threads(&mut self) {
        for (name, handle) in [
            ("command", self.command.take()),
            ("telemetry", self.telemetry.take()),
        ] {
            if let Some(handle) = handle
                && handle.join().is_err()
            {
                error!("{} thread panicked", name);
            }
        }
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        self.stop();
        self.join_threads();
    }
}

/// 遥测线程拥有的全部资源
struct TelemetryContext {
    config: BridgeConfig,
    controller: Arc<dyn RobotController>,
    bus: Arc<dyn MessageBus>,
    rate: RateControl,
    metrics: Arc<PipelineMetrics>,
    is_running: Arc<AtomicBool>,
}

impl TelemetryContext {
    fn run(self) {
        match self.config.telemetry.mode {
            TelemetryMode::Stream => self.run_stream_sessions(),
            TelemetryMode::Poll => self.run_poll(),
        }
        trace!("Telemetry thread exiting");
    }

    fn run_poll(self) {
        let pipeline_config = self.config.pipeline_config();
        let sink = BusTelemetrySink::new(Arc::clone(&self.bus), self.config.publish_options());
        self.metrics.sessions.fetch_add(1, Ordering::Relaxed);

        let mut pipeline = PollPipeline::new(
            Arc::clone(&self.controller),
            &pipeline_config,
            self.rate.clone(),
            Arc::clone(&self.metrics),
            sink,
            Instant::now(),
        );
        info!("Polling controller at {} Hz", self.rate.hz());
        poll_loop(&mut pipeline, &pipeline_config, &self.is_running);
    }

    /// 推送流会话循环
    ///
    /// 每次连接都是一个新会话：新的解帧缓冲、新的 last-known-good。
    /// 传输中断后按固定间隔重连，直到停止。
    fn run_stream_sessions(self) {
        let pipeline_config = self.config.pipeline_config();
        let addr = self.config.state_stream_addr();
        let mut sink = BusTelemetrySink::new(Arc::clone(&self.bus), self.config.publish_options());

        while self.is_running.load(Ordering::Acquire) {
            match self.connect(&addr) {
                Ok(stream) => {
                    let session = self.metrics.sessions.fetch_add(1, Ordering::Relaxed) + 1;
                    info!("Telemetry session {} connected to {}", session, addr);

                    let mut pipeline = StreamPipeline::new(
                        &pipeline_config,
                        self.rate.clone(),
                        Arc::clone(&self.metrics),
                        &mut sink,
                        Instant::now(),
                    );
                    match stream_loop(stream, &mut pipeline, &pipeline_config, &self.is_running) {
                        Ok(()) => break,
                        Err(e) => error!("Telemetry session {} lost: {}", session, e),
                    }
                },
                Err(e) => {
                    warn!("Cannot connect to state stream {}: {}", addr, e);
                    sink.report_fault(&TelemetryFault::Transport(e.to_string()));
                },
            }

            self.wait_before_reconnect();
        }
    }

    fn connect(&self, addr: &str) -> io::Result<TcpStream> {
        let resolved: Vec<SocketAddr> = addr.to_socket_addrs()?.collect();
        let mut last_err =
            io::Error::new(io::ErrorKind::AddrNotAvailable, format!("{} did not resolve", addr));

        for candidate in resolved {
            match TcpStream::connect_timeout(&candidate, self.config.connect_timeout()) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.config.pipeline_config().read_timeout))?;
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                },
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    fn wait_before_reconnect(&self) {
        let deadline = Instant::now() + self.config.reconnect_interval();
        while self.is_running.load(Ordering::Acquire) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(SHUTDOWN_POLL));
        }
    }
}
