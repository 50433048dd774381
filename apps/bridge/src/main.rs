//! 机械臂 OSC 控制桥主入口
//!
//! ```bash
//! # 默认配置：命令监听 0.0.0.0:9000，遥测发往 127.0.0.1:8000
//! armlink_bridge_host --sim-stream
//!
//! # 从配置文件加载，命令行参数覆盖文件
//! armlink_bridge_host --config bridge.toml --rate 50
//! ```

mod sim;

use anyhow::{Context, Result};
use armlink_bridge::{Bridge, BridgeConfig, TelemetryMode, UdpBus};
use armlink_driver::SimController;
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// 遥测来源
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// 控制器实时状态推送流
    Stream,
    /// 按节拍查询控制器
    Poll,
}

impl From<ModeArg> for TelemetryMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Stream => TelemetryMode::Stream,
            ModeArg::Poll => TelemetryMode::Poll,
        }
    }
}

/// 机械臂 OSC 控制桥
///
/// 接收控制面的 OSC 命令并转发给控制器，同时把遥测以 OSC 发布回控制面
#[derive(Parser, Debug)]
#[command(name = "armlink_bridge_host")]
#[command(about = "OSC control bridge for six-axis robot arms", long_about = None)]
struct Args {
    /// 配置文件（TOML），未给出时使用默认值
    #[arg(long)]
    config: Option<PathBuf>,

    /// 控制器地址
    #[arg(long)]
    robot_host: Option<String>,

    /// 实时状态推送端口
    #[arg(long)]
    state_port: Option<u16>,

    /// 遥测来源
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// 命令监听地址
    ///
    /// 格式: IP:PORT (例如: 0.0.0.0:9000)
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// 遥测发送目标
    ///
    /// 格式: IP:PORT (例如: 127.0.0.1:8000)
    #[arg(long)]
    send_to: Option<SocketAddr>,

    /// 初始遥测频率（Hz）
    #[arg(long)]
    rate: Option<f64>,

    /// 在本地启动模拟状态流，并把推送模式指向它
    #[arg(long)]
    sim_stream: bool,

    /// 打印合并后的配置并退出
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn resolve_config(&self) -> Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => BridgeConfig::default(),
        };

        if let Some(host) = &self.robot_host {
            config.robot.host = host.clone();
        }
        if let Some(port) = self.state_port {
            config.robot.state_port = port;
        }
        if let Some(mode) = self.mode {
            config.telemetry.mode = mode.into();
        }
        if let Some(listen) = self.listen {
            config.bus.listen = listen;
        }
        if let Some(send_to) = self.send_to {
            config.bus.send_to = send_to;
        }
        if let Some(rate) = self.rate {
            config.telemetry.rate_hz = rate;
        }

        config.validate()?;
        Ok(config)
    }

    /// 命令路径绑定的是模拟控制器；没有 `--sim-stream` 时遥测却来自真实控制器
    fn simulated_commands_warning(&self, config: &BridgeConfig) -> Option<String> {
        if self.sim_stream {
            return None;
        }
        Some(format!(
            "Commands go to a simulated controller and will not move the arm at {}",
            config.robot.host
        ))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("armlink=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let mut config = args.resolve_config()?;

    if args.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    // 控制器的 RPC 客户端不在本程序内，命令落到模拟控制器上
    let sim = Arc::new(SimController::new());
    if let Some(message) = args.simulated_commands_warning(&config) {
        warn!("{}", message);
    }

    let bus = UdpBus::bind(config.bus.listen, config.bus.send_to)
        .with_context(|| format!("Failed to bind {}", config.bus.listen))?;

    let mut sim_server = None;
    if args.sim_stream {
        let running = Arc::new(AtomicBool::new(true));
        let (addr, handle) = sim::spawn_state_server(
            Arc::clone(&sim),
            SocketAddr::from(([127, 0, 0, 1], 0)),
            Arc::clone(&running),
        )
        .context("Failed to start simulated state stream")?;
        config.robot.host = addr.ip().to_string();
        config.robot.state_port = addr.port();
        config.telemetry.mode = TelemetryMode::Stream;
        sim_server = Some((running, handle));
    }

    let bridge = Bridge::new(config, sim, Arc::new(bus))?;
    let is_running = bridge.running_flag();

    // 设置信号处理（Ctrl+C 优雅退出）
    let flag = Arc::clone(&is_running);
    ctrlc::set_handler(move || {
        eprintln!("\nReceived interrupt signal. Shutting down...");
        flag.store(false, Ordering::Release);
    })
    .context("Failed to set signal handler")?;

    let handle = bridge.start()?;
    info!("Bridge started. Press Ctrl+C to stop.");

    while is_running.load(Ordering::Acquire) {
        thread::sleep(Duration::from_millis(100));
    }

    let metrics = handle.metrics();
    handle.shutdown();

    if let Some((running, server)) = sim_server {
        running.store(false, Ordering::Release);
        let _ = server.join();
    }

    info!("Final metrics: {}", serde_json::to_string(&metrics)?);
    Ok(())
}
