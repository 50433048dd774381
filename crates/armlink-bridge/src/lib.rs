//! 机械臂控制桥
//!
//! 把消息总线（OSC over UDP）和机械臂控制器连接起来：
//!
//! - **命令路径**：总线消息 → [`BridgeCommand`] → [`RobotController`](armlink_driver::RobotController) 调用
//! - **遥测路径**：推送流或轮询 → 零值抑制 → 限速 → 总线发布
//!
//! # 快速开始
//!
//! ```no_run
//! use armlink_bridge::{Bridge, BridgeConfig, UdpBus};
//! use armlink_driver::SimController;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BridgeConfig::default();
//! let bus = UdpBus::bind(config.bus.listen, config.bus.send_to)?;
//! let bridge = Bridge::new(config, Arc::new(SimController::new()), Arc::new(bus))?;
//! let handle = bridge.start()?;
//! // ...
//! handle.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod command;
pub mod config;
pub mod dispatcher;
mod error;
pub mod osc;
pub mod publisher;
pub mod runtime;
pub mod udp;
pub mod wrench;

pub use bus::{BusArg, BusMessage, BusPeer, ChannelBus, MessageBus};
pub use command::{BridgeCommand, DEFAULT_JOG_SPEED};
pub use config::{BridgeConfig, BusConfig, RobotConfig, TelemetryConfig, TelemetryMode};
pub use dispatcher::{ControlDispatcher, command_loop};
pub use error::{BridgeError, BusError, CommandError, ConfigError, DispatchError};
pub use publisher::{BusTelemetrySink, PublishOptions};
pub use runtime::{Bridge, BridgeHandle};
pub use udp::UdpBus;
pub use wrench::wrench_to_base;
