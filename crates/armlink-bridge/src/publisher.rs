//! 遥测 → 总线
//!
//! 把遥测管线的输出翻译成出站地址：
//!
//! | 地址 | 内容 |
//! |------|------|
//! | `/error` | `"ID: <code>"`，控制器故障码非零时每次发布前发送 |
//! | `/joints` | 6 个关节角（度，已零值抑制） |
//! | `/pose` | 工具位姿 |
//! | `/torques` | 关节负载 |
//! | `/ext_force` | 力/力矩传感器原始值（工具坐标系） |
//! | `/ft_base` | 基坐标系下的力/力矩（可选） |
//! | `/telemetry/stats` | `reads valid_reads unique_updates unique_rate`（可选） |
//! | `/telemetry/fault` | `"transport" <原因>` / `"protocol" <丢弃字节数>` / `"decode" <原因>` |
//!
//! 控制器故障码走 `/error`，其余遥测故障走 `/telemetry/fault`。
//! 总线发送失败只记日志，不影响遥测线程。

use crate::bus::{BusArg, BusMessage, MessageBus};
use crate::wrench::wrench_to_base;
use armlink_driver::{LivenessReport, TelemetryFault, TelemetrySink, TelemetryUpdate};
use std::sync::Arc;
use tracing::warn;

/// 出站地址
pub mod addr {
    pub const ERROR: &str = "/error";
    pub const JOINTS: &str = "/joints";
    pub const POSE: &str = "/pose";
    pub const TORQUES: &str = "/torques";
    pub const EXT_FORCE: &str = "/ext_force";
    pub const FT_BASE: &str = "/ft_base";
    pub const STATS: &str = "/telemetry/stats";
    pub const FAULT: &str = "/telemetry/fault";
}

/// 可选输出
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// 发布 `/telemetry/stats`
    pub publish_stats: bool,
    /// 发布 `/ft_base`
    pub wrench_in_base: bool,
}

/// 以消息总线为输出端的 [`TelemetrySink`]
pub struct BusTelemetrySink {
    bus: Arc<dyn MessageBus>,
    options: PublishOptions,
    send_failures: u64,
}

impl BusTelemetrySink {
    pub fn new(bus: Arc<dyn MessageBus>, options: PublishOptions) -> Self {
        Self {
            bus,
            options,
            send_failures: 0,
        }
    }

    /// 累计发送失败次数
    pub fn send_failures(&self) -> u64 {
        self.send_failures
    }

    fn send(&mut self, message: BusMessage) {
        if let Err(e) = self.bus.publish(&message) {
            self.send_failures += 1;
            // 控制面离线时每帧都会失败，只在首次和每 1000 次时告警
            if self.send_failures == 1 || self.send_failures % 1000 == 0 {
                warn!(
                    "Failed to publish {} ({} failures so far): {}",
                    message.address, self.send_failures, e
                );
            }
        }
    }

    fn send_error_code(&mut self, code: i32) {
        self.send(BusMessage::text(addr::ERROR, format!("ID: {}", code)));
    }
}

impl TelemetrySink for BusTelemetrySink {
    fn publish(&mut self, update: &TelemetryUpdate) {
        let sample = &update.sample;

        if sample.main_code != 0 {
            self.send_error_code(sample.main_code);
        }

        self.send(BusMessage::floats(addr::JOINTS, &sample.joints));
        self.send(BusMessage::floats(addr::POSE, &sample.tool_pose));
        self.send(BusMessage::floats(addr::TORQUES, &sample.joint_loads));
        self.send(BusMessage::floats(addr::EXT_FORCE, &sample.force_torque));

        if self.options.wrench_in_base {
            let base = wrench_to_base(&sample.tool_pose, &sample.force_torque);
            self.send(BusMessage::floats(addr::FT_BASE, &base));
        }
    }

    fn report_fault(&mut self, fault: &TelemetryFault) {
        match fault {
            TelemetryFault::Controller { code } => self.send_error_code(*code),
            TelemetryFault::Transport(reason) => self.send(BusMessage::new(
                addr::FAULT,
                vec![BusArg::Str("transport".into()), BusArg::Str(reason.clone())],
            )),
            TelemetryFault::Protocol { discarded } => self.send(BusMessage::new(
                addr::FAULT,
                vec![BusArg::Str("protocol".into()), BusArg::Int(*discarded as i64)],
            )),
            TelemetryFault::Decode(err) => self.send(BusMessage::new(
                addr::FAULT,
                vec![BusArg::Str("decode".into()), BusArg::Str(err.to_string())],
            )),
        }
    }

    fn report_liveness(&mut self, report: &LivenessReport) {
        if !self.options.publish_stats {
            return;
        }
        self.send(BusMessage::new(
            addr::STATS,
            vec![
                BusArg::Int(report.reads as i64),
                BusArg::Int(report.valid_reads as i64),
                BusArg::Int(report.unique_updates as i64),
                BusArg::Float(report.unique_rate),
            ],
        ));
    }
}
