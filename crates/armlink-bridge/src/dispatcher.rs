//! 命令分发
//!
//! 每条入站命令恰好对应一次控制器调用（或一次频率修改）。
//! 发即忘：结果只记录日志，控制器故障码通过 `/error` 回报，不重试，不排队。

use crate::bus::{BusMessage, MessageBus};
use crate::command::BridgeCommand;
use crate::error::{BusError, DispatchError};
use crate::publisher::addr;
use armlink_driver::{ControllerError, RateControl, RobotController};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// 控制命令分发器（无状态）
pub struct ControlDispatcher {
    controller: Arc<dyn RobotController>,
    rate: RateControl,
    /// 诊断输出（控制器故障码）
    bus: Arc<dyn MessageBus>,
}

impl ControlDispatcher {
    pub fn new(
        controller: Arc<dyn RobotController>,
        rate: RateControl,
        bus: Arc<dyn MessageBus>,
    ) -> Self {
        Self {
            controller,
            rate,
            bus,
        }
    }

    /// 执行一条命令
    pub fn dispatch(&self, command: &BridgeCommand) -> Result<(), DispatchError> {
        let c = &self.controller;
        match command {
            BridgeCommand::MoveJoint(cmd) => c.move_joint(cmd)?,
            BridgeCommand::MoveLinear(cmd) => c.move_linear(cmd)?,
            BridgeCommand::ServoStart => c.servo_start()?,
            BridgeCommand::Servo(target) => c.servo_joint(target)?,
            BridgeCommand::ServoEnd => c.servo_end()?,
            BridgeCommand::DragTeach(on) => c.set_drag_teach(*on)?,
            BridgeCommand::Jog(request) => c.start_jog(request)?,
            BridgeCommand::JogStop(frame) => c.stop_jog(*frame)?,
            BridgeCommand::Enable(on) => c.set_enabled(*on)?,
            BridgeCommand::ResetErrors => c.reset_errors()?,
            BridgeCommand::SetTelemetryRate(hz) => {
                let effective = self.rate.configure(*hz)?;
                if (effective - hz).abs() > f64::EPSILON {
                    info!("Telemetry rate {} Hz clamped to {} Hz", hz, effective);
                } else {
                    info!("Telemetry rate set to {} Hz", effective);
                }
            },
        }
        Ok(())
    }

    /// 解析并执行一条总线消息，所有错误在此处消化
    pub fn handle(&self, message: &BusMessage) {
        trace!("Command: {}", message);

        let result = BridgeCommand::parse(message)
            .map_err(DispatchError::from)
            .and_then(|command| self.dispatch(&command));

        match result {
            Ok(()) => debug!("{} ok", message.address),
            Err(DispatchError::Controller(ControllerError::Fault { code })) => {
                warn!("{} rejected by controller, fault code {}", message.address, code);
                let report = BusMessage::text(addr::ERROR, format!("ID: {}", code));
                if let Err(e) = self.bus.publish(&report) {
                    warn!("Failed to report controller fault: {}", e);
                }
            },
            Err(e) => warn!("{} failed: {}", message.address, e),
        }
    }
}

/// 命令线程主循环
///
/// 接收超时保证停止信号在 `receive_timeout` 内被发现。
pub fn command_loop(
    bus: &dyn MessageBus,
    dispatcher: &ControlDispatcher,
    receive_timeout: Duration,
    is_running: &AtomicBool,
) {
    while is_running.load(Ordering::Acquire) {
        match bus.receive(receive_timeout) {
            Ok(Some(message)) => dispatcher.handle(&message),
            Ok(None) => {},
            Err(BusError::Malformed(reason)) => {
                warn!("Dropping malformed packet: {}", reason);
            },
            Err(BusError::Disconnected) => {
                info!("Command bus disconnected, command thread exiting");
                return;
            },
            Err(e) => {
                warn!("Command bus receive error: {}", e);
                std::thread::sleep(Duration::from_millis(100));
            },
        }
    }
    trace!("Command thread: is_running flag is false, exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusArg, ChannelBus};
    use armlink_driver::mock::SIM_CODE_DISABLED;
    use armlink_driver::{JointMove, RateLimits, SimCall, SimController};

    fn setup() -> (
        ControlDispatcher,
        Arc<SimController>,
        RateControl,
        crate::bus::BusPeer,
    ) {
        let sim = Arc::new(SimController::new());
        let rate = RateControl::new(20.0, RateLimits::default()).unwrap();
        let (bus, peer) = ChannelBus::pair();
        let dispatcher = ControlDispatcher::new(sim.clone(), rate.clone(), Arc::new(bus));
        (dispatcher, sim, rate, peer)
    }

    #[test]
    fn test_one_command_one_call() {
        let (dispatcher, sim, _, _) = setup();
        let joints = vec![BusArg::Float(1.0); 6];
        dispatcher.handle(&BusMessage::new("/movej", joints));

        assert_eq!(
            sim.calls(),
            vec![SimCall::MoveJoint(JointMove::new([1.0; 6]))]
        );
    }

    #[test]
    fn test_rate_command_updates_shared_control() {
        let (dispatcher, sim, rate, _) = setup();
        dispatcher.handle(&BusMessage::new("/telemetry/hz", vec![BusArg::Int(100)]));
        assert_eq!(rate.interval(), Duration::from_millis(10));

        dispatcher.handle(&BusMessage::new("/telemetry/hz", vec![BusArg::Int(0)]));
        assert_eq!(rate.interval(), Duration::from_secs(10));
        assert!(sim.calls().is_empty());
    }

    #[test]
    fn test_controller_fault_is_reported_not_retried() {
        let (dispatcher, sim, _, peer) = setup();
        sim.set_enabled(false).unwrap();

        dispatcher.handle(&BusMessage::new("/movej", vec![BusArg::Float(1.0); 6]));

        // set_enabled + 一次 movej，没有重试
        assert_eq!(sim.calls().len(), 2);
        assert_eq!(
            peer.drain(),
            vec![BusMessage::text("/error", format!("ID: {}", SIM_CODE_DISABLED))]
        );
    }

    #[test]
    fn test_malformed_command_never_reaches_controller() {
        let (dispatcher, sim, _, peer) = setup();
        dispatcher.handle(&BusMessage::new("/movej", vec![BusArg::Float(1.0); 3]));
        dispatcher.handle(&BusMessage::new("/unknown", vec![]));
        assert!(sim.calls().is_empty());
        assert!(peer.drain().is_empty());
    }

    #[test]
    fn test_command_loop_exits_on_disconnect() {
        let (bus, peer) = ChannelBus::pair();
        let sim = Arc::new(SimController::new());
        let rate = RateControl::new(20.0, RateLimits::default()).unwrap();
        let bus: Arc<dyn MessageBus> = Arc::new(bus);
        let dispatcher = ControlDispatcher::new(sim.clone(), rate, bus.clone());

        peer.send(BusMessage::new("/reset_errors", vec![])).unwrap();
        drop(peer);

        let running = AtomicBool::new(true);
        command_loop(bus.as_ref(), &dispatcher, Duration::from_millis(10), &running);
        assert_eq!(sim.calls(), vec![SimCall::ResetErrors]);
    }
}
