//! 测试替身：脚本化控制器与记录型 sink

#![allow(dead_code)]

use armlink_driver::{
    ControllerError, ControllerResult, ErrorCodes, JogFrame, JogRequest, JointMove, LinearMove,
    LivenessReport, RobotController, ServoTarget, TelemetryFault, TelemetrySink, TelemetryUpdate,
};
use armlink_protocol::{Frame, TelemetryLayout, TelemetrySample};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// 记录所有输出，供断言使用
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    inner: Arc<Mutex<Recorded>>,
}

#[derive(Debug, Default)]
pub struct Recorded {
    pub published: Vec<TelemetryUpdate>,
    pub faults: Vec<TelemetryFault>,
    pub liveness: Vec<LivenessReport>,
}

impl RecordingSink {
    pub fn published(&self) -> Vec<TelemetryUpdate> {
        self.inner.lock().published.clone()
    }

    pub fn faults(&self) -> Vec<TelemetryFault> {
        self.inner.lock().faults.clone()
    }

    pub fn liveness(&self) -> Vec<LivenessReport> {
        self.inner.lock().liveness.clone()
    }
}

impl TelemetrySink for RecordingSink {
    fn publish(&mut self, update: &TelemetryUpdate) {
        self.inner.lock().published.push(*update);
    }

    fn report_fault(&mut self, fault: &TelemetryFault) {
        self.inner.lock().faults.push(fault.clone());
    }

    fn report_liveness(&mut self, report: &LivenessReport) {
        self.inner.lock().liveness.push(*report);
    }
}

/// 按脚本返回关节读数的控制器
///
/// 脚本耗尽后重复最后一个结果；其余查询通道返回固定值。
#[derive(Debug)]
pub struct ScriptedController {
    joints: Mutex<VecDeque<ControllerResult<[f64; 6]>>>,
    last: Mutex<Option<ControllerResult<[f64; 6]>>>,
    pose: Mutex<ControllerResult<[f64; 6]>>,
    error: Mutex<ErrorCodes>,
}

impl ScriptedController {
    pub fn new(script: Vec<ControllerResult<[f64; 6]>>) -> Self {
        Self {
            joints: Mutex::new(script.into()),
            last: Mutex::new(None),
            pose: Mutex::new(Ok([1.0, 2.0, 3.0, 4.0, 5.0, 6.0])),
            error: Mutex::new(ErrorCodes::default()),
        }
    }

    pub fn set_pose(&self, pose: ControllerResult<[f64; 6]>) {
        *self.pose.lock() = pose;
    }

    pub fn set_error(&self, codes: ErrorCodes) {
        *self.error.lock() = codes;
    }
}

impl RobotController for ScriptedController {
    fn move_joint(&self, _cmd: &JointMove) -> ControllerResult<()> {
        Ok(())
    }

    fn move_linear(&self, _cmd: &LinearMove) -> ControllerResult<()> {
        Ok(())
    }

    fn servo_start(&self) -> ControllerResult<()> {
        Ok(())
    }

    fn servo_joint(&self, _target: &ServoTarget) -> ControllerResult<()> {
        Ok(())
    }

    fn servo_end(&self) -> ControllerResult<()> {
        Ok(())
    }

    fn start_jog(&self, _request: &JogRequest) -> ControllerResult<()> {
        Ok(())
    }

    fn stop_jog(&self, _frame: JogFrame) -> ControllerResult<()> {
        Ok(())
    }

    fn set_drag_teach(&self, _enabled: bool) -> ControllerResult<()> {
        Ok(())
    }

    fn set_enabled(&self, _enabled: bool) -> ControllerResult<()> {
        Ok(())
    }

    fn reset_errors(&self) -> ControllerResult<()> {
        Ok(())
    }

    fn joint_positions(&self) -> ControllerResult<[f64; 6]> {
        let mut last = self.last.lock();
        if let Some(next) = self.joints.lock().pop_front() {
            *last = Some(next.clone());
            return next;
        }
        last.clone()
            .unwrap_or(Err(ControllerError::Transport("script is empty".into())))
    }

    fn tool_pose(&self) -> ControllerResult<[f64; 6]> {
        self.pose.lock().clone()
    }

    fn joint_loads(&self) -> ControllerResult<[f64; 6]> {
        Ok([0.5; 6])
    }

    fn force_torque(&self) -> ControllerResult<[f64; 6]> {
        Ok([0.0; 6])
    }

    fn error_code(&self) -> ControllerResult<ErrorCodes> {
        Ok(*self.error.lock())
    }
}

/// 把样本编码成一整帧线上字节
pub fn encode_frame(counter: u8, sample: &TelemetrySample) -> Vec<u8> {
    let payload = TelemetryLayout::standard().encode(sample);
    Frame::new(counter, payload)
        .to_bytes()
        .expect("payload fits in u16 length")
        .to_vec()
}

pub fn sample_with_joints(joints: [f64; 6]) -> TelemetrySample {
    TelemetrySample {
        joints,
        tool_pose: [100.0, 200.0, 300.0, 180.0, 0.0, 90.0],
        ..Default::default()
    }
}
