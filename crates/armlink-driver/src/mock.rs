//! 模拟控制器（无需硬件）
//!
//! 用于测试和离线运行桥接程序。运动指令立即生效（没有轨迹），
//! 点动在每次读取关节位置时按速度推进一个固定步长。

use crate::controller::{
    ErrorCodes, JogFrame, JogRequest, JointMove, LinearMove, RobotController, ServoTarget,
};
use crate::error::{ControllerError, ControllerResult};
use parking_lot::Mutex;

/// 未上使能时执行运动指令
pub const SIM_CODE_DISABLED: i32 = 101;
/// 不在伺服模式时发送伺服指令
pub const SIM_CODE_NOT_SERVOING: i32 = 102;

/// 每次读取关节位置时点动推进的角度（度/每 1% 速度）
const JOG_STEP_PER_PERCENT: f64 = 0.01;

/// 模拟控制器收到的调用
#[derive(Debug, Clone, PartialEq)]
pub enum SimCall {
    MoveJoint(JointMove),
    MoveLinear(LinearMove),
    ServoStart,
    ServoJoint(ServoTarget),
    ServoEnd,
    StartJog(JogRequest),
    StopJog(JogFrame),
    SetDragTeach(bool),
    SetEnabled(bool),
    ResetErrors,
}

#[derive(Debug)]
struct SimState {
    joints: [f64; 6],
    pose: [f64; 6],
    loads: [f64; 6],
    force_torque: [f64; 6],
    error: ErrorCodes,
    enabled: bool,
    servoing: bool,
    drag_teach: bool,
    jog: Option<JogRequest>,
    /// 查询类调用注入的故障（一直生效，直到清除）
    query_fault: Option<ControllerError>,
    calls: Vec<SimCall>,
}

/// 模拟控制器
///
/// 内部状态由 `parking_lot::Mutex` 保护，可以在命令线程和遥测线程间共享。
#[derive(Debug)]
pub struct SimController {
    state: Mutex<SimState>,
}

impl Default for SimController {
    fn default() -> Self {
        Self::new()
    }
}

impl SimController {
    /// 创建一个已上使能、位于非零初始位置的模拟臂
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                joints: [10.0, -20.0, 30.0, -40.0, 50.0, -60.0],
                pose: [300.0, 0.0, 400.0, 180.0, 0.0, 90.0],
                loads: [0.0; 6],
                force_torque: [0.0; 6],
                error: ErrorCodes::default(),
                enabled: true,
                servoing: false,
                drag_teach: false,
                jog: None,
                query_fault: None,
                calls: Vec::new(),
            }),
        }
    }

    pub fn set_joints(&self, joints: [f64; 6]) {
        self.state.lock().joints = joints;
    }

    pub fn set_force_torque(&self, force_torque: [f64; 6]) {
        self.state.lock().force_torque = force_torque;
    }

    pub fn set_pose(&self, pose: [f64; 6]) {
        self.state.lock().pose = pose;
    }

    /// 设置控制器故障码（`reset_errors` 清除）
    pub fn set_error(&self, error: ErrorCodes) {
        self.state.lock().error = error;
    }

    /// 让所有查询类调用失败（`None` 恢复）
    pub fn inject_fault(&self, fault: Option<ControllerError>) {
        self.state.lock().query_fault = fault;
    }

    /// 收到的调用记录
    pub fn calls(&self) -> Vec<SimCall> {
        self.state.lock().calls.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    pub fn is_servoing(&self) -> bool {
        self.state.lock().servoing
    }

    pub fn is_drag_teach(&self) -> bool {
        self.state.lock().drag_teach
    }

    pub fn active_jog(&self) -> Option<JogRequest> {
        self.state.lock().jog
    }

    fn record(&self, call: SimCall) -> parking_lot::MutexGuard<'_, SimState> {
        let mut state = self.state.lock();
        state.calls.push(call);
        state
    }

    fn query<T>(&self, read: impl FnOnce(&mut SimState) -> T) -> ControllerResult<T> {
        let mut state = self.state.lock();
        if let Some(fault) = &state.query_fault {
            return Err(fault.clone());
        }
        Ok(read(&mut state))
    }
}

fn require_enabled(state: &SimState) -> ControllerResult<()> {
    if state.enabled {
        Ok(())
    } else {
        Err(ControllerError::Fault {
            code: SIM_CODE_DISABLED,
        })
    }
}

impl RobotController for SimController {
    fn move_joint(&self, cmd: &JointMove) -> ControllerResult<()> {
        let mut state = self.record(SimCall::MoveJoint(*cmd));
        require_enabled(&state)?;
        state.joints = cmd.joints;
        Ok(())
    }

    fn move_linear(&self, cmd: &LinearMove) -> ControllerResult<()> {
        let mut state = self.record(SimCall::MoveLinear(*cmd));
        require_enabled(&state)?;
        state.pose = cmd.pose;
        Ok(())
    }

    fn servo_start(&self) -> ControllerResult<()> {
        let mut state = self.record(SimCall::ServoStart);
        require_enabled(&state)?;
        state.servoing = true;
        Ok(())
    }

    fn servo_joint(&self, target: &ServoTarget) -> ControllerResult<()> {
        let mut state = self.record(SimCall::ServoJoint(*target));
        if !state.servoing {
            return Err(ControllerError::Fault {
                code: SIM_CODE_NOT_SERVOING,
            });
        }
        state.joints = target.joints;
        Ok(())
    }

    fn servo_end(&self) -> ControllerResult<()> {
        let mut state = self.record(SimCall::ServoEnd);
        state.servoing = false;
        Ok(())
    }

    fn start_jog(&self, request: &JogRequest) -> ControllerResult<()> {
        let mut state = self.record(SimCall::StartJog(*request));
        require_enabled(&state)?;
        state.jog = Some(*request);
        Ok(())
    }

    fn stop_jog(&self, frame: JogFrame) -> ControllerResult<()> {
        let mut state = self.record(SimCall::StopJog(frame));
        state.jog = None;
        Ok(())
    }

    fn set_drag_teach(&self, enabled: bool) -> ControllerResult<()> {
        let mut state = self.record(SimCall::SetDragTeach(enabled));
        state.drag_teach = enabled;
        Ok(())
    }

    fn set_enabled(&self, enabled: bool) -> ControllerResult<()> {
        let mut state = self.record(SimCall::SetEnabled(enabled));
        state.enabled = enabled;
        if !enabled {
            state.servoing = false;
            state.jog = None;
        }
        Ok(())
    }

    fn reset_errors(&self) -> ControllerResult<()> {
        let mut state = self.record(SimCall::ResetErrors);
        state.error = ErrorCodes::default();
        Ok(())
    }

    fn joint_positions(&self) -> ControllerResult<[f64; 6]> {
        self.query(|state| {
            // 只模拟关节空间点动，笛卡尔点动不改变关节读数
            if let Some(jog) = state.jog.filter(|j| j.frame == JogFrame::Joint) {
                if (1..=6).contains(&jog.axis) {
                    let idx = usize::from(jog.axis - 1);
                    state.joints[idx] += jog.direction.sign() * jog.speed * JOG_STEP_PER_PERCENT;
                }
            }
            state.joints
        })
    }

    fn tool_pose(&self) -> ControllerResult<[f64; 6]> {
        self.query(|state| state.pose)
    }

    fn joint_loads(&self) -> ControllerResult<[f64; 6]> {
        self.query(|state| state.loads)
    }

    fn force_torque(&self) -> ControllerResult<[f64; 6]> {
        self.query(|state| state.force_torque)
    }

    fn error_code(&self) -> ControllerResult<ErrorCodes> {
        self.query(|state| state.error)
    }
}
