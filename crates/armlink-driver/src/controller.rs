//! 机械臂控制器接口
//!
//! 控制器是外部协作方（厂商 RPC），这里只定义调用契约：
//! 每个操作都是一次阻塞调用，结果为 `ControllerResult<T>`。
//!
//! **并发约定**：控制器自行串行化请求，实现必须是 `Send + Sync`；
//! 调用方保证每条路径（命令/遥测）同一时刻最多一个在途调用。

use crate::error::ControllerResult;

/// 默认运动速度（%）
pub const DEFAULT_VELOCITY: f64 = 20.0;
/// 默认运动加速度（%）
pub const DEFAULT_ACCELERATION: f64 = 50.0;

/// 关节空间点到点运动
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointMove {
    /// 目标关节角（度）
    pub joints: [f64; 6],
    pub velocity: f64,
    pub acceleration: f64,
    /// 平滑过渡系数
    pub overlap: f64,
}

impl JointMove {
    pub fn new(joints: [f64; 6]) -> Self {
        Self {
            joints,
            velocity: DEFAULT_VELOCITY,
            acceleration: DEFAULT_ACCELERATION,
            overlap: 0.0,
        }
    }
}

/// 笛卡尔空间直线运动
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearMove {
    /// 目标位姿 `[x, y, z, rx, ry, rz]`
    pub pose: [f64; 6],
    pub velocity: f64,
    pub acceleration: f64,
    pub overlap: f64,
}

impl LinearMove {
    pub fn new(pose: [f64; 6]) -> Self {
        Self {
            pose,
            velocity: DEFAULT_VELOCITY,
            acceleration: DEFAULT_ACCELERATION,
            overlap: 0.0,
        }
    }
}

/// 伺服（流式）关节目标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoTarget {
    pub joints: [f64; 6],
    /// 指令周期（秒）
    pub cmd_period: f64,
    /// 滤波时间（秒）
    pub filter_time: f64,
    /// 比例增益
    pub gain: f64,
}

impl ServoTarget {
    pub fn new(joints: [f64; 6]) -> Self {
        Self {
            joints,
            cmd_period: 0.008,
            filter_time: 0.1,
            gain: 400.0,
        }
    }
}

/// 点动参考坐标系（控制器编码）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JogFrame {
    Joint = 0,
    Base = 2,
    Tool = 4,
    Workpiece = 8,
}

impl JogFrame {
    /// 从控制器编码创建
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(JogFrame::Joint),
            2 => Some(JogFrame::Base),
            4 => Some(JogFrame::Tool),
            8 => Some(JogFrame::Workpiece),
            _ => None,
        }
    }

    /// 停止点动时使用的编码（参考系编码 + 1）
    pub fn stop_code(self) -> u8 {
        self as u8 + 1
    }
}

/// 点动方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogDirection {
    Negative,
    Positive,
}

impl JogDirection {
    /// 正数为正向，0 或负数为反向
    pub fn from_value(value: f64) -> Self {
        if value > 0.0 {
            JogDirection::Positive
        } else {
            JogDirection::Negative
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            JogDirection::Negative => -1.0,
            JogDirection::Positive => 1.0,
        }
    }
}

/// 点动请求
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JogRequest {
    pub frame: JogFrame,
    /// 轴号（1-6）
    pub axis: u8,
    pub direction: JogDirection,
    /// 速度（%）
    pub speed: f64,
}

/// 控制器故障码
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorCodes {
    pub main: i32,
    pub sub: i32,
}

impl ErrorCodes {
    pub fn is_ok(&self) -> bool {
        self.main == 0 && self.sub == 0
    }
}

/// 机械臂控制器
///
/// 所有方法都是一次性的阻塞远程调用，没有内部状态机。
/// 非零状态码以 [`ControllerError::Fault`](crate::ControllerError::Fault) 返回。
pub trait RobotController: Send + Sync {
    /// 关节空间点到点运动
    fn move_joint(&self, cmd: &JointMove) -> ControllerResult<()>;

    /// 笛卡尔直线运动
    fn move_linear(&self, cmd: &LinearMove) -> ControllerResult<()>;

    /// 进入伺服模式
    fn servo_start(&self) -> ControllerResult<()>;

    /// 伺服单步
    fn servo_joint(&self, target: &ServoTarget) -> ControllerResult<()>;

    /// 退出伺服模式
    fn servo_end(&self) -> ControllerResult<()>;

    fn start_jog(&self, request: &JogRequest) -> ControllerResult<()>;

    fn stop_jog(&self, frame: JogFrame) -> ControllerResult<()>;

    /// 拖动示教开关
    fn set_drag_teach(&self, enabled: bool) -> ControllerResult<()>;

    /// 上使能/下使能
    fn set_enabled(&self, enabled: bool) -> ControllerResult<()>;

    /// 清除控制器错误
    fn reset_errors(&self) -> ControllerResult<()>;

    /// 实际关节位置（度）
    fn joint_positions(&self) -> ControllerResult<[f64; 6]>;

    /// 实际工具位姿
    fn tool_pose(&self) -> ControllerResult<[f64; 6]>;

    /// 实际关节负载
    fn joint_loads(&self) -> ControllerResult<[f64; 6]>;

    /// 力/力矩传感器原始值
    fn force_torque(&self) -> ControllerResult<[f64; 6]>;

    /// 当前故障码
    fn error_code(&self) -> ControllerResult<ErrorCodes>;
}
