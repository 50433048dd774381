//! 遥测驱动层
//!
//! 本 crate 负责机械臂遥测路径，包括：
//! - 推送模式：实时状态 TCP 流的解帧、解码与限速发布
//! - 轮询模式：按固定节拍查询控制器（控制器调用慢且阻塞）
//! - 零值抑制（last-known-good 回退）
//! - 活性统计（唯一更新率、有效读取数）
//! - 控制器调用契约 [`RobotController`]
//!
//! 协议细节见 [`armlink_protocol`]；命令路径与消息总线见 `armlink-bridge`。

pub mod controller;
mod error;
pub mod liveness;
pub mod metrics;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod pipeline;
pub mod sampler;
pub mod scheduler;
pub mod sink;

pub use controller::{
    DEFAULT_ACCELERATION, DEFAULT_VELOCITY, ErrorCodes, JogDirection, JogFrame, JogRequest,
    JointMove, LinearMove, RobotController, ServoTarget,
};
pub use error::{ControllerError, ControllerResult, DriverError, TelemetryFault, from_status};
pub use liveness::{DEFAULT_LIVENESS_INTERVAL, LivenessReport, LivenessTracker};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
#[cfg(any(test, feature = "mock"))]
pub use mock::{SimCall, SimController};
pub use pipeline::{PipelineConfig, PollPipeline, StreamPipeline, poll_loop, stream_loop};
pub use sampler::{ALL_JOINTS_MASK, FilteredJoints, TelemetrySampler};
pub use scheduler::{RateControl, RateLimits, RateScheduler};
pub use sink::{TelemetrySink, TelemetryUpdate};
