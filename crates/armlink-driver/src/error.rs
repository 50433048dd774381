//! 驱动层错误类型定义

use armlink_protocol::ProtocolError;
use thiserror::Error;

/// 控制器调用错误
///
/// 控制器每个调用返回 `(status, value)`，status 为 0 表示成功，
/// 其余值是控制器自定义的故障码，这里原样透传，不做解释。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// 控制器返回非零状态码
    #[error("Controller fault code {code}")]
    Fault { code: i32 },

    /// RPC 传输层失败（连接断开、超时等）
    #[error("Controller transport error: {0}")]
    Transport(String),
}

pub type ControllerResult<T> = Result<T, ControllerError>;

/// 把控制器的 `(status, value)` 对转换为 `Result`
///
/// # Example
///
/// ```
/// use armlink_driver::{ControllerError, from_status};
///
/// assert_eq!(from_status(0, 1.5), Ok(1.5));
/// assert_eq!(from_status(-3, 1.5), Err(ControllerError::Fault { code: -3 }));
/// ```
pub fn from_status<T>(status: i32, value: T) -> ControllerResult<T> {
    if status == 0 {
        Ok(value)
    } else {
        Err(ControllerError::Fault { code: status })
    }
}

/// 遥测路径的故障分类
///
/// 所有故障都在所属组件内部处理，通过 `TelemetrySink::report_fault` 对外报告，
/// 不会跨越命令路径/遥测路径的边界传播。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryFault {
    /// socket 关闭/不可达（推送模式）或 RPC 传输失败（轮询模式）
    #[error("Transport fault: {0}")]
    Transport(String),

    /// 失步：同步标记丢失或长度字段不可信，缓冲数据已丢弃
    #[error("Protocol fault: stream desynchronized, {discarded} bytes discarded")]
    Protocol { discarded: u64 },

    /// 载荷无法按固定偏移解码，整帧丢弃
    #[error("Decode fault: {0}")]
    Decode(#[from] ProtocolError),

    /// 控制器返回非零状态码
    #[error("Controller fault code {code}")]
    Controller { code: i32 },
}

impl From<ControllerError> for TelemetryFault {
    fn from(err: ControllerError) -> Self {
        match err {
            ControllerError::Fault { code } => TelemetryFault::Controller { code },
            ControllerError::Transport(msg) => TelemetryFault::Transport(msg),
        }
    }
}

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 推送流 IO 错误
    #[error("Stream IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 对端关闭了推送流
    #[error("Stream closed by peer")]
    StreamClosed,

    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 控制器错误
    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    /// 非法的遥测频率
    #[error("Invalid telemetry rate: {0}")]
    InvalidRate(String),

    /// 配置错误
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}
