//! 桥接层错误类型定义

use armlink_driver::{ControllerError, DriverError};
use thiserror::Error;

/// 消息总线错误
#[derive(Error, Debug)]
pub enum BusError {
    #[error("Bus IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 数据报不是合法的 OSC 包
    #[error("Malformed packet: {0}")]
    Malformed(String),

    /// 消息无法编码（地址或参数不合法）
    #[error("Cannot encode message: {0}")]
    Encode(String),

    /// 对端（通道另一侧）已断开
    #[error("Bus disconnected")]
    Disconnected,
}

/// 入站命令解析错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Unknown address: {0}")]
    UnknownAddress(String),

    #[error("{address}: expected at least {expected} arguments, got {actual}")]
    MissingArguments {
        address: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{address}: argument {index} is not a valid {expected}")]
    InvalidArgument {
        address: &'static str,
        index: usize,
        expected: &'static str,
    },
}

/// 单条命令的处理结果（发即忘，只用于日志和诊断）
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Controller rejected command: {0}")]
    Controller(#[from] ControllerError),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 桥接运行时错误
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Failed to spawn thread: {0}")]
    Spawn(std::io::Error),
}
