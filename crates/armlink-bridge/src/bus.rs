//! 消息总线抽象
//!
//! 控制面（如灯光/媒体控制软件）与桥接程序之间交换"地址 + 参数列表"形式的消息。
//! 线上实现是 OSC over UDP（[`UdpBus`](crate::udp::UdpBus)），
//! 测试与嵌入场景使用进程内的 [`ChannelBus`]。

use crate::error::BusError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, unbounded};
use std::fmt;
use std::time::Duration;

/// 消息参数
#[derive(Debug, Clone, PartialEq)]
pub enum BusArg {
    Int(i64),
    Float(f64),
    Str(String),
}

impl BusArg {
    /// 数值参数转为 `f64`（字符串返回 `None`）
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            BusArg::Int(v) => Some(*v as f64),
            BusArg::Float(v) => Some(*v),
            BusArg::Str(_) => None,
        }
    }

    /// 数值参数转为整数，浮点向零截断
    ///
    /// 控制面常把开关量当作浮点发送（`1.0`），这里一并接受。
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            BusArg::Int(v) => Some(*v),
            BusArg::Float(v) if v.is_finite() => Some(v.trunc() as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            BusArg::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for BusArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusArg::Int(v) => write!(f, "{}", v),
            BusArg::Float(v) => write!(f, "{}", v),
            BusArg::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// 一条总线消息
#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    /// 地址，如 `/joints`
    pub address: String,
    pub args: Vec<BusArg>,
}

impl BusMessage {
    pub fn new(address: impl Into<String>, args: Vec<BusArg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }

    /// 由一组浮点数构造消息（遥测向量）
    pub fn floats(address: impl Into<String>, values: &[f64]) -> Self {
        Self::new(address, values.iter().copied().map(BusArg::Float).collect())
    }

    /// 单个字符串参数
    pub fn text(address: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(address, vec![BusArg::Str(text.into())])
    }
}

impl fmt::Display for BusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// 消息总线
///
/// `publish` 和 `receive` 都只需要 `&self`：命令线程接收、遥测线程发布，
/// 两者共享同一个 `Arc<dyn MessageBus>`。
pub trait MessageBus: Send + Sync {
    /// 发送一条消息（尽力而为，不等待确认）
    fn publish(&self, message: &BusMessage) -> Result<(), BusError>;

    /// 等待下一条入站消息，超时返回 `Ok(None)`
    fn receive(&self, timeout: Duration) -> Result<Option<BusMessage>, BusError>;
}

/// 进程内总线（桥接程序一侧）
///
/// 由 [`ChannelBus::pair`] 创建，另一侧是 [`BusPeer`]（扮演控制面）。
#[derive(Debug, Clone)]
pub struct ChannelBus {
    inbound: Receiver<BusMessage>,
    outbound: Sender<BusMessage>,
}

/// 进程内总线的控制面一侧
#[derive(Debug, Clone)]
pub struct BusPeer {
    inbound: Sender<BusMessage>,
    outbound: Receiver<BusMessage>,
}

impl ChannelBus {
    /// 创建一对相连的端点
    pub fn pair() -> (ChannelBus, BusPeer) {
        let (in_tx, in_rx) = unbounded();
        let (out_tx, out_rx) = unbounded();
        (
            ChannelBus {
                inbound: in_rx,
                outbound: out_tx,
            },
            BusPeer {
                inbound: in_tx,
                outbound: out_rx,
            },
        )
    }
}

impl MessageBus for ChannelBus {
    fn publish(&self, message: &BusMessage) -> Result<(), BusError> {
        match self.outbound.try_send(message.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Disconnected(_)) => Err(BusError::Disconnected),
            // unbounded 通道不会满
            Err(TrySendError::Full(_)) => Ok(()),
        }
    }

    fn receive(&self, timeout: Duration) -> Result<Option<BusMessage>, BusError> {
        match self.inbound.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(BusError::Disconnected),
        }
    }
}

impl BusPeer {
    /// 向桥接程序发送一条命令
    pub fn send(&self, message: BusMessage) -> Result<(), BusError> {
        self.inbound
            .send(message)
            .map_err(|_| BusError::Disconnected)
    }

    /// 等待桥接程序发布的下一条消息
    pub fn recv_timeout(&self, timeout: Duration) -> Option<BusMessage> {
        self.outbound.recv_timeout(timeout).ok()
    }

    /// 取出当前已发布的全部消息
    pub fn drain(&self) -> Vec<BusMessage> {
        self.outbound.try_iter().collect()
    }
}
