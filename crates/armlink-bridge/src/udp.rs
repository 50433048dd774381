//! OSC over UDP 总线
//!
//! 一个 socket 同时用于接收控制面命令（绑定 `listen`）和发送遥测（发往 `send_to`）。
//! 一个数据报可能是 bundle，多出来的消息排队，在后续 `receive` 中依次返回。

use crate::bus::{BusMessage, MessageBus};
use crate::error::BusError;
use crate::osc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;
use tracing::{debug, trace};

/// 最大数据报长度
const MAX_DATAGRAM: usize = 65_507;

/// 接收超时的下限（`set_read_timeout(Some(0))` 是非法参数）
const MIN_RECV_TIMEOUT: Duration = Duration::from_millis(1);

/// OSC/UDP 消息总线
#[derive(Debug)]
pub struct UdpBus {
    socket: UdpSocket,
    send_to: SocketAddr,
    /// 接收缓冲区与 bundle 中尚未交付的消息（只有命令线程接收）
    rx: Mutex<RxState>,
}

#[derive(Debug)]
struct RxState {
    buf: Vec<u8>,
    queued: VecDeque<BusMessage>,
}

impl UdpBus {
    /// 绑定监听地址，遥测发往 `send_to`
    pub fn bind(listen: SocketAddr, send_to: SocketAddr) -> Result<Self, BusError> {
        let socket = UdpSocket::bind(listen)?;
        debug!(
            "OSC bus listening on {}, sending to {}",
            socket.local_addr()?,
            send_to
        );
        Ok(Self {
            socket,
            send_to,
            rx: Mutex::new(RxState {
                buf: vec![0u8; MAX_DATAGRAM],
                queued: VecDeque::new(),
            }),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, BusError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn send_to(&self) -> SocketAddr {
        self.send_to
    }
}

impl MessageBus for UdpBus {
    fn publish(&self, message: &BusMessage) -> Result<(), BusError> {
        let packet = osc::encode_message(message)?;
        self.socket.send_to(&packet, self.send_to)?;
        trace!("OSC -> {}", message);
        Ok(())
    }

    fn receive(&self, timeout: Duration) -> Result<Option<BusMessage>, BusError> {
        let mut rx = self.rx.lock();
        if let Some(message) = rx.queued.pop_front() {
            return Ok(Some(message));
        }

        self.socket
            .set_read_timeout(Some(timeout.max(MIN_RECV_TIMEOUT)))?;

        let RxState { buf, queued } = &mut *rx;
        let (len, from) = match self.socket.recv_from(buf) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Ok(None);
            },
            // Windows 上对端端口不可达会以 ConnectionReset 形式出现在接收侧
            Err(e) if e.kind() == ErrorKind::ConnectionReset => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut messages = osc::decode_packet(&buf[..len])?.into_iter();
        let first = messages.next();
        queued.extend(messages);
        if let Some(message) = &first {
            trace!("OSC <- {} from {}", message, from);
        }
        Ok(first)
    }
}
