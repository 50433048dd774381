//! 本地模拟状态流
//!
//! 没有真实控制器时，用模拟控制器的状态按固定周期编码成推送流帧，
//! 在本地 TCP 端口上提供给桥接程序的推送模式。

use armlink_driver::{RobotController, SimController};
use armlink_protocol::{Frame, TelemetryLayout, TelemetrySample};
use std::io::{self, ErrorKind, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 控制器推送周期
pub const SIM_STREAM_PERIOD: Duration = Duration::from_millis(8);

const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// 启动模拟状态流服务，返回实际监听地址
pub fn spawn_state_server(
    sim: Arc<SimController>,
    listen: SocketAddr,
    is_running: Arc<AtomicBool>,
) -> io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(listen)?;
    listener.set_nonblocking(true)?;
    let addr = listener.local_addr()?;
    info!("Simulated state stream on {}", addr);

    let handle = thread::Builder::new()
        .name("sim-stream".into())
        .spawn(move || {
            while is_running.load(Ordering::Acquire) {
                match listener.accept() {
                    Ok((stream, peer)) => {
                        debug!("Sim stream client {} connected", peer);
                        if let Err(e) = serve(stream, &sim, &is_running) {
                            debug!("Sim stream client {} gone: {}", peer, e);
                        }
                    },
                    Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                    Err(e) => {
                        warn!("Sim stream accept failed: {}", e);
                        thread::sleep(ACCEPT_POLL);
                    },
                }
            }
        })?;

    Ok((addr, handle))
}

fn serve(mut stream: TcpStream, sim: &SimController, is_running: &AtomicBool) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;

    let layout = TelemetryLayout::standard();
    let mut counter = 0u8;
    while is_running.load(Ordering::Acquire) {
        let sample = snapshot(sim).map_err(|e| io::Error::other(e.to_string()))?;
        let frame = Frame::new(counter, layout.encode(&sample))
            .to_bytes()
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
        stream.write_all(&frame)?;
        counter = counter.wrapping_add(1);
        thread::sleep(SIM_STREAM_PERIOD);
    }
    Ok(())
}

fn snapshot(sim: &SimController) -> armlink_driver::ControllerResult<TelemetrySample> {
    let codes = sim.error_code()?;
    Ok(TelemetrySample {
        joints: sim.joint_positions()?,
        tool_pose: sim.tool_pose()?,
        joint_loads: sim.joint_loads()?,
        force_torque: sim.force_torque()?,
        error_byte: u8::from(!codes.is_ok()),
        main_code: codes.main,
        sub_code: codes.sub,
    })
}
