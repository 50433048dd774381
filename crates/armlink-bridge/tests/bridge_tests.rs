//! 桥接程序端到端测试（进程内总线 + 模拟控制器）

use armlink_bridge::{
    Bridge, BridgeConfig, BridgeHandle, BusArg, BusMessage, BusPeer, ChannelBus, ConfigError,
    TelemetryMode,
};
use armlink_driver::mock::SIM_CODE_DISABLED;
use armlink_driver::{ErrorCodes, SimCall, SimController};
use armlink_protocol::{Frame, TelemetryLayout, TelemetrySample};
use std::io::Write;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn poll_config(rate_hz: f64) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.telemetry.mode = TelemetryMode::Poll;
    config.telemetry.rate_hz = rate_hz;
    config.telemetry.publish_stats = false;
    config
}

/// 等待第一条满足条件的消息，其余消息丢弃
fn wait_for(
    peer: &BusPeer,
    timeout: Duration,
    pred: impl Fn(&BusMessage) -> bool,
) -> Option<BusMessage> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(msg) = peer.recv_timeout(Duration::from_millis(10))
            && pred(&msg)
        {
            return Some(msg);
        }
    }
    None
}

fn wait_for_rate(handle: &BridgeHandle, hz: f64) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if (handle.rate_control().hz() - hz).abs() < 1e-3 {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn joint(msg: &BusMessage, idx: usize) -> f64 {
    msg.args[idx].as_f64().unwrap()
}

#[test]
fn test_poll_mode_publishes_controller_state() {
    let sim = Arc::new(SimController::new());
    let (bus, peer) = ChannelBus::pair();
    let handle = Bridge::new(poll_config(50.0), sim.clone(), Arc::new(bus))
        .unwrap()
        .start()
        .unwrap();

    let joints = wait_for(&peer, Duration::from_secs(2), |m| m.address == "/joints").unwrap();
    assert_eq!(joints.args.len(), 6);
    assert_eq!(joint(&joints, 0), 10.0);

    let ext_force = wait_for(&peer, Duration::from_secs(1), |m| m.address == "/ext_force");
    assert!(ext_force.is_some());

    handle.shutdown();
    assert!(sim.calls().is_empty());
}

#[test]
fn test_commands_reach_controller_and_telemetry_follows() {
    let sim = Arc::new(SimController::new());
    let (bus, peer) = ChannelBus::pair();
    let handle = Bridge::new(poll_config(100.0), sim.clone(), Arc::new(bus))
        .unwrap()
        .start()
        .unwrap();

    let target = vec![
        BusArg::Float(1.0),
        BusArg::Float(2.0),
        BusArg::Float(3.0),
        BusArg::Float(4.0),
        BusArg::Float(5.0),
        BusArg::Float(6.0),
    ];
    peer.send(BusMessage::new("/movej", target)).unwrap();

    let moved = wait_for(&peer, Duration::from_secs(2), |m| {
        m.address == "/joints" && joint(m, 5) == 6.0
    });
    assert!(moved.is_some());

    // 轴 1 正向点动，遥测里的关节角持续增大
    peer.send(BusMessage::new(
        "/jog",
        vec![BusArg::Int(0), BusArg::Int(1), BusArg::Int(1), BusArg::Int(50)],
    ))
    .unwrap();
    let jogging = wait_for(&peer, Duration::from_secs(2), |m| {
        m.address == "/joints" && joint(m, 0) > 1.5
    });
    assert!(jogging.is_some());

    peer.send(BusMessage::new("/jog_stop", vec![])).unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    while sim.active_jog().is_some() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(sim.active_jog().is_none());

    handle.shutdown();
    assert!(matches!(sim.calls()[0], SimCall::MoveJoint(_)));
}

#[test]
fn test_rate_command_changes_running_pipeline() {
    let sim = Arc::new(SimController::new());
    let (bus, peer) = ChannelBus::pair();
    let handle = Bridge::new(poll_config(20.0), sim, Arc::new(bus))
        .unwrap()
        .start()
        .unwrap();

    peer.send(BusMessage::new("/telemetry/hz", vec![BusArg::Float(200.0)]))
        .unwrap();

    assert!(wait_for_rate(&handle, 200.0));

    // 超出上限的请求被钳制
    peer.send(BusMessage::new("/telemetry/hz", vec![BusArg::Int(5000)]))
        .unwrap();
    assert!(wait_for_rate(&handle, 1000.0));

    handle.shutdown();
}

#[test]
fn test_controller_fault_code_published_before_data() {
    let sim = Arc::new(SimController::new());
    sim.set_error(ErrorCodes { main: 3, sub: 1 });
    let (bus, peer) = ChannelBus::pair();
    let handle = Bridge::new(poll_config(50.0), sim.clone(), Arc::new(bus))
        .unwrap()
        .start()
        .unwrap();

    let first = wait_for(&peer, Duration::from_secs(2), |m| {
        m.address == "/error" || m.address == "/joints"
    })
    .unwrap();
    assert_eq!(first, BusMessage::text("/error", "ID: 3"));

    // 被拒绝的命令同样回报故障码
    sim.set_error(ErrorCodes::default());
    peer.send(BusMessage::new("/enable", vec![BusArg::Int(0)])).unwrap();
    peer.send(BusMessage::new("/servo_start", vec![])).unwrap();
    let expected = BusMessage::text("/error", format!("ID: {}", SIM_CODE_DISABLED));
    let rejected = wait_for(&peer, Duration::from_secs(2), |m| *m == expected);
    assert!(rejected.is_some());

    handle.shutdown();
}

fn serve_frames(listener: TcpListener, frames_per_session: usize) {
    let layout = TelemetryLayout::standard();
    let sample = TelemetrySample {
        joints: [11.0, 22.0, 33.0, 44.0, 55.0, 66.0],
        ..Default::default()
    };
    let frame = Frame::new(0, layout.encode(&sample)).to_bytes().unwrap();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            for _ in 0..frames_per_session {
                if stream.write_all(&frame).is_err() {
                    break;
                }
                thread::sleep(Duration::from_millis(5));
            }
            // 关闭连接，迫使桥接程序重连
        }
    });
}

#[test]
fn test_stream_mode_decodes_and_reconnects() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    serve_frames(listener, 20);

    let mut config = BridgeConfig::default();
    config.robot.host = "127.0.0.1".into();
    config.robot.state_port = port;
    config.robot.reconnect_interval_ms = 50;
    config.telemetry.rate_hz = 100.0;

    let (bus, peer) = ChannelBus::pair();
    let handle = Bridge::new(config, Arc::new(SimController::new()), Arc::new(bus))
        .unwrap()
        .start()
        .unwrap();

    let joints = wait_for(&peer, Duration::from_secs(2), |m| m.address == "/joints").unwrap();
    assert_eq!(joint(&joints, 2), 33.0);

    let deadline = Instant::now() + Duration::from_secs(3);
    while handle.metrics().sessions < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    let metrics = handle.metrics();
    assert!(metrics.sessions >= 2);
    assert!(metrics.frames_decoded >= 20);
    assert_eq!(metrics.protocol_faults, 0);

    handle.shutdown();
}

#[test]
fn test_unreachable_stream_shuts_down_promptly() {
    // 先绑定再释放，得到一个大概率无人监听的端口
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let mut config = BridgeConfig::default();
    config.robot.host = "127.0.0.1".into();
    config.robot.state_port = port;
    config.robot.connect_timeout_ms = 100;
    config.robot.reconnect_interval_ms = 5000;

    let (bus, peer) = ChannelBus::pair();
    let handle = Bridge::new(config, Arc::new(SimController::new()), Arc::new(bus))
        .unwrap()
        .start()
        .unwrap();

    thread::sleep(Duration::from_millis(200));
    assert_eq!(handle.metrics().sessions, 0);

    let started = Instant::now();
    handle.shutdown();
    assert!(started.elapsed() < Duration::from_secs(2));

    let published = peer.drain();
    assert!(published.iter().all(|m| m.address != "/joints"));
    assert!(published.iter().any(|m| {
        m.address == "/telemetry/fault"
            && m.args.first().and_then(BusArg::as_str) == Some("transport")
    }));
}

#[test]
fn test_config_file_loading() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.toml");
    std::fs::write(
        &path,
        r#"
        [bus]
        listen = "127.0.0.1:9100"

        [telemetry]
        mode = "poll"
        rate_hz = 30.0
        wrench_in_base = true
        "#,
    )
    .unwrap();

    let config = BridgeConfig::load(&path).unwrap();
    assert_eq!(config.bus.listen.port(), 9100);
    assert_eq!(config.telemetry.mode, TelemetryMode::Poll);
    assert!(config.publish_options().wrench_in_base);

    assert!(matches!(
        BridgeConfig::load(dir.path().join("missing.toml")),
        Err(ConfigError::Io(_))
    ));
}

#[test]
fn test_invalid_config_rejected_by_bridge() {
    let mut config = BridgeConfig::default();
    config.telemetry.min_rate_hz = 50.0;
    config.telemetry.max_rate_hz = 10.0;
    let (bus, _peer) = ChannelBus::pair();
    assert!(Bridge::new(config, Arc::new(SimController::new()), Arc::new(bus)).is_err());
}
