//! 入站命令词汇表
//!
//! 每个地址对应一个 [`BridgeCommand`]，参数按位置解析，数值参数接受 int 或 float。
//!
//! | 地址 | 参数 | 控制器调用 |
//! |------|------|-----------|
//! | `/movej` | `j1..j6 [vel=20] [acc=50] [ovl=0]` | `move_joint` |
//! | `/movel` | `x y z rx ry rz [vel=20] [acc=50] [ovl=0]` | `move_linear` |
//! | `/servo_start` | - | `servo_start` |
//! | `/servo` | `j1..j6` | `servo_joint`（8ms 周期、0.1 滤波、增益 400） |
//! | `/servo_end` | - | `servo_end` |
//! | `/drag` | `0\|1` | `set_drag_teach` |
//! | `/jog` | `ref axis dir [speed=20]` | `start_jog` |
//! | `/jog_stop` | `[ref=0]` | `stop_jog` |
//! | `/enable` | `0\|1` | `set_enabled` |
//! | `/reset_errors` | - | `reset_errors` |
//! | `/telemetry/hz` | `hz` | 修改遥测频率（不调用控制器） |

use crate::bus::{BusArg, BusMessage};
use crate::error::CommandError;
use armlink_driver::{
    JogDirection, JogFrame, JogRequest, JointMove, LinearMove, ServoTarget,
};

/// 入站地址
pub mod addr {
    pub const MOVE_JOINT: &str = "/movej";
    pub const MOVE_LINEAR: &str = "/movel";
    pub const SERVO_START: &str = "/servo_start";
    pub const SERVO: &str = "/servo";
    pub const SERVO_END: &str = "/servo_end";
    pub const DRAG: &str = "/drag";
    pub const JOG: &str = "/jog";
    pub const JOG_STOP: &str = "/jog_stop";
    pub const ENABLE: &str = "/enable";
    pub const RESET_ERRORS: &str = "/reset_errors";
    pub const TELEMETRY_HZ: &str = "/telemetry/hz";
}

/// 点动默认速度（%）
pub const DEFAULT_JOG_SPEED: f64 = 20.0;

/// 一条已解析的控制命令
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCommand {
    MoveJoint(JointMove),
    MoveLinear(LinearMove),
    ServoStart,
    Servo(ServoTarget),
    ServoEnd,
    DragTeach(bool),
    Jog(JogRequest),
    JogStop(JogFrame),
    Enable(bool),
    ResetErrors,
    SetTelemetryRate(f64),
}

impl BridgeCommand {
    /// 解析一条总线消息
    ///
    /// # Example
    ///
    /// ```
    /// use armlink_bridge::{BridgeCommand, BusArg, BusMessage};
    ///
    /// let msg = BusMessage::new("/drag", vec![BusArg::Int(1)]);
    /// assert_eq!(BridgeCommand::parse(&msg), Ok(BridgeCommand::DragTeach(true)));
    /// ```
    pub fn parse(message: &BusMessage) -> Result<Self, CommandError> {
        let args = Args {
            address: "",
            values: &message.args,
        };

        match message.address.as_str() {
            addr::MOVE_JOINT => {
                let args = args.at(addr::MOVE_JOINT);
                let mut cmd = JointMove::new(args.vec6()?);
                cmd.velocity = args.number_or(6, cmd.velocity)?;
                cmd.acceleration = args.number_or(7, cmd.acceleration)?;
                cmd.overlap = args.number_or(8, cmd.overlap)?;
                Ok(BridgeCommand::MoveJoint(cmd))
            },
            addr::MOVE_LINEAR => {
                let args = args.at(addr::MOVE_LINEAR);
                let mut cmd = LinearMove::new(args.vec6()?);
                cmd.velocity = args.number_or(6, cmd.velocity)?;
                cmd.acceleration = args.number_or(7, cmd.acceleration)?;
                cmd.overlap = args.number_or(8, cmd.overlap)?;
                Ok(BridgeCommand::MoveLinear(cmd))
            },
            addr::SERVO_START => Ok(BridgeCommand::ServoStart),
            addr::SERVO => {
                let args = args.at(addr::SERVO);
                Ok(BridgeCommand::Servo(ServoTarget::new(args.vec6()?)))
            },
            addr::SERVO_END => Ok(BridgeCommand::ServoEnd),
            addr::DRAG => Ok(BridgeCommand::DragTeach(args.at(addr::DRAG).flag(0)?)),
            addr::JOG => {
                let args = args.at(addr::JOG);
                args.require(3)?;
                let frame = JogFrame::from_code(args.integer(0)?).ok_or(
                    CommandError::InvalidArgument {
                        address: addr::JOG,
                        index: 0,
                        expected: "reference frame (0, 2, 4, 8)",
                    },
                )?;
                let axis = match args.integer(1)? {
                    a @ 1..=6 => a as u8,
                    _ => {
                        return Err(CommandError::InvalidArgument {
                            address: addr::JOG,
                            index: 1,
                            expected: "axis (1-6)",
                        });
                    },
                };
                let direction = JogDirection::from_value(args.number(2)?);
                let speed = args.number_or(3, DEFAULT_JOG_SPEED)?;
                Ok(BridgeCommand::Jog(JogRequest {
                    frame,
                    axis,
                    direction,
                    speed,
                }))
            },
            addr::JOG_STOP => {
                let args = args.at(addr::JOG_STOP);
                let frame = if args.values.is_empty() {
                    JogFrame::Joint
                } else {
                    JogFrame::from_code(args.integer(0)?).ok_or(
                        CommandError::InvalidArgument {
                            address: addr::JOG_STOP,
                            index: 0,
                            expected: "reference frame (0, 2, 4, 8)",
                        },
                    )?
                };
                Ok(BridgeCommand::JogStop(frame))
            },
            addr::ENABLE => Ok(BridgeCommand::Enable(args.at(addr::ENABLE).flag(0)?)),
            addr::RESET_ERRORS => Ok(BridgeCommand::ResetErrors),
            addr::TELEMETRY_HZ => {
                let args = args.at(addr::TELEMETRY_HZ);
                args.require(1)?;
                Ok(BridgeCommand::SetTelemetryRate(args.number(0)?))
            },
            other => Err(CommandError::UnknownAddress(other.to_owned())),
        }
    }

    /// 命令对应的入站地址
    pub fn address(&self) -> &'static str {
        match self {
            BridgeCommand::MoveJoint(_) => addr::MOVE_JOINT,
            BridgeCommand::MoveLinear(_) => addr::MOVE_LINEAR,
            BridgeCommand::ServoStart => addr::SERVO_START,
            BridgeCommand::Servo(_) => addr::SERVO,
            BridgeCommand::ServoEnd => addr::SERVO_END,
            BridgeCommand::DragTeach(_) => addr::DRAG,
            BridgeCommand::Jog(_) => addr::JOG,
            BridgeCommand::JogStop(_) => addr::JOG_STOP,
            BridgeCommand::Enable(_) => addr::ENABLE,
            BridgeCommand::ResetErrors => addr::RESET_ERRORS,
            BridgeCommand::SetTelemetryRate(_) => addr::TELEMETRY_HZ,
        }
    }
}

/// 按位置读取参数的辅助结构
#[derive(Clone, Copy)]
struct Args<'a> {
    address: &'static str,
    values: &'a [BusArg],
}

impl<'a> Args<'a> {
    fn at(self, address: &'static str) -> Self {
        Self { address, ..self }
    }

    fn require(&self, expected: usize) -> Result<(), CommandError> {
        if self.values.len() < expected {
            return Err(CommandError::MissingArguments {
                address: self.address,
                expected,
                actual: self.values.len(),
            });
        }
        Ok(())
    }

    fn invalid(&self, index: usize, expected: &'static str) -> CommandError {
        CommandError::InvalidArgument {
            address: self.address,
            index,
            expected,
        }
    }

    /// 有限数值（NaN/inf 拒绝）
    fn number(&self, index: usize) -> Result<f64, CommandError> {
        self.values
            .get(index)
            .and_then(BusArg::as_f64)
            .filter(|v| v.is_finite())
            .ok_or_else(|| self.invalid(index, "number"))
    }

    fn number_or(&self, index: usize, default: f64) -> Result<f64, CommandError> {
        if index < self.values.len() {
            self.number(index)
        } else {
            Ok(default)
        }
    }

    fn integer(&self, index: usize) -> Result<i64, CommandError> {
        self.values
            .get(index)
            .and_then(BusArg::as_i64)
            .ok_or_else(|| self.invalid(index, "integer"))
    }

    /// 开关量：非零为 true
    fn flag(&self, index: usize) -> Result<bool, CommandError> {
        self.require(index + 1)?;
        Ok(self.integer(index)? != 0)
    }

    fn vec6(&self) -> Result<[f64; 6], CommandError> {
        self.require(6)?;
        let mut out = [0.0; 6];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.number(i)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(address: &str, args: Vec<BusArg>) -> BusMessage {
        BusMessage::new(address, args)
    }

    fn floats(values: &[f64]) -> Vec<BusArg> {
        values.iter().copied().map(BusArg::Float).collect()
    }

    #[test]
    fn test_movej_defaults_and_overrides() {
        let cmd = BridgeCommand::parse(&msg("/movej", floats(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])))
            .unwrap();
        assert_eq!(
            cmd,
            BridgeCommand::MoveJoint(JointMove::new([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))
        );

        let mut args = floats(&[0.0; 6]);
        args.push(BusArg::Int(80));
        args.push(BusArg::Float(30.0));
        let BridgeCommand::MoveJoint(cmd) = BridgeCommand::parse(&msg("/movej", args)).unwrap()
        else {
            panic!("expected MoveJoint");
        };
        assert_eq!(cmd.velocity, 80.0);
        assert_eq!(cmd.acceleration, 30.0);
        assert_eq!(cmd.overlap, 0.0);
    }

    #[test]
    fn test_movej_too_few_args() {
        let err = BridgeCommand::parse(&msg("/movej", floats(&[1.0, 2.0]))).unwrap_err();
        assert_eq!(
            err,
            CommandError::MissingArguments {
                address: "/movej",
                expected: 6,
                actual: 2
            }
        );
    }

    #[test]
    fn test_movel() {
        let cmd = BridgeCommand::parse(&msg("/movel", floats(&[100.0, 0.0, 300.0, 180.0, 0.0, 0.0])))
            .unwrap();
        assert!(matches!(cmd, BridgeCommand::MoveLinear(m) if m.pose[0] == 100.0));
    }

    #[test]
    fn test_servo_uses_streaming_parameters() {
        let cmd = BridgeCommand::parse(&msg("/servo", floats(&[1.0; 6]))).unwrap();
        let BridgeCommand::Servo(target) = cmd else {
            panic!("expected Servo");
        };
        assert_eq!(target.cmd_period, 0.008);
        assert_eq!(target.filter_time, 0.1);
        assert_eq!(target.gain, 400.0);
    }

    #[test]
    fn test_flags_accept_int_or_float() {
        assert_eq!(
            BridgeCommand::parse(&msg("/drag", vec![BusArg::Float(1.0)])),
            Ok(BridgeCommand::DragTeach(true))
        );
        assert_eq!(
            BridgeCommand::parse(&msg("/enable", vec![BusArg::Int(0)])),
            Ok(BridgeCommand::Enable(false))
        );
        assert!(BridgeCommand::parse(&msg("/drag", vec![])).is_err());
        assert!(BridgeCommand::parse(&msg("/drag", vec![BusArg::Str("on".into())])).is_err());
    }

    #[test]
    fn test_jog() {
        let cmd = BridgeCommand::parse(&msg(
            "/jog",
            vec![BusArg::Int(0), BusArg::Int(3), BusArg::Int(-1)],
        ))
        .unwrap();
        assert_eq!(
            cmd,
            BridgeCommand::Jog(JogRequest {
                frame: JogFrame::Joint,
                axis: 3,
                direction: JogDirection::Negative,
                speed: DEFAULT_JOG_SPEED,
            })
        );

        // 非法参考系/轴号
        assert!(BridgeCommand::parse(&msg(
            "/jog",
            vec![BusArg::Int(1), BusArg::Int(3), BusArg::Int(1)]
        ))
        .is_err());
        assert!(BridgeCommand::parse(&msg(
            "/jog",
            vec![BusArg::Int(2), BusArg::Int(7), BusArg::Int(1)]
        ))
        .is_err());
    }

    #[test]
    fn test_jog_stop_default_frame() {
        assert_eq!(
            BridgeCommand::parse(&msg("/jog_stop", vec![])),
            Ok(BridgeCommand::JogStop(JogFrame::Joint))
        );
        assert_eq!(
            BridgeCommand::parse(&msg("/jog_stop", vec![BusArg::Int(4)])),
            Ok(BridgeCommand::JogStop(JogFrame::Tool))
        );
    }

    #[test]
    fn test_telemetry_rate_rejects_nan() {
        assert_eq!(
            BridgeCommand::parse(&msg("/telemetry/hz", vec![BusArg::Int(50)])),
            Ok(BridgeCommand::SetTelemetryRate(50.0))
        );
        assert!(BridgeCommand::parse(&msg("/telemetry/hz", vec![BusArg::Float(f64::NAN)])).is_err());
    }

    #[test]
    fn test_unknown_address() {
        assert_eq!(
            BridgeCommand::parse(&msg("/fly", vec![])),
            Err(CommandError::UnknownAddress("/fly".into()))
        );
    }

    #[test]
    fn test_address_round_trip() {
        for (address, args) in [
            ("/servo_start", vec![]),
            ("/servo_end", vec![]),
            ("/reset_errors", vec![]),
            ("/jog_stop", vec![]),
            ("/telemetry/hz", vec![BusArg::Int(10)]),
        ] {
            let cmd = BridgeCommand::parse(&msg(address, args)).unwrap();
            assert_eq!(cmd.address(), address);
        }
    }
}
