//! 声明式载荷布局
//!
//! 载荷内每个通道由 `(偏移, 类型, 个数)` 描述，由同一个通用例程解码，
//! 偏移表本身可以脱离调用点单独测试。偏移相对载荷起点，必须与控制器线格式逐字节一致。

use crate::ProtocolError;
use crate::sample::TelemetrySample;

/// 字段编码类型（全部小端）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 无符号 8 位
    U8,
    /// 有符号 32 位
    I32Le,
    /// 64 位浮点
    F64Le,
}

impl FieldKind {
    /// 单个元素占用的字节数
    pub const fn width(self) -> usize {
        match self {
            FieldKind::U8 => 1,
            FieldKind::I32Le => 4,
            FieldKind::F64Le => 8,
        }
    }

    fn read(self, bytes: &[u8]) -> Value {
        match self {
            FieldKind::U8 => Value::Int(i64::from(bytes[0])),
            FieldKind::I32Le => Value::Int(i64::from(i32::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3],
            ]))),
            FieldKind::F64Le => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes[..8]);
                Value::Float(f64::from_le_bytes(raw))
            },
        }
    }

    fn write(self, value: Value, out: &mut [u8]) {
        match self {
            FieldKind::U8 => out[0] = value.as_i64() as u8,
            FieldKind::I32Le => out[..4].copy_from_slice(&(value.as_i64() as i32).to_le_bytes()),
            FieldKind::F64Le => out[..8].copy_from_slice(&value.as_f64().to_le_bytes()),
        }
    }
}

/// 遥测通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// 主错误字节
    ErrorByte,
    /// 关节位置（度）
    Joints,
    /// 工具位姿（mm / 度）
    ToolPose,
    /// 关节负载（力矩）
    JointLoads,
    /// 末端力/力矩传感器
    ForceTorque,
    /// 主故障码
    MainCode,
    /// 子故障码
    SubCode,
}

impl Channel {
    /// 通道元素个数
    pub const fn arity(self) -> usize {
        match self {
            Channel::Joints | Channel::ToolPose | Channel::JointLoads | Channel::ForceTorque => 6,
            Channel::ErrorByte | Channel::MainCode | Channel::SubCode => 1,
        }
    }
}

/// 单个字段描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub channel: Channel,
    /// 相对载荷起点的偏移
    pub offset: usize,
    pub kind: FieldKind,
    /// 连续元素个数
    pub count: usize,
}

impl FieldSpec {
    pub const fn new(channel: Channel, offset: usize, kind: FieldKind, count: usize) -> Self {
        Self {
            channel,
            offset,
            kind,
            count,
        }
    }

    /// 字段结束位置（不含）
    pub const fn end(&self) -> usize {
        self.offset + self.kind.width() * self.count
    }
}

/// 控制器实时状态包的标准布局
pub const STANDARD_FIELDS: [FieldSpec; 7] = [
    FieldSpec::new(Channel::ErrorByte, 6, FieldKind::U8, 1),
    FieldSpec::new(Channel::Joints, 8, FieldKind::F64Le, 6),
    FieldSpec::new(Channel::ToolPose, 56, FieldKind::F64Le, 6),
    FieldSpec::new(Channel::JointLoads, 108, FieldKind::F64Le, 6),
    FieldSpec::new(Channel::ForceTorque, 184, FieldKind::F64Le, 6),
    FieldSpec::new(Channel::MainCode, 314, FieldKind::I32Le, 1),
    FieldSpec::new(Channel::SubCode, 318, FieldKind::I32Le, 1),
];

#[derive(Debug, Clone, Copy)]
enum Value {
    Int(i64),
    Float(f64),
}

impl Value {
    fn as_f64(self) -> f64 {
        match self {
            Value::Int(v) => v as f64,
            Value::Float(v) => v,
        }
    }

    fn as_i64(self) -> i64 {
        match self {
            Value::Int(v) => v,
            Value::Float(v) => v as i64,
        }
    }
}

/// 载荷布局表
///
/// # Example
///
/// ```
/// use armlink_protocol::{TelemetryLayout, TelemetrySample};
///
/// let layout = TelemetryLayout::standard();
/// let mut sample = TelemetrySample::default();
/// sample.joints = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0];
///
/// let payload = layout.encode(&sample);
/// assert_eq!(payload.len(), layout.min_payload_len());
/// assert_eq!(layout.decode(&payload).unwrap().joints, sample.joints);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryLayout {
    fields: Vec<FieldSpec>,
    min_len: usize,
}

impl TelemetryLayout {
    /// 校验并创建布局
    ///
    /// 每个字段的元素个数必须与通道维度一致。
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, ProtocolError> {
        for field in &fields {
            if field.count != field.channel.arity() {
                return Err(ProtocolError::InvalidFrame(format!(
                    "field {:?} declares {} elements, channel has {}",
                    field.channel,
                    field.count,
                    field.channel.arity()
                )));
            }
        }
        let min_len = fields.iter().map(FieldSpec::end).max().unwrap_or(0);
        Ok(Self { fields, min_len })
    }

    /// 标准布局（见 [`STANDARD_FIELDS`]）
    pub fn standard() -> Self {
        let fields = STANDARD_FIELDS.to_vec();
        let min_len = fields.iter().map(FieldSpec::end).max().unwrap_or(0);
        Self { fields, min_len }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// 完整解码所需的最小载荷长度
    pub fn min_payload_len(&self) -> usize {
        self.min_len
    }

    /// 解码载荷（纯函数）
    ///
    /// 载荷短于 [`min_payload_len`](Self::min_payload_len) 时整帧拒绝，不做部分解码。
    pub fn decode(&self, payload: &[u8]) -> Result<TelemetrySample, ProtocolError> {
        if payload.len() < self.min_len {
            return Err(ProtocolError::PayloadTooShort {
                required: self.min_len,
                actual: payload.len(),
            });
        }

        let mut sample = TelemetrySample::default();
        for field in &self.fields {
            let width = field.kind.width();
            for i in 0..field.count {
                let start = field.offset + i * width;
                let value = field.kind.read(&payload[start..start + width]);
                assign(&mut sample, field.channel, i, value);
            }
        }
        Ok(sample)
    }

    /// 编码为最小长度的载荷（模拟器/测试用），未覆盖的字节为 0
    pub fn encode(&self, sample: &TelemetrySample) -> Vec<u8> {
        let mut payload = vec![0u8; self.min_len];
        for field in &self.fields {
            let width = field.kind.width();
            for i in 0..field.count {
                let start = field.offset + i * width;
                field
                    .kind
                    .write(extract(sample, field.channel, i), &mut payload[start..start + width]);
            }
        }
        payload
    }
}

impl Default for TelemetryLayout {
    fn default() -> Self {
        Self::standard()
    }
}

fn assign(sample: &mut TelemetrySample, channel: Channel, index: usize, value: Value) {
    match channel {
        Channel::ErrorByte => sample.error_byte = value.as_i64() as u8,
        Channel::Joints => sample.joints[index] = value.as_f64(),
        Channel::ToolPose => sample.tool_pose[index] = value.as_f64(),
        Channel::JointLoads => sample.joint_loads[index] = value.as_f64(),
        Channel::ForceTorque => sample.force_torque[index] = value.as_f64(),
        Channel::MainCode => sample.main_code = value.as_i64() as i32,
        Channel::SubCode => sample.sub_code = value.as_i64() as i32,
    }
}

fn extract(sample: &TelemetrySample, channel: Channel, index: usize) -> Value {
    match channel {
        Channel::ErrorByte => Value::Int(i64::from(sample.error_byte)),
        Channel::Joints => Value::Float(sample.joints[index]),
        Channel::ToolPose => Value::Float(sample.tool_pose[index]),
        Channel::JointLoads => Value::Float(sample.joint_loads[index]),
        Channel::ForceTorque => Value::Float(sample.force_torque[index]),
        Channel::MainCode => Value::Int(i64::from(sample.main_code)),
        Channel::SubCode => Value::Int(i64::from(sample.sub_code)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 标准偏移表（与控制器线格式逐项对照）
    #[test]
    fn test_standard_offsets() {
        let expected: [(Channel, usize, usize); 7] = [
            (Channel::ErrorByte, 6, 7),
            (Channel::Joints, 8, 56),
            (Channel::ToolPose, 56, 104),
            (Channel::JointLoads, 108, 156),
            (Channel::ForceTorque, 184, 232),
            (Channel::MainCode, 314, 318),
            (Channel::SubCode, 318, 322),
        ];
        for (field, (channel, start, end)) in STANDARD_FIELDS.iter().zip(expected) {
            assert_eq!(field.channel, channel);
            assert_eq!(field.offset, start, "{:?}", channel);
            assert_eq!(field.end(), end, "{:?}", channel);
        }
        assert_eq!(TelemetryLayout::standard().min_payload_len(), 322);
    }

    #[test]
    fn test_decode_reads_fixed_offsets() {
        let mut payload = vec![0u8; 322];
        payload[6] = 3;
        for i in 0..6 {
            let v = (i + 1) as f64 * 1.5;
            payload[8 + i * 8..16 + i * 8].copy_from_slice(&v.to_le_bytes());
            payload[56 + i * 8..64 + i * 8].copy_from_slice(&(-v).to_le_bytes());
            payload[108 + i * 8..116 + i * 8].copy_from_slice(&(v * 10.0).to_le_bytes());
            payload[184 + i * 8..192 + i * 8].copy_from_slice(&(v * 100.0).to_le_bytes());
        }
        payload[314..318].copy_from_slice(&(-7i32).to_le_bytes());
        payload[318..322].copy_from_slice(&42i32.to_le_bytes());

        let sample = TelemetryLayout::standard().decode(&payload).unwrap();
        assert_eq!(sample.error_byte, 3);
        assert_eq!(sample.joints, [1.5, 3.0, 4.5, 6.0, 7.5, 9.0]);
        assert_eq!(sample.tool_pose[5], -9.0);
        assert_eq!(sample.joint_loads[0], 15.0);
        assert_eq!(sample.force_torque[2], 450.0);
        assert_eq!(sample.main_code, -7);
        assert_eq!(sample.sub_code, 42);
    }

    #[test]
    fn test_decode_rejects_short_payload() {
        let layout = TelemetryLayout::standard();
        let err = layout.decode(&[0u8; 23]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::PayloadTooShort {
                required: 322,
                actual: 23
            }
        );
    }

    #[test]
    fn test_decode_accepts_longer_payload() {
        let layout = TelemetryLayout::standard();
        let mut payload = vec![0u8; 900];
        payload[8..16].copy_from_slice(&12.5f64.to_le_bytes());
        assert_eq!(layout.decode(&payload).unwrap().joints[0], 12.5);
    }

    #[test]
    fn test_custom_layout_joints_only() {
        let layout =
            TelemetryLayout::new(vec![FieldSpec::new(Channel::Joints, 0, FieldKind::F64Le, 6)])
                .unwrap();
        assert_eq!(layout.min_payload_len(), 48);

        let mut payload = Vec::new();
        for v in [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        let sample = layout.decode(&payload).unwrap();
        assert_eq!(sample.joints, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(sample.main_code, 0);
    }

    #[test]
    fn test_layout_rejects_wrong_arity() {
        let result =
            TelemetryLayout::new(vec![FieldSpec::new(Channel::Joints, 0, FieldKind::F64Le, 3)]);
        assert!(result.is_err());
    }
}
