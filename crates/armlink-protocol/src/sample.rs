//! 遥测快照

/// 单帧解码得到的不可变状态快照
///
/// 每次解码产生一个新快照，创建后不再修改。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TelemetrySample {
    /// 关节位置（度）
    pub joints: [f64; 6],
    /// 工具位姿 `[x, y, z, rx, ry, rz]`（mm / 度）
    pub tool_pose: [f64; 6],
    /// 关节负载
    pub joint_loads: [f64; 6],
    /// 力/力矩 `[fx, fy, fz, tx, ty, tz]`
    pub force_torque: [f64; 6],
    /// 主错误字节
    pub error_byte: u8,
    /// 主故障码
    pub main_code: i32,
    /// 子故障码
    pub sub_code: i32,
}

impl TelemetrySample {
    /// 控制器是否报告了故障
    pub fn has_fault(&self) -> bool {
        self.main_code != 0 || self.error_byte != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_fault() {
        let mut sample = TelemetrySample::default();
        assert!(!sample.has_fault());

        sample.main_code = 14;
        assert!(sample.has_fault());

        sample.main_code = 0;
        sample.error_byte = 1;
        assert!(sample.has_fault());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_sample_serde() {
        let sample = TelemetrySample {
            joints: [1.0; 6],
            main_code: 3,
            ..Default::default()
        };
        let json = serde_json::to_string(&sample).unwrap();
        let back: TelemetrySample = serde_json::from_str(&json).unwrap();
        assert_eq!(sample, back);
    }
}
