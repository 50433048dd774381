//! 零值抑制（stale-value filtering）
//!
//! 控制器偶尔会在某个关节上输出一次瞬时的 0 读数，它并不代表真实位置，
//! 直接转发会让下游出现跳变/闪烁。对每个关节独立处理：
//!
//! - 新值恰好为 0：用该关节的 last-known-good 代替
//! - 否则：接受新值并覆盖 last-known-good
//!
//! 这是有损的启发式：真实的 0 度关节角与瞬时故障无法区分，也会被屏蔽。

/// 六个关节全部被替换
pub const ALL_JOINTS_MASK: u8 = 0b11_1111;

/// 过滤结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilteredJoints {
    /// 对外发布的关节值
    pub joints: [f64; 6],
    /// 被替换的通道（Bit 0-5 对应 Joint 1-6）
    pub substituted_mask: u8,
}

/// 关节遥测采样器
///
/// 持有 last-known-good 状态，生命周期与一次遥测会话相同，重连时重建。
#[derive(Debug, Clone, Default)]
pub struct TelemetrySampler {
    last_known_good: [f64; 6],
}

impl TelemetrySampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按通道过滤一组关节值，并更新 last-known-good
    pub fn filter(&mut self, joints: &[f64; 6]) -> FilteredJoints {
        let mut out = [0.0; 6];
        let mut mask = 0u8;

        for (i, &value) in joints.iter().enumerate() {
            // `-0.0 == 0.0` 成立，负零同样视为瞬时零读数
            if value == 0.0 {
                out[i] = self.last_known_good[i];
                mask |= 1 << i;
            } else {
                self.last_known_good[i] = value;
                out[i] = value;
            }
        }

        FilteredJoints {
            joints: out,
            substituted_mask: mask,
        }
    }

    pub fn last_known_good(&self) -> [f64; 6] {
        self.last_known_good
    }

    /// 重置（重连时）
    pub fn reset(&mut self) {
        self.last_known_good = [0.0; 6];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_masked_per_channel() {
        let mut sampler = TelemetrySampler::new();
        let mut published = Vec::new();

        for v in [1.0, 0.0, 2.0] {
            let mut joints = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0];
            joints[2] = v;
            published.push(sampler.filter(&joints).joints[2]);
        }

        assert_eq!(published, vec![1.0, 1.0, 2.0]);
    }

    #[test]
    fn test_substituted_mask() {
        let mut sampler = TelemetrySampler::new();
        sampler.filter(&[1.0; 6]);

        let out = sampler.filter(&[0.0, 2.0, 0.0, 2.0, 2.0, -0.0]);
        assert_eq!(out.joints, [1.0, 2.0, 1.0, 2.0, 2.0, 1.0]);
        assert_eq!(out.substituted_mask, 0b10_0101);
        assert_eq!(sampler.last_known_good(), [1.0, 2.0, 1.0, 2.0, 2.0, 1.0]);
    }

    #[test]
    fn test_zero_before_any_good_value() {
        let mut sampler = TelemetrySampler::new();
        let out = sampler.filter(&[0.0; 6]);
        assert_eq!(out.joints, [0.0; 6]);
        assert_eq!(out.substituted_mask, 0b11_1111);
    }

    #[test]
    fn test_reset() {
        let mut sampler = TelemetrySampler::new();
        sampler.filter(&[5.0; 6]);
        sampler.reset();
        assert_eq!(sampler.last_known_good(), [0.0; 6]);
    }
}
