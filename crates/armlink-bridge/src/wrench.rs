//! 工具坐标系 → 基坐标系的力/力矩变换
//!
//! 力传感器读数在工具坐标系下，控制面通常更关心基坐标系下的方向。
//! 工具位姿 `[x, y, z, rx, ry, rz]` 的姿态部分是 XYZ 固定轴欧拉角（度），
//! 即 `R = Rz(rz) · Ry(ry) · Rx(rx)`。
//!
//! 只做旋转，不做力矩的参考点平移（传感器原点与 TCP 重合）。

/// 由 XYZ 欧拉角（度）构造旋转矩阵
pub fn rotation_from_euler_deg(rx: f64, ry: f64, rz: f64) -> [[f64; 3]; 3] {
    let (sx, cx) = rx.to_radians().sin_cos();
    let (sy, cy) = ry.to_radians().sin_cos();
    let (sz, cz) = rz.to_radians().sin_cos();

    [
        [cz * cy, cz * sy * sx - sz * cx, cz * sy * cx + sz * sx],
        [sz * cy, sz * sy * sx + cz * cx, sz * sy * cx - cz * sx],
        [-sy, cy * sx, cy * cx],
    ]
}

fn rotate(r: &[[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
    [
        r[0][0] * v[0] + r[0][1] * v[1] + r[0][2] * v[2],
        r[1][0] * v[0] + r[1][1] * v[1] + r[1][2] * v[2],
        r[2][0] * v[0] + r[2][1] * v[1] + r[2][2] * v[2],
    ]
}

/// 把工具坐标系下的 `[fx, fy, fz, tx, ty, tz]` 旋转到基坐标系
pub fn wrench_to_base(tool_pose: &[f64; 6], wrench: &[f64; 6]) -> [f64; 6] {
    let r = rotation_from_euler_deg(tool_pose[3], tool_pose[4], tool_pose[5]);
    let f = rotate(&r, [wrench[0], wrench[1], wrench[2]]);
    let t = rotate(&r, [wrench[3], wrench[4], wrench[5]]);
    [f[0], f[1], f[2], t[0], t[1], t[2]]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: [f64; 6], b: [f64; 6]) {
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-9, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_identity_orientation() {
        let wrench = [1.0, 2.0, 3.0, 0.1, 0.2, 0.3];
        assert_close(wrench_to_base(&[100.0, 0.0, 0.0, 0.0, 0.0, 0.0], &wrench), wrench);
    }

    #[test]
    fn test_yaw_90_rotates_x_into_y() {
        let out = wrench_to_base(&[0.0, 0.0, 0.0, 0.0, 0.0, 90.0], &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        assert_close(out, [0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_tool_pointing_down() {
        // rx = 180：工具 z 轴朝下
        let out = wrench_to_base(&[0.0, 0.0, 0.0, 180.0, 0.0, 0.0], &[0.0, 0.0, 10.0, 0.0, 0.0, 0.0]);
        assert_close(out, [0.0, 0.0, -10.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_rotation_preserves_magnitude() {
        let wrench = [3.0, -4.0, 12.0, 0.0, 0.0, 0.0];
        let out = wrench_to_base(&[0.0, 0.0, 0.0, 33.0, -71.0, 140.0], &wrench);
        let norm = (out[0] * out[0] + out[1] * out[1] + out[2] * out[2]).sqrt();
        assert!((norm - 13.0).abs() < 1e-9);
    }
}
