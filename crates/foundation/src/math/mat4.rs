//! Column-major 4x4 matrices laid out the way WGSL uniforms expect them.

use super::Vec3;

pub type Mat4 = [[f32; 4]; 4];

pub const MAT4_IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Column-major matrix multiply: c = a * b
pub fn mat4_mul(a: Mat4, b: Mat4) -> Mat4 {
    let mut c = [[0.0f32; 4]; 4];
    for col in 0..4 {
        for row in 0..4 {
            c[col][row] = a[0][row] * b[col][0]
                + a[1][row] * b[col][1]
                + a[2][row] * b[col][2]
                + a[3][row] * b[col][3];
        }
    }
    c
}

/// Transform a point (w = 1) and return the homogeneous result.
pub fn mat4_transform_point(m: Mat4, p: [f32; 3]) -> [f32; 4] {
    let mut out = [0.0f32; 4];
    for (row, o) in out.iter_mut().enumerate() {
        *o = m[0][row] * p[0] + m[1][row] * p[1] + m[2][row] * p[2] + m[3][row];
    }
    out
}

/// Right-handed view matrix.
pub fn mat4_look_at_rh(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let f = (target - eye).normalize_or_zero();
    let s = f.cross(up).normalize_or_zero();
    let u = s.cross(f);

    let ex = -s.dot(eye);
    let ey = -u.dot(eye);
    let ez = f.dot(eye);

    [
        [s.x as f32, u.x as f32, (-f.x) as f32, 0.0],
        [s.y as f32, u.y as f32, (-f.y) as f32, 0.0],
        [s.z as f32, u.z as f32, (-f.z) as f32, 0.0],
        [ex as f32, ey as f32, ez as f32, 1.0],
    ]
}

/// Right-handed orthographic projection with depth range [0, 1].
pub fn mat4_orthographic_rh_z0(
    left: f64,
    right: f64,
    bottom: f64,
    top: f64,
    near: f64,
    far: f64,
) -> Mat4 {
    let rml = right - left;
    let tmb = top - bottom;
    let r = 1.0 / (near - far);
    [
        [(2.0 / rml) as f32, 0.0, 0.0, 0.0],
        [0.0, (2.0 / tmb) as f32, 0.0, 0.0],
        [0.0, 0.0, r as f32, 0.0],
        [
            (-(left + right) / rml) as f32,
            (-(top + bottom) / tmb) as f32,
            (near * r) as f32,
            1.0,
        ],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn identity_is_neutral() {
        let m = mat4_orthographic_rh_z0(-2.0, 2.0, -1.0, 1.0, 0.1, 10.0);
        assert_eq!(mat4_mul(MAT4_IDENTITY, m), m);
        assert_eq!(mat4_mul(m, MAT4_IDENTITY), m);
    }

    #[test]
    fn ortho_maps_corners_to_clip_space() {
        let m = mat4_orthographic_rh_z0(-2.0, 2.0, -1.0, 1.0, 1.0, 11.0);
        let p = mat4_transform_point(m, [2.0, 1.0, -1.0]);
        assert!(close(p[0], 1.0) && close(p[1], 1.0) && close(p[2], 0.0));
        let q = mat4_transform_point(m, [-2.0, -1.0, -11.0]);
        assert!(close(q[0], -1.0) && close(q[1], -1.0) && close(q[2], 1.0));
    }

    #[test]
    fn look_at_puts_target_on_negative_z() {
        let eye = Vec3::new(0.0, 0.0, 5.0);
        let v = mat4_look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let p = mat4_transform_point(v, [0.0, 0.0, 0.0]);
        assert!(close(p[0], 0.0) && close(p[1], 0.0) && close(p[2], -5.0));
    }
}
