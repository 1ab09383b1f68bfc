//! Array math helpers:
//! - component-wise lerp over [f32; N]
//! - quaternion multiply / conjugate / rotate with NLERP blending
//! - twist decomposition onto an arbitrary axis
//!
//! Quaternions are (x, y, z, w) throughout.

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_vec3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
    ]
}

#[inline]
pub fn add_vec3(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn sub_vec3(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn mul_vec3(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] * b[0], a[1] * b[1], a[2] * b[2]]
}

#[inline]
pub fn scale_vec3(v: [f32; 3], s: f32) -> [f32; 3] {
    [v[0] * s, v[1] * s, v[2] * s]
}

#[inline]
pub fn dot3(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross3(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn length3(v: [f32; 3]) -> f32 {
    dot3(v, v).sqrt()
}

#[inline]
pub fn normalize3(v: [f32; 3]) -> [f32; 3] {
    let len = length3(v);
    if len > 0.0 {
        scale_vec3(v, len.recip())
    } else {
        [0.0, 0.0, 0.0]
    }
}

#[inline]
pub fn dot4(a: [f32; 4], b: [f32; 4]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

#[inline]
pub fn normalize4(mut q: [f32; 4]) -> [f32; 4] {
    let len2 = dot4(q, q);
    if len2 > 0.0 {
        let inv_len = len2.sqrt().recip();
        q[0] *= inv_len;
        q[1] *= inv_len;
        q[2] *= inv_len;
        q[3] *= inv_len;
    }
    q
}

pub const QUAT_IDENTITY: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Hamilton product `a * b` (apply `b`, then `a`).
#[inline]
pub fn quat_mul(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    [
        a[3] * b[0] + a[0] * b[3] + a[1] * b[2] - a[2] * b[1],
        a[3] * b[1] - a[0] * b[2] + a[1] * b[3] + a[2] * b[0],
        a[3] * b[2] + a[0] * b[1] - a[1] * b[0] + a[2] * b[3],
        a[3] * b[3] - a[0] * b[0] - a[1] * b[1] - a[2] * b[2],
    ]
}

/// Conjugate; equals the inverse for unit quaternions.
#[inline]
pub fn quat_conjugate(q: [f32; 4]) -> [f32; 4] {
    [-q[0], -q[1], -q[2], q[3]]
}

/// Rotate a vector by a unit quaternion.
#[inline]
pub fn quat_rotate(q: [f32; 4], v: [f32; 3]) -> [f32; 3] {
    let u = [q[0], q[1], q[2]];
    let s = q[3];
    let uv = cross3(u, v);
    let uuv = cross3(u, uv);
    [
        v[0] + 2.0 * (s * uv[0] + uuv[0]),
        v[1] + 2.0 * (s * uv[1] + uuv[1]),
        v[2] + 2.0 * (s * uv[2] + uuv[2]),
    ]
}

/// Unit quaternion from an axis (normalized internally) and angle in radians.
#[inline]
pub fn quat_axis_angle(axis: [f32; 3], angle: f32) -> [f32; 4] {
    let axis = normalize3(axis);
    let half = 0.5 * angle;
    let s = half.sin();
    [axis[0] * s, axis[1] * s, axis[2] * s, half.cos()]
}

/// Shortest rotation taking `from` onto `to` (both need not be unit length).
pub fn quat_from_to(from: [f32; 3], to: [f32; 3]) -> [f32; 4] {
    let f = normalize3(from);
    let t = normalize3(to);
    let d = dot3(f, t);
    if d >= 1.0 - 1e-6 {
        return QUAT_IDENTITY;
    }
    if d <= -1.0 + 1e-6 {
        // Opposite directions: pick any perpendicular axis.
        let axis = if f[0].abs() < 0.9 {
            cross3(f, [1.0, 0.0, 0.0])
        } else {
            cross3(f, [0.0, 1.0, 0.0])
        };
        return quat_axis_angle(axis, std::f32::consts::PI);
    }
    let axis = cross3(f, t);
    normalize4([axis[0], axis[1], axis[2], 1.0 + d])
}

/// Quaternion NLERP with shortest-arc correction.
/// If dot < 0, negate the second quaternion to ensure the shortest path.
#[inline]
pub fn nlerp_quat(a: [f32; 4], mut b: [f32; 4], t: f32) -> [f32; 4] {
    let d = dot4(a, b);
    if d < 0.0 {
        b = [-b[0], -b[1], -b[2], -b[3]];
    }
    normalize4([
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
        lerp_f32(a[3], b[3], t),
    ])
}

/// Decompose `q` into (twist, swing) about `axis`, with `q = swing * twist`.
/// The twist component is the rotation of `q` projected onto `axis`.
pub fn quat_twist(q: [f32; 4], axis: [f32; 3]) -> [f32; 4] {
    let axis = normalize3(axis);
    let proj = dot3([q[0], q[1], q[2]], axis);
    let twist = [axis[0] * proj, axis[1] * proj, axis[2] * proj, q[3]];
    if dot4(twist, twist) < 1e-12 {
        // Pure swing (rotation axis perpendicular to the twist axis).
        QUAT_IDENTITY
    } else {
        normalize4(twist)
    }
}

/// Scale the angle of a unit quaternion by `s` (identity-relative), keeping
/// its axis. Negative `s` inverts the rotation.
pub fn quat_scale_angle(q: [f32; 4], s: f32) -> [f32; 4] {
    let w = q[3].clamp(-1.0, 1.0);
    let angle = 2.0 * w.acos();
    if angle.abs() < 1e-6 {
        return QUAT_IDENTITY;
    }
    let inv_sin = (1.0 - w * w).sqrt().recip();
    let axis = [q[0] * inv_sin, q[1] * inv_sin, q[2] * inv_sin];
    quat_axis_angle(axis, angle * s)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn approx4(a: [f32; 4], b: [f32; 4]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < EPS)
    }

    #[test]
    fn quat_mul_identity() {
        let q = quat_axis_angle([0.0, 1.0, 0.0], 0.7);
        assert!(approx4(quat_mul(q, QUAT_IDENTITY), q));
        assert!(approx4(quat_mul(QUAT_IDENTITY, q), q));
    }

    #[test]
    fn quat_rotate_quarter_turn() {
        let q = quat_axis_angle([0.0, 0.0, 1.0], std::f32::consts::FRAC_PI_2);
        let v = quat_rotate(q, [1.0, 0.0, 0.0]);
        assert!((v[0]).abs() < EPS && (v[1] - 1.0).abs() < EPS && v[2].abs() < EPS);
    }

    #[test]
    fn conjugate_inverts_rotation() {
        let q = quat_axis_angle([1.0, 2.0, 0.5], 1.1);
        let v = [0.3, -1.0, 2.0];
        let back = quat_rotate(quat_conjugate(q), quat_rotate(q, v));
        for i in 0..3 {
            assert!((back[i] - v[i]).abs() < EPS);
        }
    }

    #[test]
    fn from_to_aligns() {
        let q = quat_from_to([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let v = quat_rotate(q, [1.0, 0.0, 0.0]);
        assert!((v[1] - 1.0).abs() < EPS);
    }

    #[test]
    fn twist_extracts_axis_rotation() {
        let twist = quat_axis_angle([0.0, 1.0, 0.0], 0.8);
        let swing = quat_axis_angle([1.0, 0.0, 0.0], 0.3);
        let q = quat_mul(swing, twist);
        assert!(approx4(quat_twist(q, [0.0, 1.0, 0.0]), twist));
    }

    #[test]
    fn nlerp_endpoints() {
        let a = quat_axis_angle([0.0, 1.0, 0.0], 0.4);
        let b = quat_axis_angle([0.0, 1.0, 0.0], 1.2);
        assert!(approx4(nlerp_quat(a, b, 0.0), a));
        assert!(approx4(nlerp_quat(a, b, 1.0), b));
    }
}
