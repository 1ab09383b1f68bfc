//! TRS transform used for bone-space math (translation, rotation quat, scale).

use serde::{Deserialize, Serialize};

use crate::math::{
    add_vec3, mul_vec3, nlerp_quat, quat_conjugate, quat_mul, quat_rotate, QUAT_IDENTITY,
};

/// Rigid transform with non-uniform scale. Rotation is a unit quaternion
/// (x, y, z, w).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: [0.0, 0.0, 0.0],
        rotation: QUAT_IDENTITY,
        scale: [1.0, 1.0, 1.0],
    };

    pub fn from_translation(translation: [f32; 3]) -> Self {
        Transform {
            translation,
            ..Transform::IDENTITY
        }
    }

    pub fn from_rotation(rotation: [f32; 4]) -> Self {
        Transform {
            rotation,
            ..Transform::IDENTITY
        }
    }

    /// Compose `self * rhs`: apply `rhs` in the space of `self`.
    /// Matches matrix composition `M(self) * M(rhs)` for TRS transforms.
    pub fn mul(&self, rhs: &Transform) -> Transform {
        Transform {
            translation: add_vec3(
                self.translation,
                quat_rotate(self.rotation, mul_vec3(self.scale, rhs.translation)),
            ),
            rotation: quat_mul(self.rotation, rhs.rotation),
            scale: mul_vec3(self.scale, rhs.scale),
        }
    }

    /// Inverse transform. Scale components must be non-zero; zero scale maps
    /// to zero to stay finite.
    pub fn inverse(&self) -> Transform {
        let inv_scale = [
            safe_recip(self.scale[0]),
            safe_recip(self.scale[1]),
            safe_recip(self.scale[2]),
        ];
        let inv_rot = quat_conjugate(self.rotation);
        let t = quat_rotate(inv_rot, self.translation);
        Transform {
            translation: [-t[0] * inv_scale[0], -t[1] * inv_scale[1], -t[2] * inv_scale[2]],
            rotation: inv_rot,
            scale: inv_scale,
        }
    }

    /// Map a point through this transform.
    pub fn transform_point(&self, p: [f32; 3]) -> [f32; 3] {
        add_vec3(
            self.translation,
            quat_rotate(self.rotation, mul_vec3(self.scale, p)),
        )
    }

    /// Component-wise interpolation (translation/scale lerp, rotation NLERP).
    pub fn lerp(&self, rhs: &Transform, t: f32) -> Transform {
        Transform {
            translation: crate::math::lerp_vec3(self.translation, rhs.translation, t),
            rotation: nlerp_quat(self.rotation, rhs.rotation, t),
            scale: crate::math::lerp_vec3(self.scale, rhs.scale, t),
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Transform::IDENTITY
    }
}

#[inline]
fn safe_recip(v: f32) -> f32 {
    if v != 0.0 {
        v.recip()
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::quat_axis_angle;

    const EPS: f32 = 1e-4;

    fn approx3(a: [f32; 3], b: [f32; 3]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < EPS)
    }

    #[test]
    fn mul_identity_is_noop() {
        let t = Transform {
            translation: [1.0, 2.0, 3.0],
            rotation: quat_axis_angle([0.0, 1.0, 0.0], 0.6),
            scale: [2.0, 2.0, 2.0],
        };
        let r = t.mul(&Transform::IDENTITY);
        assert!(approx3(r.translation, t.translation));
        assert!(approx3(r.scale, t.scale));
    }

    #[test]
    fn inverse_round_trips_points() {
        let t = Transform {
            translation: [1.0, -2.0, 0.5],
            rotation: quat_axis_angle([0.3, 1.0, 0.2], 1.3),
            scale: [2.0, 0.5, 1.0],
        };
        let p = [0.7, 3.0, -1.0];
        let back = t.inverse().transform_point(t.transform_point(p));
        assert!(approx3(back, p));
    }

    #[test]
    fn compose_matches_sequential_points() {
        let a = Transform::from_translation([1.0, 0.0, 0.0]);
        let b = Transform::from_rotation(quat_axis_angle([0.0, 0.0, 1.0], 0.9));
        let p = [1.0, 1.0, 0.0];
        let composed = a.mul(&b).transform_point(p);
        let sequential = a.transform_point(b.transform_point(p));
        assert!(approx3(composed, sequential));
    }
}
