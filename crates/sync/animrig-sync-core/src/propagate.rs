//! Hierarchical propagation: local-to-parent into local-to-root and/or
//! local-to-world.
//!
//! One loop body serves the three output modes. The per-bone world multiply
//! is specialized over which root components (translation, rotation, scale)
//! are externally present: a 3-bit flag selects one of eight monomorphized
//! instances, keeping the hot loop free of per-bone branches.

use animrig_api_core::{StreamView, Transform};

/// Which spaces the propagation pass must produce.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PropagationMode {
    RootOnly,
    WorldOnly,
    Both,
}

/// Externally supplied root placement, component-wise optional.
#[derive(Copy, Clone, Debug, Default)]
pub struct RootTransform {
    pub translation: Option<[f32; 3]>,
    pub rotation: Option<[f32; 4]>,
    pub scale: Option<[f32; 3]>,
}

impl RootTransform {
    pub fn from_transform(t: &Transform) -> Self {
        RootTransform {
            translation: Some(t.translation),
            rotation: Some(t.rotation),
            scale: Some(t.scale),
        }
    }

    #[inline]
    fn flags(&self) -> u8 {
        (self.translation.is_some() as u8)
            | (self.rotation.is_some() as u8) << 1
            | (self.scale.is_some() as u8) << 2
    }

    #[inline]
    fn to_transform(self) -> Transform {
        Transform {
            translation: self.translation.unwrap_or([0.0, 0.0, 0.0]),
            rotation: self.rotation.unwrap_or([0.0, 0.0, 0.0, 1.0]),
            scale: self.scale.unwrap_or([1.0, 1.0, 1.0]),
        }
    }
}

/// Propagation results; vectors are filled only for the requested spaces.
#[derive(Default, Debug)]
pub struct PropagationOutput {
    pub local_to_root: Vec<Transform>,
    pub local_to_world: Vec<Transform>,
}

/// Walk bones in index order composing each local-to-parent onto its
/// parent's local-to-root, optionally composing the root placement into
/// world space.
pub fn propagate(
    stream: &StreamView<'_>,
    root: &RootTransform,
    mode: PropagationMode,
    out: &mut PropagationOutput,
) {
    let root_to_world = root.to_transform();
    match root.flags() {
        0b000 => run::<false, false, false>(stream, &root_to_world, mode, out),
        0b001 => run::<true, false, false>(stream, &root_to_world, mode, out),
        0b010 => run::<false, true, false>(stream, &root_to_world, mode, out),
        0b011 => run::<true, true, false>(stream, &root_to_world, mode, out),
        0b100 => run::<false, false, true>(stream, &root_to_world, mode, out),
        0b101 => run::<true, false, true>(stream, &root_to_world, mode, out),
        0b110 => run::<false, true, true>(stream, &root_to_world, mode, out),
        _ => run::<true, true, true>(stream, &root_to_world, mode, out),
    }
}

fn run<const T: bool, const R: bool, const S: bool>(
    stream: &StreamView<'_>,
    root_to_world: &Transform,
    mode: PropagationMode,
    out: &mut PropagationOutput,
) {
    let skeleton = stream.skeleton();
    let bone_count = skeleton.bone_count() as usize;

    let want_root = matches!(mode, PropagationMode::RootOnly | PropagationMode::Both);
    let want_world = matches!(mode, PropagationMode::WorldOnly | PropagationMode::Both);

    out.local_to_root.clear();
    out.local_to_world.clear();
    if want_root {
        out.local_to_root.reserve(bone_count);
    }
    if want_world {
        out.local_to_world.reserve(bone_count);
    }

    // Root chain is always composed; world output additionally maps through
    // the selected root components. `scratch` keeps the chain when the
    // caller asked for world only.
    let mut scratch: Vec<Transform> = Vec::with_capacity(bone_count);

    for bone in 0..bone_count {
        let parent = skeleton.parent(bone);
        let local = stream.local_to_parent(bone);
        let local_to_root = if parent < 0 {
            local
        } else {
            scratch[parent as usize].mul(&local)
        };
        scratch.push(local_to_root);

        if want_root {
            out.local_to_root.push(local_to_root);
        }
        if want_world {
            out.local_to_world
                .push(apply_root::<T, R, S>(root_to_world, &local_to_root));
        }
    }
}

/// Compose the root placement onto one local-to-root transform, touching
/// only the components the specialization enables. The branches resolve at
/// monomorphization time.
#[inline]
fn apply_root<const T: bool, const R: bool, const S: bool>(
    root: &Transform,
    x: &Transform,
) -> Transform {
    let mut result = *x;
    if S {
        result.translation = animrig_api_core::math::mul_vec3(root.scale, result.translation);
        result.scale = animrig_api_core::math::mul_vec3(root.scale, result.scale);
    }
    if R {
        result.translation = animrig_api_core::math::quat_rotate(root.rotation, result.translation);
        result.rotation = animrig_api_core::math::quat_mul(root.rotation, result.rotation);
    }
    if T {
        result.translation = animrig_api_core::math::add_vec3(root.translation, result.translation);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use animrig_api_core::math::quat_axis_angle;
    use animrig_api_core::skeleton::SkeletonBuilder;
    use animrig_api_core::StreamViewMut;

    #[test]
    fn full_root_matches_plain_multiply() {
        let skel = SkeletonBuilder::new()
            .bone("root", -1, Transform::IDENTITY)
            .bone("a", 0, Transform::IDENTITY)
            .build()
            .unwrap();
        let mut data = vec![0.0; skel.stream_size()];
        let mut stream = StreamViewMut::bind(&skel, &mut data).unwrap();
        stream.reset_to_bind_pose();
        stream.set_translation(1, [0.0, 2.0, 0.0]);

        let placement = Transform {
            translation: [1.0, 0.0, 0.0],
            rotation: quat_axis_angle([0.0, 0.0, 1.0], std::f32::consts::FRAC_PI_2),
            scale: [2.0, 2.0, 2.0],
        };
        let mut out = PropagationOutput::default();
        propagate(
            &stream.as_view(),
            &RootTransform::from_transform(&placement),
            PropagationMode::Both,
            &mut out,
        );

        let expected = placement.mul(&out.local_to_root[1]);
        let got = out.local_to_world[1];
        for i in 0..3 {
            assert!((expected.translation[i] - got.translation[i]).abs() < 1e-4);
        }
    }
}
