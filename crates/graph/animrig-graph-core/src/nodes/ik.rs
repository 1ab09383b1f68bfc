//! Two-bone analytic IK.
//!
//! Solves a 2-link chain (root/mid/tip) toward a target transform with an
//! optional pole hint steering the bend plane. Position and rotation target
//! influence blend independently; the overall weight input scales the whole
//! correction (0 disables, 1 fully applies).

use animrig_api_core::math::{
    cross3, dot3, length3, nlerp_quat, normalize3, quat_conjugate, quat_from_to, quat_mul,
    quat_rotate, sub_vec3,
};
use animrig_api_core::{StreamViewMut, Transform};

use crate::error::GraphError;
use crate::graph::{KernelCtx, OutputMap};
use crate::message::{IkSetup, Message};
use crate::nodes::constraint::{local_to_root, stream_output};
use crate::nodes::NodeState;
use crate::port::{NodeDescriptor, PortDef, TypeTag};

pub static TWO_BONE_IK: NodeDescriptor = NodeDescriptor {
    name: "two_bone_ik",
    ports: &[
        PortDef::msg_in("setup", TypeTag::IkSetup),
        PortDef::data_in("in", TypeTag::Stream),
        PortDef::data_in("target", TypeTag::Transform),
        PortDef::data_in("hint", TypeTag::Transform),
        PortDef::data_in("weight", TypeTag::Float),
        PortDef::data_out("out", TypeTag::Stream),
    ],
};

#[derive(Debug, Default)]
pub struct TwoBoneIkNode {
    pub setup: Option<IkSetup>,
}

impl TwoBoneIkNode {
    pub fn state(&self) -> NodeState {
        if self.setup.is_some() {
            NodeState::Evaluable
        } else {
            NodeState::Uninitialized
        }
    }

    pub fn on_message(&mut self, port: &str, msg: &Message) -> Result<(), GraphError> {
        match (port, msg) {
            ("setup", Message::IkSetup(setup)) => {
                self.setup = Some(setup.clone());
                Ok(())
            }
            _ => Err(GraphError::NoSuchPort(port.to_string())),
        }
    }

    pub fn execute(&self, ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
        let mut out = ctx.stream_or_null("in");
        let weight = ctx.float_or("weight", 1.0).clamp(0.0, 1.0);
        let (Some(setup), Some(skeleton), Some(target)) =
            (&self.setup, out.skeleton.clone(), ctx.transform("target"))
        else {
            return Ok(stream_output(out));
        };
        if weight == 0.0 {
            return Ok(stream_output(out));
        }
        let bone_count = skeleton.bone_count() as i32;
        if setup.root < 0
            || setup.mid < 0
            || setup.tip < 0
            || setup.root >= bone_count
            || setup.mid >= bone_count
            || setup.tip >= bone_count
        {
            return Ok(stream_output(out));
        }
        let (root, mid, tip) = (
            setup.root as usize,
            setup.mid as usize,
            setup.tip as usize,
        );
        let hint = ctx.transform("hint");

        {
            let mut view = StreamViewMut::bind(&skeleton, &mut out.data).map_err(|_| {
                GraphError::BufferLengthMismatch {
                    expected: skeleton.stream_size(),
                    got: 0,
                }
            })?;

            let root_l2r = local_to_root(&view.as_view(), root);
            let mid_l2r = root_l2r.mul(&view.local_to_parent(mid));
            let tip_l2r = mid_l2r.mul(&view.local_to_parent(tip));

            let root_pos = root_l2r.translation;
            let mid_pos = mid_l2r.translation;
            let tip_pos = tip_l2r.translation;

            let target_pos = animrig_api_core::math::lerp_vec3(
                tip_pos,
                target.translation,
                weight * setup.position_weight.clamp(0.0, 1.0),
            );

            let upper_len = length3(sub_vec3(mid_pos, root_pos));
            let lower_len = length3(sub_vec3(tip_pos, mid_pos));
            if upper_len <= 1e-6 || lower_len <= 1e-6 {
                return Ok(stream_output(out));
            }

            let to_target = sub_vec3(target_pos, root_pos);
            let reach = length3(to_target).clamp(
                (upper_len - lower_len).abs() + 1e-5,
                upper_len + lower_len - 1e-5,
            );

            // Law of cosines for the angle at the root and at the mid joint.
            let cos_root = ((upper_len * upper_len + reach * reach - lower_len * lower_len)
                / (2.0 * upper_len * reach))
                .clamp(-1.0, 1.0);
            let cos_mid = ((upper_len * upper_len + lower_len * lower_len - reach * reach)
                / (2.0 * upper_len * lower_len))
                .clamp(-1.0, 1.0);

            // Bend plane normal: prefer the hint, fall back to the current
            // bend, then to any perpendicular.
            let axis = bend_axis(root_pos, mid_pos, target_pos, hint.as_ref());
            let dir = normalize3(to_target);

            // Position the mid joint by rotating the target direction by the
            // root interior angle around the bend axis.
            let root_angle = cos_root.acos();
            let to_mid = quat_rotate(
                animrig_api_core::math::quat_axis_angle(axis, root_angle),
                dir,
            );
            let new_mid = [
                root_pos[0] + to_mid[0] * upper_len,
                root_pos[1] + to_mid[1] * upper_len,
                root_pos[2] + to_mid[2] * upper_len,
            ];
            let mid_interior = cos_mid.acos();
            let to_tip = quat_rotate(
                animrig_api_core::math::quat_axis_angle(axis, -(std::f32::consts::PI - mid_interior)),
                to_mid,
            );
            let new_tip = [
                new_mid[0] + to_tip[0] * lower_len,
                new_mid[1] + to_tip[1] * lower_len,
                new_mid[2] + to_tip[2] * lower_len,
            ];

            // Re-aim the root and mid rotations at the solved joint
            // positions, then write the locals back. Bone lengths are
            // untouched, so only rotations change.
            let root_delta = quat_from_to(sub_vec3(mid_pos, root_pos), sub_vec3(new_mid, root_pos));
            let new_root_rot = quat_mul(root_delta, root_l2r.rotation);
            let parent_rot = if skeleton.parent(root) >= 0 {
                local_to_root(&view.as_view(), skeleton.parent(root) as usize).rotation
            } else {
                [0.0, 0.0, 0.0, 1.0]
            };
            view.set_rotation(root, quat_mul(quat_conjugate(parent_rot), new_root_rot));

            // The root correction already swung the lower link; the mid
            // delta closes the remaining gap to the solved tip.
            let swung_tip_dir = quat_rotate(root_delta, sub_vec3(tip_pos, mid_pos));
            let mid_delta = quat_from_to(swung_tip_dir, sub_vec3(new_tip, new_mid));
            let new_mid_rot = quat_mul(mid_delta, quat_mul(root_delta, mid_l2r.rotation));
            view.set_rotation(mid, quat_mul(quat_conjugate(new_root_rot), new_mid_rot));

            // Optional tip orientation toward the target rotation.
            let rot_w = weight * setup.rotation_weight.clamp(0.0, 1.0);
            if rot_w > 0.0 {
                let solved_tip_rot = quat_mul(mid_delta, quat_mul(root_delta, tip_l2r.rotation));
                let tip_rot = nlerp_quat(solved_tip_rot, target.rotation, rot_w);
                view.set_rotation(tip, quat_mul(quat_conjugate(new_mid_rot), tip_rot));
            }
        }

        Ok(stream_output(out))
    }
}

/// Normal of the bend plane. With a hint the plane contains root→target and
/// leans toward the hint; otherwise the current bend is preserved.
fn bend_axis(
    root: [f32; 3],
    mid: [f32; 3],
    target: [f32; 3],
    hint: Option<&Transform>,
) -> [f32; 3] {
    let to_target = sub_vec3(target, root);
    let bend_ref = match hint {
        Some(h) => sub_vec3(h.translation, root),
        None => sub_vec3(mid, root),
    };
    let axis = cross3(to_target, bend_ref);
    if dot3(axis, axis) > 1e-10 {
        normalize3(axis)
    } else {
        // Degenerate (collinear): any perpendicular axis works.
        let fallback = cross3(to_target, [0.0, 1.0, 0.0]);
        if dot3(fallback, fallback) > 1e-10 {
            normalize3(fallback)
        } else {
            [1.0, 0.0, 0.0]
        }
    }
}
