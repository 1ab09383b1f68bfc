//! Aim / position / rotation / parent constraint kernels.
//!
//! All four share one shape: copy the input stream, resolve a
//! runtime-sized list of weighted sources (live transforms from the data
//! port array, static weights and offsets from the setup record), reduce
//! them to a single target in root space, and apply it to one bone's local
//! channel scaled by the overall weight input. Weight 0 leaves the output
//! bit-identical to the input.

use animrig_api_core::math::{
    dot4, normalize4, quat_conjugate, quat_from_to, quat_mul, quat_rotate, nlerp_quat,
};
use animrig_api_core::{StreamView, StreamViewMut, Transform};

use crate::error::GraphError;
use crate::graph::{KernelCtx, OutputMap};
use crate::message::{ConstraintSetup, Message};
use crate::nodes::NodeState;
use crate::port::{NodeDescriptor, PortDef, TypeTag};
use crate::value::{DataValue, StreamBuffer};

macro_rules! constraint_descriptor {
    ($ident:ident, $name:literal) => {
        pub static $ident: NodeDescriptor = NodeDescriptor {
            name: $name,
            ports: &[
                PortDef::msg_in("setup", TypeTag::ConstraintSetup),
                PortDef::data_in("in", TypeTag::Stream),
                PortDef::data_in("weight", TypeTag::Float),
                PortDef::data_in_array("sources", TypeTag::Transform),
                PortDef::data_out("out", TypeTag::Stream),
            ],
        };
    };
}

constraint_descriptor!(POSITION_CONSTRAINT, "position_constraint");
constraint_descriptor!(ROTATION_CONSTRAINT, "rotation_constraint");
constraint_descriptor!(AIM_CONSTRAINT, "aim_constraint");
constraint_descriptor!(PARENT_CONSTRAINT, "parent_constraint");

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConstraintFlavor {
    Position,
    Rotation,
    Aim,
    Parent,
}

#[derive(Debug)]
pub struct ConstraintNode {
    pub flavor: ConstraintFlavor,
    pub setup: Option<ConstraintSetup>,
}

impl ConstraintNode {
    pub fn new(flavor: ConstraintFlavor) -> Self {
        ConstraintNode {
            flavor,
            setup: None,
        }
    }

    pub fn state(&self) -> NodeState {
        if self.setup.is_some() {
            NodeState::Evaluable
        } else {
            NodeState::Uninitialized
        }
    }

    pub fn on_message(&mut self, port: &str, msg: &Message) -> Result<(), GraphError> {
        match (port, msg) {
            ("setup", Message::ConstraintSetup(setup)) => {
                self.setup = Some(setup.clone());
                Ok(())
            }
            _ => Err(GraphError::NoSuchPort(port.to_string())),
        }
    }

    pub fn execute(&self, ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
        let mut out = ctx.stream_or_null("in");
        let mut map = OutputMap::with_capacity(1);

        let weight = ctx.float_or("weight", 1.0).clamp(0.0, 1.0);
        let (Some(setup), Some(skeleton)) = (&self.setup, out.skeleton.clone()) else {
            map.insert("out".to_string(), DataValue::Stream(out));
            return Ok(map);
        };
        let bone = setup.bone;
        if weight == 0.0 || bone < 0 || bone as u32 >= skeleton.bone_count() {
            map.insert("out".to_string(), DataValue::Stream(out));
            return Ok(map);
        }
        let bone = bone as usize;

        // Pair live source transforms with their configured weight/offset.
        let live = ctx.array("sources");
        let mut sources: Vec<(Transform, f32)> = Vec::new();
        for (slot, cfg) in live.iter().zip(setup.sources.iter()) {
            let Some(transform) = slot.as_ref().and_then(|v| v.as_transform()) else {
                continue;
            };
            if cfg.weight <= 0.0 {
                continue;
            }
            sources.push((transform.mul(&cfg.offset), cfg.weight));
        }
        let total: f32 = sources.iter().map(|(_, w)| w).sum();
        if sources.is_empty() || total <= 0.0 {
            map.insert("out".to_string(), DataValue::Stream(out));
            return Ok(map);
        }

        {
            let mut view = StreamViewMut::bind(&skeleton, &mut out.data).map_err(|_| {
                GraphError::BufferLengthMismatch {
                    expected: skeleton.stream_size(),
                    got: 0,
                }
            })?;
            let parent_root = parent_local_to_root(&view.as_view(), bone);
            let bone_root = parent_root.mul(&view.local_to_parent(bone));

            match self.flavor {
                ConstraintFlavor::Position => {
                    let target = blend_translations(&sources, total);
                    let blended = animrig_api_core::math::lerp_vec3(
                        bone_root.translation,
                        target,
                        weight,
                    );
                    let local = parent_root.inverse().transform_point(blended);
                    view.set_translation(bone, local);
                }
                ConstraintFlavor::Rotation => {
                    let target = blend_rotations(&sources, total);
                    let blended = nlerp_quat(bone_root.rotation, target, weight);
                    let local = quat_mul(quat_conjugate(parent_root.rotation), blended);
                    view.set_rotation(bone, normalize4(local));
                }
                ConstraintFlavor::Aim => {
                    let target = blend_translations(&sources, total);
                    let to_target = [
                        target[0] - bone_root.translation[0],
                        target[1] - bone_root.translation[1],
                        target[2] - bone_root.translation[2],
                    ];
                    let current_dir = quat_rotate(bone_root.rotation, setup.aim_axis);
                    let full = quat_mul(quat_from_to(current_dir, to_target), bone_root.rotation);
                    let blended = nlerp_quat(bone_root.rotation, full, weight);
                    let local = quat_mul(quat_conjugate(parent_root.rotation), blended);
                    view.set_rotation(bone, normalize4(local));
                }
                ConstraintFlavor::Parent => {
                    let target_t = blend_translations(&sources, total);
                    let target_r = blend_rotations(&sources, total);
                    let blended_t = animrig_api_core::math::lerp_vec3(
                        bone_root.translation,
                        target_t,
                        weight,
                    );
                    let blended_r = nlerp_quat(bone_root.rotation, target_r, weight);
                    view.set_translation(bone, parent_root.inverse().transform_point(blended_t));
                    view.set_rotation(
                        bone,
                        normalize4(quat_mul(quat_conjugate(parent_root.rotation), blended_r)),
                    );
                }
            }
        }

        map.insert("out".to_string(), DataValue::Stream(out));
        Ok(map)
    }
}

/// Local-to-root of a bone's parent, composed on demand from the stream.
pub(crate) fn parent_local_to_root(view: &StreamView<'_>, bone: usize) -> Transform {
    let parent = view.skeleton().parent(bone);
    if parent < 0 {
        Transform::IDENTITY
    } else {
        local_to_root(view, parent as usize)
    }
}

/// Local-to-root of one bone, walking the (parents-precede-children) chain.
pub(crate) fn local_to_root(view: &StreamView<'_>, bone: usize) -> Transform {
    let mut chain = Vec::new();
    let mut current = bone as i32;
    while current >= 0 {
        chain.push(current as usize);
        current = view.skeleton().parent(current as usize);
    }
    let mut acc = Transform::IDENTITY;
    for &b in chain.iter().rev() {
        acc = acc.mul(&view.local_to_parent(b));
    }
    acc
}

fn blend_translations(sources: &[(Transform, f32)], total: f32) -> [f32; 3] {
    let mut acc = [0.0f32; 3];
    for (t, w) in sources {
        let w = w / total;
        acc[0] += t.translation[0] * w;
        acc[1] += t.translation[1] * w;
        acc[2] += t.translation[2] * w;
    }
    acc
}

fn blend_rotations(sources: &[(Transform, f32)], total: f32) -> [f32; 4] {
    let reference = sources[0].0.rotation;
    let mut acc = [0.0f32; 4];
    for (t, w) in sources {
        let mut q = t.rotation;
        if dot4(q, reference) < 0.0 {
            q = [-q[0], -q[1], -q[2], -q[3]];
        }
        let w = w / total;
        for (a, b) in acc.iter_mut().zip(q.iter()) {
            *a += b * w;
        }
    }
    normalize4(acc)
}

/// Wrap a bare stream in the single-output map kernels return.
pub(crate) fn stream_output(stream: StreamBuffer) -> OutputMap {
    let mut map = OutputMap::with_capacity(1);
    map.insert("out".to_string(), DataValue::Stream(stream));
    map
}
