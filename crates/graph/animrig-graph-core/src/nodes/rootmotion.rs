//! Root-motion stream kernels composed by the clip player.
//!
//! All of these copy the incoming stream and touch only the root bone's
//! channels. A null input passes straight through.

use animrig_api_core::math::{quat_conjugate, quat_mul, quat_scale_angle, sub_vec3};
use animrig_api_core::{StreamView, StreamViewMut, Transform};

use crate::error::GraphError;
use crate::graph::{KernelCtx, NodeFrameState, OutputMap};
use crate::message::{Message, RootVelocity};
use crate::port::{NodeDescriptor, PortDef, TypeTag};
use crate::value::{DataValue, StreamBuffer};

pub static LOOP_VALUES: NodeDescriptor = NodeDescriptor {
    name: "loop_values",
    ports: &[
        PortDef::data_in("in", TypeTag::Stream),
        PortDef::data_in("start", TypeTag::Stream),
        PortDef::data_in("stop", TypeTag::Stream),
        PortDef::data_in("progress", TypeTag::Float),
        PortDef::data_out("out", TypeTag::Stream),
    ],
};

pub static IN_PLACE: NodeDescriptor = NodeDescriptor {
    name: "in_place",
    ports: &[
        PortDef::data_in("in", TypeTag::Stream),
        PortDef::data_out("out", TypeTag::Stream),
    ],
};

pub static CYCLE_ROOT: NodeDescriptor = NodeDescriptor {
    name: "cycle_root",
    ports: &[
        PortDef::data_in("in", TypeTag::Stream),
        PortDef::data_in("cycles", TypeTag::Float),
        PortDef::data_in("start", TypeTag::Stream),
        PortDef::data_in("stop", TypeTag::Stream),
        PortDef::data_out("out", TypeTag::Stream),
    ],
};

pub static DELTA_ROOT: NodeDescriptor = NodeDescriptor {
    name: "delta_root_motion",
    ports: &[
        PortDef::data_in("in", TypeTag::Stream),
        PortDef::data_out("out", TypeTag::Stream),
    ],
};

pub static VELOCITY_ROOT: NodeDescriptor = NodeDescriptor {
    name: "velocity_root_motion",
    ports: &[
        PortDef::msg_in("velocity", TypeTag::RootVelocity),
        PortDef::data_in("in", TypeTag::Stream),
        PortDef::data_out("out", TypeTag::Stream),
    ],
};

fn single(stream: StreamBuffer) -> OutputMap {
    let mut map = OutputMap::with_capacity(1);
    map.insert("out".to_string(), DataValue::Stream(stream));
    map
}

fn root_transform(stream: &StreamBuffer) -> Option<Transform> {
    let skeleton = stream.skeleton.as_ref()?;
    let view = StreamView::bind(skeleton, &stream.data).ok()?;
    Some(view.local_to_parent(0))
}

fn write_root(stream: &mut StreamBuffer, root: &Transform) {
    let Some(skeleton) = stream.skeleton.clone() else {
        return;
    };
    if let Ok(mut view) = StreamViewMut::bind(&skeleton, &mut stream.data) {
        view.set_local_to_parent(0, root);
    }
}

/// Cancels the root displacement accumulated across one loop so looped
/// playback does not pop at the seam: the start→stop root delta, scaled by
/// loop progress, is subtracted back out.
#[derive(Debug, Default)]
pub struct LoopValuesNode;

impl LoopValuesNode {
    pub fn execute(&self, ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
        let mut out = ctx.stream_or_null("in");
        if out.is_null() {
            return Ok(single(out));
        }
        let progress = ctx.float_or("progress", 0.0).clamp(0.0, 1.0);
        let (start, stop) = (ctx.stream_or_null("start"), ctx.stream_or_null("stop"));
        let (Some(start_root), Some(stop_root)) = (root_transform(&start), root_transform(&stop))
        else {
            return Ok(single(out));
        };
        let Some(mut root) = root_transform(&out) else {
            return Ok(single(out));
        };

        let delta_t = sub_vec3(stop_root.translation, start_root.translation);
        root.translation = [
            root.translation[0] - delta_t[0] * progress,
            root.translation[1] - delta_t[1] * progress,
            root.translation[2] - delta_t[2] * progress,
        ];
        let delta_r = quat_mul(stop_root.rotation, quat_conjugate(start_root.rotation));
        root.rotation = quat_mul(quat_scale_angle(delta_r, -progress), root.rotation);

        write_root(&mut out, &root);
        Ok(single(out))
    }
}

/// Pins the root translation to the bind pose on the ground plane, keeping
/// the vertical component (in-place motion extraction).
#[derive(Debug, Default)]
pub struct InPlaceNode;

impl InPlaceNode {
    pub fn execute(&self, ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
        let mut out = ctx.stream_or_null("in");
        let Some(skeleton) = out.skeleton.clone() else {
            return Ok(single(out));
        };
        let bind = skeleton.bind_pose(0).translation;
        if let Ok(mut view) = StreamViewMut::bind(&skeleton, &mut out.data) {
            let t = view.translation(0);
            view.set_translation(0, [bind[0], t[1], bind[2]]);
        }
        Ok(single(out))
    }
}

/// Re-applies the per-loop root displacement `cycles` times so root motion
/// keeps accumulating across wrapped playback.
#[derive(Debug, Default)]
pub struct CycleRootNode;

impl CycleRootNode {
    pub fn execute(&self, ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
        let mut out = ctx.stream_or_null("in");
        if out.is_null() {
            return Ok(single(out));
        }
        let cycles = ctx.float_or("cycles", 0.0);
        if cycles == 0.0 {
            return Ok(single(out));
        }
        let (start, stop) = (ctx.stream_or_null("start"), ctx.stream_or_null("stop"));
        let (Some(start_root), Some(stop_root)) = (root_transform(&start), root_transform(&stop))
        else {
            return Ok(single(out));
        };
        let Some(mut root) = root_transform(&out) else {
            return Ok(single(out));
        };

        let delta_t = sub_vec3(stop_root.translation, start_root.translation);
        root.translation = [
            root.translation[0] + delta_t[0] * cycles,
            root.translation[1] + delta_t[1] * cycles,
            root.translation[2] + delta_t[2] * cycles,
        ];
        let delta_r = quat_mul(stop_root.rotation, quat_conjugate(start_root.rotation));
        root.rotation = quat_mul(quat_scale_angle(delta_r, cycles), root.rotation);

        write_root(&mut out, &root);
        Ok(single(out))
    }
}

/// Replaces the root with the delta since the previous evaluation's sample.
/// The first frame after (re)configuration reports an identity root.
#[derive(Debug, Default)]
pub struct DeltaRootNode;

impl DeltaRootNode {
    pub fn execute(&self, ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
        let mut out = ctx.stream_or_null("in");
        if out.is_null() {
            return Ok(single(out));
        }
        let Some(current) = root_transform(&out) else {
            return Ok(single(out));
        };

        let prev = match ctx.frame_state() {
            Some(NodeFrameState::DeltaRoot { prev }) => *prev,
            _ => None,
        };
        *ctx.frame_state() = Some(NodeFrameState::DeltaRoot {
            prev: Some(current),
        });

        let delta = match prev {
            Some(prev) => prev.inverse().mul(&current),
            None => Transform::IDENTITY,
        };
        write_root(&mut out, &delta);
        Ok(single(out))
    }
}

/// Drives the root from a configured velocity integrated over frame time,
/// ignoring whatever root the clip sampled.
#[derive(Debug, Default)]
pub struct VelocityRootNode {
    pub velocity: Option<RootVelocity>,
}

impl VelocityRootNode {
    pub fn on_message(&mut self, port: &str, msg: &Message) -> Result<(), GraphError> {
        match (port, msg) {
            ("velocity", Message::RootVelocity(v)) => {
                self.velocity = Some(*v);
                Ok(())
            }
            _ => Err(GraphError::NoSuchPort(port.to_string())),
        }
    }

    pub fn execute(&self, ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
        let mut out = ctx.stream_or_null("in");
        if out.is_null() {
            return Ok(single(out));
        }
        let Some(velocity) = self.velocity else {
            return Ok(single(out));
        };

        let mut accum = match ctx.frame_state() {
            Some(NodeFrameState::VelocityRoot { accum }) => *accum,
            _ => Transform::IDENTITY,
        };
        let dt = ctx.dt;
        let step = Transform {
            translation: [
                velocity.linear[0] * dt,
                velocity.linear[1] * dt,
                velocity.linear[2] * dt,
            ],
            rotation: animrig_api_core::math::quat_axis_angle(
                velocity.angular_axis,
                velocity.angular_speed * dt,
            ),
            scale: [1.0, 1.0, 1.0],
        };
        accum = accum.mul(&step);
        *ctx.frame_state() = Some(NodeFrameState::VelocityRoot { accum });

        write_root(&mut out, &accum);
        Ok(single(out))
    }
}
