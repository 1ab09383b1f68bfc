//! Core clip sampling kernel.

use std::sync::Arc;

use animrig_api_core::math::{quat_conjugate, quat_mul, sub_vec3};
use animrig_api_core::{Clip, SkeletonDefinition, StreamViewMut};

use crate::error::GraphError;
use crate::graph::{KernelCtx, OutputMap};
use crate::message::Message;
use crate::nodes::NodeState;
use crate::port::{NodeDescriptor, PortDef, TypeTag};
use crate::value::{DataValue, StreamBuffer};

pub static CLIP_SAMPLER: NodeDescriptor = NodeDescriptor {
    name: "clip_sampler",
    ports: &[
        PortDef::msg_in("skeleton", TypeTag::Skeleton),
        PortDef::msg_in("clip", TypeTag::Clip),
        PortDef::msg_in("additive", TypeTag::Bool),
        PortDef::data_in("time", TypeTag::Float),
        PortDef::data_out("out", TypeTag::Stream),
    ],
};

/// Samples a clip at the incoming time into a bind-pose-initialized stream.
///
/// With `additive` set, the first frame is subtracted so the output becomes
/// a delta pose suitable for additive mixing.
#[derive(Debug, Default)]
pub struct ClipSamplerNode {
    pub skeleton: Option<Arc<SkeletonDefinition>>,
    pub clip: Option<Arc<Clip>>,
    pub additive: bool,
}

impl ClipSamplerNode {
    pub fn state(&self) -> NodeState {
        match (&self.skeleton, &self.clip) {
            (Some(_), Some(_)) => NodeState::Evaluable,
            (Some(_), None) => NodeState::Configured,
            _ => NodeState::Uninitialized,
        }
    }

    pub fn on_message(&mut self, port: &str, msg: &Message) -> Result<(), GraphError> {
        match (port, msg) {
            ("skeleton", Message::Skeleton(skel)) => {
                self.skeleton = Some(skel.clone());
                Ok(())
            }
            ("clip", Message::Clip(clip)) => {
                self.clip = Some(clip.clone());
                Ok(())
            }
            ("additive", Message::Bool(flag)) => {
                self.additive = *flag;
                Ok(())
            }
            _ => Err(GraphError::NoSuchPort(port.to_string())),
        }
    }

    pub fn execute(&self, ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
        let mut map = OutputMap::with_capacity(1);
        // Incomplete configuration forwards the null buffer.
        let (Some(skeleton), Some(clip)) = (&self.skeleton, &self.clip) else {
            map.insert("out".to_string(), DataValue::Stream(StreamBuffer::null()));
            return Ok(map);
        };
        let time = ctx.float_or("time", 0.0);

        let mut out = StreamBuffer::bind_pose(skeleton.clone());
        {
            let mut view = StreamViewMut::bind(skeleton, &mut out.data)
                .map_err(|_| GraphError::BufferLengthMismatch {
                    expected: skeleton.stream_size(),
                    got: 0,
                })?;
            clip.sample_into(time, &mut view);
        }

        if self.additive {
            subtract_reference(skeleton, clip, &mut out)?;
        }

        map.insert("out".to_string(), DataValue::Stream(out));
        Ok(map)
    }
}

/// Turn an absolute pose into a delta against the clip's first frame.
fn subtract_reference(
    skeleton: &Arc<SkeletonDefinition>,
    clip: &Clip,
    out: &mut StreamBuffer,
) -> Result<(), GraphError> {
    let mut reference = StreamBuffer::bind_pose(skeleton.clone());
    {
        let mut view = StreamViewMut::bind(skeleton, &mut reference.data).map_err(|_| {
            GraphError::BufferLengthMismatch {
                expected: skeleton.stream_size(),
                got: 0,
            }
        })?;
        clip.sample_into(0.0, &mut view);
    }
    let mut view = StreamViewMut::bind(skeleton, &mut out.data).map_err(|_| {
        GraphError::BufferLengthMismatch {
            expected: skeleton.stream_size(),
            got: 0,
        }
    })?;
    let reference_view = animrig_api_core::StreamView::bind(skeleton, &reference.data)
        .map_err(|_| GraphError::BufferLengthMismatch {
            expected: skeleton.stream_size(),
            got: 0,
        })?;
    for bone in 0..skeleton.bone_count() as usize {
        view.set_translation(
            bone,
            sub_vec3(view.translation(bone), reference_view.translation(bone)),
        );
        view.set_rotation(
            bone,
            quat_mul(
                quat_conjugate(reference_view.rotation(bone)),
                view.rotation(bone),
            ),
        );
        let s = view.scale(bone);
        let r = reference_view.scale(bone);
        view.set_scale(
            bone,
            [safe_div(s[0], r[0]), safe_div(s[1], r[1]), safe_div(s[2], r[2])],
        );
    }
    Ok(())
}

#[inline]
fn safe_div(a: f32, b: f32) -> f32 {
    if b != 0.0 {
        a / b
    } else {
        a
    }
}
