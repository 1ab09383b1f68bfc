//! Twist correction kernel.
//!
//! Measures the delta between a source bone's current and bind rotation,
//! projects it onto a configured local twist axis, and redistributes a
//! configurable fraction of that twist onto one or more twist bones.
//! Per-bone fractions may be negative to counter-rotate.

use animrig_api_core::math::{normalize4, quat_conjugate, quat_mul, quat_scale_angle, quat_twist};
use animrig_api_core::StreamViewMut;

use crate::error::GraphError;
use crate::graph::{KernelCtx, OutputMap};
use crate::message::{Message, TwistSetup};
use crate::nodes::constraint::stream_output;
use crate::nodes::NodeState;
use crate::port::{NodeDescriptor, PortDef, TypeTag};

pub static TWIST_CORRECTION: NodeDescriptor = NodeDescriptor {
    name: "twist_correction",
    ports: &[
        PortDef::msg_in("setup", TypeTag::TwistSetup),
        PortDef::data_in("in", TypeTag::Stream),
        PortDef::data_in("weight", TypeTag::Float),
        PortDef::data_out("out", TypeTag::Stream),
    ],
};

#[derive(Debug, Default)]
pub struct TwistCorrectionNode {
    pub setup: Option<TwistSetup>,
}

impl TwistCorrectionNode {
    pub fn state(&self) -> NodeState {
        if self.setup.is_some() {
            NodeState::Evaluable
        } else {
            NodeState::Uninitialized
        }
    }

    pub fn on_message(&mut self, port: &str, msg: &Message) -> Result<(), GraphError> {
        match (port, msg) {
            ("setup", Message::TwistSetup(setup)) => {
                self.setup = Some(setup.clone());
                Ok(())
            }
            _ => Err(GraphError::NoSuchPort(port.to_string())),
        }
    }

    pub fn execute(&self, ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
        let mut out = ctx.stream_or_null("in");
        let weight = ctx.float_or("weight", 1.0).clamp(0.0, 1.0);
        let (Some(setup), Some(skeleton)) = (&self.setup, out.skeleton.clone()) else {
            return Ok(stream_output(out));
        };
        if weight == 0.0 {
            return Ok(stream_output(out));
        }
        let bone_count = skeleton.bone_count() as i32;
        if setup.source < 0 || setup.source >= bone_count {
            return Ok(stream_output(out));
        }
        let source = setup.source as usize;

        {
            let mut view = StreamViewMut::bind(&skeleton, &mut out.data).map_err(|_| {
                GraphError::BufferLengthMismatch {
                    expected: skeleton.stream_size(),
                    got: 0,
                }
            })?;

            // Delta rotation of the source relative to its bind pose,
            // reduced to the component around the configured axis.
            let bind = skeleton.bind_pose(source).rotation;
            let delta = quat_mul(view.rotation(source), quat_conjugate(bind));
            let twist = quat_twist(delta, setup.axis);

            for &(bone, fraction) in &setup.bones {
                if bone < 0 || bone >= bone_count {
                    continue;
                }
                let bone = bone as usize;
                let applied = quat_scale_angle(twist, fraction * weight);
                let bind_rot = skeleton.bind_pose(bone).rotation;
                view.set_rotation(bone, normalize4(quat_mul(applied, bind_rot)));
            }
        }

        Ok(stream_output(out))
    }
}
