//! Stream entry point: exposes a host-staged buffer as a graph output.

use std::sync::Arc;

use animrig_api_core::SkeletonDefinition;

use crate::error::GraphError;
use crate::graph::{KernelCtx, OutputMap};
use crate::message::Message;
use crate::nodes::NodeState;
use crate::port::{NodeDescriptor, PortDef, TypeTag};
use crate::value::{DataValue, StreamBuffer};

pub static STREAM_SOURCE: NodeDescriptor = NodeDescriptor {
    name: "stream_source",
    ports: &[
        PortDef::msg_in("skeleton", TypeTag::Skeleton),
        PortDef::msg_in("buffer_size", TypeTag::BufferSize),
        PortDef::data_out("out", TypeTag::Stream),
    ],
};

pub static TRANSFORM_SOURCE: NodeDescriptor = NodeDescriptor {
    name: "transform_source",
    ports: &[PortDef::data_out("out", TypeTag::Transform)],
};

/// Publishes the buffer staged by the host for the current evaluation.
///
/// A staged buffer whose length disagrees with the configured size is a
/// kernel-phase invariant violation and fails the evaluation; an absent
/// staged buffer publishes the bind pose instead.
#[derive(Debug, Default)]
pub struct StreamSourceNode {
    pub skeleton: Option<Arc<SkeletonDefinition>>,
    pub buffer_size: Option<usize>,
}

impl StreamSourceNode {
    pub fn state(&self) -> NodeState {
        if self.skeleton.is_some() {
            NodeState::Evaluable
        } else {
            NodeState::Uninitialized
        }
    }

    pub fn on_message(&mut self, port: &str, msg: &Message) -> Result<(), GraphError> {
        match (port, msg) {
            ("skeleton", Message::Skeleton(skel)) => {
                self.buffer_size = Some(skel.stream_size());
                self.skeleton = Some(skel.clone());
                Ok(())
            }
            ("buffer_size", Message::BufferSize(size)) => {
                self.buffer_size = Some(*size);
                Ok(())
            }
            _ => Err(GraphError::NoSuchPort(port.to_string())),
        }
    }

    pub fn execute(&self, ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
        let mut map = OutputMap::with_capacity(1);
        let Some(skeleton) = &self.skeleton else {
            map.insert("out".to_string(), DataValue::Stream(StreamBuffer::null()));
            return Ok(map);
        };
        let expected = self.buffer_size.unwrap_or(skeleton.stream_size());
        let out = match ctx.staged() {
            Some(DataValue::Stream(staged)) => {
                if staged.data.len() != expected {
                    return Err(GraphError::BufferLengthMismatch {
                        expected,
                        got: staged.data.len(),
                    });
                }
                StreamBuffer {
                    skeleton: Some(skeleton.clone()),
                    data: staged.data.clone(),
                }
            }
            _ => StreamBuffer::bind_pose(skeleton.clone()),
        };
        map.insert("out".to_string(), DataValue::Stream(out));
        Ok(map)
    }
}

/// Publishes a host-staged transform (constraint sources, IK targets and
/// hints). Identity when nothing has been staged yet.
#[derive(Debug, Default)]
pub struct TransformSourceNode;

impl TransformSourceNode {
    pub fn execute(&self, ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
        let transform = match ctx.staged() {
            Some(DataValue::Transform(t)) => *t,
            _ => animrig_api_core::Transform::IDENTITY,
        };
        let mut map = OutputMap::with_capacity(1);
        map.insert("out".to_string(), DataValue::Transform(transform));
        Ok(map)
    }
}
