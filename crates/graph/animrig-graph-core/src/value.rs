//! Kernel-phase port values.
//!
//! Streams are owned, stream-sized `Vec<f32>` buffers tagged with the
//! skeleton they are laid out for. A null stream (no skeleton, empty data)
//! is the explicit "no change yet" value forwarded by nodes whose
//! configuration is still incomplete; every consumer checks for it before
//! channel access.

use std::sync::Arc;

use animrig_api_core::{SkeletonDefinition, Transform};

use crate::port::TypeTag;

/// One skeleton instance's channel buffer flowing through a data port.
#[derive(Clone, Debug, Default)]
pub struct StreamBuffer {
    pub skeleton: Option<Arc<SkeletonDefinition>>,
    pub data: Vec<f32>,
}

impl StreamBuffer {
    /// The explicit "no skeleton bound yet" stream.
    pub fn null() -> Self {
        StreamBuffer::default()
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.skeleton.is_none()
    }

    /// Allocate a bind-pose stream for `skeleton`.
    pub fn bind_pose(skeleton: Arc<SkeletonDefinition>) -> Self {
        let mut data = vec![0.0; skeleton.stream_size()];
        skeleton.write_bind_pose(&mut data);
        StreamBuffer {
            skeleton: Some(skeleton),
            data,
        }
    }
}

/// Value carried by a data port for one evaluation.
#[derive(Clone, Debug)]
pub enum DataValue {
    Float(f32),
    Bool(bool),
    Transform(Transform),
    Stream(StreamBuffer),
}

impl DataValue {
    #[inline]
    pub fn tag(&self) -> TypeTag {
        match self {
            DataValue::Float(_) => TypeTag::Float,
            DataValue::Bool(_) => TypeTag::Bool,
            DataValue::Transform(_) => TypeTag::Transform,
            DataValue::Stream(_) => TypeTag::Stream,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            DataValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_transform(&self) -> Option<&Transform> {
        match self {
            DataValue::Transform(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&StreamBuffer> {
        match self {
            DataValue::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_stream(self) -> Option<StreamBuffer> {
        match self {
            DataValue::Stream(s) => Some(s),
            _ => None,
        }
    }
}
