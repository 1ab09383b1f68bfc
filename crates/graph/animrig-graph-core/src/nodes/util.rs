//! Utility node kinds: constants, pass-throughs, arithmetic, time, mixers.

use animrig_api_core::math::{lerp_f32, normalize4};
use animrig_api_core::{SkeletonDefinition, StreamView, StreamViewMut};

use crate::error::GraphError;
use crate::graph::{KernelCtx, OutputMap};
use crate::message::Message;
use crate::port::{NodeDescriptor, PortDef, TypeTag};
use crate::value::{DataValue, StreamBuffer};

pub static FLOAT_CONSTANT: NodeDescriptor = NodeDescriptor {
    name: "float_constant",
    ports: &[
        PortDef::msg_in("value", TypeTag::Float),
        PortDef::data_out("out", TypeTag::Float),
    ],
};

pub static FLOAT_PASS_THROUGH: NodeDescriptor = NodeDescriptor {
    name: "float_pass_through",
    ports: &[
        PortDef::data_in("in", TypeTag::Float),
        PortDef::data_out("out", TypeTag::Float),
    ],
};

pub static PASS_THROUGH: NodeDescriptor = NodeDescriptor {
    name: "pass_through",
    ports: &[
        PortDef::data_in("in", TypeTag::Stream),
        PortDef::data_out("out", TypeTag::Stream),
    ],
};

pub static TIME: NodeDescriptor = NodeDescriptor {
    name: "time",
    ports: &[
        PortDef::data_out("time", TypeTag::Float),
        PortDef::data_out("dt", TypeTag::Float),
    ],
};

pub static FLOAT_ADD: NodeDescriptor = NodeDescriptor {
    name: "float_add",
    ports: &[
        PortDef::data_in("lhs", TypeTag::Float),
        PortDef::data_in("rhs", TypeTag::Float),
        PortDef::data_out("out", TypeTag::Float),
    ],
};

pub static FLOAT_SCALE: NodeDescriptor = NodeDescriptor {
    name: "float_scale",
    ports: &[
        PortDef::msg_in("factor", TypeTag::Float),
        PortDef::data_in("in", TypeTag::Float),
        PortDef::data_out("out", TypeTag::Float),
    ],
};

pub static MIXER: NodeDescriptor = NodeDescriptor {
    name: "mixer",
    ports: &[
        PortDef::data_in("lhs", TypeTag::Stream),
        PortDef::data_in("rhs", TypeTag::Stream),
        PortDef::data_in("weight", TypeTag::Float),
        PortDef::data_out("out", TypeTag::Stream),
    ],
};

pub static ADDITIVE_MIXER: NodeDescriptor = NodeDescriptor {
    name: "additive_mixer",
    ports: &[
        PortDef::data_in("base", TypeTag::Stream),
        PortDef::data_in("additive", TypeTag::Stream),
        PortDef::data_in("weight", TypeTag::Float),
        PortDef::data_out("out", TypeTag::Stream),
    ],
};

pub static N_MIXER: NodeDescriptor = NodeDescriptor {
    name: "n_mixer",
    ports: &[
        PortDef::msg_in("weights", TypeTag::Floats),
        PortDef::data_in_array("sources", TypeTag::Stream),
        PortDef::data_out("out", TypeTag::Stream),
    ],
};

fn single(value: DataValue) -> OutputMap {
    let mut map = OutputMap::with_capacity(1);
    map.insert("out".to_string(), value);
    map
}

/// Constant float whose value arrives as configuration.
#[derive(Debug, Default)]
pub struct FloatConstantNode {
    pub value: f32,
}

impl FloatConstantNode {
    pub fn on_message(&mut self, port: &str, msg: &Message) -> Result<(), GraphError> {
        match (port, msg) {
            ("value", Message::Float(v)) => {
                self.value = *v;
                Ok(())
            }
            _ => Err(GraphError::NoSuchPort(port.to_string())),
        }
    }

    pub fn execute(&self) -> Result<OutputMap, GraphError> {
        Ok(single(DataValue::Float(self.value)))
    }
}

/// Multiply the input by a configured factor.
#[derive(Debug, Default)]
pub struct FloatScaleNode {
    pub factor: f32,
}

impl FloatScaleNode {
    pub fn on_message(&mut self, port: &str, msg: &Message) -> Result<(), GraphError> {
        match (port, msg) {
            ("factor", Message::Float(v)) => {
                self.factor = *v;
                Ok(())
            }
            _ => Err(GraphError::NoSuchPort(port.to_string())),
        }
    }

    pub fn execute(&self, ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
        Ok(single(DataValue::Float(
            ctx.float_or("in", 0.0) * self.factor,
        )))
    }
}

pub fn float_pass_through(ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
    Ok(single(DataValue::Float(ctx.float_or("in", 0.0))))
}

pub fn pass_through(ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
    Ok(single(DataValue::Stream(ctx.stream_or_null("in"))))
}

pub fn time(ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
    let mut map = OutputMap::with_capacity(2);
    map.insert("time".to_string(), DataValue::Float(ctx.t));
    map.insert("dt".to_string(), DataValue::Float(ctx.dt));
    Ok(map)
}

pub fn float_add(ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
    Ok(single(DataValue::Float(
        ctx.float_or("lhs", 0.0) + ctx.float_or("rhs", 0.0),
    )))
}

/// Two-way stream lerp. A null side passes the other through unchanged.
pub fn mixer(ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
    let lhs = ctx.stream_or_null("lhs");
    let rhs = ctx.stream_or_null("rhs");
    let weight = ctx.float_or("weight", 0.0).clamp(0.0, 1.0);
    let out = match (lhs.is_null(), rhs.is_null()) {
        (true, true) => StreamBuffer::null(),
        (false, true) => lhs,
        (true, false) => rhs,
        (false, false) => {
            check_same_layout(&lhs, &rhs)?;
            blend_pair(&lhs, &rhs, weight)
        }
    };
    Ok(single(DataValue::Stream(out)))
}

/// Apply a weighted additive stream on top of a base stream.
pub fn additive_mixer(ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
    let base = ctx.stream_or_null("base");
    let additive = ctx.stream_or_null("additive");
    let weight = ctx.float_or("weight", 0.0);
    if base.is_null() || additive.is_null() || weight == 0.0 {
        return Ok(single(DataValue::Stream(base)));
    }
    check_same_layout(&base, &additive)?;
    let Some(skeleton) = base.skeleton.clone() else {
        return Ok(single(DataValue::Stream(base)));
    };
    let mut out = base.clone();
    {
        let add_view = StreamView::bind(&skeleton, &additive.data)
            .map_err(|_| length_error(&skeleton, additive.data.len()))?;
        let mut view = StreamViewMut::bind(&skeleton, &mut out.data)
            .map_err(|_| length_error(&skeleton, base.data.len()))?;
        for bone in 0..skeleton.bone_count() as usize {
            let t = view.translation(bone);
            let add_t = add_view.translation(bone);
            view.set_translation(
                bone,
                [
                    t[0] + add_t[0] * weight,
                    t[1] + add_t[1] * weight,
                    t[2] + add_t[2] * weight,
                ],
            );
            let delta = animrig_api_core::math::quat_scale_angle(add_view.rotation(bone), weight);
            view.set_rotation(
                bone,
                animrig_api_core::math::quat_mul(view.rotation(bone), delta),
            );
            let s = view.scale(bone);
            let add_s = add_view.scale(bone);
            view.set_scale(
                bone,
                [
                    s[0] * lerp_f32(1.0, add_s[0], weight),
                    s[1] * lerp_f32(1.0, add_s[1], weight),
                    s[2] * lerp_f32(1.0, add_s[2], weight),
                ],
            );
        }
    }
    Ok(single(DataValue::Stream(out)))
}

/// N-way stream mixer. Weights arrive as configuration (pushed by blend
/// trees on every recompute); they are renormalized over the sources that
/// are actually connected and non-null for this evaluation.
#[derive(Debug, Default)]
pub struct NMixerNode {
    pub weights: Vec<f32>,
}

impl NMixerNode {
    pub fn on_message(&mut self, port: &str, msg: &Message) -> Result<(), GraphError> {
        match (port, msg) {
            ("weights", Message::Floats(ws)) => {
                self.weights = ws.clone();
                Ok(())
            }
            _ => Err(GraphError::NoSuchPort(port.to_string())),
        }
    }

    pub fn execute(&self, ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
        let sources = ctx.array("sources");
        let mut contributions: Vec<(&StreamBuffer, f32)> = Vec::new();
        for (i, slot) in sources.iter().enumerate() {
            let weight = self.weights.get(i).copied().unwrap_or(0.0);
            if weight <= 0.0 {
                continue;
            }
            if let Some(stream) = slot.as_ref().and_then(|v| v.as_stream()) {
                if !stream.is_null() {
                    contributions.push((stream, weight));
                }
            }
        }
        if contributions.is_empty() {
            return Ok(single(DataValue::Stream(StreamBuffer::null())));
        }

        let total: f32 = contributions.iter().map(|(_, w)| w).sum();
        let Some(skeleton) = contributions[0].0.skeleton.clone() else {
            return Ok(single(DataValue::Stream(StreamBuffer::null())));
        };
        for (stream, _) in &contributions {
            check_same_layout(contributions[0].0, *stream)?;
        }

        // Weighted accumulate: components sum per channel, quaternions are
        // aligned to the first contributor's hemisphere and renormalized.
        let len = contributions[0].0.data.len();
        let mut data = vec![0.0f32; len];
        for (stream, weight) in &contributions {
            let w = weight / total;
            for (acc, v) in data.iter_mut().zip(stream.data.iter()) {
                *acc += v * w;
            }
        }
        let mut out = StreamBuffer {
            skeleton: Some(skeleton.clone()),
            data,
        };
        fixup_accumulated(&skeleton, &mut out, &contributions);
        Ok(single(DataValue::Stream(out)))
    }
}

/// Re-normalize accumulated rotation channels and re-run hemisphere
/// alignment against the dominant contributor.
fn fixup_accumulated(
    skeleton: &SkeletonDefinition,
    out: &mut StreamBuffer,
    contributions: &[(&StreamBuffer, f32)],
) {
    let reference = contributions[0].0;
    let total: f32 = contributions.iter().map(|(_, w)| w).sum();
    let ref_view = match StreamView::bind(skeleton, &reference.data) {
        Ok(v) => v,
        Err(_) => return,
    };
    // Recompute rotations with shortest-arc alignment; a plain component sum
    // of opposing hemispheres would cancel out.
    let bone_count = skeleton.bone_count() as usize;
    let mut rotations = vec![[0.0f32; 4]; bone_count];
    for (stream, weight) in contributions {
        let view = match StreamView::bind(skeleton, &stream.data) {
            Ok(v) => v,
            Err(_) => return,
        };
        let w = weight / total;
        for (bone, acc) in rotations.iter_mut().enumerate() {
            let mut q = view.rotation(bone);
            let reference_q = ref_view.rotation(bone);
            if animrig_api_core::math::dot4(q, reference_q) < 0.0 {
                q = [-q[0], -q[1], -q[2], -q[3]];
            }
            for (a, b) in acc.iter_mut().zip(q.iter()) {
                *a += b * w;
            }
        }
    }
    // Step channels never blend: take them from the dominant contributor.
    let dominant = contributions
        .iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(s, _)| *s)
        .unwrap_or(reference);
    let dominant_view = match StreamView::bind(skeleton, &dominant.data) {
        Ok(v) => v,
        Err(_) => return,
    };
    if let Ok(mut view) = StreamViewMut::bind(skeleton, &mut out.data) {
        for (bone, q) in rotations.into_iter().enumerate() {
            view.set_rotation(bone, normalize4(q));
        }
        for idx in 0..skeleton.int_channel_count() {
            view.set_int(idx, dominant_view.int(idx));
        }
    }
}

fn blend_pair(lhs: &StreamBuffer, rhs: &StreamBuffer, weight: f32) -> StreamBuffer {
    let Some(skeleton) = lhs.skeleton.clone() else {
        return StreamBuffer::null();
    };
    let mut data: Vec<f32> = lhs
        .data
        .iter()
        .zip(rhs.data.iter())
        .map(|(a, b)| lerp_f32(*a, *b, weight))
        .collect();
    if let (Ok(a), Ok(b)) = (
        StreamView::bind(&skeleton, &lhs.data),
        StreamView::bind(&skeleton, &rhs.data),
    ) {
        let mut scratch = std::mem::take(&mut data);
        if let Ok(mut view) = StreamViewMut::bind(&skeleton, &mut scratch) {
            for bone in 0..skeleton.bone_count() as usize {
                view.set_rotation(
                    bone,
                    animrig_api_core::math::nlerp_quat(a.rotation(bone), b.rotation(bone), weight),
                );
            }
        }
        data = scratch;
    }
    StreamBuffer {
        skeleton: Some(skeleton),
        data,
    }
}

fn check_same_layout(a: &StreamBuffer, b: &StreamBuffer) -> Result<(), GraphError> {
    if a.data.len() != b.data.len() {
        return Err(GraphError::BufferLengthMismatch {
            expected: a.data.len(),
            got: b.data.len(),
        });
    }
    Ok(())
}

fn length_error(skeleton: &SkeletonDefinition, got: usize) -> GraphError {
    GraphError::BufferLengthMismatch {
        expected: skeleton.stream_size(),
        got,
    }
}
