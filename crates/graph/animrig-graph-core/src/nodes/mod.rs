//! Node kinds and their dispatch.
//!
//! Kinds are a tagged variant enum rather than trait objects: the engine
//! core only ever invokes `descriptor`, `state`, `on_message`, and `execute`
//! on whatever variant occupies a handle slot. Composite kinds (clip player,
//! blend tree) own child nodes and rebuild them from the configuration
//! phase; leaf kinds are pure kernels over their configuration snapshot.

pub mod blend;
pub mod clip_player;
pub mod constraint;
pub mod ik;
pub mod rootmotion;
pub mod sampler;
pub mod source;
pub mod timeops;
pub mod twist;
pub mod util;

use crate::error::GraphError;
use crate::graph::{ConfigCtx, KernelCtx, OutputMap};
use crate::message::Message;
use crate::port::NodeDescriptor;

pub use blend::BlendTreeNode;
pub use clip_player::ClipPlayerNode;
pub use constraint::{ConstraintFlavor, ConstraintNode};
pub use ik::TwoBoneIkNode;
pub use rootmotion::{
    CycleRootNode, DeltaRootNode, InPlaceNode, LoopValuesNode, VelocityRootNode,
};
pub use sampler::ClipSamplerNode;
pub use source::{StreamSourceNode, TransformSourceNode};
pub use timeops::{LoopTimeNode, NormalizedTimeNode};
pub use twist::TwistCorrectionNode;
pub use util::{FloatConstantNode, FloatScaleNode, NMixerNode};

/// Configuration lifecycle of a node.
///
/// Kernel evaluation of a node that is not yet `Evaluable` is a no-op that
/// forwards a null buffer, guarding downstream consumers from reading an
/// invalid stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeState {
    Uninitialized,
    Configured,
    Evaluable,
}

#[derive(Debug)]
pub enum NodeKind {
    // Utility
    FloatConstant(FloatConstantNode),
    FloatPassThrough,
    PassThrough,
    Time,
    FloatAdd,
    FloatScale(FloatScaleNode),
    Mixer,
    AdditiveMixer,
    NMixer(NMixerNode),

    // Sampling & time
    ClipSampler(ClipSamplerNode),
    NormalizedTime(NormalizedTimeNode),
    LoopTime(LoopTimeNode),

    // Root-motion stream ops
    LoopValues(LoopValuesNode),
    InPlace(InPlaceNode),
    CycleRoot(CycleRootNode),
    DeltaRootMotion(DeltaRootNode),
    VelocityRootMotion(VelocityRootNode),

    // Composites
    ClipPlayer(ClipPlayerNode),
    BlendTree(BlendTreeNode),

    // External input staging
    StreamSource(StreamSourceNode),
    TransformSource(TransformSourceNode),

    // Constraints / IK
    PositionConstraint(ConstraintNode),
    RotationConstraint(ConstraintNode),
    AimConstraint(ConstraintNode),
    ParentConstraint(ConstraintNode),
    TwoBoneIk(TwoBoneIkNode),
    TwistCorrection(TwistCorrectionNode),
}

impl NodeKind {
    pub fn float_constant() -> Self {
        NodeKind::FloatConstant(FloatConstantNode::default())
    }
    pub fn float_scale() -> Self {
        NodeKind::FloatScale(FloatScaleNode::default())
    }
    pub fn n_mixer() -> Self {
        NodeKind::NMixer(NMixerNode::default())
    }
    pub fn clip_sampler() -> Self {
        NodeKind::ClipSampler(ClipSamplerNode::default())
    }
    pub fn normalized_time() -> Self {
        NodeKind::NormalizedTime(NormalizedTimeNode::default())
    }
    pub fn loop_time() -> Self {
        NodeKind::LoopTime(LoopTimeNode::default())
    }
    pub fn clip_player() -> Self {
        NodeKind::ClipPlayer(ClipPlayerNode::default())
    }
    pub fn blend_tree() -> Self {
        NodeKind::BlendTree(BlendTreeNode::default())
    }
    pub fn stream_source() -> Self {
        NodeKind::StreamSource(StreamSourceNode::default())
    }
    pub fn transform_source() -> Self {
        NodeKind::TransformSource(TransformSourceNode)
    }
    pub fn position_constraint() -> Self {
        NodeKind::PositionConstraint(ConstraintNode::new(ConstraintFlavor::Position))
    }
    pub fn rotation_constraint() -> Self {
        NodeKind::RotationConstraint(ConstraintNode::new(ConstraintFlavor::Rotation))
    }
    pub fn aim_constraint() -> Self {
        NodeKind::AimConstraint(ConstraintNode::new(ConstraintFlavor::Aim))
    }
    pub fn parent_constraint() -> Self {
        NodeKind::ParentConstraint(ConstraintNode::new(ConstraintFlavor::Parent))
    }
    pub fn two_bone_ik() -> Self {
        NodeKind::TwoBoneIk(TwoBoneIkNode::default())
    }
    pub fn twist_correction() -> Self {
        NodeKind::TwistCorrection(TwistCorrectionNode::default())
    }

    pub fn descriptor(&self) -> &'static NodeDescriptor {
        match self {
            NodeKind::FloatConstant(_) => &util::FLOAT_CONSTANT,
            NodeKind::FloatPassThrough => &util::FLOAT_PASS_THROUGH,
            NodeKind::PassThrough => &util::PASS_THROUGH,
            NodeKind::Time => &util::TIME,
            NodeKind::FloatAdd => &util::FLOAT_ADD,
            NodeKind::FloatScale(_) => &util::FLOAT_SCALE,
            NodeKind::Mixer => &util::MIXER,
            NodeKind::AdditiveMixer => &util::ADDITIVE_MIXER,
            NodeKind::NMixer(_) => &util::N_MIXER,
            NodeKind::ClipSampler(_) => &sampler::CLIP_SAMPLER,
            NodeKind::NormalizedTime(_) => &timeops::NORMALIZED_TIME,
            NodeKind::LoopTime(_) => &timeops::LOOP_TIME,
            NodeKind::LoopValues(_) => &rootmotion::LOOP_VALUES,
            NodeKind::InPlace(_) => &rootmotion::IN_PLACE,
            NodeKind::CycleRoot(_) => &rootmotion::CYCLE_ROOT,
            NodeKind::DeltaRootMotion(_) => &rootmotion::DELTA_ROOT,
            NodeKind::VelocityRootMotion(_) => &rootmotion::VELOCITY_ROOT,
            NodeKind::ClipPlayer(_) => &clip_player::CLIP_PLAYER,
            NodeKind::BlendTree(_) => &blend::BLEND_TREE,
            NodeKind::StreamSource(_) => &source::STREAM_SOURCE,
            NodeKind::TransformSource(_) => &source::TRANSFORM_SOURCE,
            NodeKind::PositionConstraint(_) => &constraint::POSITION_CONSTRAINT,
            NodeKind::RotationConstraint(_) => &constraint::ROTATION_CONSTRAINT,
            NodeKind::AimConstraint(_) => &constraint::AIM_CONSTRAINT,
            NodeKind::ParentConstraint(_) => &constraint::PARENT_CONSTRAINT,
            NodeKind::TwoBoneIk(_) => &ik::TWO_BONE_IK,
            NodeKind::TwistCorrection(_) => &twist::TWIST_CORRECTION,
        }
    }

    pub fn state(&self) -> NodeState {
        match self {
            NodeKind::ClipSampler(n) => n.state(),
            NodeKind::ClipPlayer(n) => n.state(),
            NodeKind::BlendTree(n) => n.state(),
            NodeKind::StreamSource(n) => n.state(),
            NodeKind::PositionConstraint(n)
            | NodeKind::RotationConstraint(n)
            | NodeKind::AimConstraint(n)
            | NodeKind::ParentConstraint(n) => n.state(),
            NodeKind::TwoBoneIk(n) => n.state(),
            NodeKind::TwistCorrection(n) => n.state(),
            // Pure utilities are evaluable from creation.
            _ => NodeState::Evaluable,
        }
    }

    pub(crate) fn on_message(
        &mut self,
        ctx: &mut ConfigCtx<'_>,
        port: &str,
        element: u32,
        msg: &Message,
    ) -> Result<(), GraphError> {
        match self {
            NodeKind::FloatConstant(n) => n.on_message(port, msg),
            NodeKind::FloatScale(n) => n.on_message(port, msg),
            NodeKind::NMixer(n) => n.on_message(port, msg),
            NodeKind::ClipSampler(n) => n.on_message(port, msg),
            NodeKind::NormalizedTime(n) => n.on_message(port, msg),
            NodeKind::LoopTime(n) => n.on_message(port, msg),
            NodeKind::VelocityRootMotion(n) => n.on_message(port, msg),
            NodeKind::ClipPlayer(n) => n.on_message(ctx, port, msg),
            NodeKind::BlendTree(n) => n.on_message(ctx, port, element, msg),
            NodeKind::StreamSource(n) => n.on_message(port, msg),
            NodeKind::PositionConstraint(n)
            | NodeKind::RotationConstraint(n)
            | NodeKind::AimConstraint(n)
            | NodeKind::ParentConstraint(n) => n.on_message(port, msg),
            NodeKind::TwoBoneIk(n) => n.on_message(port, msg),
            NodeKind::TwistCorrection(n) => n.on_message(port, msg),
            // Remaining kinds have no message inputs.
            _ => Err(GraphError::NoSuchPort(port.to_string())),
        }
    }

    pub(crate) fn execute(&self, ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
        match self {
            NodeKind::FloatConstant(n) => n.execute(),
            NodeKind::FloatPassThrough => util::float_pass_through(ctx),
            NodeKind::PassThrough => util::pass_through(ctx),
            NodeKind::Time => util::time(ctx),
            NodeKind::FloatAdd => util::float_add(ctx),
            NodeKind::FloatScale(n) => n.execute(ctx),
            NodeKind::Mixer => util::mixer(ctx),
            NodeKind::AdditiveMixer => util::additive_mixer(ctx),
            NodeKind::NMixer(n) => n.execute(ctx),
            NodeKind::ClipSampler(n) => n.execute(ctx),
            NodeKind::NormalizedTime(n) => n.execute(ctx),
            NodeKind::LoopTime(n) => n.execute(ctx),
            NodeKind::LoopValues(n) => n.execute(ctx),
            NodeKind::InPlace(n) => n.execute(ctx),
            NodeKind::CycleRoot(n) => n.execute(ctx),
            NodeKind::DeltaRootMotion(n) => n.execute(ctx),
            NodeKind::VelocityRootMotion(n) => n.execute(ctx),
            NodeKind::StreamSource(n) => n.execute(ctx),
            NodeKind::TransformSource(n) => n.execute(ctx),
            NodeKind::PositionConstraint(n)
            | NodeKind::RotationConstraint(n)
            | NodeKind::AimConstraint(n)
            | NodeKind::ParentConstraint(n) => n.execute(ctx),
            NodeKind::TwoBoneIk(n) => n.execute(ctx),
            NodeKind::TwistCorrection(n) => n.execute(ctx),
            // Composites have no kernel; their ports forward to children.
            NodeKind::ClipPlayer(_) | NodeKind::BlendTree(_) => Ok(OutputMap::default()),
        }
    }

    /// Composites have no kernel of their own and are skipped by the
    /// scheduler.
    pub fn is_composite(&self) -> bool {
        matches!(self, NodeKind::ClipPlayer(_) | NodeKind::BlendTree(_))
    }
}
