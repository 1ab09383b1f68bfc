//! Configuration-phase messages and the records they carry.
//!
//! Messages are delivered synchronously from a FIFO work queue pumped to a
//! fixpoint per configuration event, never by recursive call-stack dispatch.
//! Handlers must be idempotent under repeated identical messages.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use animrig_api_core::{BlendTree, Clip, SkeletonDefinition, Transform};

use crate::port::TypeTag;

/// Feature flags steering a clip player's subgraph rebuild.
///
/// Flags compose: loop-value correction implies start/stop reference samples;
/// root-motion cycling implies loop time.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipConfigMask(pub u32);

impl ClipConfigMask {
    /// The time input is normalized [0, 1] and scaled by the clip duration.
    pub const NORMALIZED_TIME: ClipConfigMask = ClipConfigMask(1 << 0);
    /// Wrap time into the clip range instead of clamping.
    pub const LOOP_TIME: ClipConfigMask = ClipConfigMask(1 << 1);
    /// Correct the root so looped playback does not pop at the seam.
    pub const LOOP_VALUES: ClipConfigMask = ClipConfigMask(1 << 2);
    /// Accumulate the per-cycle root displacement across loops.
    pub const CYCLE_ROOT_MOTION: ClipConfigMask = ClipConfigMask(1 << 3);
    /// Replace the root with the per-frame delta since the previous sample.
    pub const DELTA_ROOT_MOTION: ClipConfigMask = ClipConfigMask(1 << 4);
    /// Pin the root translation in place (motion extraction).
    pub const IN_PLACE: ClipConfigMask = ClipConfigMask(1 << 5);
    /// Drive the root from a configured velocity instead of the clip.
    pub const ROOT_MOTION_FROM_VELOCITY: ClipConfigMask = ClipConfigMask(1 << 6);

    #[inline]
    pub fn contains(self, other: ClipConfigMask) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn union(self, other: ClipConfigMask) -> ClipConfigMask {
        ClipConfigMask(self.0 | other.0)
    }
}

/// One weighted source slot of a constraint. Live source transforms arrive
/// through the node's data port array; weights and offsets are configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSource {
    pub weight: f32,
    #[serde(default)]
    pub offset: Transform,
}

/// Configuration record shared by the aim/position/rotation/parent
/// constraint kernels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSetup {
    /// Constrained bone index.
    pub bone: i32,
    pub sources: Vec<ConstraintSource>,
    /// Local aim axis (aim constraint only).
    #[serde(default = "default_aim_axis")]
    pub aim_axis: [f32; 3],
}

fn default_aim_axis() -> [f32; 3] {
    [0.0, 1.0, 0.0]
}

/// Two-bone analytic IK chain configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IkSetup {
    pub root: i32,
    pub mid: i32,
    pub tip: i32,
    /// Blend of the target position onto the tip.
    pub position_weight: f32,
    /// Blend of the target rotation onto the tip.
    pub rotation_weight: f32,
}

/// Twist redistribution configuration. Weights may be negative to invert.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TwistSetup {
    /// Bone whose twist (relative to bind) is measured.
    pub source: i32,
    /// Local twist axis the delta rotation is projected onto.
    pub axis: [f32; 3],
    /// `(bone, fraction)` receivers of the projected twist.
    pub bones: Vec<(i32, f32)>,
}

/// Root velocity configuration for velocity-derived root motion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RootVelocity {
    pub linear: [f32; 3],
    pub angular_axis: [f32; 3],
    /// Radians per second around `angular_axis`.
    pub angular_speed: f32,
}

/// A discrete configuration value travelling through a message port.
#[derive(Clone, Debug)]
pub enum Message {
    Skeleton(Arc<SkeletonDefinition>),
    Clip(Arc<Clip>),
    BlendTree(Arc<BlendTree>),
    ClipConfig(ClipConfigMask),
    Bool(bool),
    Float(f32),
    Floats(Vec<f32>),
    Parameter { name: String, value: f32 },
    Duration(f32),
    SampleRate(f32),
    BufferSize(usize),
    ConstraintSetup(ConstraintSetup),
    IkSetup(IkSetup),
    TwistSetup(TwistSetup),
    RootVelocity(RootVelocity),
}

impl Message {
    #[inline]
    pub fn tag(&self) -> TypeTag {
        match self {
            Message::Skeleton(_) => TypeTag::Skeleton,
            Message::Clip(_) => TypeTag::Clip,
            Message::BlendTree(_) => TypeTag::BlendTree,
            Message::ClipConfig(_) => TypeTag::ClipConfig,
            Message::Bool(_) => TypeTag::Bool,
            Message::Float(_) => TypeTag::Float,
            Message::Floats(_) => TypeTag::Floats,
            Message::Parameter { .. } => TypeTag::Parameter,
            Message::Duration(_) => TypeTag::Duration,
            Message::SampleRate(_) => TypeTag::SampleRate,
            Message::BufferSize(_) => TypeTag::BufferSize,
            Message::ConstraintSetup(_) => TypeTag::ConstraintSetup,
            Message::IkSetup(_) => TypeTag::IkSetup,
            Message::TwistSetup(_) => TypeTag::TwistSetup,
            Message::RootVelocity(_) => TypeTag::RootVelocity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_config_masks_compose() {
        let mask = ClipConfigMask::LOOP_TIME.union(ClipConfigMask::LOOP_VALUES);
        assert!(mask.contains(ClipConfigMask::LOOP_TIME));
        assert!(mask.contains(ClipConfigMask::LOOP_VALUES));
        assert!(!mask.contains(ClipConfigMask::IN_PLACE));
    }

    #[test]
    fn setups_round_trip_via_json() {
        let setup = ConstraintSetup {
            bone: 3,
            sources: vec![ConstraintSource {
                weight: 0.5,
                offset: Default::default(),
            }],
            aim_axis: [0.0, 1.0, 0.0],
        };
        let json = serde_json::to_string(&setup).unwrap();
        let parsed: ConstraintSetup = serde_json::from_str(&json).unwrap();
        assert_eq!(setup, parsed);
    }
}
