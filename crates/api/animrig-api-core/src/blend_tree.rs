//! Blend tree assets: how multiple motions combine into one output based on
//! one or two scalar parameters.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clip::Clip;
use crate::error::AssetError;

/// Where a motion slot gets its stream from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MotionSource {
    Clip(Arc<Clip>),
    Tree(Arc<BlendTree>),
}

/// One motion slot of a blend tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Motion {
    pub source: MotionSource,
    /// Playback speed; effective duration is `source duration / speed`.
    pub speed: f32,
    /// 1D selection threshold (ascending across motions).
    #[serde(default)]
    pub threshold: f32,
    /// 2D selection direction (not required to be unit or evenly spaced).
    #[serde(default)]
    pub direction: [f32; 2],
}

/// Dimensionality of the selection parameter.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlendTreeKind {
    /// Scalar parameter against ascending thresholds.
    Simple1d,
    /// 2D parameter against per-motion direction vectors.
    SimpleDirectional2d,
}

/// Immutable blend tree asset. Nested trees are shared by `Arc`, like every
/// other asset reference.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlendTree {
    pub name: String,
    pub kind: BlendTreeKind,
    /// Blend parameter name(s) driving selection: `[p]` for 1D, `[x, y]`
    /// for 2D.
    pub parameters: Vec<String>,
    pub motions: Vec<Motion>,
}

impl BlendTree {
    /// Validate parameter arity, motion count, and 1D threshold ordering
    /// (recursively for nested trees).
    pub fn validate(&self) -> Result<(), AssetError> {
        let invalid = |reason: String| AssetError::InvalidBlendTree {
            tree: self.name.clone(),
            reason,
        };
        if self.motions.is_empty() {
            return Err(invalid("no motions".into()));
        }
        let expected_params = match self.kind {
            BlendTreeKind::Simple1d => 1,
            BlendTreeKind::SimpleDirectional2d => 2,
        };
        if self.parameters.len() != expected_params {
            return Err(invalid(format!(
                "expected {} parameter(s), got {}",
                expected_params,
                self.parameters.len()
            )));
        }
        if self.kind == BlendTreeKind::Simple1d {
            for pair in self.motions.windows(2) {
                if pair[1].threshold < pair[0].threshold {
                    return Err(invalid("1D thresholds must be ascending".into()));
                }
            }
        }
        for motion in &self.motions {
            if !(motion.speed > 0.0) {
                return Err(invalid("motion speed must be > 0".into()));
            }
            match &motion.source {
                MotionSource::Clip(clip) => clip.validate()?,
                MotionSource::Tree(tree) => tree.validate()?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::ChannelKind;
    use crate::clip::ClipTrack;

    fn clip() -> Arc<Clip> {
        Arc::new(Clip {
            name: "c".into(),
            duration: 1.0,
            sample_rate: 1.0,
            tracks: vec![ClipTrack {
                target: "root".into(),
                kind: ChannelKind::Translation,
                frames: vec![0.0; 6],
            }],
        })
    }

    fn motion(threshold: f32) -> Motion {
        Motion {
            source: MotionSource::Clip(clip()),
            speed: 1.0,
            threshold,
            direction: [0.0, 0.0],
        }
    }

    #[test]
    fn validates_threshold_order() {
        let tree = BlendTree {
            name: "t".into(),
            kind: BlendTreeKind::Simple1d,
            parameters: vec!["speed".into()],
            motions: vec![motion(0.0), motion(2.0), motion(1.0)],
        };
        assert!(matches!(
            tree.validate(),
            Err(AssetError::InvalidBlendTree { .. })
        ));
    }

    #[test]
    fn validates_parameter_arity() {
        let tree = BlendTree {
            name: "t".into(),
            kind: BlendTreeKind::SimpleDirectional2d,
            parameters: vec!["x".into()],
            motions: vec![motion(0.0)],
        };
        assert!(tree.validate().is_err());
    }
}
