//! Shared fixture builders for animrig test suites.
//!
//! Assets here are tiny and assembled programmatically; every builder
//! validates what it returns so a broken fixture fails loudly at the call
//! site instead of deep inside an evaluation.

use std::sync::Arc;

use anyhow::{Context, Result};

use animrig_api_core::blend_tree::{BlendTree, BlendTreeKind, Motion, MotionSource};
use animrig_api_core::clip::{Clip, ClipTrack};
use animrig_api_core::math::quat_axis_angle;
use animrig_api_core::skeleton::{ChannelKind, SkeletonBuilder, SkeletonDefinition};
use animrig_api_core::transform::Transform;

/// A straight chain of `n` bones spaced one unit along +Y: root, bone1,
/// bone2, ...
pub fn chain_skeleton(n: usize) -> Result<Arc<SkeletonDefinition>> {
    let mut builder = SkeletonBuilder::new().bone("root", -1, Transform::IDENTITY);
    for i in 1..n {
        builder = builder.bone(
            format!("bone{i}"),
            i as i32 - 1,
            Transform::from_translation([0.0, 1.0, 0.0]),
        );
    }
    let skeleton = builder.build().context("chain skeleton should build")?;
    Ok(Arc::new(skeleton))
}

/// One-second clip translating the root from the origin to `end`.
pub fn root_translation_clip(name: &str, end: [f32; 3]) -> Result<Arc<Clip>> {
    let clip = Clip {
        name: name.to_string(),
        duration: 1.0,
        sample_rate: 1.0,
        tracks: vec![ClipTrack {
            target: "root".into(),
            kind: ChannelKind::Translation,
            frames: vec![0.0, 0.0, 0.0, end[0], end[1], end[2]],
        }],
    };
    clip.validate().context("translation clip should validate")?;
    Ok(Arc::new(clip))
}

/// One-second clip rotating `bone` around Z from identity to `angle`.
pub fn bone_rotation_clip(name: &str, bone: &str, angle: f32) -> Result<Arc<Clip>> {
    let q = quat_axis_angle([0.0, 0.0, 1.0], angle);
    let clip = Clip {
        name: name.to_string(),
        duration: 1.0,
        sample_rate: 1.0,
        tracks: vec![ClipTrack {
            target: bone.to_string(),
            kind: ChannelKind::Rotation,
            frames: vec![0.0, 0.0, 0.0, 1.0, q[0], q[1], q[2], q[3]],
        }],
    };
    clip.validate().context("rotation clip should validate")?;
    Ok(Arc::new(clip))
}

/// 1D blend tree over clips with the given thresholds.
pub fn blend_tree_1d(
    name: &str,
    parameter: &str,
    motions: Vec<(Arc<Clip>, f32)>,
) -> Result<Arc<BlendTree>> {
    let tree = BlendTree {
        name: name.to_string(),
        kind: BlendTreeKind::Simple1d,
        parameters: vec![parameter.to_string()],
        motions: motions
            .into_iter()
            .map(|(clip, threshold)| Motion {
                source: MotionSource::Clip(clip),
                speed: 1.0,
                threshold,
                direction: [0.0, 0.0],
            })
            .collect(),
    };
    tree.validate().context("1D blend tree should validate")?;
    Ok(Arc::new(tree))
}

/// 2D simple-directional blend tree over clips with the given directions.
pub fn blend_tree_2d(
    name: &str,
    parameters: (&str, &str),
    motions: Vec<(Arc<Clip>, [f32; 2])>,
) -> Result<Arc<BlendTree>> {
    let tree = BlendTree {
        name: name.to_string(),
        kind: BlendTreeKind::SimpleDirectional2d,
        parameters: vec![parameters.0.to_string(), parameters.1.to_string()],
        motions: motions
            .into_iter()
            .map(|(clip, direction)| Motion {
                source: MotionSource::Clip(clip),
                speed: 1.0,
                threshold: 0.0,
                direction,
            })
            .collect(),
    };
    tree.validate().context("2D blend tree should validate")?;
    Ok(Arc::new(tree))
}

/// Nest a tree as one motion of an outer 1D tree alongside a clip.
pub fn nested_tree(
    name: &str,
    parameter: &str,
    clip: Arc<Clip>,
    inner: Arc<BlendTree>,
) -> Result<Arc<BlendTree>> {
    let tree = BlendTree {
        name: name.to_string(),
        kind: BlendTreeKind::Simple1d,
        parameters: vec![parameter.to_string()],
        motions: vec![
            Motion {
                source: MotionSource::Clip(clip),
                speed: 1.0,
                threshold: 0.0,
                direction: [0.0, 0.0],
            },
            Motion {
                source: MotionSource::Tree(inner),
                speed: 1.0,
                threshold: 1.0,
                direction: [0.0, 0.0],
            },
        ],
    };
    tree.validate().context("nested tree should validate")?;
    Ok(Arc::new(tree))
}
