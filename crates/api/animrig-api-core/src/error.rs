//! Error taxonomy shared across the workspace's core crates.

use thiserror::Error;

/// Failures binding or accessing an animation stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("stream buffer length {got} does not match skeleton stream size {expected}")]
    BufferLengthMismatch { expected: usize, got: usize },

    #[error("channel access on a null stream (no skeleton bound)")]
    NullStream,

    #[error("bone index {bone} out of range for skeleton with {bone_count} bones")]
    BoneOutOfRange { bone: i32, bone_count: u32 },

    #[error("unknown channel '{0}'")]
    UnknownChannel(String),
}

/// Failures validating immutable assets at load time.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AssetError {
    #[error("skeleton parent index {parent} of bone {bone} does not precede it")]
    ParentOrder { bone: usize, parent: i32 },

    #[error("skeleton has no bones")]
    EmptySkeleton,

    #[error("duplicate bone name '{0}'")]
    DuplicateBoneName(String),

    #[error("clip '{clip}': {reason}")]
    InvalidClip { clip: String, reason: String },

    #[error("blend tree '{tree}': {reason}")]
    InvalidBlendTree { tree: String, reason: String },
}
