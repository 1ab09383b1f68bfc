//! animrig-api-core: shared data model for the animrig runtime (engine-agnostic).
//!
//! Defines the immutable skeleton description, the flat-buffer animation
//! stream views bound to it, sampled clip and blend-tree assets, and the TRS
//! transform math everything else composes with.

pub mod blend_tree;
pub mod clip;
pub mod error;
pub mod math;
pub mod skeleton;
pub mod stream;
pub mod transform;

pub use blend_tree::{BlendTree, BlendTreeKind, Motion, MotionSource};
pub use clip::{Clip, ClipTrack};
pub use error::{AssetError, StreamError};
pub use skeleton::{ChannelBinding, ChannelKind, SkeletonBuilder, SkeletonDefinition};
pub use stream::{StreamView, StreamViewMut};
pub use transform::Transform;
