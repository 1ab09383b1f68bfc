//! Immutable skeleton description: bone hierarchy, channel layout, bind pose.
//!
//! A `SkeletonDefinition` is created once at import time and shared by
//! reference (`Arc`) between every stream and node that targets it. The flat
//! stream layout it describes is:
//!
//! ```text
//! [ translations (3 per bone) | rotations (4 per bone) | scales (3 per bone)
//!   | named floats (1 each)   | named ints (1 each) ]
//! ```

use serde::{Deserialize, Serialize};

use crate::error::AssetError;
use crate::transform::Transform;

/// Which logical channel a binding refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Translation,
    Rotation,
    Scale,
    Float,
    Int,
}

impl ChannelKind {
    /// Number of floats one element of this channel occupies in the stream.
    #[inline]
    pub fn width(self) -> usize {
        match self {
            ChannelKind::Translation | ChannelKind::Scale => 3,
            ChannelKind::Rotation => 4,
            ChannelKind::Float | ChannelKind::Int => 1,
        }
    }
}

/// Resolved location of one logical channel in the flat buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelBinding {
    pub kind: ChannelKind,
    pub offset: usize,
    pub count: usize,
}

/// Immutable bone hierarchy plus channel layout shared by all instances of a
/// rig.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SkeletonDefinition {
    bone_names: Vec<String>,
    parent_indices: Vec<i32>,
    bind_pose: Vec<Transform>,
    float_channels: Vec<String>,
    int_channels: Vec<String>,
    stream_size: usize,
}

impl SkeletonDefinition {
    #[inline]
    pub fn bone_count(&self) -> u32 {
        self.bone_names.len() as u32
    }

    #[inline]
    pub fn parent(&self, bone: usize) -> i32 {
        self.parent_indices[bone]
    }

    #[inline]
    pub fn parent_indices(&self) -> &[i32] {
        &self.parent_indices
    }

    pub fn bone_name(&self, bone: usize) -> &str {
        &self.bone_names[bone]
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bone_names.iter().position(|n| n == name)
    }

    #[inline]
    pub fn bind_pose(&self, bone: usize) -> &Transform {
        &self.bind_pose[bone]
    }

    #[inline]
    pub fn stream_size(&self) -> usize {
        self.stream_size
    }

    pub fn float_channel_index(&self, name: &str) -> Option<usize> {
        self.float_channels.iter().position(|n| n == name)
    }

    pub fn int_channel_index(&self, name: &str) -> Option<usize> {
        self.int_channels.iter().position(|n| n == name)
    }

    #[inline]
    pub fn float_channel_count(&self) -> usize {
        self.float_channels.len()
    }

    #[inline]
    pub fn int_channel_count(&self) -> usize {
        self.int_channels.len()
    }

    #[inline]
    pub(crate) fn translation_offset(&self, bone: usize) -> usize {
        bone * 3
    }

    #[inline]
    pub(crate) fn rotation_offset(&self, bone: usize) -> usize {
        self.bone_names.len() * 3 + bone * 4
    }

    #[inline]
    pub(crate) fn scale_offset(&self, bone: usize) -> usize {
        self.bone_names.len() * 7 + bone * 3
    }

    #[inline]
    pub(crate) fn float_offset(&self, idx: usize) -> usize {
        self.bone_names.len() * 10 + idx
    }

    #[inline]
    pub(crate) fn int_offset(&self, idx: usize) -> usize {
        self.bone_names.len() * 10 + self.float_channels.len() + idx
    }

    /// Look up the binding for a logical channel of a named bone or a named
    /// float/int channel.
    pub fn channel_binding(&self, kind: ChannelKind, name: &str) -> Option<ChannelBinding> {
        let offset = match kind {
            ChannelKind::Translation => self.translation_offset(self.bone_index(name)?),
            ChannelKind::Rotation => self.rotation_offset(self.bone_index(name)?),
            ChannelKind::Scale => self.scale_offset(self.bone_index(name)?),
            ChannelKind::Float => self.float_offset(self.float_channel_index(name)?),
            ChannelKind::Int => self.int_offset(self.int_channel_index(name)?),
        };
        Some(ChannelBinding {
            kind,
            offset,
            count: kind.width(),
        })
    }

    /// Fill a stream-sized buffer with the bind pose (named channels zeroed).
    pub fn write_bind_pose(&self, buffer: &mut [f32]) {
        debug_assert_eq!(buffer.len(), self.stream_size);
        buffer.fill(0.0);
        for (bone, bind) in self.bind_pose.iter().enumerate() {
            let t = self.translation_offset(bone);
            buffer[t..t + 3].copy_from_slice(&bind.translation);
            let r = self.rotation_offset(bone);
            buffer[r..r + 4].copy_from_slice(&bind.rotation);
            let s = self.scale_offset(bone);
            buffer[s..s + 3].copy_from_slice(&bind.scale);
        }
    }
}

/// Builder validating the parent-before-child invariant and computing the
/// stream layout.
#[derive(Default, Debug)]
pub struct SkeletonBuilder {
    bones: Vec<(String, i32, Transform)>,
    float_channels: Vec<String>,
    int_channels: Vec<String>,
}

impl SkeletonBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bone. `parent` is an index into previously added bones, or -1
    /// for a root.
    pub fn bone(mut self, name: impl Into<String>, parent: i32, bind: Transform) -> Self {
        self.bones.push((name.into(), parent, bind));
        self
    }

    pub fn float_channel(mut self, name: impl Into<String>) -> Self {
        self.float_channels.push(name.into());
        self
    }

    pub fn int_channel(mut self, name: impl Into<String>) -> Self {
        self.int_channels.push(name.into());
        self
    }

    pub fn build(self) -> Result<SkeletonDefinition, AssetError> {
        if self.bones.is_empty() {
            return Err(AssetError::EmptySkeleton);
        }
        let mut bone_names = Vec::with_capacity(self.bones.len());
        let mut parent_indices = Vec::with_capacity(self.bones.len());
        let mut bind_pose = Vec::with_capacity(self.bones.len());
        for (i, (name, parent, bind)) in self.bones.into_iter().enumerate() {
            if parent >= i as i32 || parent < -1 {
                return Err(AssetError::ParentOrder { bone: i, parent });
            }
            if bone_names.contains(&name) {
                return Err(AssetError::DuplicateBoneName(name));
            }
            bone_names.push(name);
            parent_indices.push(parent);
            bind_pose.push(bind);
        }
        let bone_count = bone_names.len();
        let stream_size = bone_count * 10 + self.float_channels.len() + self.int_channels.len();
        Ok(SkeletonDefinition {
            bone_names,
            parent_indices,
            bind_pose,
            float_channels: self.float_channels,
            int_channels: self.int_channels,
            stream_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_computes_layout() {
        let skel = SkeletonBuilder::new()
            .bone("root", -1, Transform::IDENTITY)
            .bone("spine", 0, Transform::IDENTITY)
            .float_channel("blink")
            .int_channel("state")
            .build()
            .unwrap();
        assert_eq!(skel.bone_count(), 2);
        // 2 bones * 10 floats + 1 float + 1 int
        assert_eq!(skel.stream_size(), 22);
        let b = skel
            .channel_binding(ChannelKind::Rotation, "spine")
            .unwrap();
        assert_eq!(b.offset, 2 * 3 + 4);
        assert_eq!(b.count, 4);
        let f = skel.channel_binding(ChannelKind::Float, "blink").unwrap();
        assert_eq!(f.offset, 20);
    }

    #[test]
    fn it_should_reject_child_before_parent() {
        let err = SkeletonBuilder::new()
            .bone("root", 0, Transform::IDENTITY)
            .build()
            .unwrap_err();
        assert!(matches!(err, AssetError::ParentOrder { bone: 0, .. }));
    }

    #[test]
    fn it_should_reject_duplicate_names() {
        let err = SkeletonBuilder::new()
            .bone("a", -1, Transform::IDENTITY)
            .bone("a", 0, Transform::IDENTITY)
            .build()
            .unwrap_err();
        assert!(matches!(err, AssetError::DuplicateBoneName(_)));
    }
}
