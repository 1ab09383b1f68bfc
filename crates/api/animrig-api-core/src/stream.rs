//! Animation stream views: typed access over one skeleton instance's flat
//! channel buffer.
//!
//! Views are transient, valid for the duration of one evaluation, and never
//! own the buffer. Binding checks the buffer length against the skeleton's
//! stream size; everything after that is unchecked-by-construction offsets.

use crate::error::StreamError;
use crate::skeleton::SkeletonDefinition;
use crate::transform::Transform;

/// Read-only view over a bound stream buffer.
#[derive(Clone, Copy, Debug)]
pub struct StreamView<'a> {
    skeleton: &'a SkeletonDefinition,
    data: &'a [f32],
}

/// Mutable view over a bound stream buffer.
pub struct StreamViewMut<'a> {
    skeleton: &'a SkeletonDefinition,
    data: &'a mut [f32],
}

impl<'a> StreamView<'a> {
    pub fn bind(skeleton: &'a SkeletonDefinition, data: &'a [f32]) -> Result<Self, StreamError> {
        if data.len() != skeleton.stream_size() {
            return Err(StreamError::BufferLengthMismatch {
                expected: skeleton.stream_size(),
                got: data.len(),
            });
        }
        Ok(StreamView { skeleton, data })
    }

    #[inline]
    pub fn skeleton(&self) -> &'a SkeletonDefinition {
        self.skeleton
    }

    #[inline]
    pub fn translation(&self, bone: usize) -> [f32; 3] {
        let o = self.skeleton.translation_offset(bone);
        [self.data[o], self.data[o + 1], self.data[o + 2]]
    }

    #[inline]
    pub fn rotation(&self, bone: usize) -> [f32; 4] {
        let o = self.skeleton.rotation_offset(bone);
        [
            self.data[o],
            self.data[o + 1],
            self.data[o + 2],
            self.data[o + 3],
        ]
    }

    #[inline]
    pub fn scale(&self, bone: usize) -> [f32; 3] {
        let o = self.skeleton.scale_offset(bone);
        [self.data[o], self.data[o + 1], self.data[o + 2]]
    }

    #[inline]
    pub fn float(&self, idx: usize) -> f32 {
        self.data[self.skeleton.float_offset(idx)]
    }

    #[inline]
    pub fn int(&self, idx: usize) -> i32 {
        self.data[self.skeleton.int_offset(idx)].round() as i32
    }

    /// Local-to-parent transform of one bone.
    #[inline]
    pub fn local_to_parent(&self, bone: usize) -> Transform {
        Transform {
            translation: self.translation(bone),
            rotation: self.rotation(bone),
            scale: self.scale(bone),
        }
    }
}

impl<'a> StreamViewMut<'a> {
    pub fn bind(
        skeleton: &'a SkeletonDefinition,
        data: &'a mut [f32],
    ) -> Result<Self, StreamError> {
        if data.len() != skeleton.stream_size() {
            return Err(StreamError::BufferLengthMismatch {
                expected: skeleton.stream_size(),
                got: data.len(),
            });
        }
        Ok(StreamViewMut { skeleton, data })
    }

    #[inline]
    pub fn skeleton(&self) -> &'a SkeletonDefinition {
        self.skeleton
    }

    /// Reborrow as a read-only view.
    #[inline]
    pub fn as_view(&self) -> StreamView<'_> {
        StreamView {
            skeleton: self.skeleton,
            data: self.data,
        }
    }

    #[inline]
    pub fn translation(&self, bone: usize) -> [f32; 3] {
        self.as_view().translation(bone)
    }

    #[inline]
    pub fn rotation(&self, bone: usize) -> [f32; 4] {
        self.as_view().rotation(bone)
    }

    #[inline]
    pub fn scale(&self, bone: usize) -> [f32; 3] {
        self.as_view().scale(bone)
    }

    #[inline]
    pub fn set_translation(&mut self, bone: usize, v: [f32; 3]) {
        let o = self.skeleton.translation_offset(bone);
        self.data[o..o + 3].copy_from_slice(&v);
    }

    #[inline]
    pub fn set_rotation(&mut self, bone: usize, q: [f32; 4]) {
        let o = self.skeleton.rotation_offset(bone);
        self.data[o..o + 4].copy_from_slice(&q);
    }

    #[inline]
    pub fn set_scale(&mut self, bone: usize, v: [f32; 3]) {
        let o = self.skeleton.scale_offset(bone);
        self.data[o..o + 3].copy_from_slice(&v);
    }

    #[inline]
    pub fn set_float(&mut self, idx: usize, v: f32) {
        let o = self.skeleton.float_offset(idx);
        self.data[o] = v;
    }

    #[inline]
    pub fn set_int(&mut self, idx: usize, v: i32) {
        let o = self.skeleton.int_offset(idx);
        self.data[o] = v as f32;
    }

    #[inline]
    pub fn local_to_parent(&self, bone: usize) -> Transform {
        self.as_view().local_to_parent(bone)
    }

    #[inline]
    pub fn set_local_to_parent(&mut self, bone: usize, t: &Transform) {
        self.set_translation(bone, t.translation);
        self.set_rotation(bone, t.rotation);
        self.set_scale(bone, t.scale);
    }

    /// Reset every channel to the skeleton's bind pose.
    pub fn reset_to_bind_pose(&mut self) {
        self.skeleton.write_bind_pose(self.data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::quat_axis_angle;
    use crate::skeleton::SkeletonBuilder;

    fn two_bone() -> SkeletonDefinition {
        SkeletonBuilder::new()
            .bone("root", -1, Transform::IDENTITY)
            .bone("child", 0, Transform::from_translation([0.0, 1.0, 0.0]))
            .float_channel("aux")
            .int_channel("state")
            .build()
            .unwrap()
    }

    #[test]
    fn it_should_reject_wrong_buffer_length() {
        let skel = two_bone();
        let data = vec![0.0; skel.stream_size() + 1];
        let err = StreamView::bind(&skel, &data).unwrap_err();
        assert!(matches!(err, StreamError::BufferLengthMismatch { .. }));
    }

    #[test]
    fn channel_round_trip() {
        let skel = two_bone();
        let mut data = vec![0.0; skel.stream_size()];
        let mut stream = StreamViewMut::bind(&skel, &mut data).unwrap();
        let q = quat_axis_angle([0.0, 1.0, 0.0], 0.5);
        stream.set_translation(1, [1.0, 2.0, 3.0]);
        stream.set_rotation(1, q);
        stream.set_scale(0, [2.0, 2.0, 2.0]);
        stream.set_float(0, 0.25);
        stream.set_int(0, 7);

        assert_eq!(stream.translation(1), [1.0, 2.0, 3.0]);
        assert_eq!(stream.rotation(1), q);
        assert_eq!(stream.scale(0), [2.0, 2.0, 2.0]);
        assert_eq!(stream.as_view().float(0), 0.25);
        assert_eq!(stream.as_view().int(0), 7);
    }

    #[test]
    fn bind_pose_reset() {
        let skel = two_bone();
        let mut data = vec![9.0; skel.stream_size()];
        let mut stream = StreamViewMut::bind(&skel, &mut data).unwrap();
        stream.reset_to_bind_pose();
        assert_eq!(stream.translation(1), [0.0, 1.0, 0.0]);
        assert_eq!(stream.rotation(0), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(stream.scale(1), [1.0, 1.0, 1.0]);
        assert_eq!(stream.as_view().float(0), 0.0);
    }
}
