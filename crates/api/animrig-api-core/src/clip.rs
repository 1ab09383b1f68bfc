//! Sampled clip asset: uniformly sampled channel curves plus duration and
//! sample rate.
//!
//! Tracks target stream channels by name (bone name for transform channels,
//! channel name for named float/int channels) and are resolved against a
//! skeleton at sampling time. Unanimated channels are left untouched, so
//! callers reset the output stream to the bind pose before sampling.

use serde::{Deserialize, Serialize};

use crate::error::AssetError;
use crate::math::{lerp_f32, nlerp_quat};
use crate::skeleton::{ChannelKind, SkeletonDefinition};
use crate::stream::StreamViewMut;

/// One uniformly sampled curve targeting a single logical channel.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClipTrack {
    /// Bone name (translation/rotation/scale) or named channel (float/int).
    pub target: String,
    pub kind: ChannelKind,
    /// `frame_count * kind.width()` values, frame-major.
    pub frames: Vec<f32>,
}

/// Immutable clip asset, shared by opaque reference.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Clip {
    pub name: String,
    /// Duration in seconds; authoritative for time mapping.
    pub duration: f32,
    /// Frames per second the tracks were sampled at.
    pub sample_rate: f32,
    pub tracks: Vec<ClipTrack>,
}

impl Clip {
    /// Number of stored frames per track (inclusive of both endpoints).
    #[inline]
    pub fn frame_count(&self) -> usize {
        (self.duration * self.sample_rate).round() as usize + 1
    }

    /// Validate duration, sample rate, and per-track frame counts.
    pub fn validate(&self) -> Result<(), AssetError> {
        if !(self.duration > 0.0) {
            return Err(AssetError::InvalidClip {
                clip: self.name.clone(),
                reason: "duration must be > 0".into(),
            });
        }
        if !(self.sample_rate > 0.0) {
            return Err(AssetError::InvalidClip {
                clip: self.name.clone(),
                reason: "sample rate must be > 0".into(),
            });
        }
        let frames = self.frame_count();
        for track in &self.tracks {
            let expected = frames * track.kind.width();
            if track.frames.len() != expected {
                return Err(AssetError::InvalidClip {
                    clip: self.name.clone(),
                    reason: format!(
                        "track '{}' has {} values, expected {}",
                        track.target,
                        track.frames.len(),
                        expected
                    ),
                });
            }
        }
        Ok(())
    }

    /// Sample every track at `time` (clamped to the clip range) into `out`.
    /// Tracks that do not resolve against the stream's skeleton are skipped.
    pub fn sample_into(&self, time: f32, out: &mut StreamViewMut<'_>) {
        let skeleton = out.skeleton();
        let t = time.clamp(0.0, self.duration);
        let frame_pos = t * self.sample_rate;
        let last = self.frame_count() - 1;
        let i0 = (frame_pos.floor() as usize).min(last);
        let i1 = (i0 + 1).min(last);
        let alpha = frame_pos - i0 as f32;

        for track in &self.tracks {
            sample_track(track, skeleton, i0, i1, alpha, out);
        }
    }
}

fn sample_track(
    track: &ClipTrack,
    skeleton: &SkeletonDefinition,
    i0: usize,
    i1: usize,
    alpha: f32,
    out: &mut StreamViewMut<'_>,
) {
    let w = track.kind.width();
    let a = &track.frames[i0 * w..i0 * w + w];
    let b = &track.frames[i1 * w..i1 * w + w];
    match track.kind {
        ChannelKind::Translation => {
            if let Some(bone) = skeleton.bone_index(&track.target) {
                out.set_translation(bone, lerp3(a, b, alpha));
            }
        }
        ChannelKind::Scale => {
            if let Some(bone) = skeleton.bone_index(&track.target) {
                out.set_scale(bone, lerp3(a, b, alpha));
            }
        }
        ChannelKind::Rotation => {
            if let Some(bone) = skeleton.bone_index(&track.target) {
                let qa = [a[0], a[1], a[2], a[3]];
                let qb = [b[0], b[1], b[2], b[3]];
                out.set_rotation(bone, nlerp_quat(qa, qb, alpha));
            }
        }
        ChannelKind::Float => {
            if let Some(idx) = skeleton.float_channel_index(&track.target) {
                out.set_float(idx, lerp_f32(a[0], b[0], alpha));
            }
        }
        // Int channels hold step values; never interpolate.
        ChannelKind::Int => {
            if let Some(idx) = skeleton.int_channel_index(&track.target) {
                out.set_int(idx, a[0].round() as i32);
            }
        }
    }
}

#[inline]
fn lerp3(a: &[f32], b: &[f32], t: f32) -> [f32; 3] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::SkeletonBuilder;
    use crate::transform::Transform;

    fn skeleton() -> SkeletonDefinition {
        SkeletonBuilder::new()
            .bone("root", -1, Transform::IDENTITY)
            .int_channel("state")
            .build()
            .unwrap()
    }

    fn linear_clip() -> Clip {
        // Two frames over one second: root translates 0 -> (1, 0, 0).
        Clip {
            name: "move".into(),
            duration: 1.0,
            sample_rate: 1.0,
            tracks: vec![
                ClipTrack {
                    target: "root".into(),
                    kind: ChannelKind::Translation,
                    frames: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
                },
                ClipTrack {
                    target: "state".into(),
                    kind: ChannelKind::Int,
                    frames: vec![3.0, 8.0],
                },
            ],
        }
    }

    #[test]
    fn validate_checks_frame_counts() {
        let mut clip = linear_clip();
        assert!(clip.validate().is_ok());
        clip.tracks[0].frames.pop();
        assert!(matches!(
            clip.validate(),
            Err(AssetError::InvalidClip { .. })
        ));
    }

    #[test]
    fn sample_lerps_translation_and_steps_ints() {
        let skel = skeleton();
        let clip = linear_clip();
        let mut data = vec![0.0; skel.stream_size()];
        let mut out = StreamViewMut::bind(&skel, &mut data).unwrap();
        out.reset_to_bind_pose();
        clip.sample_into(0.5, &mut out);
        assert_eq!(out.translation(0), [0.5, 0.0, 0.0]);
        assert_eq!(out.as_view().int(0), 3);
    }

    #[test]
    fn sample_clamps_to_clip_range() {
        let skel = skeleton();
        let clip = linear_clip();
        let mut data = vec![0.0; skel.stream_size()];
        let mut out = StreamViewMut::bind(&skel, &mut data).unwrap();
        out.reset_to_bind_pose();
        clip.sample_into(5.0, &mut out);
        assert_eq!(out.translation(0), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn clip_round_trips_via_json() {
        let clip = linear_clip();
        let json = serde_json::to_string(&clip).unwrap();
        let parsed: Clip = serde_json::from_str(&json).unwrap();
        assert_eq!(clip, parsed);
    }
}
