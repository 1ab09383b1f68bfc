//! Read synchronization: external world transforms into stream channels.
//!
//! Two passes. Sort-and-validate first: handles are ordered by bone index
//! and adjacent duplicates are a fatal configuration error reported before
//! anything is written. The fill pass then walks bones in index order with
//! a cursor into the sorted handle list, relying on the sort and on the
//! parents-precede-children invariant so every parent's local-to-root is
//! already cached when a child needs it.

use animrig_api_core::math::{normalize4, quat_conjugate, quat_mul};
use animrig_api_core::{StreamViewMut, Transform};

use crate::error::SyncError;
use crate::provider::{BoneHandle, WorldTransformProvider};

/// Convert bound external world transforms into local-to-parent channels.
///
/// `root_to_world` is the skeleton instance's own placement; external
/// transforms are pulled back through its inverse. `local_to_root` is
/// caller-provided scratch, resized and filled for every bone so later
/// passes can reuse it.
pub fn sync_world_to_stream(
    handles: &mut [BoneHandle],
    provider: &dyn WorldTransformProvider,
    root_to_world: &Transform,
    stream: &mut StreamViewMut<'_>,
    local_to_root: &mut Vec<Transform>,
) -> Result<(), SyncError> {
    let skeleton = stream.skeleton();
    let bone_count = skeleton.bone_count();

    // Sort-and-validate. No stream writes may happen before this pass
    // succeeds: a duplicate must not leave a partial fill behind.
    handles.sort_by_key(|h| h.bone);
    for h in handles.iter() {
        if h.bone < 0 || h.bone as u32 >= bone_count {
            return Err(SyncError::BoneOutOfRange {
                entity: h.entity,
                bone: h.bone,
                bone_count,
            });
        }
    }
    for pair in handles.windows(2) {
        if pair[0].bone == pair[1].bone {
            return Err(SyncError::DuplicateBoneHandle {
                entity: pair[1].entity,
                bone: pair[1].bone,
            });
        }
    }

    let world_to_root = root_to_world.inverse();
    local_to_root.clear();
    local_to_root.resize(bone_count as usize, Transform::IDENTITY);

    let mut cursor = 0usize;
    for bone in 0..bone_count as usize {
        let parent = skeleton.parent(bone);
        let parent_root = if parent < 0 {
            Transform::IDENTITY
        } else {
            local_to_root[parent as usize]
        };

        let bound = handles
            .get(cursor)
            .filter(|h| h.bone as usize == bone)
            .copied();
        if let Some(handle) = bound {
            cursor += 1;
            match provider.world_transform(handle.entity) {
                Some(world) => {
                    let target_root = world_to_root.mul(&world);
                    let parent_inv = parent_root.inverse();
                    let translation = parent_inv.transform_point(target_root.translation);
                    let rotation = normalize4(quat_mul(
                        quat_conjugate(parent_root.rotation),
                        target_root.rotation,
                    ));
                    // Scale stays authored; only translation/rotation bind.
                    stream.set_translation(bone, translation);
                    stream.set_rotation(bone, rotation);
                    local_to_root[bone] = parent_root.mul(&stream.local_to_parent(bone));
                    continue;
                }
                None => {
                    log::warn!(
                        "read handle entity {:?} for bone {} has no world transform; using stream value",
                        handle.entity,
                        bone
                    );
                }
            }
        }
        local_to_root[bone] = parent_root.mul(&stream.local_to_parent(bone));
    }

    Ok(())
}
