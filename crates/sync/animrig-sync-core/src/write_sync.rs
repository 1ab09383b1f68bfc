//! Write synchronization: scatter propagated local-to-world transforms back
//! to external transform owners.

use animrig_api_core::Transform;

use crate::error::SyncError;
use crate::provider::{BoneHandle, WorldTransformProvider};

/// Push each write handle's bone transform to its external entity. Unlike
/// read handles, several write handles may target the same bone; each one
/// receives the value (broadcast).
pub fn sync_stream_to_world(
    local_to_world: &[Transform],
    handles: &[BoneHandle],
    provider: &mut dyn WorldTransformProvider,
) -> Result<(), SyncError> {
    let bone_count = local_to_world.len() as u32;
    for handle in handles {
        if handle.bone < 0 || handle.bone as u32 >= bone_count {
            return Err(SyncError::BoneOutOfRange {
                entity: handle.entity,
                bone: handle.bone,
                bone_count,
            });
        }
        provider.set_world_transform(handle.entity, local_to_world[handle.bone as usize]);
    }
    Ok(())
}
