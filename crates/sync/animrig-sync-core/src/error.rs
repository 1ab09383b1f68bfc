//! Synchronization error taxonomy: ordering/invariant violations are fatal
//! for the affected skeleton instance's frame and carry enough context to
//! diagnose the offending binding.

use thiserror::Error;

use animrig_api_core::StreamError;

use crate::provider::EntityRef;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("two read handles target bone {bone} (entity {entity:?})")]
    DuplicateBoneHandle { entity: EntityRef, bone: i32 },

    #[error("handle targets bone {bone}, skeleton has {bone_count} bones (entity {entity:?})")]
    BoneOutOfRange {
        entity: EntityRef,
        bone: i32,
        bone_count: u32,
    },

    #[error(transparent)]
    Stream(#[from] StreamError),
}
