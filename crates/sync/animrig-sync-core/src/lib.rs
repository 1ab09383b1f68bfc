//! animrig-sync-core: bidirectional mapping between external world
//! transforms and animation stream channels, plus hierarchical propagation
//! of local-to-parent into local-to-root/world.

pub mod error;
pub mod propagate;
pub mod provider;
pub mod read_sync;
pub mod write_sync;

pub use error::SyncError;
pub use propagate::{propagate, PropagationMode, PropagationOutput, RootTransform};
pub use provider::{BoneHandle, EntityRef, WorldTransformMap, WorldTransformProvider};
pub use read_sync::sync_world_to_stream;
pub use write_sync::sync_stream_to_world;
