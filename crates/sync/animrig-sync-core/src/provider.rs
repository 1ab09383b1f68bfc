//! World-transform provider boundary.
//!
//! The external scene representation owns the handle lists and the actual
//! transforms; this crate only reads and writes through the trait. A
//! map-backed implementation is provided for tests and simple hosts.

use std::collections::HashMap;

use animrig_api_core::Transform;

/// Opaque reference to an external entity owning a world transform.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntityRef(pub u64);

/// Binding of one external entity to one bone of a skeleton instance.
///
/// Many handles may target the same skeleton instance. Read-direction
/// handles must target distinct bones (validated at synchronization time);
/// write-direction handles may share a bone (broadcast).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BoneHandle {
    pub entity: EntityRef,
    pub bone: i32,
}

impl BoneHandle {
    pub fn new(entity: EntityRef, bone: i32) -> Self {
        BoneHandle { entity, bone }
    }
}

/// Supplies and receives per-entity world transforms.
pub trait WorldTransformProvider {
    fn world_transform(&self, entity: EntityRef) -> Option<Transform>;
    fn set_world_transform(&mut self, entity: EntityRef, transform: Transform);
}

/// HashMap-backed provider for tests and simple hosts.
#[derive(Default, Debug)]
pub struct WorldTransformMap {
    map: HashMap<EntityRef, Transform>,
}

impl WorldTransformMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: EntityRef, transform: Transform) {
        self.map.insert(entity, transform);
    }

    pub fn get(&self, entity: EntityRef) -> Option<&Transform> {
        self.map.get(&entity)
    }
}

impl WorldTransformProvider for WorldTransformMap {
    fn world_transform(&self, entity: EntityRef) -> Option<Transform> {
        self.map.get(&entity).copied()
    }

    fn set_world_transform(&mut self, entity: EntityRef, transform: Transform) {
        self.map.insert(entity, transform);
    }
}
