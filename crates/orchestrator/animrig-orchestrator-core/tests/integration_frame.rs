//! End-to-end frames: read sync → graph evaluation → propagation → write
//! sync, with per-instance error isolation.

use animrig_api_core::Transform;
use animrig_graph_core::{Endpoint, Message, NodeKind};
use animrig_orchestrator::{AnimationSystem, FrameError, SkeletonInstance};
use animrig_sync_core::{BoneHandle, EntityRef, SyncError, WorldTransformMap};
use animrig_test_fixtures::{chain_skeleton, root_translation_clip};

const EPS: f32 = 1e-4;

fn approx3(a: [f32; 3], b: [f32; 3]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < EPS)
}

fn clip_driven_instance(id: &str) -> SkeletonInstance {
    let skeleton = chain_skeleton(3).unwrap();
    let clip = root_translation_clip("walk", [1.0, 0.0, 0.0]).unwrap();
    let mut instance = SkeletonInstance::new(id, skeleton.clone());
    let graph = instance.graph_mut();
    let time = graph.create_node(NodeKind::Time);
    let player = graph.create_node(NodeKind::clip_player());
    graph
        .connect(&Endpoint::new(time, "time"), &Endpoint::new(player, "time"))
        .unwrap();
    graph
        .send_message(&Endpoint::new(player, "skeleton"), Message::Skeleton(skeleton))
        .unwrap();
    graph
        .send_message(&Endpoint::new(player, "clip"), Message::Clip(clip))
        .unwrap();
    instance.set_output(Endpoint::new(player, "out")).unwrap();
    instance
}

#[test]
fn a_frame_flows_from_clip_to_external_transforms() {
    let mut system = AnimationSystem::new();
    let mut instance = clip_driven_instance("hero");
    instance.write_handles.push(BoneHandle::new(EntityRef(1), 0));
    instance.write_handles.push(BoneHandle::new(EntityRef(2), 2));
    system.add_instance(instance).unwrap();

    let mut provider = WorldTransformMap::new();
    let report = system.step(0.5, &mut provider);
    assert!(report.is_clean());
    assert_eq!(report.epoch, 1);

    // Root sampled halfway through the clip; tip two bones further up.
    let root = provider.get(EntityRef(1)).copied().unwrap();
    assert!(approx3(root.translation, [0.5, 0.0, 0.0]));
    let tip = provider.get(EntityRef(2)).copied().unwrap();
    assert!(approx3(tip.translation, [0.5, 2.0, 0.0]));
}

#[test]
fn placement_maps_results_into_world_space() {
    let mut system = AnimationSystem::new();
    let mut instance = clip_driven_instance("hero");
    instance.placement = Transform::from_translation([10.0, 0.0, 0.0]);
    instance.write_handles.push(BoneHandle::new(EntityRef(1), 0));
    system.add_instance(instance).unwrap();

    let mut provider = WorldTransformMap::new();
    let report = system.step(1.0, &mut provider);
    assert!(report.is_clean());

    let root = provider.get(EntityRef(1)).copied().unwrap();
    assert!(approx3(root.translation, [11.0, 0.0, 0.0]));
}

#[test]
fn read_handles_override_the_evaluated_pose() {
    let skeleton = chain_skeleton(2).unwrap();
    let mut instance = SkeletonInstance::new("puppet", skeleton);
    // No graph output: the read-synced input stream propagates directly.
    instance.read_handles.push(BoneHandle::new(EntityRef(5), 1));
    instance.write_handles.push(BoneHandle::new(EntityRef(6), 1));

    let mut system = AnimationSystem::new();
    system.add_instance(instance).unwrap();

    let mut provider = WorldTransformMap::new();
    let driven = Transform::from_translation([0.0, 7.0, 0.0]);
    provider.insert(EntityRef(5), driven);

    let report = system.step(0.016, &mut provider);
    assert!(report.is_clean());
    let result = provider.get(EntityRef(6)).copied().unwrap();
    assert!(approx3(result.translation, [0.0, 7.0, 0.0]));
}

#[test]
fn instance_failures_are_isolated() {
    let mut system = AnimationSystem::new();

    let mut healthy = clip_driven_instance("healthy");
    healthy.write_handles.push(BoneHandle::new(EntityRef(1), 0));
    system.add_instance(healthy).unwrap();

    let skeleton = chain_skeleton(2).unwrap();
    let mut broken = SkeletonInstance::new("broken", skeleton);
    broken.read_handles.push(BoneHandle::new(EntityRef(8), 1));
    broken.read_handles.push(BoneHandle::new(EntityRef(9), 1));
    system.add_instance(broken).unwrap();

    let mut provider = WorldTransformMap::new();
    provider.insert(EntityRef(8), Transform::IDENTITY);
    provider.insert(EntityRef(9), Transform::IDENTITY);

    let report = system.step(1.0, &mut provider);
    assert_eq!(report.errors.len(), 1);
    let (id, err) = &report.errors[0];
    assert_eq!(id, "broken");
    assert!(matches!(
        err,
        FrameError::Sync(SyncError::DuplicateBoneHandle { bone: 1, .. })
    ));

    // The healthy instance still completed its frame.
    let root = provider.get(EntityRef(1)).copied().unwrap();
    assert!(approx3(root.translation, [1.0, 0.0, 0.0]));
}

#[test]
fn duplicate_instance_ids_are_rejected() {
    let mut system = AnimationSystem::new();
    let skeleton = chain_skeleton(2).unwrap();
    system
        .add_instance(SkeletonInstance::new("hero", skeleton.clone()))
        .unwrap();
    assert!(system
        .add_instance(SkeletonInstance::new("hero", skeleton))
        .is_err());
}
