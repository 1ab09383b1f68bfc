//! Behavioural coverage for the synchronization jobs.

use animrig_api_core::math::quat_axis_angle;
use animrig_api_core::{StreamViewMut, Transform};
use animrig_sync_core::{
    propagate, sync_stream_to_world, sync_world_to_stream, BoneHandle, EntityRef,
    PropagationMode, PropagationOutput, RootTransform, SyncError, WorldTransformMap,
};
use animrig_test_fixtures::chain_skeleton;

const EPS: f32 = 1e-4;

fn approx3(a: [f32; 3], b: [f32; 3]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < EPS)
}

#[test]
fn it_should_propagate_through_the_parent_chain() {
    // ParentIndex = [-1, 0, 1] with known locals: local_to_root[2] must be
    // the ordered product of all three local-to-parent transforms.
    let skel = chain_skeleton(3).unwrap();
    let mut data = vec![0.0; skel.stream_size()];
    let mut stream = StreamViewMut::bind(&skel, &mut data).unwrap();
    stream.reset_to_bind_pose();
    stream.set_translation(0, [1.0, 0.0, 0.0]);
    stream.set_rotation(1, quat_axis_angle([0.0, 0.0, 1.0], 0.5));
    stream.set_translation(2, [0.0, 0.0, 3.0]);

    let mut out = PropagationOutput::default();
    propagate(
        &stream.as_view(),
        &RootTransform::default(),
        PropagationMode::RootOnly,
        &mut out,
    );

    let expected = stream
        .local_to_parent(0)
        .mul(&stream.local_to_parent(1))
        .mul(&stream.local_to_parent(2));
    assert!(approx3(out.local_to_root[2].translation, expected.translation));
    for i in 0..4 {
        assert!((out.local_to_root[2].rotation[i] - expected.rotation[i]).abs() < EPS);
    }
    assert!(out.local_to_world.is_empty());
}

#[test]
fn it_should_bind_unique_read_handles_exactly() {
    let skel = chain_skeleton(3).unwrap();
    let mut data = vec![0.0; skel.stream_size()];
    let mut stream = StreamViewMut::bind(&skel, &mut data).unwrap();
    stream.reset_to_bind_pose();

    let mut provider = WorldTransformMap::new();
    let target = Transform {
        translation: [2.0, 5.0, -1.0],
        rotation: quat_axis_angle([0.0, 1.0, 0.0], 0.8),
        scale: [1.0, 1.0, 1.0],
    };
    provider.insert(EntityRef(7), target);

    let mut handles = vec![BoneHandle::new(EntityRef(7), 2)];
    let mut cache = Vec::new();
    sync_world_to_stream(
        &mut handles,
        &provider,
        &Transform::IDENTITY,
        &mut stream,
        &mut cache,
    )
    .unwrap();

    // The cached local-to-root of the bound bone equals the external
    // transform (identity instance placement).
    assert!(approx3(cache[2].translation, target.translation));
    for i in 0..4 {
        assert!((cache[2].rotation[i] - target.rotation[i]).abs() < EPS);
    }
}

#[test]
fn it_should_reject_duplicate_read_handles_without_partial_write() {
    let skel = chain_skeleton(3).unwrap();
    let mut data = vec![0.0; skel.stream_size()];
    let mut stream = StreamViewMut::bind(&skel, &mut data).unwrap();
    stream.reset_to_bind_pose();
    let before = data.clone();

    let mut stream = StreamViewMut::bind(&skel, &mut data).unwrap();
    let mut provider = WorldTransformMap::new();
    provider.insert(EntityRef(1), Transform::from_translation([9.0, 9.0, 9.0]));
    provider.insert(EntityRef(2), Transform::from_translation([8.0, 8.0, 8.0]));

    let mut handles = vec![
        BoneHandle::new(EntityRef(1), 1),
        BoneHandle::new(EntityRef(2), 1),
    ];
    let mut cache = Vec::new();
    let err = sync_world_to_stream(
        &mut handles,
        &provider,
        &Transform::IDENTITY,
        &mut stream,
        &mut cache,
    )
    .unwrap_err();

    assert!(matches!(
        err,
        SyncError::DuplicateBoneHandle { bone: 1, .. }
    ));
    assert_eq!(data, before, "no partial write on validation failure");
}

#[test]
fn it_should_reject_out_of_range_handles() {
    let skel = chain_skeleton(2).unwrap();
    let mut data = vec![0.0; skel.stream_size()];
    let mut stream = StreamViewMut::bind(&skel, &mut data).unwrap();
    let provider = WorldTransformMap::new();
    let mut handles = vec![BoneHandle::new(EntityRef(1), 5)];
    let mut cache = Vec::new();
    let err = sync_world_to_stream(
        &mut handles,
        &provider,
        &Transform::IDENTITY,
        &mut stream,
        &mut cache,
    )
    .unwrap_err();
    assert!(matches!(err, SyncError::BoneOutOfRange { bone: 5, .. }));
}

#[test]
fn round_trip_reproduces_the_external_transform() {
    // Write a world transform in via read-sync, propagate, scatter it back
    // out via write-sync: the external transform must survive the trip.
    let skel = chain_skeleton(3).unwrap();
    let mut data = vec![0.0; skel.stream_size()];
    let mut stream = StreamViewMut::bind(&skel, &mut data).unwrap();
    stream.reset_to_bind_pose();

    let placement = Transform {
        translation: [0.5, 0.0, 2.0],
        rotation: quat_axis_angle([0.0, 1.0, 0.0], 0.4),
        scale: [1.0, 1.0, 1.0],
    };
    let external = Transform {
        translation: [3.0, 1.0, -2.0],
        rotation: quat_axis_angle([1.0, 0.0, 0.0], 0.9),
        scale: [1.0, 1.0, 1.0],
    };

    let mut provider = WorldTransformMap::new();
    provider.insert(EntityRef(10), external);

    let mut read_handles = vec![BoneHandle::new(EntityRef(10), 1)];
    let mut cache = Vec::new();
    sync_world_to_stream(&mut read_handles, &provider, &placement, &mut stream, &mut cache)
        .unwrap();

    let mut out = PropagationOutput::default();
    propagate(
        &stream.as_view(),
        &RootTransform::from_transform(&placement),
        PropagationMode::WorldOnly,
        &mut out,
    );

    let write_handles = vec![
        BoneHandle::new(EntityRef(20), 1),
        // Duplicate write bone is a broadcast, not an error.
        BoneHandle::new(EntityRef(21), 1),
    ];
    sync_stream_to_world(&out.local_to_world, &write_handles, &mut provider).unwrap();

    for entity in [EntityRef(20), EntityRef(21)] {
        let result = provider.get(entity).copied().unwrap();
        assert!(approx3(result.translation, external.translation));
        for i in 0..4 {
            assert!((result.rotation[i] - external.rotation[i]).abs() < 1e-3);
        }
    }
}

#[test]
fn unbound_bones_keep_their_stream_pose() {
    let skel = chain_skeleton(3).unwrap();
    let mut data = vec![0.0; skel.stream_size()];
    let mut stream = StreamViewMut::bind(&skel, &mut data).unwrap();
    stream.reset_to_bind_pose();
    stream.set_translation(2, [0.0, 4.0, 0.0]);

    let provider = WorldTransformMap::new();
    let mut handles: Vec<BoneHandle> = Vec::new();
    let mut cache = Vec::new();
    sync_world_to_stream(
        &mut handles,
        &provider,
        &Transform::IDENTITY,
        &mut stream,
        &mut cache,
    )
    .unwrap();

    // Cache reflects pure stream composition: bone1 at +1Y, bone2 at +5Y.
    assert!(approx3(cache[1].translation, [0.0, 1.0, 0.0]));
    assert!(approx3(cache[2].translation, [0.0, 5.0, 0.0]));
}
