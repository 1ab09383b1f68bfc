use criterion::{criterion_group, criterion_main, Criterion};

use animrig_api_core::{StreamViewMut, Transform};
use animrig_sync_core::{propagate, PropagationMode, PropagationOutput, RootTransform};
use animrig_test_fixtures::chain_skeleton;

fn bench_propagate(c: &mut Criterion) {
    let skel = chain_skeleton(128).unwrap();
    let mut data = vec![0.0; skel.stream_size()];
    let mut stream = StreamViewMut::bind(&skel, &mut data).unwrap();
    stream.reset_to_bind_pose();
    let root = RootTransform::from_transform(&Transform::from_translation([1.0, 2.0, 3.0]));
    let mut out = PropagationOutput::default();

    c.bench_function("propagate_128_bones_both", |b| {
        b.iter(|| {
            propagate(
                &stream.as_view(),
                &root,
                PropagationMode::Both,
                &mut out,
            );
            criterion::black_box(&out);
        })
    });
}

criterion_group!(benches, bench_propagate);
criterion_main!(benches);
