use criterion::{criterion_group, criterion_main, Criterion};

use animrig_graph_core::{EvaluationGraph, Endpoint, Message, NodeKind};
use animrig_test_fixtures::{blend_tree_1d, chain_skeleton, root_translation_clip};

fn bench_blend_tree_eval(c: &mut Criterion) {
    let skeleton = chain_skeleton(32).unwrap();
    let walk = root_translation_clip("walk", [1.0, 0.0, 0.0]).unwrap();
    let run = root_translation_clip("run", [3.0, 0.0, 0.0]).unwrap();
    let tree = blend_tree_1d("locomotion", "speed", vec![(walk, 0.0), (run, 1.0)]).unwrap();

    let mut graph = EvaluationGraph::new();
    let time = graph.create_node(NodeKind::Time);
    let player = graph.create_node(NodeKind::blend_tree());
    graph
        .connect(
            &Endpoint::new(time, "time"),
            &Endpoint::new(player, "time"),
        )
        .unwrap();
    graph
        .send_message(
            &Endpoint::new(player, "skeleton"),
            Message::Skeleton(skeleton),
        )
        .unwrap();
    graph
        .send_message(&Endpoint::new(player, "tree"), Message::BlendTree(tree))
        .unwrap();
    graph
        .send_message(
            &Endpoint::new(player, "parameter"),
            Message::Parameter {
                name: "speed".into(),
                value: 0.5,
            },
        )
        .unwrap();

    c.bench_function("blend_tree_1d_step", |b| {
        b.iter(|| {
            let token = graph.evaluate(1.0 / 60.0, None).unwrap();
            criterion::black_box(token);
        })
    });
}

criterion_group!(benches, bench_blend_tree_eval);
criterion_main!(benches);
