//! Behavioural coverage for the evaluation graph engine: topology checks,
//! handle lifetime, message delivery, and the two-phase contract.

use animrig_graph_core::{
    DataValue, Endpoint, EvaluationGraph, GraphError, Message, NodeKind, NodeState,
};
use animrig_test_fixtures::{chain_skeleton, root_translation_clip};

#[test]
fn it_should_reject_type_mismatched_connections() {
    let mut graph = EvaluationGraph::new();
    let time = graph.create_node(NodeKind::Time);
    let mixer = graph.create_node(NodeKind::Mixer);
    let err = graph
        .connect(&Endpoint::new(time, "time"), &Endpoint::new(mixer, "lhs"))
        .unwrap_err();
    assert!(matches!(err, GraphError::TypeMismatch { .. }));
}

#[test]
fn it_should_reject_connecting_two_outputs_or_two_inputs() {
    let mut graph = EvaluationGraph::new();
    let a = graph.create_node(NodeKind::Time);
    let b = graph.create_node(NodeKind::Time);
    let err = graph
        .connect(&Endpoint::new(a, "time"), &Endpoint::new(b, "time"))
        .unwrap_err();
    assert!(matches!(err, GraphError::DirectionMismatch));
}

#[test]
fn it_should_enforce_single_consumer_data_inputs() {
    let mut graph = EvaluationGraph::new();
    let a = graph.create_node(NodeKind::float_constant());
    let b = graph.create_node(NodeKind::float_constant());
    let sink = graph.create_node(NodeKind::FloatPassThrough);
    graph
        .connect(&Endpoint::new(a, "out"), &Endpoint::new(sink, "in"))
        .unwrap();
    let err = graph
        .connect(&Endpoint::new(b, "out"), &Endpoint::new(sink, "in"))
        .unwrap_err();
    assert!(matches!(err, GraphError::PortOccupied(_)));
}

#[test]
fn it_should_reject_unknown_ports() {
    let mut graph = EvaluationGraph::new();
    let node = graph.create_node(NodeKind::Time);
    let err = graph
        .send_message(&Endpoint::new(node, "nonsense"), Message::Float(1.0))
        .unwrap_err();
    assert!(matches!(err, GraphError::NoSuchPort(_)));
}

#[test]
fn it_should_type_check_messages() {
    let mut graph = EvaluationGraph::new();
    let sampler = graph.create_node(NodeKind::clip_sampler());
    let err = graph
        .send_message(&Endpoint::new(sampler, "skeleton"), Message::Float(1.0))
        .unwrap_err();
    assert!(matches!(err, GraphError::TypeMismatch { .. }));
}

#[test]
fn it_should_refuse_destroying_a_connected_node() {
    let mut graph = EvaluationGraph::new();
    let a = graph.create_node(NodeKind::float_constant());
    let sink = graph.create_node(NodeKind::FloatPassThrough);
    graph
        .connect(&Endpoint::new(a, "out"), &Endpoint::new(sink, "in"))
        .unwrap();
    assert_eq!(graph.destroy_node(a).unwrap_err(), GraphError::NodeInUse);

    graph
        .disconnect(&Endpoint::new(a, "out"), &Endpoint::new(sink, "in"))
        .unwrap();
    graph.destroy_node(a).unwrap();

    // The handle is stale afterwards: every operation through it fails.
    let err = graph
        .send_message(&Endpoint::new(a, "value"), Message::Float(1.0))
        .unwrap_err();
    assert_eq!(err, GraphError::StaleHandle);
    assert!(!graph.is_live(a));
}

#[test]
fn it_should_detect_data_cycles() {
    let mut graph = EvaluationGraph::new();
    let a = graph.create_node(NodeKind::FloatPassThrough);
    let b = graph.create_node(NodeKind::FloatPassThrough);
    graph
        .connect(&Endpoint::new(a, "out"), &Endpoint::new(b, "in"))
        .unwrap();
    graph
        .connect(&Endpoint::new(b, "out"), &Endpoint::new(a, "in"))
        .unwrap();
    let err = graph.evaluate(0.016, None).unwrap_err();
    assert_eq!(err, GraphError::CycleDetected);
}

#[test]
fn it_should_order_kernels_by_data_dependency() {
    let mut graph = EvaluationGraph::new();
    let c = graph.create_node(NodeKind::float_constant());
    graph
        .send_message(&Endpoint::new(c, "value"), Message::Float(2.0))
        .unwrap();
    let add = graph.create_node(NodeKind::FloatAdd);
    graph
        .connect(&Endpoint::new(c, "out"), &Endpoint::new(add, "lhs"))
        .unwrap();
    graph
        .connect(&Endpoint::new(c, "out"), &Endpoint::new(add, "rhs"))
        .unwrap();
    graph.evaluate(0.016, None).unwrap();
    match graph.output_value(&Endpoint::new(add, "out")) {
        Some(DataValue::Float(v)) => assert_eq!(v, 4.0),
        other => panic!("expected float output, got {other:?}"),
    }
}

#[test]
fn completion_tokens_chain_frames() {
    let mut graph = EvaluationGraph::new();
    graph.create_node(NodeKind::Time);
    let t1 = graph.evaluate(0.1, None).unwrap();
    let t2 = graph.evaluate(0.1, Some(&t1)).unwrap();
    assert!(t2.frame() > t1.frame());

    // A token from the future is an unsatisfied dependency.
    let mut other = EvaluationGraph::new();
    other.create_node(NodeKind::Time);
    let err = other.evaluate(0.1, Some(&t2)).unwrap_err();
    assert!(matches!(err, GraphError::DependencyNotComplete { .. }));
}

#[test]
fn message_fan_out_reaches_every_consumer() {
    // One clip player's duration_out fans out to two loop-time consumers.
    let skeleton = chain_skeleton(2).unwrap();
    let clip = root_translation_clip("walk", [1.0, 0.0, 0.0]).unwrap();

    let mut graph = EvaluationGraph::new();
    let player = graph.create_node(NodeKind::clip_player());
    let lt_a = graph.create_node(NodeKind::loop_time());
    let lt_b = graph.create_node(NodeKind::loop_time());
    graph
        .connect(
            &Endpoint::new(player, "duration_out"),
            &Endpoint::new(lt_a, "duration"),
        )
        .unwrap();
    graph
        .connect(
            &Endpoint::new(player, "duration_out"),
            &Endpoint::new(lt_b, "duration"),
        )
        .unwrap();

    graph
        .send_message(&Endpoint::new(player, "skeleton"), Message::Skeleton(skeleton))
        .unwrap();
    graph
        .send_message(&Endpoint::new(player, "clip"), Message::Clip(clip))
        .unwrap();

    // Both consumers saw the emitted duration: wrapping at t=1.5 over the
    // one-second clip yields 0.5 on each.
    let c = graph.create_node(NodeKind::float_constant());
    graph
        .send_message(&Endpoint::new(c, "value"), Message::Float(1.5))
        .unwrap();
    graph
        .connect(&Endpoint::new(c, "out"), &Endpoint::new(lt_a, "in"))
        .unwrap();
    graph
        .connect(&Endpoint::new(c, "out"), &Endpoint::new(lt_b, "in"))
        .unwrap();
    graph.evaluate(0.016, None).unwrap();
    for lt in [lt_a, lt_b] {
        match graph.output_value(&Endpoint::new(lt, "out")) {
            Some(DataValue::Float(v)) => assert!((v - 0.5).abs() < 1e-5),
            other => panic!("expected wrapped time, got {other:?}"),
        }
    }
}

#[test]
fn node_states_follow_configuration() {
    let skeleton = chain_skeleton(2).unwrap();
    let clip = root_translation_clip("walk", [1.0, 0.0, 0.0]).unwrap();

    let mut graph = EvaluationGraph::new();
    let sampler = graph.create_node(NodeKind::clip_sampler());
    assert_eq!(graph.node_state(sampler), Some(NodeState::Uninitialized));
    graph
        .send_message(&Endpoint::new(sampler, "skeleton"), Message::Skeleton(skeleton))
        .unwrap();
    assert_eq!(graph.node_state(sampler), Some(NodeState::Configured));
    graph
        .send_message(&Endpoint::new(sampler, "clip"), Message::Clip(clip))
        .unwrap();
    assert_eq!(graph.node_state(sampler), Some(NodeState::Evaluable));
}

#[test]
fn declared_outputs_limit_the_schedule() {
    let mut graph = EvaluationGraph::new();
    let wanted = graph.create_node(NodeKind::float_constant());
    let orphan = graph.create_node(NodeKind::float_constant());
    graph
        .send_message(&Endpoint::new(wanted, "value"), Message::Float(1.0))
        .unwrap();
    graph
        .send_message(&Endpoint::new(orphan, "value"), Message::Float(2.0))
        .unwrap();
    graph.declare_output(Endpoint::new(wanted, "out")).unwrap();
    graph.evaluate(0.016, None).unwrap();
    assert!(graph.output_value(&Endpoint::new(wanted, "out")).is_some());
    assert!(graph.output_value(&Endpoint::new(orphan, "out")).is_none());
}

#[test]
fn staged_stream_length_mismatch_fails_the_evaluation() {
    let skeleton = chain_skeleton(2).unwrap();
    let mut graph = EvaluationGraph::new();
    let source = graph.create_node(NodeKind::stream_source());
    graph
        .send_message(
            &Endpoint::new(source, "skeleton"),
            Message::Skeleton(skeleton),
        )
        .unwrap();
    graph
        .stage_input(
            source,
            DataValue::Stream(animrig_graph_core::StreamBuffer {
                skeleton: None,
                data: vec![0.0; 3],
            }),
        )
        .unwrap();
    let err = graph.evaluate(0.016, None).unwrap_err();
    assert!(matches!(err, GraphError::BufferLengthMismatch { .. }));
}
