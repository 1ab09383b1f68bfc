//! One skeleton instance: its evaluation graph, stream buffer, handle
//! lists, and placement.

use std::sync::Arc;

use thiserror::Error;

use animrig_api_core::{SkeletonDefinition, StreamError, StreamView, StreamViewMut, Transform};
use animrig_graph_core::{
    CompletionToken, DataValue, Endpoint, EvaluationGraph, GraphError, Message, NodeHandle,
    NodeKind, StreamBuffer,
};
use animrig_sync_core::{
    propagate, sync_stream_to_world, sync_world_to_stream, BoneHandle, PropagationMode,
    PropagationOutput, RootTransform, SyncError, WorldTransformProvider,
};

/// Why one instance's frame was abandoned. Other instances are unaffected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// A skeleton instance owns its evaluation graph and its stream buffer; the
/// buffer is exclusively held for the duration of the instance's own
/// evaluation, so instances sharing one `SkeletonDefinition` stay
/// independent.
pub struct SkeletonInstance {
    pub id: String,
    pub skeleton: Arc<SkeletonDefinition>,
    /// The instance's own root-to-world placement.
    pub placement: Transform,
    pub read_handles: Vec<BoneHandle>,
    pub write_handles: Vec<BoneHandle>,
    pub mode: PropagationMode,
    graph: EvaluationGraph,
    source: NodeHandle,
    output: Option<Endpoint>,
    buffer: Vec<f32>,
    root_cache: Vec<Transform>,
    propagation: PropagationOutput,
    last_token: Option<CompletionToken>,
}

impl SkeletonInstance {
    pub fn new(id: impl Into<String>, skeleton: Arc<SkeletonDefinition>) -> Self {
        let mut graph = EvaluationGraph::new();
        let source = graph.create_node(NodeKind::stream_source());
        // The source's skeleton reference is the one message every graph
        // needs before anything is evaluable. A freshly created source
        // always accepts it.
        graph
            .send_message(
                &Endpoint::new(source, "skeleton"),
                Message::Skeleton(skeleton.clone()),
            )
            .ok();
        let buffer = vec![0.0; skeleton.stream_size()];
        SkeletonInstance {
            id: id.into(),
            skeleton,
            placement: Transform::IDENTITY,
            read_handles: Vec::new(),
            write_handles: Vec::new(),
            mode: PropagationMode::Both,
            graph,
            source,
            output: None,
            buffer,
            root_cache: Vec::new(),
            propagation: PropagationOutput::default(),
            last_token: None,
        }
    }

    /// The graph this instance evaluates. Hosts and graph-description
    /// compilers build node networks through this surface.
    pub fn graph_mut(&mut self) -> &mut EvaluationGraph {
        &mut self.graph
    }

    pub fn graph(&self) -> &EvaluationGraph {
        &self.graph
    }

    /// Entry node publishing the read-synchronized input stream.
    pub fn source(&self) -> NodeHandle {
        self.source
    }

    /// Select which output port produces the instance's final stream. With
    /// no selection the input stream passes through untouched.
    pub fn set_output(&mut self, ep: Endpoint) -> Result<(), GraphError> {
        self.graph.declare_output(ep.clone())?;
        self.output = Some(ep);
        Ok(())
    }

    /// Propagated transforms from the last completed frame.
    pub fn propagation(&self) -> &PropagationOutput {
        &self.propagation
    }

    pub fn last_token(&self) -> Option<CompletionToken> {
        self.last_token
    }

    /// Run one frame: read sync → graph evaluation → hierarchical
    /// propagation → write sync.
    pub fn run_frame(
        &mut self,
        dt: f32,
        provider: &mut dyn WorldTransformProvider,
    ) -> Result<(), FrameError> {
        // Input stream starts from the bind pose each frame; read sync
        // overlays externally driven bones.
        self.buffer.resize(self.skeleton.stream_size(), 0.0);
        self.skeleton.write_bind_pose(&mut self.buffer);
        {
            let mut stream = StreamViewMut::bind(&self.skeleton, &mut self.buffer)?;
            sync_world_to_stream(
                &mut self.read_handles,
                provider,
                &self.placement,
                &mut stream,
                &mut self.root_cache,
            )?;
        }

        self.graph.stage_input(
            self.source,
            DataValue::Stream(StreamBuffer {
                skeleton: Some(self.skeleton.clone()),
                data: self.buffer.clone(),
            }),
        )?;

        let token = self.graph.evaluate(dt, self.last_token.as_ref())?;
        self.last_token = Some(token);

        let evaluated = match &self.output {
            Some(ep) => self
                .graph
                .output_value(ep)
                .and_then(DataValue::into_stream),
            None => None,
        };
        let output_data: &[f32] = match &evaluated {
            Some(stream) if !stream.is_null() => &stream.data,
            _ => &self.buffer,
        };

        let view = StreamView::bind(&self.skeleton, output_data)?;
        propagate(
            &view,
            &RootTransform::from_transform(&self.placement),
            self.mode,
            &mut self.propagation,
        );

        if matches!(self.mode, PropagationMode::WorldOnly | PropagationMode::Both) {
            sync_stream_to_world(&self.propagation.local_to_world, &self.write_handles, provider)?;
        }
        Ok(())
    }
}
