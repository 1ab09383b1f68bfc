//! The evaluation graph: node arena, connection tables, message pump, and
//! the buffered kernel scheduler.
//!
//! Mutation (create/destroy/connect/send) belongs to the configuration
//! phase and is strictly ordered before the next evaluation; `evaluate`
//! flushes any pending messages before scheduling kernels.

use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};

use animrig_api_core::Transform;

use crate::error::GraphError;
use crate::handle::NodeHandle;
use crate::message::Message;
use crate::nodes::{NodeKind, NodeState};
use crate::port::{Endpoint, PortDef, PortDirection, PortKind};
use crate::topo::{reachable_upstream, topo_order, DepEdge};
use crate::value::{DataValue, StreamBuffer};

pub type OutputMap = HashMap<String, DataValue>;

/// Per-node state that persists across frames for stateful kernels.
#[derive(Clone, Debug)]
pub enum NodeFrameState {
    DeltaRoot { prev: Option<Transform> },
    VelocityRoot { accum: Transform },
}

/// Outgoing completion signal of one evaluation. The engine never blocks on
/// its own threads; callers chain tokens to order work.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CompletionToken {
    frame: u64,
}

impl CompletionToken {
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

#[derive(Clone, Debug)]
struct DataEdge {
    src: Endpoint,
    dst: Endpoint,
    dst_element: u32,
}

#[derive(Clone, Debug)]
struct MessageEdge {
    src: Endpoint,
    dst: Endpoint,
    dst_element: u32,
}

#[derive(Debug)]
struct Delivery {
    node: NodeHandle,
    port: String,
    element: u32,
    message: Message,
}

pub(crate) struct Node {
    /// Detached (taken out of the slot) while its own message handler runs.
    kind: Option<NodeKind>,
    /// Kept beside the kind so port lookups keep working while the kind is
    /// detached (handlers connect to their own ports during rebuild).
    descriptor: &'static crate::port::NodeDescriptor,
    children: Vec<NodeHandle>,
    parent: Option<NodeHandle>,
    /// Composite port forwarding: own input port -> internal input endpoint.
    input_forwards: HashMap<String, Endpoint>,
    /// Composite port forwarding: own output port -> internal output endpoint.
    output_forwards: HashMap<String, Endpoint>,
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Resolved per-evaluation values, keyed by arena slot.
#[derive(Default)]
struct EvalState {
    frame: u64,
    t: f32,
    dt: f32,
    outputs: HashMap<u32, OutputMap>,
    node_states: HashMap<u32, NodeFrameState>,
    staged: HashMap<u32, DataValue>,
}

/// Inputs resolved for one kernel invocation.
pub enum InputSlot {
    Single(DataValue),
    Array(Vec<Option<DataValue>>),
}

/// Context handed to a kernel: buffered input values, staged host data,
/// frame time, and the node's persistent frame state.
pub struct KernelCtx<'a> {
    pub(crate) inputs: HashMap<String, InputSlot>,
    pub(crate) staged: Option<DataValue>,
    pub t: f32,
    pub dt: f32,
    pub(crate) state: &'a mut Option<NodeFrameState>,
}

impl KernelCtx<'_> {
    pub fn float(&self, name: &str) -> Option<f32> {
        match self.inputs.get(name) {
            Some(InputSlot::Single(v)) => v.as_float(),
            _ => None,
        }
    }

    pub fn float_or(&self, name: &str, default: f32) -> f32 {
        self.float(name).unwrap_or(default)
    }

    pub fn stream(&self, name: &str) -> Option<&StreamBuffer> {
        match self.inputs.get(name) {
            Some(InputSlot::Single(v)) => v.as_stream(),
            _ => None,
        }
    }

    /// Input stream, or the null stream when unconnected / not yet produced.
    pub fn stream_or_null(&self, name: &str) -> StreamBuffer {
        self.stream(name).cloned().unwrap_or_default()
    }

    pub fn transform(&self, name: &str) -> Option<Transform> {
        match self.inputs.get(name) {
            Some(InputSlot::Single(v)) => v.as_transform().copied(),
            _ => None,
        }
    }

    pub fn array(&self, name: &str) -> &[Option<DataValue>] {
        match self.inputs.get(name) {
            Some(InputSlot::Array(vs)) => vs,
            _ => &[],
        }
    }

    pub fn staged(&self) -> Option<&DataValue> {
        self.staged.as_ref()
    }

    pub fn frame_state(&mut self) -> &mut Option<NodeFrameState> {
        self.state
    }
}

/// Context handed to a configuration-message handler. The handler's node is
/// temporarily detached from its slot, so the graph can be mutated freely;
/// handlers must not destroy their own node.
pub struct ConfigCtx<'g> {
    graph: &'g mut EvaluationGraph,
    handle: NodeHandle,
}

impl ConfigCtx<'_> {
    pub fn handle(&self) -> NodeHandle {
        self.handle
    }

    /// Create a node owned by the handler's node; it is destroyed with it.
    pub fn create_child(&mut self, kind: NodeKind) -> NodeHandle {
        let child = self.graph.insert_node(kind, Some(self.handle));
        if let Some(node) = self.graph.node_mut(self.handle) {
            node.children.push(child);
        }
        child
    }

    pub fn child_count(&self) -> usize {
        self.graph
            .node_ref(self.handle)
            .map(|n| n.children.len())
            .unwrap_or(0)
    }

    /// Drain-and-destroy every owned child, clearing port forwards that
    /// pointed into the dropped subgraph.
    pub fn destroy_children(&mut self) {
        let children = self
            .graph
            .node_mut(self.handle)
            .map(|n| std::mem::take(&mut n.children))
            .unwrap_or_default();
        for child in children {
            self.graph.release_recursive(child);
        }
        if let Some(node) = self.graph.node_mut(self.handle) {
            node.input_forwards.clear();
            node.output_forwards.clear();
        }
    }

    pub fn connect(&mut self, src: Endpoint, dst: Endpoint) -> Result<(), GraphError> {
        self.graph.connect(&src, &dst)
    }

    pub fn connect_element(
        &mut self,
        src: Endpoint,
        dst: Endpoint,
        element: u32,
    ) -> Result<(), GraphError> {
        self.graph.connect_element(&src, &dst, element)
    }

    pub fn set_port_array_size(
        &mut self,
        node: NodeHandle,
        port: &str,
        size: u32,
    ) -> Result<(), GraphError> {
        self.graph.set_port_array_size(node, port, size)
    }

    /// Expose an internal input endpoint as this node's own input port.
    pub fn forward_input(&mut self, port: &str, to: Endpoint) {
        if let Some(node) = self.graph.node_mut(self.handle) {
            node.input_forwards.insert(port.to_string(), to);
        }
    }

    /// Expose an internal output endpoint as this node's own output port.
    pub fn forward_output(&mut self, port: &str, to: Endpoint) {
        if let Some(node) = self.graph.node_mut(self.handle) {
            node.output_forwards.insert(port.to_string(), to);
        }
    }

    /// Queue a message for a child (or any node); it is delivered within the
    /// current pump, preserving causal order.
    pub fn send_to(&mut self, node: NodeHandle, port: &str, msg: Message) {
        self.graph.queue.push_back(Delivery {
            node,
            port: port.to_string(),
            element: 0,
            message: msg,
        });
    }

    /// Emit on one of this node's message output ports; fan-out follows the
    /// authored message connections.
    pub fn emit(&mut self, port: &str, msg: Message) {
        self.graph.emit_from(self.handle, port, msg);
    }
}

/// Owner of all nodes, ports, and connections.
#[derive(Default)]
pub struct EvaluationGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    data_edges: Vec<DataEdge>,
    message_edges: Vec<MessageEdge>,
    array_sizes: HashMap<(u32, String), u32>,
    queue: VecDeque<Delivery>,
    declared_outputs: Vec<Endpoint>,
    eval: EvalState,
}

impl EvaluationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Node lifecycle --------------------------------------------------

    pub fn create_node(&mut self, kind: NodeKind) -> NodeHandle {
        self.insert_node(kind, None)
    }

    fn insert_node(&mut self, kind: NodeKind, parent: Option<NodeHandle>) -> NodeHandle {
        let node = Node {
            descriptor: kind.descriptor(),
            kind: Some(kind),
            children: Vec::new(),
            parent,
            input_forwards: HashMap::new(),
            output_forwards: HashMap::new(),
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeHandle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeHandle::new(index, 0)
        }
    }

    /// Destroy a node and everything it owns. Fails while any authored
    /// connection still references the node; callers disconnect first.
    pub fn destroy_node(&mut self, handle: NodeHandle) -> Result<(), GraphError> {
        self.node_ref(handle).ok_or(GraphError::StaleHandle)?;
        let touches = |ep: &Endpoint| ep.node == handle;
        if self.data_edges.iter().any(|e| touches(&e.src) || touches(&e.dst))
            || self
                .message_edges
                .iter()
                .any(|e| touches(&e.src) || touches(&e.dst))
        {
            return Err(GraphError::NodeInUse);
        }
        if let Some(parent) = self.node_ref(handle).and_then(|n| n.parent) {
            if let Some(p) = self.node_mut(parent) {
                p.children.retain(|c| *c != handle);
            }
        }
        self.release_recursive(handle);
        Ok(())
    }

    /// Tear down a subtree, removing any connections into it. Used for
    /// owned children during rebuild, where edges are internal by
    /// construction.
    fn release_recursive(&mut self, handle: NodeHandle) {
        let Some(node) = self.node_mut(handle) else {
            return;
        };
        let children = std::mem::take(&mut node.children);
        for child in children {
            self.release_recursive(child);
        }
        let touches = |ep: &Endpoint| ep.node == handle;
        self.data_edges.retain(|e| !touches(&e.src) && !touches(&e.dst));
        self.message_edges
            .retain(|e| !touches(&e.src) && !touches(&e.dst));
        self.array_sizes.retain(|(slot, _), _| *slot != handle.index);
        self.eval.outputs.remove(&handle.index);
        self.eval.node_states.remove(&handle.index);
        self.eval.staged.remove(&handle.index);
        let slot = &mut self.slots[handle.index as usize];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
    }

    pub fn is_live(&self, handle: NodeHandle) -> bool {
        self.node_ref(handle).is_some()
    }

    pub fn node_state(&self, handle: NodeHandle) -> Option<NodeState> {
        self.node_ref(handle)
            .and_then(|n| n.kind.as_ref())
            .map(|k| k.state())
    }

    /// Number of nodes currently alive (diagnostics and leak tests).
    pub fn live_node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    /// Direct children owned by a composite node.
    pub fn children_of(&self, handle: NodeHandle) -> Vec<NodeHandle> {
        self.node_ref(handle)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn node_ref(&self, handle: NodeHandle) -> Option<&Node> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.node.as_mut()
    }

    fn port_def(&self, ep: &Endpoint) -> Result<&'static PortDef, GraphError> {
        let node = self.node_ref(ep.node).ok_or(GraphError::StaleHandle)?;
        node.descriptor
            .port(&ep.port)
            .ok_or_else(|| GraphError::NoSuchPort(ep.port.clone()))
    }

    // --- Connections -----------------------------------------------------

    /// Connect an output port to a non-array input port.
    pub fn connect(&mut self, src: &Endpoint, dst: &Endpoint) -> Result<(), GraphError> {
        let dst_def = self.port_def(dst)?;
        if dst_def.array {
            return Err(GraphError::NotAnArray(dst.port.clone()));
        }
        self.connect_checked(src, dst, 0)
    }

    /// Connect an output port to one element of an array input port.
    pub fn connect_element(
        &mut self,
        src: &Endpoint,
        dst: &Endpoint,
        element: u32,
    ) -> Result<(), GraphError> {
        let dst_def = self.port_def(dst)?;
        if !dst_def.array {
            return Err(GraphError::NotAnArray(dst.port.clone()));
        }
        let size = self
            .array_sizes
            .get(&(dst.node.index, dst.port.clone()))
            .copied()
            .unwrap_or(0);
        if element >= size {
            return Err(GraphError::ElementOutOfRange {
                port: dst.port.clone(),
                element,
                size,
            });
        }
        self.connect_checked(src, dst, element)
    }

    fn connect_checked(
        &mut self,
        src: &Endpoint,
        dst: &Endpoint,
        element: u32,
    ) -> Result<(), GraphError> {
        let src_def = self.port_def(src)?;
        let dst_def = self.port_def(dst)?;
        if src_def.direction != PortDirection::Output || dst_def.direction != PortDirection::Input {
            return Err(GraphError::DirectionMismatch);
        }
        if src_def.kind != dst_def.kind {
            return Err(GraphError::KindMismatch);
        }
        if src_def.tag != dst_def.tag {
            return Err(GraphError::TypeMismatch {
                expected: dst_def.tag,
                got: src_def.tag,
            });
        }
        match dst_def.kind {
            PortKind::Data => {
                // Data inputs are single-consumer per element.
                if self
                    .data_edges
                    .iter()
                    .any(|e| e.dst == *dst && e.dst_element == element)
                {
                    return Err(GraphError::PortOccupied(dst.port.clone()));
                }
                self.data_edges.push(DataEdge {
                    src: src.clone(),
                    dst: dst.clone(),
                    dst_element: element,
                });
            }
            PortKind::Message => {
                // Message ports fan out freely.
                self.message_edges.push(MessageEdge {
                    src: src.clone(),
                    dst: dst.clone(),
                    dst_element: element,
                });
            }
        }
        Ok(())
    }

    pub fn disconnect(&mut self, src: &Endpoint, dst: &Endpoint) -> Result<(), GraphError> {
        let before = self.data_edges.len() + self.message_edges.len();
        self.data_edges.retain(|e| !(e.src == *src && e.dst == *dst));
        self.message_edges
            .retain(|e| !(e.src == *src && e.dst == *dst));
        if before == self.data_edges.len() + self.message_edges.len() {
            return Err(GraphError::NoSuchPort(dst.port.clone()));
        }
        Ok(())
    }

    /// Resize an array input port. Shrinking drops edges beyond the new
    /// size.
    pub fn set_port_array_size(
        &mut self,
        node: NodeHandle,
        port: &str,
        size: u32,
    ) -> Result<(), GraphError> {
        let ep = Endpoint::new(node, port);
        let def = self.port_def(&ep)?;
        if !def.array {
            return Err(GraphError::NotAnArray(port.to_string()));
        }
        self.array_sizes.insert((node.index, port.to_string()), size);
        self.data_edges
            .retain(|e| !(e.dst == ep && e.dst_element >= size));
        self.message_edges
            .retain(|e| !(e.dst == ep && e.dst_element >= size));
        Ok(())
    }

    /// Resize a node's stream buffer expectation; sugar over the
    /// `buffer_size` message port.
    pub fn set_buffer_size(&mut self, node: NodeHandle, size: usize) -> Result<(), GraphError> {
        self.send_message(&Endpoint::new(node, "buffer_size"), Message::BufferSize(size))
    }

    // --- Messages --------------------------------------------------------

    /// Send a configuration message to a message input port. Delivery is
    /// synchronous: the queue is pumped to a fixpoint before returning, so
    /// any rebuild triggered by the message has completed.
    pub fn send_message(&mut self, dst: &Endpoint, msg: Message) -> Result<(), GraphError> {
        let def = self.port_def(dst)?;
        if def.kind != PortKind::Message || def.direction != PortDirection::Input {
            return Err(GraphError::KindMismatch);
        }
        if def.tag != msg.tag() {
            return Err(GraphError::TypeMismatch {
                expected: def.tag,
                got: msg.tag(),
            });
        }
        self.queue.push_back(Delivery {
            node: dst.node,
            port: dst.port.clone(),
            element: 0,
            message: msg,
        });
        self.pump()
    }

    fn emit_from(&mut self, node: NodeHandle, port: &str, msg: Message) {
        let src = Endpoint::new(node, port);
        let targets: Vec<(NodeHandle, String, u32)> = self
            .message_edges
            .iter()
            .filter(|e| e.src == src)
            .map(|e| (e.dst.node, e.dst.port.clone(), e.dst_element))
            .collect();
        for (dst_node, dst_port, element) in targets {
            self.queue.push_back(Delivery {
                node: dst_node,
                port: dst_port,
                element,
                message: msg.clone(),
            });
        }
    }

    /// Deliver queued messages until the queue drains. Handlers run with
    /// their node detached from its slot, so they may mutate the graph
    /// (create children, connect, queue further messages) without
    /// re-entering themselves.
    fn pump(&mut self) -> Result<(), GraphError> {
        let mut result = Ok(());
        while let Some(delivery) = self.queue.pop_front() {
            let Some(node) = self.node_mut(delivery.node) else {
                // Target was destroyed by an earlier rebuild; drop silently.
                continue;
            };
            let Some(mut kind) = node.kind.take() else {
                continue;
            };
            let mut ctx = ConfigCtx {
                graph: self,
                handle: delivery.node,
            };
            let outcome = kind.on_message(&mut ctx, &delivery.port, delivery.element, &delivery.message);
            if let Some(node) = self.node_mut(delivery.node) {
                node.kind = Some(kind);
            }
            // A failed handler aborts only that node's rebuild; the pump
            // continues so unrelated nodes still configure. First error wins.
            if result.is_ok() {
                if let Err(err) = outcome {
                    result = Err(err);
                }
            }
        }
        result
    }

    // --- Forward resolution ----------------------------------------------

    fn resolve_output(&self, mut ep: Endpoint) -> Endpoint {
        for _ in 0..32 {
            match self
                .node_ref(ep.node)
                .and_then(|n| n.output_forwards.get(&ep.port))
            {
                Some(next) => ep = next.clone(),
                None => break,
            }
        }
        ep
    }

    fn resolve_input(&self, mut ep: Endpoint) -> Endpoint {
        for _ in 0..32 {
            match self
                .node_ref(ep.node)
                .and_then(|n| n.input_forwards.get(&ep.port))
            {
                Some(next) => ep = next.clone(),
                None => break,
            }
        }
        ep
    }

    // --- Evaluation ------------------------------------------------------

    /// Declare a graph output: evaluation schedules every node reachable
    /// upstream of the declared set. With no declarations, the whole graph
    /// runs.
    pub fn declare_output(&mut self, ep: Endpoint) -> Result<(), GraphError> {
        let def = self.port_def(&ep)?;
        if def.kind != PortKind::Data || def.direction != PortDirection::Output {
            return Err(GraphError::KindMismatch);
        }
        self.declared_outputs.push(ep);
        Ok(())
    }

    /// Stage a host-provided value for a `StreamSource` (or any staged
    /// consumer) ahead of the next evaluation.
    pub fn stage_input(&mut self, node: NodeHandle, value: DataValue) -> Result<(), GraphError> {
        if !self.is_live(node) {
            return Err(GraphError::StaleHandle);
        }
        self.eval.staged.insert(node.index, value);
        Ok(())
    }

    /// Run the kernel phase. Pending configuration messages are flushed
    /// first, preserving the configuration-before-execution ordering. The
    /// returned token is the outgoing completion signal for this frame.
    pub fn evaluate(
        &mut self,
        dt: f32,
        after: Option<&CompletionToken>,
    ) -> Result<CompletionToken, GraphError> {
        if let Some(token) = after {
            if token.frame > self.eval.frame {
                return Err(GraphError::DependencyNotComplete {
                    token: token.frame,
                    required: self.eval.frame,
                });
            }
        }
        self.pump()?;

        self.eval.frame += 1;
        self.eval.dt = dt;
        self.eval.t += dt;
        self.eval.outputs.clear();
        let live: HashSet<u32> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.node.is_some())
            .map(|(i, _)| i as u32)
            .collect();
        self.eval.node_states.retain(|slot, _| live.contains(slot));
        self.eval.staged.retain(|slot, _| live.contains(slot));

        // Resolve authored edges through composite port forwards.
        let mut resolved: Vec<(Endpoint, Endpoint, u32)> = Vec::with_capacity(self.data_edges.len());
        for edge in &self.data_edges {
            let src = self.resolve_output(edge.src.clone());
            let dst = self.resolve_input(edge.dst.clone());
            if self.node_ref(src.node).is_none() || self.node_ref(dst.node).is_none() {
                continue;
            }
            resolved.push((src, dst, edge.dst_element));
        }
        let dep_edges: Vec<DepEdge> = resolved
            .iter()
            .map(|(src, dst, _)| DepEdge {
                src: src.node.index,
                dst: dst.node.index,
            })
            .collect();

        let needed: HashSet<u32> = if self.declared_outputs.is_empty() {
            live
        } else {
            let roots: Vec<u32> = self
                .declared_outputs
                .iter()
                .map(|ep| self.resolve_output(ep.clone()).node.index)
                .collect();
            reachable_upstream(&roots, &dep_edges)
                .into_iter()
                .filter(|slot| live.contains(slot))
                .collect()
        };

        let order = topo_order(&needed, &dep_edges)?;

        // Input lookup: (dst slot, port, element) -> (src slot, src port).
        let mut input_map: HashMap<(u32, String, u32), (u32, String)> = HashMap::new();
        for (src, dst, element) in &resolved {
            input_map.insert(
                (dst.node.index, dst.port.clone(), *element),
                (src.node.index, src.port.clone()),
            );
        }

        for slot_index in order {
            let Some(node) = self.slots[slot_index as usize].node.as_ref() else {
                continue;
            };
            let Some(kind) = node.kind.as_ref() else {
                continue;
            };
            if kind.is_composite() {
                continue;
            }

            let mut inputs: HashMap<String, InputSlot> = HashMap::new();
            for def in kind.descriptor().ports {
                if def.kind != PortKind::Data || def.direction != PortDirection::Input {
                    continue;
                }
                if def.array {
                    let size = self
                        .array_sizes
                        .get(&(slot_index, def.name.to_string()))
                        .copied()
                        .unwrap_or(0);
                    let mut values = Vec::with_capacity(size as usize);
                    for element in 0..size {
                        values.push(self.lookup_input(&input_map, slot_index, def.name, element));
                    }
                    inputs.insert(def.name.to_string(), InputSlot::Array(values));
                } else if let Some(value) = self.lookup_input(&input_map, slot_index, def.name, 0) {
                    inputs.insert(def.name.to_string(), InputSlot::Single(value));
                }
            }

            let staged = self.eval.staged.get(&slot_index).cloned();
            let mut state = self.eval.node_states.remove(&slot_index);
            let outputs = {
                let mut ctx = KernelCtx {
                    inputs,
                    staged,
                    t: self.eval.t,
                    dt: self.eval.dt,
                    state: &mut state,
                };
                kind.execute(&mut ctx)?
            };
            if let Some(state) = state {
                self.eval.node_states.insert(slot_index, state);
            }
            self.eval.outputs.insert(slot_index, outputs);
        }

        Ok(CompletionToken {
            frame: self.eval.frame,
        })
    }

    fn lookup_input(
        &self,
        input_map: &HashMap<(u32, String, u32), (u32, String)>,
        slot: u32,
        port: &str,
        element: u32,
    ) -> Option<DataValue> {
        let (src_slot, src_port) = input_map.get(&(slot, port.to_string(), element))?;
        self.eval
            .outputs
            .get(src_slot)
            .and_then(|outs| outs.get(src_port))
            .cloned()
    }

    /// Read an output port's value from the last evaluation, resolving
    /// composite forwards.
    pub fn output_value(&self, ep: &Endpoint) -> Option<DataValue> {
        let resolved = self.resolve_output(ep.clone());
        self.eval
            .outputs
            .get(&resolved.node.index)
            .and_then(|outs| outs.get(&resolved.port))
            .cloned()
    }
}
