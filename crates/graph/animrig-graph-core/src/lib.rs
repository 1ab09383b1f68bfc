//! animrig-graph-core: the evaluation graph engine.
//!
//! Animation computations (clip sampling, blend trees, constraints) are
//! represented as nodes in a dynamically reconfigurable directed graph with
//! two strictly ordered phases per frame:
//!
//! - the **configuration phase**: discrete messages (asset references,
//!   configuration records, scalar parameters) are pumped through message
//!   ports to a fixpoint; handlers may mutate the graph, including
//!   drain-and-destroy rebuilds of composite subgraphs;
//! - the **kernel phase**: pure per-node kernels run in data-dependency
//!   order over buffered port values, producing streams consumed downstream.
//!
//! Nodes live in an arena indexed by generation-checked handles; composite
//! nodes expose their internals through port forwarding so rebuilds never
//! invalidate authored connections.

pub mod error;
pub mod graph;
pub mod handle;
pub mod message;
pub mod nodes;
pub mod port;
pub mod topo;
pub mod value;
pub mod weights;

pub use error::GraphError;
pub use graph::{CompletionToken, EvaluationGraph};
pub use handle::NodeHandle;
pub use message::{
    ClipConfigMask, ConstraintSetup, ConstraintSource, IkSetup, Message, RootVelocity, TwistSetup,
};
pub use nodes::{NodeKind, NodeState};
pub use port::{Endpoint, PortDef, PortDirection, PortKind, TypeTag};
pub use value::{DataValue, StreamBuffer};
