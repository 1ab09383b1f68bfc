//! Graph error taxonomy.
//!
//! Topology errors are rejected at the call that caused them. Kernel-phase
//! invariant violations abort the running evaluation. Transient
//! incompleteness (missing skeleton/clip before configuration completes) is
//! never an error; incomplete nodes forward null buffers instead.

use thiserror::Error;

use crate::port::TypeTag;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("stale node handle (node was destroyed or never existed)")]
    StaleHandle,

    #[error("node has no port named '{0}'")]
    NoSuchPort(String),

    #[error("port type mismatch: expected {expected:?}, got {got:?}")]
    TypeMismatch { expected: TypeTag, got: TypeTag },

    #[error("port kind mismatch: message and data ports cannot be connected")]
    KindMismatch,

    #[error("connection must run from an output port to an input port")]
    DirectionMismatch,

    #[error("data input port '{0}' is already connected")]
    PortOccupied(String),

    #[error("port '{0}' is not an array port")]
    NotAnArray(String),

    #[error("array element {element} out of range for port '{port}' of size {size}")]
    ElementOutOfRange {
        port: String,
        element: u32,
        size: u32,
    },

    #[error("node is still referenced by a live connection; disconnect first")]
    NodeInUse,

    #[error("cycle detected among data ports")]
    CycleDetected,

    #[error("kernel buffer length mismatch: expected {expected}, got {got}")]
    BufferLengthMismatch { expected: usize, got: usize },

    #[error("evaluation dependency not complete (token frame {token} < {required})")]
    DependencyNotComplete { token: u64, required: u64 },
}
