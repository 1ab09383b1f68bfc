//! Port model: every node kind declares its ports in a static descriptor
//! table; connections address ports by `(handle, name)` endpoints.
//!
//! Message ports carry discrete configuration values delivered synchronously
//! during the configuration phase and allow multi-consumer fan-out. Data
//! ports carry per-evaluation values, are single-consumer on the input side
//! unless declared as an array, and are only read during the kernel phase.

use serde::{Deserialize, Serialize};

use crate::handle::NodeHandle;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortKind {
    Message,
    Data,
}

/// Coarse type tag checked at connection time and on message delivery.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    // Data-phase values
    Float,
    Bool,
    Stream,
    Transform,
    // Message-phase values
    Skeleton,
    Clip,
    BlendTree,
    ClipConfig,
    Floats,
    Parameter,
    Duration,
    SampleRate,
    BufferSize,
    ConstraintSetup,
    IkSetup,
    TwistSetup,
    RootVelocity,
}

/// Static description of one port of a node kind.
#[derive(Copy, Clone, Debug)]
pub struct PortDef {
    pub name: &'static str,
    pub direction: PortDirection,
    pub kind: PortKind,
    pub tag: TypeTag,
    /// Runtime-resizable fan-in (constraint source lists, mixer inputs).
    pub array: bool,
}

impl PortDef {
    pub const fn msg_in(name: &'static str, tag: TypeTag) -> Self {
        PortDef {
            name,
            direction: PortDirection::Input,
            kind: PortKind::Message,
            tag,
            array: false,
        }
    }

    pub const fn msg_in_array(name: &'static str, tag: TypeTag) -> Self {
        PortDef {
            name,
            direction: PortDirection::Input,
            kind: PortKind::Message,
            tag,
            array: true,
        }
    }

    pub const fn msg_out(name: &'static str, tag: TypeTag) -> Self {
        PortDef {
            name,
            direction: PortDirection::Output,
            kind: PortKind::Message,
            tag,
            array: false,
        }
    }

    pub const fn data_in(name: &'static str, tag: TypeTag) -> Self {
        PortDef {
            name,
            direction: PortDirection::Input,
            kind: PortKind::Data,
            tag,
            array: false,
        }
    }

    pub const fn data_in_array(name: &'static str, tag: TypeTag) -> Self {
        PortDef {
            name,
            direction: PortDirection::Input,
            kind: PortKind::Data,
            tag,
            array: true,
        }
    }

    pub const fn data_out(name: &'static str, tag: TypeTag) -> Self {
        PortDef {
            name,
            direction: PortDirection::Output,
            kind: PortKind::Data,
            tag,
            array: false,
        }
    }
}

/// Static description of a node kind's port surface.
#[derive(Copy, Clone, Debug)]
pub struct NodeDescriptor {
    pub name: &'static str,
    pub ports: &'static [PortDef],
}

impl NodeDescriptor {
    pub fn port(&self, name: &str) -> Option<&'static PortDef> {
        self.ports.iter().find(|p| p.name == name)
    }
}

/// Address of one port of one node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub node: NodeHandle,
    pub port: String,
}

impl Endpoint {
    pub fn new(node: NodeHandle, port: impl Into<String>) -> Self {
        Endpoint {
            node,
            port: port.into(),
        }
    }
}
