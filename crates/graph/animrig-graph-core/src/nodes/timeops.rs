//! Time-shaping kernels used inside clip player subgraphs.

use crate::error::GraphError;
use crate::graph::{KernelCtx, OutputMap};
use crate::message::Message;
use crate::port::{NodeDescriptor, PortDef, TypeTag};
use crate::value::DataValue;

pub static NORMALIZED_TIME: NodeDescriptor = NodeDescriptor {
    name: "normalized_time",
    ports: &[
        PortDef::msg_in("duration", TypeTag::Duration),
        PortDef::data_in("in", TypeTag::Float),
        PortDef::data_out("out", TypeTag::Float),
    ],
};

pub static LOOP_TIME: NodeDescriptor = NodeDescriptor {
    name: "loop_time",
    ports: &[
        PortDef::msg_in("duration", TypeTag::Duration),
        PortDef::data_in("in", TypeTag::Float),
        PortDef::data_out("out", TypeTag::Float),
        PortDef::data_out("cycles", TypeTag::Float),
    ],
};

/// Scales normalized [0, 1] time to clip seconds.
#[derive(Debug, Default)]
pub struct NormalizedTimeNode {
    pub duration: f32,
}

impl NormalizedTimeNode {
    pub fn on_message(&mut self, port: &str, msg: &Message) -> Result<(), GraphError> {
        match (port, msg) {
            ("duration", Message::Duration(d)) => {
                self.duration = *d;
                Ok(())
            }
            _ => Err(GraphError::NoSuchPort(port.to_string())),
        }
    }

    pub fn execute(&self, ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
        let mut map = OutputMap::with_capacity(1);
        map.insert(
            "out".to_string(),
            DataValue::Float(ctx.float_or("in", 0.0) * self.duration),
        );
        Ok(map)
    }
}

/// Wraps time into [0, duration) and reports the completed cycle count.
#[derive(Debug, Default)]
pub struct LoopTimeNode {
    pub duration: f32,
}

impl LoopTimeNode {
    pub fn on_message(&mut self, port: &str, msg: &Message) -> Result<(), GraphError> {
        match (port, msg) {
            ("duration", Message::Duration(d)) => {
                self.duration = *d;
                Ok(())
            }
            _ => Err(GraphError::NoSuchPort(port.to_string())),
        }
    }

    pub fn execute(&self, ctx: &mut KernelCtx<'_>) -> Result<OutputMap, GraphError> {
        let t = ctx.float_or("in", 0.0);
        let (wrapped, cycles) = if self.duration > 0.0 {
            let cycles = (t / self.duration).floor();
            (t - cycles * self.duration, cycles)
        } else {
            (0.0, 0.0)
        };
        let mut map = OutputMap::with_capacity(2);
        map.insert("out".to_string(), DataValue::Float(wrapped));
        map.insert("cycles".to_string(), DataValue::Float(cycles));
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::KernelCtx;
    use hashbrown::HashMap;

    fn ctx_with_float(name: &str, v: f32) -> (HashMap<String, crate::graph::InputSlot>, f32) {
        let mut inputs = HashMap::new();
        inputs.insert(
            name.to_string(),
            crate::graph::InputSlot::Single(DataValue::Float(v)),
        );
        (inputs, v)
    }

    #[test]
    fn loop_time_wraps_and_counts() {
        let node = LoopTimeNode { duration: 2.0 };
        let (inputs, _) = ctx_with_float("in", 5.0);
        let mut state = None;
        let mut ctx = KernelCtx {
            inputs,
            staged: None,
            t: 0.0,
            dt: 0.0,
            state: &mut state,
        };
        let out = node.execute(&mut ctx).unwrap();
        match (out.get("out"), out.get("cycles")) {
            (Some(DataValue::Float(w)), Some(DataValue::Float(c))) => {
                assert!((w - 1.0).abs() < 1e-6);
                assert!((c - 2.0).abs() < 1e-6);
            }
            _ => panic!("expected float outputs"),
        }
    }
}
