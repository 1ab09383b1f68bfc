//! Blend tree composite node (1D and 2D simple-directional).
//!
//! The node owns one clip player (or nested blend tree) per motion plus an
//! N-way mixer. Asset or skeleton changes rebuild that subgraph; parameter
//! changes only recompute weights and push them to the mixer's weight port.
//! Nested trees report their weighted duration back on a message output, so
//! duration folds post-order through the message pump.

use std::sync::Arc;

use hashbrown::HashMap;

use animrig_api_core::blend_tree::{BlendTree, BlendTreeKind, MotionSource};
use animrig_api_core::SkeletonDefinition;

use crate::error::GraphError;
use crate::graph::ConfigCtx;
use crate::handle::NodeHandle;
use crate::message::{ClipConfigMask, Message};
use crate::nodes::{NodeKind, NodeState};
use crate::port::{Endpoint, NodeDescriptor, PortDef, TypeTag};
use crate::weights;

pub static BLEND_TREE: NodeDescriptor = NodeDescriptor {
    name: "blend_tree",
    ports: &[
        PortDef::msg_in("skeleton", TypeTag::Skeleton),
        PortDef::msg_in("tree", TypeTag::BlendTree),
        PortDef::msg_in("parameter", TypeTag::Parameter),
        PortDef::msg_in("additive", TypeTag::Bool),
        PortDef::msg_in_array("motion_duration", TypeTag::Duration),
        PortDef::msg_out("duration_out", TypeTag::Duration),
        PortDef::data_in("time", TypeTag::Float),
        PortDef::data_out("out", TypeTag::Stream),
        PortDef::data_out("duration", TypeTag::Float),
    ],
};

#[derive(PartialEq)]
struct BuiltKey {
    skeleton: *const SkeletonDefinition,
    tree: *const BlendTree,
    additive: bool,
}

#[derive(Default)]
pub struct BlendTreeNode {
    pub skeleton: Option<Arc<SkeletonDefinition>>,
    pub tree: Option<Arc<BlendTree>>,
    pub additive: bool,
    params: HashMap<String, f32>,
    /// Source duration per motion; nested entries refresh via messages.
    motion_durations: Vec<f32>,
    weights: Vec<f32>,
    mixer: Option<NodeHandle>,
    duration_const: Option<NodeHandle>,
    /// Children that are nested trees and receive parameter routing.
    tree_children: Vec<NodeHandle>,
    built: Option<BuiltKey>,
}

impl std::fmt::Debug for BlendTreeNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlendTreeNode")
            .field("additive", &self.additive)
            .field("weights", &self.weights)
            .field("has_skeleton", &self.skeleton.is_some())
            .field("has_tree", &self.tree.is_some())
            .finish()
    }
}

impl BlendTreeNode {
    pub fn state(&self) -> NodeState {
        match (&self.skeleton, &self.tree) {
            (Some(_), Some(_)) => NodeState::Evaluable,
            (Some(_), None) => NodeState::Configured,
            _ => NodeState::Uninitialized,
        }
    }

    /// Per-motion weights from the last recompute (tests and tooling).
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn on_message(
        &mut self,
        ctx: &mut ConfigCtx<'_>,
        port: &str,
        element: u32,
        msg: &Message,
    ) -> Result<(), GraphError> {
        match (port, msg) {
            ("skeleton", Message::Skeleton(skel)) => {
                self.skeleton = Some(skel.clone());
                self.rebuild(ctx)
            }
            ("tree", Message::BlendTree(tree)) => {
                self.tree = Some(tree.clone());
                self.rebuild(ctx)
            }
            ("additive", Message::Bool(flag)) => {
                self.additive = *flag;
                self.rebuild(ctx)
            }
            ("parameter", Message::Parameter { name, value }) => {
                self.params.insert(name.clone(), *value);
                // Route to nested trees; their own recompute reports back
                // through `motion_duration`.
                for child in self.tree_children.clone() {
                    ctx.send_to(child, "parameter", msg.clone());
                }
                self.recompute(ctx);
                Ok(())
            }
            ("motion_duration", Message::Duration(d)) => {
                let slot = element as usize;
                if slot < self.motion_durations.len() {
                    self.motion_durations[slot] = *d;
                }
                self.recompute(ctx);
                Ok(())
            }
            _ => Err(GraphError::NoSuchPort(port.to_string())),
        }
    }

    fn rebuild(&mut self, ctx: &mut ConfigCtx<'_>) -> Result<(), GraphError> {
        let (Some(skeleton), Some(tree)) = (self.skeleton.clone(), self.tree.clone()) else {
            ctx.destroy_children();
            self.built = None;
            self.mixer = None;
            self.duration_const = None;
            self.tree_children.clear();
            return Ok(());
        };

        let key = BuiltKey {
            skeleton: Arc::as_ptr(&skeleton),
            tree: Arc::as_ptr(&tree),
            additive: self.additive,
        };
        if self.built.as_ref() == Some(&key) {
            return Ok(());
        }

        ctx.destroy_children();
        self.tree_children.clear();

        let me = ctx.handle();
        let motion_count = tree.motions.len();

        let relay = ctx.create_child(NodeKind::FloatPassThrough);
        ctx.forward_input("time", Endpoint::new(relay, "in"));

        let mixer = ctx.create_child(NodeKind::n_mixer());
        ctx.set_port_array_size(mixer, "sources", motion_count as u32)?;
        ctx.forward_output("out", Endpoint::new(mixer, "out"));
        self.mixer = Some(mixer);

        let duration_const = ctx.create_child(NodeKind::float_constant());
        ctx.forward_output("duration", Endpoint::new(duration_const, "out"));
        self.duration_const = Some(duration_const);

        ctx.set_port_array_size(me, "motion_duration", motion_count as u32)?;

        let params = self.params.clone();
        let lookup = |name: &str| params.get(name).copied().unwrap_or(0.0);
        self.motion_durations = tree
            .motions
            .iter()
            .map(|m| weights::motion_source_duration(&m.source, &lookup))
            .collect();

        for (i, motion) in tree.motions.iter().enumerate() {
            let child = match &motion.source {
                MotionSource::Clip(clip) => {
                    let player = ctx.create_child(NodeKind::clip_player());
                    ctx.send_to(player, "skeleton", Message::Skeleton(skeleton.clone()));
                    ctx.send_to(player, "clip", Message::Clip(clip.clone()));
                    ctx.send_to(
                        player,
                        "config",
                        Message::ClipConfig(ClipConfigMask::NORMALIZED_TIME),
                    );
                    ctx.send_to(player, "additive", Message::Bool(self.additive));
                    player
                }
                MotionSource::Tree(sub) => {
                    let nested = ctx.create_child(NodeKind::blend_tree());
                    ctx.send_to(nested, "skeleton", Message::Skeleton(skeleton.clone()));
                    ctx.send_to(nested, "tree", Message::BlendTree(sub.clone()));
                    ctx.send_to(nested, "additive", Message::Bool(self.additive));
                    for (name, value) in &self.params {
                        ctx.send_to(
                            nested,
                            "parameter",
                            Message::Parameter {
                                name: name.clone(),
                                value: *value,
                            },
                        );
                    }
                    ctx.connect_element(
                        Endpoint::new(nested, "duration_out"),
                        Endpoint::new(me, "motion_duration"),
                        i as u32,
                    )?;
                    self.tree_children.push(nested);
                    nested
                }
            };
            ctx.connect(Endpoint::new(relay, "out"), Endpoint::new(child, "time"))?;
            ctx.connect_element(
                Endpoint::new(child, "out"),
                Endpoint::new(mixer, "sources"),
                i as u32,
            )?;
        }

        self.built = Some(key);
        self.recompute(ctx);
        Ok(())
    }

    /// Recompute per-motion weights, push them to the mixer, and re-report
    /// the weighted duration.
    fn recompute(&mut self, ctx: &mut ConfigCtx<'_>) {
        let Some(tree) = self.tree.clone() else {
            return;
        };
        if self.built.is_none() {
            return;
        }

        match tree.kind {
            BlendTreeKind::Simple1d => {
                let thresholds: Vec<f32> = tree.motions.iter().map(|m| m.threshold).collect();
                let p = self
                    .params
                    .get(&tree.parameters[0])
                    .copied()
                    .unwrap_or(0.0);
                weights::blend_1d_weights(&thresholds, p, &mut self.weights);
            }
            BlendTreeKind::SimpleDirectional2d => {
                let directions: Vec<[f32; 2]> = tree.motions.iter().map(|m| m.direction).collect();
                let p = [
                    self.params
                        .get(&tree.parameters[0])
                        .copied()
                        .unwrap_or(0.0),
                    self.params
                        .get(&tree.parameters[1])
                        .copied()
                        .unwrap_or(0.0),
                ];
                weights::blend_2d_weights(&directions, p, &mut self.weights);
            }
        }

        if let Some(mixer) = self.mixer {
            ctx.send_to(mixer, "weights", Message::Floats(self.weights.clone()));
        }

        let duration = weights::weighted_duration(&tree, &self.weights, &self.motion_durations);
        if let Some(duration_const) = self.duration_const {
            ctx.send_to(duration_const, "value", Message::Float(duration));
        }
        ctx.emit("duration_out", Message::Duration(duration));
    }
}
