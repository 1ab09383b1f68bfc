//! Clip player: a composite node that rebuilds its sampling subgraph from
//! feature flags.
//!
//! On any configuration-affecting message the player destroys every child it
//! owns, recomputes its feature set, creates exactly the children the new
//! flag combination requires, wires the kernel-phase connections, and
//! re-sends current configuration to the fresh children. Rebuilding only on
//! configuration change keeps unused features off the per-frame path.

use std::sync::Arc;

use animrig_api_core::{Clip, SkeletonDefinition};

use crate::error::GraphError;
use crate::graph::ConfigCtx;
use crate::message::{ClipConfigMask, Message, RootVelocity};
use crate::nodes::{NodeKind, NodeState};
use crate::port::{Endpoint, NodeDescriptor, PortDef, TypeTag};

pub static CLIP_PLAYER: NodeDescriptor = NodeDescriptor {
    name: "clip_player",
    ports: &[
        PortDef::msg_in("skeleton", TypeTag::Skeleton),
        PortDef::msg_in("clip", TypeTag::Clip),
        PortDef::msg_in("config", TypeTag::ClipConfig),
        PortDef::msg_in("additive", TypeTag::Bool),
        PortDef::msg_in("velocity", TypeTag::RootVelocity),
        PortDef::msg_out("duration_out", TypeTag::Duration),
        PortDef::msg_out("sample_rate_out", TypeTag::SampleRate),
        PortDef::data_in("time", TypeTag::Float),
        PortDef::data_out("out", TypeTag::Stream),
    ],
};

/// Snapshot of the configuration a subgraph was last built from. Rebuilds
/// with an identical snapshot are skipped, which makes configuration
/// messages idempotent and leak-free.
#[derive(PartialEq)]
struct BuiltKey {
    skeleton: *const SkeletonDefinition,
    clip: *const Clip,
    config: ClipConfigMask,
    additive: bool,
    velocity: Option<RootVelocity>,
}

#[derive(Default)]
pub struct ClipPlayerNode {
    pub skeleton: Option<Arc<SkeletonDefinition>>,
    pub clip: Option<Arc<Clip>>,
    pub config: ClipConfigMask,
    pub additive: bool,
    pub velocity: Option<RootVelocity>,
    built: Option<BuiltKey>,
}

impl std::fmt::Debug for ClipPlayerNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipPlayerNode")
            .field("config", &self.config)
            .field("additive", &self.additive)
            .field("has_skeleton", &self.skeleton.is_some())
            .field("has_clip", &self.clip.is_some())
            .finish()
    }
}

impl ClipPlayerNode {
    pub fn state(&self) -> NodeState {
        match (&self.skeleton, &self.clip) {
            (Some(_), Some(_)) => NodeState::Evaluable,
            (Some(_), None) => NodeState::Configured,
            _ => NodeState::Uninitialized,
        }
    }

    pub fn on_message(
        &mut self,
        ctx: &mut ConfigCtx<'_>,
        port: &str,
        msg: &Message,
    ) -> Result<(), GraphError> {
        match (port, msg) {
            ("skeleton", Message::Skeleton(skel)) => self.skeleton = Some(skel.clone()),
            ("clip", Message::Clip(clip)) => self.clip = Some(clip.clone()),
            ("config", Message::ClipConfig(mask)) => self.config = *mask,
            ("additive", Message::Bool(flag)) => self.additive = *flag,
            ("velocity", Message::RootVelocity(v)) => self.velocity = Some(*v),
            _ => return Err(GraphError::NoSuchPort(port.to_string())),
        }
        self.rebuild(ctx)
    }

    fn rebuild(&mut self, ctx: &mut ConfigCtx<'_>) -> Result<(), GraphError> {
        // Deferred until both required references have arrived; until then
        // the unforwarded output reads as a null pass-through downstream.
        let (Some(skeleton), Some(clip)) = (self.skeleton.clone(), self.clip.clone()) else {
            ctx.destroy_children();
            self.built = None;
            return Ok(());
        };

        let key = BuiltKey {
            skeleton: Arc::as_ptr(&skeleton),
            clip: Arc::as_ptr(&clip),
            config: self.config,
            additive: self.additive,
            velocity: self.velocity,
        };
        if self.built.as_ref() == Some(&key) {
            return Ok(());
        }

        ctx.destroy_children();

        let config = self.config;
        let needs_loop_time = config.contains(ClipConfigMask::LOOP_TIME)
            || config.contains(ClipConfigMask::CYCLE_ROOT_MOTION)
            || config.contains(ClipConfigMask::LOOP_VALUES);
        // Loop correction and cycling both compare against reference samples
        // of the clip's first and last frame.
        let needs_references = config.contains(ClipConfigMask::LOOP_VALUES)
            || config.contains(ClipConfigMask::CYCLE_ROOT_MOTION);

        let duration = clip.duration;

        // Time chain: relay -> [normalized] -> [loop] -> sampler.
        let relay = ctx.create_child(NodeKind::FloatPassThrough);
        ctx.forward_input("time", Endpoint::new(relay, "in"));
        let mut time_out = Endpoint::new(relay, "out");

        if config.contains(ClipConfigMask::NORMALIZED_TIME) {
            let norm = ctx.create_child(NodeKind::normalized_time());
            ctx.send_to(norm, "duration", Message::Duration(duration));
            ctx.connect(time_out.clone(), Endpoint::new(norm, "in"))?;
            time_out = Endpoint::new(norm, "out");
        }

        let mut cycles_out = None;
        let mut loop_out = None;
        if needs_loop_time {
            let lt = ctx.create_child(NodeKind::loop_time());
            ctx.send_to(lt, "duration", Message::Duration(duration));
            ctx.connect(time_out.clone(), Endpoint::new(lt, "in"))?;
            time_out = Endpoint::new(lt, "out");
            loop_out = Some(Endpoint::new(lt, "out"));
            cycles_out = Some(Endpoint::new(lt, "cycles"));
        }

        let sampler = self.spawn_sampler(ctx, &skeleton, &clip);
        ctx.connect(time_out, Endpoint::new(sampler, "time"))?;
        let mut stream_out = Endpoint::new(sampler, "out");

        // Start/stop reference samples at fixed clip times.
        let references = if needs_references {
            let start_time = ctx.create_child(NodeKind::float_constant());
            ctx.send_to(start_time, "value", Message::Float(0.0));
            let start = self.spawn_sampler(ctx, &skeleton, &clip);
            ctx.connect(Endpoint::new(start_time, "out"), Endpoint::new(start, "time"))?;

            let stop_time = ctx.create_child(NodeKind::float_constant());
            ctx.send_to(stop_time, "value", Message::Float(duration));
            let stop = self.spawn_sampler(ctx, &skeleton, &clip);
            ctx.connect(Endpoint::new(stop_time, "out"), Endpoint::new(stop, "time"))?;
            Some((start, stop))
        } else {
            None
        };

        if config.contains(ClipConfigMask::LOOP_VALUES) {
            let (start, stop) = references.as_ref().copied().unwrap_or((sampler, sampler));
            let lv = ctx.create_child(NodeKind::LoopValues(Default::default()));
            ctx.connect(stream_out, Endpoint::new(lv, "in"))?;
            ctx.connect(Endpoint::new(start, "out"), Endpoint::new(lv, "start"))?;
            ctx.connect(Endpoint::new(stop, "out"), Endpoint::new(lv, "stop"))?;
            if let Some(loop_out) = &loop_out {
                // Progress through the loop in [0, 1].
                let progress = ctx.create_child(NodeKind::float_scale());
                let factor = if duration > 0.0 { 1.0 / duration } else { 0.0 };
                ctx.send_to(progress, "factor", Message::Float(factor));
                ctx.connect(loop_out.clone(), Endpoint::new(progress, "in"))?;
                ctx.connect(Endpoint::new(progress, "out"), Endpoint::new(lv, "progress"))?;
            }
            stream_out = Endpoint::new(lv, "out");
        }

        if config.contains(ClipConfigMask::CYCLE_ROOT_MOTION) {
            let (start, stop) = references.as_ref().copied().unwrap_or((sampler, sampler));
            let cr = ctx.create_child(NodeKind::CycleRoot(Default::default()));
            ctx.connect(stream_out, Endpoint::new(cr, "in"))?;
            ctx.connect(Endpoint::new(start, "out"), Endpoint::new(cr, "start"))?;
            ctx.connect(Endpoint::new(stop, "out"), Endpoint::new(cr, "stop"))?;
            if let Some(cycles) = &cycles_out {
                ctx.connect(cycles.clone(), Endpoint::new(cr, "cycles"))?;
            }
            stream_out = Endpoint::new(cr, "out");
        }

        if config.contains(ClipConfigMask::IN_PLACE) {
            let ip = ctx.create_child(NodeKind::InPlace(Default::default()));
            ctx.connect(stream_out, Endpoint::new(ip, "in"))?;
            stream_out = Endpoint::new(ip, "out");
        }

        if config.contains(ClipConfigMask::DELTA_ROOT_MOTION) {
            let dr = ctx.create_child(NodeKind::DeltaRootMotion(Default::default()));
            ctx.connect(stream_out, Endpoint::new(dr, "in"))?;
            stream_out = Endpoint::new(dr, "out");
        }

        if config.contains(ClipConfigMask::ROOT_MOTION_FROM_VELOCITY) {
            let vr = ctx.create_child(NodeKind::VelocityRootMotion(Default::default()));
            if let Some(velocity) = self.velocity {
                ctx.send_to(vr, "velocity", Message::RootVelocity(velocity));
            }
            ctx.connect(stream_out, Endpoint::new(vr, "in"))?;
            stream_out = Endpoint::new(vr, "out");
        }

        ctx.forward_output("out", stream_out);

        self.built = Some(key);
        ctx.emit("duration_out", Message::Duration(duration));
        ctx.emit("sample_rate_out", Message::SampleRate(clip.sample_rate));
        Ok(())
    }

    fn spawn_sampler(
        &self,
        ctx: &mut ConfigCtx<'_>,
        skeleton: &Arc<SkeletonDefinition>,
        clip: &Arc<Clip>,
    ) -> crate::handle::NodeHandle {
        let sampler = ctx.create_child(NodeKind::clip_sampler());
        ctx.send_to(sampler, "skeleton", Message::Skeleton(skeleton.clone()));
        ctx.send_to(sampler, "clip", Message::Clip(clip.clone()));
        ctx.send_to(sampler, "additive", Message::Bool(self.additive));
        sampler
    }
}
