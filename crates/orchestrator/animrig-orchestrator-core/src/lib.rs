//! animrig-orchestrator: the per-frame driver.
//!
//! Owns skeleton instances and orders the two phases the engine promises:
//! all configuration (message delivery, rebuilds) strictly before kernel
//! evaluation, then synchronization of the evaluated streams back to the
//! external world. Instance failures are isolated: one instance aborting
//! its frame never stops the others.

pub mod diagnostics;
pub mod instance;

use std::collections::HashMap;

use anyhow::{anyhow, Result};

use animrig_sync_core::WorldTransformProvider;

pub use crate::diagnostics::DiagnosticsCfg;
pub use crate::instance::{FrameError, SkeletonInstance};

/// Outcome of one `AnimationSystem::step`.
#[derive(Debug, Default)]
pub struct FrameReport {
    pub epoch: u64,
    /// Instances whose frame was abandoned, with the reason.
    pub errors: Vec<(String, FrameError)>,
}

impl FrameReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Diagnostics-friendly summary of the frame.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "epoch": self.epoch,
            "errors": self
                .errors
                .iter()
                .map(|(id, err)| serde_json::json!({ "instance": id, "error": err.to_string() }))
                .collect::<Vec<_>>(),
        })
    }
}

/// The logical animation system: a set of skeleton instances advanced in
/// lockstep.
#[derive(Default)]
pub struct AnimationSystem {
    instances: HashMap<String, SkeletonInstance>,
    order: Vec<String>,
    epoch: u64,
    pub diagnostics: DiagnosticsCfg,
}

impl AnimationSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance; insertion order is evaluation order.
    pub fn add_instance(&mut self, instance: SkeletonInstance) -> Result<()> {
        let id = instance.id.clone();
        if self.instances.contains_key(&id) {
            return Err(anyhow!("instance '{id}' already registered"));
        }
        self.order.push(id.clone());
        self.instances.insert(id, instance);
        Ok(())
    }

    pub fn instance_mut(&mut self, id: &str) -> Option<&mut SkeletonInstance> {
        self.instances.get_mut(id)
    }

    pub fn instance(&self, id: &str) -> Option<&SkeletonInstance> {
        self.instances.get(id)
    }

    /// Advance every instance by `dt`. Per-instance failures are recorded
    /// in the report and logged; healthy instances still complete.
    pub fn step(&mut self, dt: f32, provider: &mut dyn WorldTransformProvider) -> FrameReport {
        self.epoch = self.epoch.wrapping_add(1);
        let mut report = FrameReport {
            epoch: self.epoch,
            errors: Vec::new(),
        };
        if self.diagnostics.enabled {
            log::debug!("animation frame {} begin (dt={dt})", self.epoch);
        }
        for id in &self.order {
            let Some(instance) = self.instances.get_mut(id) else {
                continue;
            };
            if let Err(err) = instance.run_frame(dt, provider) {
                if self.diagnostics.enabled {
                    log::warn!("instance '{id}' abandoned frame {}: {err}", self.epoch);
                }
                report.errors.push((id.clone(), err));
            }
        }
        if self.diagnostics.enabled {
            log::debug!(
                "animation frame {} end ({} instance(s), {} error(s))",
                self.epoch,
                self.order.len(),
                report.errors.len()
            );
        }
        report
    }
}
