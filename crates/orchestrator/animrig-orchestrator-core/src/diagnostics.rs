use serde::{Deserialize, Serialize};

/// Diagnostics configuration for the frame driver. When enabled, phase
/// transitions and per-instance failures are reported through the `log`
/// facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsCfg {
    pub enabled: bool,
}

impl Default for DiagnosticsCfg {
    fn default() -> Self {
        DiagnosticsCfg { enabled: true }
    }
}
