use std::path::Path;

use anyhow::Context;
use crosslock_escrow::EscrowConfig;
use crosslock_script::ScriptConfig;
use crosslock_timelock::CoordinatorConfig;
use serde::{Deserialize, Serialize};

/// Operator configuration. Every section falls back to its defaults when
/// absent from the file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrosslockConfig {
    pub script: ScriptConfig,
    pub escrow: EscrowConfig,
    pub coordinator: CoordinatorConfig,
}

impl CrosslockConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }
}
