use crosslock_core::constants::{EMERGENCY_RECOVERY_DELAY_SECS, RECOMMENDED_EXCLUSIVE_PERIOD_SECS};
use serde::{Deserialize, Serialize};

/// Timing parameters of the contract-chain escrow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscrowConfig {
    /// Length of the tail window before the timelock in which anyone holding
    /// the secret may complete the withdrawal.
    pub exclusive_period_secs: u64,
    /// Delay after the timelock before emergency recovery opens.
    pub emergency_delay_secs: u64,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            exclusive_period_secs: RECOMMENDED_EXCLUSIVE_PERIOD_SECS,
            emergency_delay_secs: EMERGENCY_RECOVERY_DELAY_SECS,
        }
    }
}
