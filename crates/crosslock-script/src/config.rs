use bitcoin::Network;
use crosslock_core::constants::{DEFAULT_FEE_RATE_SAT_PER_VB, DUST_LIMIT_SATS};
use serde::{Deserialize, Serialize};

/// Parameters of the script-chain leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Network whose address encoding the lock address uses.
    pub network: Network,
    /// Change below this value is folded into the fee.
    pub dust_limit_sats: u64,
    /// Fee rate (sat/vB) used when the operator does not supply one.
    pub default_fee_rate: u64,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            network: Network::Bitcoin,
            dust_limit_sats: DUST_LIMIT_SATS,
            default_fee_rate: DEFAULT_FEE_RATE_SAT_PER_VB,
        }
    }
}
