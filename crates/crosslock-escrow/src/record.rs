use crosslock_core::error::CrosslockError;
use crosslock_core::types::{AccountAddress, Balance, OrderId, SecretHash, Timestamp};
use serde::{Deserialize, Serialize};

/// Lifecycle position of an escrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowStatus {
    Uninitialized,
    /// Parameters and safety deposit recorded; principal not yet attached.
    Initialized,
    Funded,
    Redeemed,
    Refunded,
    /// Refunded through the late recovery path.
    EmergencyRecovered,
}

impl EscrowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EscrowStatus::Redeemed | EscrowStatus::Refunded | EscrowStatus::EmergencyRecovered
        )
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EscrowStatus::Uninitialized => "uninitialized",
            EscrowStatus::Initialized => "initialized",
            EscrowStatus::Funded => "funded",
            EscrowStatus::Redeemed => "redeemed",
            EscrowStatus::Refunded => "refunded",
            EscrowStatus::EmergencyRecovered => "emergency-recovered",
        };
        f.write_str(s)
    }
}

/// Persisted state of one escrow. Owned and stored by the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecord {
    pub order_id: OrderId,
    /// Token held in escrow; [`AccountAddress::NATIVE`] for the native asset.
    pub asset: AccountAddress,
    pub amount: Balance,
    pub depositor: AccountAddress,
    pub withdrawer: AccountAddress,
    pub secret_hash: SecretHash,
    /// Unix timestamp at which the redeem path closes and refund opens.
    pub timelock: Timestamp,
    /// Native-asset bonus paid to whoever settles the escrow.
    pub safety_deposit: Balance,
    pub status: EscrowStatus,
}

impl EscrowRecord {
    pub fn is_redeemed(&self) -> bool {
        self.status == EscrowStatus::Redeemed
    }

    /// True for both the regular and the emergency refund.
    pub fn is_refunded(&self) -> bool {
        matches!(
            self.status,
            EscrowStatus::Refunded | EscrowStatus::EmergencyRecovered
        )
    }

    pub fn is_funded(&self) -> bool {
        self.status == EscrowStatus::Funded
    }

    /// Canonical byte encoding for persistence.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CrosslockError> {
        bincode::serialize(self).map_err(|e| CrosslockError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CrosslockError> {
        bincode::deserialize(bytes).map_err(|e| CrosslockError::Serialization(e.to_string()))
    }
}
