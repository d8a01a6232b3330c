use crosslock_core::error::CrosslockError;
use crosslock_core::types::{Secret, SecretHash};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapStatus {
    Created,
    BothLegsFunded,
    SecretRevealed,
    Completed,
    Refunded,
    Expired,
    Failed,
}

impl SwapStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SwapStatus::Completed | SwapStatus::Refunded | SwapStatus::Expired | SwapStatus::Failed
        )
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwapStatus::Created => "created",
            SwapStatus::BothLegsFunded => "both legs funded",
            SwapStatus::SecretRevealed => "secret revealed",
            SwapStatus::Completed => "completed",
            SwapStatus::Refunded => "refunded",
            SwapStatus::Expired => "expired",
            SwapStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Chain observations the orchestrator feeds into a swap record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SwapEvent {
    BothLegsFunded,
    SecretRevealed(Secret),
    Completed,
    Refunded,
    Expired,
    Failed(String),
}

impl SwapEvent {
    fn target(&self) -> SwapStatus {
        match self {
            SwapEvent::BothLegsFunded => SwapStatus::BothLegsFunded,
            SwapEvent::SecretRevealed(_) => SwapStatus::SecretRevealed,
            SwapEvent::Completed => SwapStatus::Completed,
            SwapEvent::Refunded => SwapStatus::Refunded,
            SwapEvent::Expired => SwapStatus::Expired,
            SwapEvent::Failed(_) => SwapStatus::Failed,
        }
    }
}

/// The orchestrator's record of one cross-chain swap.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossChainSwapState {
    pub status: SwapStatus,
    pub source_timelock: u64,
    pub destination_timelock: u64,
    pub secret_hash: SecretHash,
    pub revealed_secret: Option<Secret>,
    /// Reason recorded with a `Failed` event.
    pub failure: Option<String>,
}

impl CrossChainSwapState {
    pub fn new(secret_hash: SecretHash, source_timelock: u64, destination_timelock: u64) -> Self {
        Self {
            status: SwapStatus::Created,
            source_timelock,
            destination_timelock,
            secret_hash,
            revealed_secret: None,
            failure: None,
        }
    }

    /// Advance the record. Allowed moves:
    ///
    /// ```text
    /// Created ─▶ BothLegsFunded ─▶ SecretRevealed ─▶ Completed
    /// Created | BothLegsFunded ─▶ Refunded | Expired | Failed
    /// ```
    ///
    /// A revealed secret must open `secret_hash`.
    pub fn apply(&mut self, event: SwapEvent) -> Result<SwapStatus, CrosslockError> {
        use SwapStatus::*;

        let to = event.target();
        let allowed = matches!(
            (self.status, to),
            (Created, BothLegsFunded)
                | (BothLegsFunded, SecretRevealed)
                | (SecretRevealed, Completed)
                | (Created | BothLegsFunded, Refunded | Expired | Failed)
        );
        if !allowed {
            return Err(CrosslockError::InvalidSwapTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }

        match event {
            SwapEvent::SecretRevealed(secret) => {
                if !secret.matches(&self.secret_hash) {
                    return Err(CrosslockError::InvalidSecret);
                }
                self.revealed_secret = Some(secret);
            }
            SwapEvent::Failed(reason) => self.failure = Some(reason),
            _ => {}
        }

        info!(secret_hash = %self.secret_hash, from = %self.status, to = %to, "swap status");
        self.status = to;
        Ok(to)
    }

    /// One-line human-readable summary at `now`.
    pub fn describe(&self, now: u64) -> String {
        let detail = match self.status {
            SwapStatus::Created | SwapStatus::BothLegsFunded => format!(
                "destination refundable {}, source refundable {}",
                countdown(self.destination_timelock, now),
                countdown(self.source_timelock, now)
            ),
            SwapStatus::SecretRevealed => format!(
                "source must be redeemed {}",
                countdown(self.source_timelock, now)
            ),
            SwapStatus::Failed => match &self.failure {
                Some(reason) => format!("reason: {}", reason),
                None => "no reason recorded".to_string(),
            },
            SwapStatus::Completed | SwapStatus::Refunded | SwapStatus::Expired => {
                "settled".to_string()
            }
        };
        format!(
            "Swap {} | {} | {}",
            &self.secret_hash.to_hex()[..18],
            self.status,
            detail
        )
    }
}

fn countdown(deadline: u64, now: u64) -> String {
    if deadline > now {
        format!("in {}", deadline - now)
    } else {
        format!("since {}", now - deadline)
    }
}
