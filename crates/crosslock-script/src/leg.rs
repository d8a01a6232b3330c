//! Observer-side state of one script-chain leg.
//!
//! A script-chain HTLC holds no state of its own; a leg's progress is read
//! off the transactions that fund and spend it. `ScriptLeg` folds those
//! observations into a small state machine with the same terminal rules as
//! a contract-chain escrow.

use bitcoin::consensus::deserialize;
use bitcoin::{Amount, OutPoint, Transaction};
use crosslock_core::error::CrosslockError;
use crosslock_core::types::Secret;
use tracing::{info, warn};

use crate::lock::LockOutput;
use crate::scan::{classify_spend, find_lock_vout, is_spend_of, SpendKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptLegState {
    Unfunded,
    Funded { outpoint: OutPoint, value: Amount },
    Redeemed { secret: Secret },
    Refunded,
}

impl ScriptLegState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScriptLegState::Redeemed { .. } | ScriptLegState::Refunded)
    }
}

#[derive(Clone, Debug)]
pub struct ScriptLeg {
    pub lock: LockOutput,
    state: ScriptLegState,
}

impl ScriptLeg {
    pub fn new(lock: LockOutput) -> Self {
        Self {
            lock,
            state: ScriptLegState::Unfunded,
        }
    }

    pub fn state(&self) -> &ScriptLegState {
        &self.state
    }

    /// Record a transaction that may pay into the lock. Returns whether it
    /// did; unrelated transactions leave the leg untouched.
    pub fn observe_funding(&mut self, raw: &[u8]) -> Result<bool, CrosslockError> {
        match self.state {
            ScriptLegState::Unfunded => {}
            ScriptLegState::Funded { .. } => return Err(CrosslockError::AlreadyFunded),
            _ => return Err(CrosslockError::AlreadyTerminal),
        }
        let Some(vout) = find_lock_vout(raw, &self.lock) else {
            return Ok(false);
        };
        let tx: Transaction = deserialize(raw)
            .map_err(|e| CrosslockError::Serialization(e.to_string()))?;
        let value = tx.output[vout as usize].value;
        let outpoint = OutPoint::new(tx.compute_txid(), vout);

        info!(outpoint = %outpoint, value_sats = value.to_sat(), "script leg funded");
        self.state = ScriptLegState::Funded { outpoint, value };
        Ok(true)
    }

    /// Record a transaction that may spend the funded lock output. Returns
    /// whether it did.
    pub fn observe_spend(&mut self, raw: &[u8]) -> Result<bool, CrosslockError> {
        let outpoint = match &self.state {
            ScriptLegState::Funded { outpoint, .. } => *outpoint,
            ScriptLegState::Unfunded => return Err(CrosslockError::NotFunded),
            _ => return Err(CrosslockError::AlreadyTerminal),
        };
        if !is_spend_of(raw, &outpoint.txid, outpoint.vout) {
            return Ok(false);
        }
        match classify_spend(raw, &self.lock) {
            Some(SpendKind::Redeem { secret }) => {
                info!(outpoint = %outpoint, "script leg redeemed");
                self.state = ScriptLegState::Redeemed { secret };
                Ok(true)
            }
            Some(SpendKind::Refund) => {
                info!(outpoint = %outpoint, "script leg refunded");
                self.state = ScriptLegState::Refunded;
                Ok(true)
            }
            None => {
                warn!(outpoint = %outpoint, "lock output spent by an unrecognised witness");
                Ok(false)
            }
        }
    }

    /// The revealed secret once the leg has been redeemed.
    pub fn revealed_secret(&self) -> Option<&Secret> {
        match &self.state {
            ScriptLegState::Redeemed { secret } => Some(secret),
            _ => None,
        }
    }
}
