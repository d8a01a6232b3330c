//! Partial-fill planning.
//!
//! An order of `total_amount` split into `max_fills` parts is committed to by
//! `max_fills + 1` secrets. A fill that ends strictly inside the order uses
//! the secret of the part its last unit falls into; the fill that completes
//! the order always uses the extra secret at index `max_fills`.

use crosslock_core::error::CrosslockError;
use crosslock_core::types::{Balance, SecretHash};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::merkle::{build_merkle_tree, prove_leaf, MerkleProof};
use crate::secret::SecretPair;

/// Deterministic split of an order into fills.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialFillPlan {
    pub total_amount: Balance,
    pub max_fills: u32,
    /// Amount of each fill; the first `total_amount % max_fills` carry one
    /// extra unit.
    pub fills: Vec<Balance>,
}

/// One planned fill bound to its leaf secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundFill {
    /// Position of the fill in the plan (0-based).
    pub fill_number: u32,
    /// Leaf of the secret tree unlocking this fill.
    pub secret_index: u32,
    pub amount: Balance,
    pub secret_hash: SecretHash,
    pub proof: MerkleProof,
}

/// A plan with every fill bound to a secret and a proof against `root`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundFillPlan {
    pub root: [u8; 32],
    pub fills: Vec<BoundFill>,
}

/// Split `total_amount` into `max_fills` near-equal pieces.
pub fn plan_partial_fills(
    total_amount: Balance,
    max_fills: u32,
) -> Result<PartialFillPlan, CrosslockError> {
    if max_fills == 0 {
        return Err(CrosslockError::InvalidFillCount);
    }
    if total_amount == 0 {
        return Err(CrosslockError::ZeroAmount);
    }
    // Every fill must carry at least one unit.
    if total_amount < max_fills as Balance {
        return Err(CrosslockError::InvalidFillCount);
    }

    let parts = max_fills as Balance;
    let base = total_amount / parts;
    let remainder = total_amount % parts;
    let fills = (0..parts)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect();

    Ok(PartialFillPlan {
        total_amount,
        max_fills,
        fills,
    })
}

/// Index of the secret unlocking a fill of `fill_amount` after
/// `filled_before` units of a `total_amount` order split into `parts`.
///
/// Parts follow the boundaries of [`plan_partial_fills`]: the first
/// `total_amount % parts` parts are one unit longer than the rest.
pub fn secret_index_for(
    total_amount: Balance,
    parts: u32,
    filled_before: Balance,
    fill_amount: Balance,
) -> Result<u32, CrosslockError> {
    if parts == 0 || total_amount < parts as Balance {
        return Err(CrosslockError::InvalidFillCount);
    }
    if fill_amount == 0 {
        return Err(CrosslockError::ZeroAmount);
    }
    let remaining = total_amount.saturating_sub(filled_before);
    if fill_amount > remaining {
        return Err(CrosslockError::AmountMismatch {
            expected: remaining,
            got: fill_amount,
        });
    }

    let filled_after = filled_before + fill_amount;
    if filled_after == total_amount {
        return Ok(parts);
    }

    // Smallest part whose end is at or after `filled_after`.
    let base = total_amount / parts as Balance;
    let long_parts = total_amount % parts as Balance;
    let long_span = if long_parts == 0 {
        0
    } else {
        long_parts * (base + 1)
    };
    let index = if filled_after <= long_span {
        div_ceil(filled_after, base + 1) - 1
    } else {
        long_parts + div_ceil(filled_after - long_span, base) - 1
    };
    Ok(index as u32)
}

fn div_ceil(n: Balance, d: Balance) -> Balance {
    n / d + Balance::from(n % d != 0)
}

impl PartialFillPlan {
    /// Sum of all fills; equals `total_amount` by construction.
    pub fn total(&self) -> Balance {
        self.fills.iter().sum()
    }

    /// Bind every fill to its secret. `secrets` must hold `max_fills + 1`
    /// pairs, as produced by `generate_fill_secrets`.
    pub fn bind(&self, secrets: &[SecretPair]) -> Result<BoundFillPlan, CrosslockError> {
        let expected = self.max_fills as usize + 1;
        if secrets.len() != expected {
            return Err(CrosslockError::MerkleProof(format!(
                "expected {} secrets for {} fills, got {}",
                expected,
                self.max_fills,
                secrets.len()
            )));
        }

        let hashes: Vec<SecretHash> = secrets.iter().map(|p| p.hash).collect();
        let tree = build_merkle_tree(&hashes)?;

        let mut filled_before: Balance = 0;
        let mut fills = Vec::with_capacity(self.fills.len());
        for (n, amount) in self.fills.iter().enumerate() {
            let secret_index =
                secret_index_for(self.total_amount, self.max_fills, filled_before, *amount)?;
            let secret_hash = hashes[secret_index as usize];
            let proof = prove_leaf(&tree, &secret_hash)?;
            fills.push(BoundFill {
                fill_number: n as u32,
                secret_index,
                amount: *amount,
                secret_hash,
                proof,
            });
            filled_before += amount;
        }

        debug!(fills = fills.len(), total = self.total_amount, "bound partial fills");
        Ok(BoundFillPlan {
            root: tree.root(),
            fills,
        })
    }
}
