use crosslock_core::constants::RECOMMENDED_EXCLUSIVE_PERIOD_SECS;
use crosslock_core::error::CrosslockError;
use crosslock_core::types::{Balance, HtlcParams, OrderId, PartyKey, SecretHash};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Minimum gap between the destination and source timelocks, in the
    /// clock both timelocks are expressed in.
    pub exclusive_period: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            exclusive_period: recommended_exclusive_period(),
        }
    }
}

/// Default margin for callers building timelocks. Not enforced by itself.
pub fn recommended_exclusive_period() -> u64 {
    RECOMMENDED_EXCLUSIVE_PERIOD_SECS
}

/// Require `destination_timelock + exclusive_period <= source_timelock`.
///
/// The destination leg is funded second; it must expire (or the secret must
/// surface) with at least `exclusive_period` to spare before the source
/// funder can refund. Overflow counts as a violation.
pub fn validate_ordering(
    source_timelock: u64,
    destination_timelock: u64,
    exclusive_period: u64,
) -> Result<(), CrosslockError> {
    let safe = destination_timelock
        .checked_add(exclusive_period)
        .is_some_and(|deadline| deadline <= source_timelock);
    if !safe {
        warn!(
            source_timelock,
            destination_timelock, exclusive_period, "rejecting unsafe timelock ordering"
        );
        return Err(CrosslockError::UnsafeTimelockOrdering {
            source_timelock,
            destination_timelock,
            exclusive_period,
        });
    }
    Ok(())
}

/// One counterparty's identity on each chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapParty {
    pub source_key: PartyKey,
    pub destination_key: PartyKey,
}

/// An order as agreed off-chain by maker and taker.
///
/// The maker funds the source leg and redeems the destination leg; the
/// taker funds the destination leg and redeems the source leg once the
/// maker's redemption reveals the secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOrder {
    pub order_id: OrderId,
    pub secret_hash: SecretHash,
    pub maker: SwapParty,
    pub taker: SwapParty,
    pub source_amount: Balance,
    pub destination_amount: Balance,
    pub source_timelock: u64,
    pub destination_timelock: u64,
}

/// HTLC parameters of one leg together with the value it locks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegParameters {
    pub params: HtlcParams,
    pub amount: Balance,
}

/// Gatekeeper for new swaps.
#[derive(Clone, Debug, Default)]
pub struct TimelockCoordinator {
    config: CoordinatorConfig,
}

impl TimelockCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn validate(&self, order: &SwapOrder) -> Result<(), CrosslockError> {
        if order.source_amount == 0 || order.destination_amount == 0 {
            return Err(CrosslockError::ZeroAmount);
        }
        validate_ordering(
            order.source_timelock,
            order.destination_timelock,
            self.config.exclusive_period,
        )
    }

    /// Split `order` into `(source, destination)` leg parameters sharing one
    /// secret hash.
    pub fn derive_leg_parameters(
        &self,
        order: &SwapOrder,
    ) -> Result<(LegParameters, LegParameters), CrosslockError> {
        self.validate(order)?;

        let source = LegParameters {
            params: HtlcParams {
                secret_hash: order.secret_hash,
                payer: order.maker.source_key.clone(),
                payee: order.taker.source_key.clone(),
                timelock: order.source_timelock,
            },
            amount: order.source_amount,
        };
        let destination = LegParameters {
            params: HtlcParams {
                secret_hash: order.secret_hash,
                payer: order.taker.destination_key.clone(),
                payee: order.maker.destination_key.clone(),
                timelock: order.destination_timelock,
            },
            amount: order.destination_amount,
        };

        info!(
            order_id = %order.order_id,
            source_timelock = order.source_timelock,
            destination_timelock = order.destination_timelock,
            "derived swap legs"
        );
        Ok((source, destination))
    }
}
