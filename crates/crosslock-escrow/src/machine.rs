//! Escrow transitions.
//!
//! Each public operation runs in two phases. The check phase reads the
//! record and the call context and produces a [`Settlement`] without
//! touching anything. The commit phase writes the new status and hands the
//! event and payouts back to the caller. A failed check leaves the record
//! exactly as it was.

use crosslock_core::error::CrosslockError;
use crosslock_core::types::{AccountAddress, Balance, OrderId, Secret, SecretHash, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EscrowConfig;
use crate::record::{EscrowRecord, EscrowStatus};

/// Arguments of [`Escrow::initialize`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowInit {
    pub order_id: OrderId,
    pub asset: AccountAddress,
    pub amount: Balance,
    pub depositor: AccountAddress,
    pub withdrawer: AccountAddress,
    pub secret_hash: SecretHash,
    pub timelock: Timestamp,
    pub safety_deposit: Balance,
}

/// Observable outcome of a transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowEvent {
    EscrowCreated {
        order_id: OrderId,
        secret_hash: SecretHash,
        timelock: Timestamp,
    },
    Deposited {
        depositor: AccountAddress,
        amount: Balance,
    },
    Redeemed {
        secret: Secret,
        withdrawer: AccountAddress,
    },
    Refunded {
        depositor: AccountAddress,
        emergency: bool,
    },
}

/// A transfer the contract chain must perform as part of a transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub to: AccountAddress,
    pub asset: AccountAddress,
    pub amount: Balance,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub event: EscrowEvent,
    pub payouts: Vec<Payout>,
}

/// Validated, not yet applied transition.
struct Settlement {
    record: EscrowRecord,
    event: EscrowEvent,
    payouts: Vec<Payout>,
}

// ── Escrow ───────────────────────────────────────────────────────────────────

/// One escrow instance. Holds no state beyond its record, which the
/// orchestrator persists with [`EscrowRecord::to_bytes`].
#[derive(Clone, Debug)]
pub struct Escrow {
    config: EscrowConfig,
    record: Option<EscrowRecord>,
}

impl Escrow {
    pub fn new(config: EscrowConfig) -> Self {
        Self {
            config,
            record: None,
        }
    }

    /// Resume an escrow from a persisted record.
    pub fn from_record(config: EscrowConfig, record: EscrowRecord) -> Self {
        Self {
            config,
            record: Some(record),
        }
    }

    pub fn record(&self) -> Option<&EscrowRecord> {
        self.record.as_ref()
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    pub fn state(&self) -> EscrowStatus {
        self.record
            .as_ref()
            .map_or(EscrowStatus::Uninitialized, |r| r.status)
    }

    // ── Operations ───────────────────────────────────────────────────────────

    /// Record the escrow parameters. `attached_value` must equal the
    /// safety deposit exactly.
    pub fn initialize(
        &mut self,
        init: EscrowInit,
        attached_value: Balance,
        now: Timestamp,
    ) -> Result<Transition, CrosslockError> {
        let settlement = self.check_initialize(init, attached_value, now)?;
        Ok(self.commit(settlement))
    }

    /// Attach the principal. Only the depositor may call, once.
    pub fn deposit(
        &mut self,
        caller: &AccountAddress,
        attached_value: Balance,
        now: Timestamp,
    ) -> Result<Transition, CrosslockError> {
        let settlement = self.check_deposit(caller, attached_value, now)?;
        Ok(self.commit(settlement))
    }

    /// Withdrawer claims principal and safety deposit with the secret.
    pub fn redeem(
        &mut self,
        caller: &AccountAddress,
        secret: &Secret,
        now: Timestamp,
    ) -> Result<Transition, CrosslockError> {
        let settlement = self.check_redeem(caller, secret, now)?;
        Ok(self.commit(settlement))
    }

    /// Anyone completes the withdrawal inside the tail window; the caller
    /// keeps the safety deposit.
    pub fn public_withdraw(
        &mut self,
        caller: &AccountAddress,
        secret: &Secret,
        now: Timestamp,
    ) -> Result<Transition, CrosslockError> {
        let settlement = self.check_public_withdraw(caller, secret, now)?;
        Ok(self.commit(settlement))
    }

    /// Return the principal to the depositor once the timelock has passed.
    pub fn refund(
        &mut self,
        caller: &AccountAddress,
        now: Timestamp,
    ) -> Result<Transition, CrosslockError> {
        let settlement = self.check_refund(caller, now, false)?;
        Ok(self.commit(settlement))
    }

    /// Late refund, open from `timelock + emergency_delay_secs`.
    pub fn emergency_recover(
        &mut self,
        caller: &AccountAddress,
        now: Timestamp,
    ) -> Result<Transition, CrosslockError> {
        let settlement = self.check_refund(caller, now, true)?;
        Ok(self.commit(settlement))
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Whether the withdrawer could redeem with `secret` at `now`.
    pub fn can_redeem(&self, secret: &Secret, now: Timestamp) -> bool {
        match &self.record {
            Some(r) => self.check_redeem(&r.withdrawer, secret, now).is_ok(),
            None => false,
        }
    }

    /// Whether any caller could refund at `now`.
    pub fn can_refund(&self, now: Timestamp) -> bool {
        self.check_refund(&AccountAddress::NATIVE, now, false).is_ok()
    }

    /// Whether any caller could publicly withdraw with `secret` at `now`.
    pub fn can_public_withdraw(&self, secret: &Secret, now: Timestamp) -> bool {
        self.check_public_withdraw(&AccountAddress::NATIVE, secret, now)
            .is_ok()
    }

    /// Start of the public-withdrawal tail window.
    pub fn public_window_opens_at(&self) -> Option<Timestamp> {
        self.record
            .as_ref()
            .map(|r| r.timelock.saturating_sub(self.config.exclusive_period_secs))
    }

    /// Earliest time emergency recovery is accepted.
    pub fn emergency_opens_at(&self) -> Option<Timestamp> {
        self.record
            .as_ref()
            .map(|r| r.timelock.saturating_add(self.config.emergency_delay_secs))
    }

    // ── Check phase ──────────────────────────────────────────────────────────

    fn check_initialize(
        &self,
        init: EscrowInit,
        attached_value: Balance,
        now: Timestamp,
    ) -> Result<Settlement, CrosslockError> {
        if self.record.is_some() {
            return Err(CrosslockError::AlreadyInitialized);
        }
        if init.amount == 0 {
            return Err(CrosslockError::ZeroAmount);
        }
        if init.timelock <= now {
            return Err(CrosslockError::TimelockAlreadyExpired {
                expired_at: init.timelock,
                now,
            });
        }
        if attached_value != init.safety_deposit {
            return Err(CrosslockError::InsufficientSafetyDeposit {
                expected: init.safety_deposit,
                got: attached_value,
            });
        }

        let event = EscrowEvent::EscrowCreated {
            order_id: init.order_id,
            secret_hash: init.secret_hash,
            timelock: init.timelock,
        };
        let record = EscrowRecord {
            order_id: init.order_id,
            asset: init.asset,
            amount: init.amount,
            depositor: init.depositor,
            withdrawer: init.withdrawer,
            secret_hash: init.secret_hash,
            timelock: init.timelock,
            safety_deposit: init.safety_deposit,
            status: EscrowStatus::Initialized,
        };
        Ok(Settlement {
            record,
            event,
            payouts: Vec::new(),
        })
    }

    fn check_deposit(
        &self,
        caller: &AccountAddress,
        attached_value: Balance,
        now: Timestamp,
    ) -> Result<Settlement, CrosslockError> {
        let record = self.live_record()?;
        if record.status == EscrowStatus::Funded {
            return Err(CrosslockError::AlreadyFunded);
        }
        if *caller != record.depositor {
            return Err(CrosslockError::Unauthorized(format!(
                "{} is not the depositor",
                caller
            )));
        }
        if now >= record.timelock {
            return Err(CrosslockError::TimelockAlreadyExpired {
                expired_at: record.timelock,
                now,
            });
        }
        if attached_value != record.amount {
            return Err(CrosslockError::AmountMismatch {
                expected: record.amount,
                got: attached_value,
            });
        }

        let event = EscrowEvent::Deposited {
            depositor: record.depositor,
            amount: record.amount,
        };
        Ok(Settlement {
            record: with_status(record, EscrowStatus::Funded),
            event,
            payouts: Vec::new(),
        })
    }

    fn check_redeem(
        &self,
        caller: &AccountAddress,
        secret: &Secret,
        now: Timestamp,
    ) -> Result<Settlement, CrosslockError> {
        let record = self.funded_record()?;
        if *caller != record.withdrawer {
            return Err(CrosslockError::Unauthorized(format!(
                "{} is not the withdrawer",
                caller
            )));
        }
        if now >= record.timelock {
            return Err(CrosslockError::TimelockAlreadyExpired {
                expired_at: record.timelock,
                now,
            });
        }
        if !secret.matches(&record.secret_hash) {
            return Err(CrosslockError::InvalidSecret);
        }

        Ok(Settlement {
            event: EscrowEvent::Redeemed {
                secret: secret.clone(),
                withdrawer: record.withdrawer,
            },
            payouts: settle_payouts(record, record.withdrawer, record.withdrawer, true),
            record: with_status(record, EscrowStatus::Redeemed),
        })
    }

    fn check_public_withdraw(
        &self,
        caller: &AccountAddress,
        secret: &Secret,
        now: Timestamp,
    ) -> Result<Settlement, CrosslockError> {
        let record = self.funded_record()?;
        let opens_at = record
            .timelock
            .saturating_sub(self.config.exclusive_period_secs);
        if now < opens_at {
            return Err(CrosslockError::OutsidePublicWindow { opens_at, now });
        }
        if now >= record.timelock {
            return Err(CrosslockError::TimelockAlreadyExpired {
                expired_at: record.timelock,
                now,
            });
        }
        if !secret.matches(&record.secret_hash) {
            return Err(CrosslockError::InvalidSecret);
        }

        Ok(Settlement {
            event: EscrowEvent::Redeemed {
                secret: secret.clone(),
                withdrawer: record.withdrawer,
            },
            payouts: settle_payouts(record, record.withdrawer, *caller, true),
            record: with_status(record, EscrowStatus::Redeemed),
        })
    }

    /// Shared by `refund` and `emergency_recover`. An escrow that was never
    /// funded may still be refunded so the safety deposit is not stranded;
    /// the emergency path only applies to funded escrows.
    fn check_refund(
        &self,
        caller: &AccountAddress,
        now: Timestamp,
        emergency: bool,
    ) -> Result<Settlement, CrosslockError> {
        let record = if emergency {
            self.funded_record()?
        } else {
            self.live_record()?
        };
        let unlock_at = if emergency {
            record
                .timelock
                .saturating_add(self.config.emergency_delay_secs)
        } else {
            record.timelock
        };
        if now < unlock_at {
            return Err(CrosslockError::TimelockNotYetReached { unlock_at, now });
        }

        let funded = record.is_funded();
        let status = if emergency {
            EscrowStatus::EmergencyRecovered
        } else {
            EscrowStatus::Refunded
        };
        Ok(Settlement {
            event: EscrowEvent::Refunded {
                depositor: record.depositor,
                emergency,
            },
            payouts: settle_payouts(record, record.depositor, *caller, funded),
            record: with_status(record, status),
        })
    }

    /// An initialized, non-terminal record.
    fn live_record(&self) -> Result<&EscrowRecord, CrosslockError> {
        let record = self.record.as_ref().ok_or(CrosslockError::NotInitialized)?;
        if record.status.is_terminal() {
            return Err(CrosslockError::AlreadyTerminal);
        }
        Ok(record)
    }

    fn funded_record(&self) -> Result<&EscrowRecord, CrosslockError> {
        let record = self.live_record()?;
        if !record.is_funded() {
            return Err(CrosslockError::NotFunded);
        }
        Ok(record)
    }

    // ── Commit phase ─────────────────────────────────────────────────────────

    fn commit(&mut self, settlement: Settlement) -> Transition {
        let Settlement {
            record,
            event,
            payouts,
        } = settlement;
        info!(
            order_id = %record.order_id,
            status = %record.status,
            payouts = payouts.len(),
            "escrow transition"
        );
        for p in &payouts {
            debug!(order_id = %record.order_id, to = %p.to, amount = p.amount, "payout");
        }
        self.record = Some(record);
        Transition { event, payouts }
    }
}

fn with_status(record: &EscrowRecord, status: EscrowStatus) -> EscrowRecord {
    EscrowRecord {
        status,
        ..record.clone()
    }
}

/// Principal to `principal_to` (if the escrow holds it), safety deposit to
/// `deposit_to`. Zero-value transfers are omitted.
fn settle_payouts(
    record: &EscrowRecord,
    principal_to: AccountAddress,
    deposit_to: AccountAddress,
    principal_held: bool,
) -> Vec<Payout> {
    let mut payouts = Vec::with_capacity(2);
    if principal_held {
        payouts.push(Payout {
            to: principal_to,
            asset: record.asset,
            amount: record.amount,
        });
    }
    if record.safety_deposit > 0 {
        payouts.push(Payout {
            to: deposit_to,
            asset: AccountAddress::NATIVE,
            amount: record.safety_deposit,
        });
    }
    payouts
}
