//! crosslock-escrow
//!
//! The contract-chain leg of a swap as an explicit state machine. An
//! [`Escrow`] wraps one [`EscrowRecord`]; every operation validates against
//! the current record first and only then commits, returning the event and
//! payouts the transition produced.
//!
//! ```text
//! Uninitialized ─initialize─▶ Initialized ─deposit─▶ Funded ─┬─redeem──────────▶ Redeemed
//!                                  │                         ├─public_withdraw─▶ Redeemed
//!                                  │                         ├─refund──────────▶ Refunded
//!                                  └──────refund─────────────┴─emergency───────▶ EmergencyRecovered
//! ```

pub mod config;
pub mod machine;
pub mod record;

pub use config::EscrowConfig;
pub use machine::{Escrow, EscrowEvent, EscrowInit, Payout, Transition};
pub use record::{EscrowRecord, EscrowStatus};
