//! crosslock-script
//!
//! The script-chain leg of a swap: the P2WSH hash/time-locked script, the
//! funding, redemption and refund transactions around it, and total parsers
//! that recognise spends of a lock in raw chain data.
//!
//! Nothing here touches the network. UTXOs, fee rates and chain heights are
//! supplied by the caller, and every builder is byte-deterministic.

pub mod config;
pub mod fee;
pub mod leg;
pub mod lock;
pub mod scan;
pub mod tx;

pub use config::ScriptConfig;
pub use fee::{estimate_transaction_size, fee_for};
pub use leg::{ScriptLeg, ScriptLegState};
pub use lock::{build_lock_script, lock_output_matches, parse_lock_script, LockOutput};
pub use scan::{classify_spend, extract_secret_from_spend, find_lock_vout, is_spend_of, SpendKind};
pub use tx::{
    build_funding_transaction, build_redemption_transaction, build_refund_transaction, SignedTx,
    Utxo,
};
