/// ─── Crosslock Protocol Constants ───────────────────────────────────────────
///
/// Shared by both legs of a swap. Amounts are in the smallest unit of the
/// chain they apply to (satoshis on the script chain, wei-like base units on
/// the contract chain).

// ── Secrets ──────────────────────────────────────────────────────────────────

/// Length of a swap secret and of its SHA-256 commitment.
pub const SECRET_LEN: usize = 32;

/// Length of a compressed secp256k1 public key as pushed into the lock script.
pub const COMPRESSED_PUBKEY_LEN: usize = 33;

/// Length of an account address on the contract chain.
pub const ACCOUNT_ADDRESS_LEN: usize = 20;

// ── Timelocks ────────────────────────────────────────────────────────────────

/// Default margin between the destination and source timelocks, and the
/// length of the public-withdrawal tail before an escrow timelock (seconds).
pub const RECOMMENDED_EXCLUSIVE_PERIOD_SECS: u64 = 3600;

/// Delay after an escrow timelock before the emergency recovery path opens.
pub const EMERGENCY_RECOVERY_DELAY_SECS: u64 = 7 * 24 * 3600;

/// Absolute lock-time values below this are block heights, at or above it
/// Unix timestamps. The lock script only accepts heights.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

// ── Script-chain fees ────────────────────────────────────────────────────────

/// Outputs below this value are not relayed; change under it goes to fees.
pub const DUST_LIMIT_SATS: u64 = 546;

/// Fixed per-transaction overhead (version, locktime, counts) in vbytes.
pub const TX_BASE_VBYTES: u64 = 10;

/// Spend of a P2WPKH output with the witness discount applied.
pub const WITNESS_INPUT_VBYTES: u64 = 68;

/// Spend of a legacy P2PKH output.
pub const LEGACY_INPUT_VBYTES: u64 = 148;

/// One output with a standard locking script.
pub const OUTPUT_VBYTES: u64 = 34;

/// Extra vbytes of an HTLC spend over a P2WPKH spend: the redeem script,
/// the preimage and the branch selector ride in the witness.
pub const HTLC_WITNESS_EXTRA_VBYTES: u64 = 40;

/// Default fee rate (sat/vB) used when the operator does not supply one.
pub const DEFAULT_FEE_RATE_SAT_PER_VB: u64 = 5;
