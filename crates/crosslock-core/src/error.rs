use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrosslockError {
    // ── Secret / commitment errors ───────────────────────────────────────────
    #[error("secret does not hash to the committed secret hash")]
    InvalidSecret,

    #[error("leaf not found in merkle tree")]
    LeafNotFound,

    #[error("merkle proof error: {0}")]
    MerkleProof(String),

    #[error("fill count must be between 1 and the order amount")]
    InvalidFillCount,

    // ── Timelock errors ──────────────────────────────────────────────────────
    #[error(
        "unsafe timelock ordering: destination {destination_timelock} + exclusive period {exclusive_period} exceeds source {source_timelock}"
    )]
    UnsafeTimelockOrdering {
        source_timelock: u64,
        destination_timelock: u64,
        exclusive_period: u64,
    },

    #[error("timelock not yet reached (opens at {unlock_at}, now {now})")]
    TimelockNotYetReached { unlock_at: u64, now: u64 },

    #[error("timelock already expired (expired at {expired_at}, now {now})")]
    TimelockAlreadyExpired { expired_at: u64, now: u64 },

    // ── Escrow errors ────────────────────────────────────────────────────────
    #[error("escrow already settled; no further transitions allowed")]
    AlreadyTerminal,

    #[error("escrow already initialized")]
    AlreadyInitialized,

    #[error("escrow not initialized")]
    NotInitialized,

    #[error("escrow not funded")]
    NotFunded,

    #[error("escrow already funded")]
    AlreadyFunded,

    #[error("caller not permitted: {0}")]
    Unauthorized(String),

    #[error("insufficient safety deposit: expected {expected}, attached {got}")]
    InsufficientSafetyDeposit { expected: u128, got: u128 },

    #[error("attached value mismatch: expected {expected}, got {got}")]
    AmountMismatch { expected: u128, got: u128 },

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("public withdrawal window not open (opens at {opens_at}, now {now})")]
    OutsidePublicWindow { opens_at: u64, now: u64 },

    // ── Script-chain errors ──────────────────────────────────────────────────
    #[error("script construction error: {0}")]
    ScriptConstruction(String),

    #[error("insufficient funds: need {need} sats, have {have}")]
    InsufficientFunds { need: u64, have: u64 },

    #[error("signing error: {0}")]
    Signing(String),

    // ── Swap lifecycle ───────────────────────────────────────────────────────
    #[error("invalid swap transition from {from} to {to}")]
    InvalidSwapTransition { from: String, to: String },

    // ── Serialization / encoding ─────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),
}
