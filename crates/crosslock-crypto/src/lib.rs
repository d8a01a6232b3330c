//! crosslock-crypto
//!
//! Secret and commitment scheme shared by both legs of a swap: SHA-256
//! hash-locks, a merkle tree of per-fill secrets for partially fillable
//! orders, and the deterministic split of an order into fills.
//! Everything here is a pure function of its inputs.

pub mod fills;
pub mod hash;
pub mod merkle;
pub mod secret;

pub use fills::{plan_partial_fills, secret_index_for, BoundFill, BoundFillPlan, PartialFillPlan};
pub use hash::{hash_pair, sha256};
pub use merkle::{build_merkle_tree, prove_leaf, verify_proof, MerkleProof, MerkleTree};
pub use secret::{
    generate_fill_secrets, generate_fill_secrets_with, generate_secret, generate_secret_with,
    validate_secret, SecretPair,
};
