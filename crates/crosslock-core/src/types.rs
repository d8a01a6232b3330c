use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{ACCOUNT_ADDRESS_LEN, SECRET_LEN};
use crate::error::CrosslockError;

/// Value in the smallest unit of the chain it applies to. u128 covers every
/// token amount a contract chain escrow is expected to hold.
pub type Balance = u128;

/// Unix timestamp (seconds, UTC) as seen by the contract chain.
pub type Timestamp = u64;

/// Absolute block height on the script chain.
pub type BlockHeight = u32;

// ── Hex helpers ──────────────────────────────────────────────────────────────

/// Encode bytes as a `0x`-prefixed lowercase hex string.
pub fn to_prefixed_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode a hex string with an optional `0x` prefix into exactly `N` bytes.
pub fn parse_prefixed_hex<const N: usize>(s: &str) -> Result<[u8; N], CrosslockError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(stripped).map_err(|e| CrosslockError::InvalidHex(e.to_string()))?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        CrosslockError::InvalidHex(format!("expected {} bytes, got {}", N, b.len()))
    })
}

// ── SecretHash ───────────────────────────────────────────────────────────────

/// SHA-256 commitment to a swap secret. The same value locks both legs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecretHash(pub [u8; SECRET_LEN]);

impl SecretHash {
    pub fn from_bytes(b: [u8; SECRET_LEN]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.0
    }

    /// The all-zero hash used to pad merkle trees.
    pub fn zero() -> Self {
        Self([0u8; SECRET_LEN])
    }

    pub fn to_hex(&self) -> String {
        to_prefixed_hex(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CrosslockError> {
        parse_prefixed_hex(s).map(Self)
    }
}

impl fmt::Display for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretHash({}…)", &self.to_hex()[..18])
    }
}

impl TryFrom<String> for SecretHash {
    type Error = CrosslockError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<SecretHash> for String {
    fn from(h: SecretHash) -> Self {
        h.to_hex()
    }
}

// ── Secret ───────────────────────────────────────────────────────────────────

/// A 32-byte swap preimage. Wiped from memory on drop and never printed by
/// `Debug`; use [`Secret::to_hex`] when the value must leave the process.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Secret([u8; SECRET_LEN]);

impl Secret {
    pub fn from_bytes(b: [u8; SECRET_LEN]) -> Self {
        Self(b)
    }

    /// Accepts a slice of exactly 32 bytes, e.g. a witness element.
    pub fn from_slice(b: &[u8]) -> Option<Self> {
        <[u8; SECRET_LEN]>::try_from(b).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.0
    }

    /// SHA-256 of the raw 32 bytes.
    pub fn hash(&self) -> SecretHash {
        SecretHash(Sha256::digest(self.0).into())
    }

    /// True iff `SHA256(self) == hash`.
    pub fn matches(&self, hash: &SecretHash) -> bool {
        self.hash() == *hash
    }

    pub fn to_hex(&self) -> String {
        to_prefixed_hex(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CrosslockError> {
        parse_prefixed_hex(s).map(Self)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(<redacted>)")
    }
}

impl TryFrom<String> for Secret {
    type Error = CrosslockError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<Secret> for String {
    fn from(s: Secret) -> Self {
        s.to_hex()
    }
}

// ── OrderId ──────────────────────────────────────────────────────────────────

/// 32-byte order identifier agreed by the counterparties off-chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub [u8; 32]);

impl OrderId {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn to_hex(&self) -> String {
        to_prefixed_hex(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CrosslockError> {
        parse_prefixed_hex(s).map(Self)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderId({}…)", &self.to_hex()[..18])
    }
}

// ── AccountAddress ───────────────────────────────────────────────────────────

/// 20-byte account on the contract chain. The zero address denotes the
/// chain's native asset when used as an escrow `asset`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountAddress(pub [u8; ACCOUNT_ADDRESS_LEN]);

impl AccountAddress {
    pub const NATIVE: AccountAddress = AccountAddress([0u8; ACCOUNT_ADDRESS_LEN]);

    pub fn from_bytes(b: [u8; ACCOUNT_ADDRESS_LEN]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; ACCOUNT_ADDRESS_LEN] {
        &self.0
    }

    pub fn is_native(&self) -> bool {
        *self == Self::NATIVE
    }

    pub fn to_hex(&self) -> String {
        to_prefixed_hex(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CrosslockError> {
        parse_prefixed_hex(s).map(Self)
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountAddress({})", self.to_hex())
    }
}

// ── PartyKey ─────────────────────────────────────────────────────────────────

/// Chain-specific identity of a swap party: a 33-byte compressed public key
/// on the script chain, a 20-byte address on the contract chain. Each leg
/// validates the length it needs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyKey(pub Vec<u8>);

impl PartyKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        to_prefixed_hex(&self.0)
    }
}

impl From<AccountAddress> for PartyKey {
    fn from(a: AccountAddress) -> Self {
        Self(a.0.to_vec())
    }
}

impl TryFrom<&PartyKey> for AccountAddress {
    type Error = CrosslockError;

    fn try_from(k: &PartyKey) -> Result<Self, Self::Error> {
        <[u8; ACCOUNT_ADDRESS_LEN]>::try_from(k.as_bytes())
            .map(AccountAddress)
            .map_err(|_| {
                CrosslockError::InvalidHex(format!(
                    "expected {}-byte address, got {} bytes",
                    ACCOUNT_ADDRESS_LEN,
                    k.0.len()
                ))
            })
    }
}

impl fmt::Debug for PartyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartyKey({})", self.to_hex())
    }
}

// ── HtlcParams ───────────────────────────────────────────────────────────────

/// Chain-agnostic parameters of one HTLC leg.
///
/// `timelock` is a block height on the script chain and a Unix timestamp on
/// the contract chain; the coordinator compares both in the caller's common
/// clock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtlcParams {
    pub secret_hash: SecretHash,
    /// Funds the leg and may refund it after `timelock`.
    pub payer: PartyKey,
    /// May redeem the leg with the secret before `timelock`.
    pub payee: PartyKey,
    pub timelock: u64,
}
