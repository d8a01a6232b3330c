use crosslock_core::constants::SECRET_LEN;
use crosslock_core::error::CrosslockError;
use crosslock_core::types::{Secret, SecretHash};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A freshly generated secret together with its hash-lock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPair {
    pub secret: Secret,
    pub hash: SecretHash,
}

impl SecretPair {
    pub fn from_secret(secret: Secret) -> Self {
        let hash = secret.hash();
        Self { secret, hash }
    }
}

/// Generate a 32-byte secret from the operating system CSPRNG.
pub fn generate_secret() -> SecretPair {
    generate_secret_with(&mut OsRng)
}

/// Generate a secret from a caller-supplied cryptographic RNG.
pub fn generate_secret_with<R: RngCore + CryptoRng>(rng: &mut R) -> SecretPair {
    let mut bytes = [0u8; SECRET_LEN];
    rng.fill_bytes(&mut bytes);
    SecretPair::from_secret(Secret::from_bytes(bytes))
}

/// Generate `max_fills + 1` secrets for a partially fillable order.
///
/// Secret `i` (0-based) unlocks the fill that crosses the `i`-th part; the
/// last one is reserved for the fill that completes the order.
pub fn generate_fill_secrets(max_fills: u32) -> Result<Vec<SecretPair>, CrosslockError> {
    generate_fill_secrets_with(&mut OsRng, max_fills)
}

pub fn generate_fill_secrets_with<R: RngCore + CryptoRng>(
    rng: &mut R,
    max_fills: u32,
) -> Result<Vec<SecretPair>, CrosslockError> {
    if max_fills == 0 {
        return Err(CrosslockError::InvalidFillCount);
    }
    let pairs: Vec<SecretPair> = (0..=max_fills).map(|_| generate_secret_with(rng)).collect();
    debug!(max_fills, count = pairs.len(), "generated fill secrets");
    Ok(pairs)
}

/// True iff `SHA256(secret) == hash`.
pub fn validate_secret(secret: &Secret, hash: &SecretHash) -> bool {
    secret.matches(hash)
}
