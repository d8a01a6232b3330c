//! Total parsers over raw transactions observed on the script chain.
//!
//! Every function here accepts arbitrary bytes. Malformed input yields
//! `None` or `false`, never a panic.

use bitcoin::consensus::deserialize;
use bitcoin::{Transaction, Txid};
use crosslock_core::types::{Secret, SecretHash};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::lock::{lock_output_matches, LockOutput};

/// How a lock output was spent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpendKind {
    /// Secret branch; the payee revealed `secret`.
    Redeem { secret: Secret },
    /// Timelock branch; the payer reclaimed the funds.
    Refund,
}

fn decode(raw: &[u8]) -> Option<Transaction> {
    match deserialize::<Transaction>(raw) {
        Ok(tx) => Some(tx),
        Err(e) => {
            debug!(error = %e, len = raw.len(), "ignoring undecodable transaction");
            None
        }
    }
}

/// Recover the secret revealed by `raw`, if any witness element hashes to
/// `secret_hash`.
pub fn extract_secret_from_spend(raw: &[u8], secret_hash: &SecretHash) -> Option<Secret> {
    let tx = decode(raw)?;
    tx.input
        .iter()
        .flat_map(|input| input.witness.iter())
        .filter_map(Secret::from_slice)
        .find(|candidate| candidate.matches(secret_hash))
}

/// True iff `raw` consumes the outpoint `txid:vout`.
pub fn is_spend_of(raw: &[u8], txid: &Txid, vout: u32) -> bool {
    decode(raw).is_some_and(|tx| {
        tx.input
            .iter()
            .any(|i| i.previous_output.txid == *txid && i.previous_output.vout == vout)
    })
}

/// Index of the first output of `raw` that pays `lock`.
pub fn find_lock_vout(raw: &[u8], lock: &LockOutput) -> Option<u32> {
    let tx = decode(raw)?;
    tx.output
        .iter()
        .position(|o| lock_output_matches(o, lock))
        .map(|i| i as u32)
}

/// Classify `raw` as a redemption or refund of `lock`.
///
/// Only inputs whose witness ends with the lock's redeem script are
/// considered; the first input that matches a branch decides. A redemption
/// must select the secret branch and carry a secret that opens the
/// hash-lock.
pub fn classify_spend(raw: &[u8], lock: &LockOutput) -> Option<SpendKind> {
    let tx = decode(raw)?;
    let script = lock.redeem_script.as_bytes();

    for input in &tx.input {
        let witness = &input.witness;
        if witness.last() != Some(script) {
            continue;
        }
        match witness.len() {
            4 => {
                if witness.nth(2) != Some(&[0x01u8][..]) {
                    continue;
                }
                let Some(secret) = witness.nth(1).and_then(Secret::from_slice) else {
                    continue;
                };
                if secret.matches(&lock.params.secret_hash) {
                    return Some(SpendKind::Redeem { secret });
                }
            }
            3 => {
                if witness.nth(1).is_some_and(|selector| selector.is_empty()) {
                    return Some(SpendKind::Refund);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScriptConfig;
    use crate::lock::build_lock_script;
    use crate::lock::tests::{key, params};
    use crate::tx::{
        build_funding_transaction, build_redemption_transaction, build_refund_transaction, Utxo,
    };
    use bitcoin::consensus::serialize;
    use bitcoin::hashes::Hash;
    use bitcoin::{Address, CompressedPublicKey, Network, Witness};

    fn config() -> ScriptConfig {
        ScriptConfig {
            network: Network::Regtest,
            ..ScriptConfig::default()
        }
    }

    fn address(seed: u8) -> Address {
        Address::p2wpkh(&CompressedPublicKey(key(seed).1), Network::Regtest)
    }

    fn lock() -> LockOutput {
        build_lock_script(&params(800_000), Network::Regtest).unwrap()
    }

    fn lock_utxo() -> Utxo {
        Utxo {
            txid: Txid::from_byte_array([0x11; 32]),
            vout: 1,
            value_sats: 50_000,
        }
    }

    fn secret() -> Secret {
        Secret::from_bytes([0x42; 32])
    }

    #[test]
    fn secret_extracted_from_redemption() {
        let lock = lock();
        let redeem = build_redemption_transaction(
            &lock_utxo(),
            &lock,
            &secret(),
            &key(2).0,
            &address(2),
            5,
            &config(),
        )
        .unwrap();
        let raw = redeem.raw();

        assert_eq!(
            extract_secret_from_spend(&raw, &lock.params.secret_hash),
            Some(secret())
        );
        assert_eq!(
            classify_spend(&raw, &lock),
            Some(SpendKind::Redeem { secret: secret() })
        );
        assert!(is_spend_of(&raw, &lock_utxo().txid, 1));
        assert!(!is_spend_of(&raw, &lock_utxo().txid, 0));
    }

    #[test]
    fn refund_reveals_nothing() {
        let lock = lock();
        let refund = build_refund_transaction(
            &lock_utxo(),
            &lock,
            &key(1).0,
            &address(1),
            800_000,
            5,
            &config(),
        )
        .unwrap();
        let raw = refund.raw();

        assert_eq!(extract_secret_from_spend(&raw, &lock.params.secret_hash), None);
        assert_eq!(classify_spend(&raw, &lock), Some(SpendKind::Refund));
    }

    #[test]
    fn funding_output_located() {
        let lock = lock();
        let utxos = vec![Utxo {
            txid: Txid::from_byte_array([0x22; 32]),
            vout: 0,
            value_sats: 200_000,
        }];
        let funding =
            build_funding_transaction(&lock, 100_000, &utxos, &key(1).0, &address(1), 5, &config())
                .unwrap();
        assert_eq!(find_lock_vout(&funding.raw(), &lock), Some(0));
        assert_eq!(classify_spend(&funding.raw(), &lock), None);

        let other = build_lock_script(&params(800_001), Network::Regtest).unwrap();
        assert_eq!(find_lock_vout(&funding.raw(), &other), None);
    }

    #[test]
    fn garbage_is_ignored() {
        let lock = lock();
        let hash = lock.params.secret_hash;
        for raw in [&[][..], &[0u8; 3][..], &[0xff; 64][..]] {
            assert_eq!(extract_secret_from_spend(raw, &hash), None);
            assert!(!is_spend_of(raw, &lock_utxo().txid, 1));
            assert_eq!(find_lock_vout(raw, &lock), None);
            assert_eq!(classify_spend(raw, &lock), None);
        }
    }

    #[test]
    fn other_lock_spend_not_classified() {
        let lock = lock();
        let redeem = build_redemption_transaction(
            &lock_utxo(),
            &lock,
            &secret(),
            &key(2).0,
            &address(2),
            5,
            &config(),
        )
        .unwrap();
        let other = build_lock_script(&params(900_000), Network::Regtest).unwrap();
        assert_eq!(classify_spend(&redeem.raw(), &other), None);
        // The secret is still visible to anyone watching the hash.
        assert!(extract_secret_from_spend(&redeem.raw(), &other.params.secret_hash).is_some());
    }

    fn redemption(lock: &LockOutput) -> Transaction {
        build_redemption_transaction(
            &lock_utxo(),
            lock,
            &secret(),
            &key(2).0,
            &address(2),
            5,
            &config(),
        )
        .unwrap()
        .tx
    }

    #[test]
    fn malformed_input_does_not_hide_later_redemption() {
        let lock = lock();
        let mut tx = redemption(&lock);
        let mut decoy = tx.input[0].clone();
        decoy.previous_output.vout = 7;
        decoy.witness = Witness::from_slice(&[
            vec![0x30; 71],
            vec![0xaa; 5],
            vec![0x01],
            lock.redeem_script.to_bytes(),
        ]);
        tx.input.insert(0, decoy);

        assert_eq!(
            classify_spend(&serialize(&tx), &lock),
            Some(SpendKind::Redeem { secret: secret() })
        );
    }

    #[test]
    fn redemption_needs_secret_branch_selector() {
        let lock = lock();
        let mut tx = redemption(&lock);
        let mut items = tx.input[0].witness.to_vec();
        items[2] = vec![];
        tx.input[0].witness = Witness::from_slice(&items);

        assert_eq!(classify_spend(&serialize(&tx), &lock), None);
        // The preimage is still on chain for anyone watching the hash.
        assert_eq!(
            extract_secret_from_spend(&serialize(&tx), &lock.params.secret_hash),
            Some(secret())
        );
    }
}
