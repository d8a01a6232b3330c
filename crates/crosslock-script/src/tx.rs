//! Funding, redemption and refund transactions for a lock output.
//!
//! All signatures are RFC 6979 ECDSA over BIP-143 sighashes, so identical
//! inputs always produce the same txid and a rebroadcast never conflicts
//! with an earlier attempt.

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::{serialize, serialize_hex};
use bitcoin::ecdsa;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1, SecretKey, Signing};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, CompressedPublicKey, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut,
    Txid, Witness,
};
use crosslock_core::constants::HTLC_WITNESS_EXTRA_VBYTES;
use crosslock_core::error::CrosslockError;
use crosslock_core::types::{BlockHeight, Secret};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ScriptConfig;
use crate::fee::{estimate_transaction_size, fee_for};
use crate::lock::LockOutput;

/// Reference to an unspent output supplied by the caller's wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: Txid,
    pub vout: u32,
    pub value_sats: u64,
}

impl Utxo {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid, self.vout)
    }
}

/// A fully signed transaction ready for broadcast.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTx {
    pub tx: Transaction,
    pub txid: Txid,
    pub fee_sats: u64,
}

impl SignedTx {
    fn new(tx: Transaction, fee_sats: u64) -> Self {
        let txid = tx.compute_txid();
        Self { tx, txid, fee_sats }
    }

    /// Consensus-encoded bytes.
    pub fn raw(&self) -> Vec<u8> {
        serialize(&self.tx)
    }

    pub fn to_hex(&self) -> String {
        serialize_hex(&self.tx)
    }
}

// ── Funding ──────────────────────────────────────────────────────────────────

/// Pay `amount_sats` into `lock` from the payer's P2WPKH `utxos`.
///
/// UTXOs are consumed in the order given until they cover the amount and
/// the fee of a transaction with change. If they run out first, a single
/// output spend is tried. Change below the dust limit is left to the fee.
pub fn build_funding_transaction(
    lock: &LockOutput,
    amount_sats: u64,
    utxos: &[Utxo],
    payer_key: &SecretKey,
    change_address: &Address,
    fee_rate: u64,
    config: &ScriptConfig,
) -> Result<SignedTx, CrosslockError> {
    if amount_sats == 0 {
        return Err(CrosslockError::ScriptConstruction(
            "funding amount must be positive".into(),
        ));
    }
    if amount_sats < config.dust_limit_sats {
        return Err(CrosslockError::ScriptConstruction(format!(
            "funding amount {} is below the dust limit {}",
            amount_sats, config.dust_limit_sats
        )));
    }

    let secp = Secp256k1::signing_only();
    let payer_pubkey = payer_key.public_key(&secp);
    let payer_spk = ScriptBuf::new_p2wpkh(&CompressedPublicKey(payer_pubkey).wpubkey_hash());

    // ── Coin selection ───────────────────────────────────────────────────────
    let mut selected: Vec<&Utxo> = Vec::new();
    let mut total: u64 = 0;
    for utxo in utxos {
        selected.push(utxo);
        total = total.saturating_add(utxo.value_sats);
        let fee = fee_for(estimate_transaction_size(selected.len(), 2, true), fee_rate);
        if total >= amount_sats.saturating_add(fee) {
            break;
        }
    }
    // Without a change output the same inputs may still cover the payment.
    let inputs = selected.len().max(1);
    let fee_with_change = fee_for(estimate_transaction_size(inputs, 2, true), fee_rate);
    let fee_without_change = fee_for(estimate_transaction_size(inputs, 1, true), fee_rate);
    let need = amount_sats.saturating_add(fee_without_change);
    if selected.is_empty() || total < need {
        return Err(CrosslockError::InsufficientFunds { need, have: total });
    }

    let mut outputs = vec![TxOut {
        value: Amount::from_sat(amount_sats),
        script_pubkey: lock.script_pubkey.clone(),
    }];
    let fee_sats = match total.checked_sub(amount_sats.saturating_add(fee_with_change)) {
        Some(change) if change > 0 && change >= config.dust_limit_sats => {
            outputs.push(TxOut {
                value: Amount::from_sat(change),
                script_pubkey: change_address.script_pubkey(),
            });
            fee_with_change
        }
        _ => total - amount_sats,
    };

    let mut tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: selected
            .iter()
            .map(|u| TxIn {
                previous_output: u.outpoint(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                witness: Witness::default(),
            })
            .collect(),
        output: outputs,
    };

    // ── Signing ──────────────────────────────────────────────────────────────
    let mut witnesses = Vec::with_capacity(selected.len());
    {
        let mut cache = SighashCache::new(&tx);
        for (i, utxo) in selected.iter().enumerate() {
            let sighash = cache
                .p2wpkh_signature_hash(
                    i,
                    &payer_spk,
                    Amount::from_sat(utxo.value_sats),
                    EcdsaSighashType::All,
                )
                .map_err(|e| CrosslockError::Signing(e.to_string()))?;
            let sig = sign_digest(&secp, sighash.to_byte_array(), payer_key);
            let mut witness = Witness::new();
            witness.push(sig.serialize());
            witness.push(payer_pubkey.serialize());
            witnesses.push(witness);
        }
    }
    for (input, witness) in tx.input.iter_mut().zip(witnesses) {
        input.witness = witness;
    }

    let signed = SignedTx::new(tx, fee_sats);
    info!(
        txid = %signed.txid,
        amount_sats,
        fee_sats,
        inputs = selected.len(),
        lock = %lock.address,
        "built funding transaction"
    );
    Ok(signed)
}

// ── Redemption ───────────────────────────────────────────────────────────────

/// Spend `utxo` through the secret branch, paying the payee's `destination`.
///
/// Witness: `[signature, secret, 0x01, redeem_script]`.
pub fn build_redemption_transaction(
    utxo: &Utxo,
    lock: &LockOutput,
    secret: &Secret,
    payee_key: &SecretKey,
    destination: &Address,
    fee_rate: u64,
    config: &ScriptConfig,
) -> Result<SignedTx, CrosslockError> {
    if !secret.matches(&lock.params.secret_hash) {
        return Err(CrosslockError::InvalidSecret);
    }
    let secp = Secp256k1::signing_only();
    check_key(&secp, payee_key, &lock.payee_pubkey, "payee")?;

    let (tx, fee_sats) = spend_template(
        utxo,
        destination,
        fee_rate,
        config,
        LockTime::ZERO,
        Sequence::ENABLE_RBF_NO_LOCKTIME,
    )?;
    let sig = sign_lock_input(&secp, &tx, utxo, lock, payee_key)?;

    let mut witness = Witness::new();
    witness.push(sig.serialize());
    witness.push(secret.as_bytes());
    witness.push([0x01u8]);
    witness.push(lock.redeem_script.as_bytes());

    let signed = finish(tx, witness, fee_sats);
    info!(txid = %signed.txid, fee_sats, "built redemption transaction");
    Ok(signed)
}

// ── Refund ───────────────────────────────────────────────────────────────────

/// Spend `utxo` through the timelock branch back to the payer.
///
/// The transaction carries `nLockTime = timelock_height` and a non-final
/// sequence so `OP_CHECKLOCKTIMEVERIFY` is enforced. Maturity is checked by
/// the network, not here. Witness: `[signature, <empty>, redeem_script]`.
pub fn build_refund_transaction(
    utxo: &Utxo,
    lock: &LockOutput,
    payer_key: &SecretKey,
    destination: &Address,
    timelock_height: BlockHeight,
    fee_rate: u64,
    config: &ScriptConfig,
) -> Result<SignedTx, CrosslockError> {
    if timelock_height < lock.timelock_height() {
        return Err(CrosslockError::ScriptConstruction(format!(
            "refund lock time {} precedes the script timelock {}",
            timelock_height,
            lock.timelock_height()
        )));
    }
    let lock_time = LockTime::from_height(timelock_height)
        .map_err(|e| CrosslockError::ScriptConstruction(e.to_string()))?;
    let secp = Secp256k1::signing_only();
    check_key(&secp, payer_key, &lock.payer_pubkey, "payer")?;

    let (tx, fee_sats) = spend_template(
        utxo,
        destination,
        fee_rate,
        config,
        lock_time,
        Sequence::ENABLE_LOCKTIME_NO_RBF,
    )?;
    let sig = sign_lock_input(&secp, &tx, utxo, lock, payer_key)?;

    let mut witness = Witness::new();
    witness.push(sig.serialize());
    witness.push(Vec::<u8>::new());
    witness.push(lock.redeem_script.as_bytes());

    let signed = finish(tx, witness, fee_sats);
    info!(txid = %signed.txid, timelock_height, fee_sats, "built refund transaction");
    Ok(signed)
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// One-input, one-output spend of a lock output, unsigned.
fn spend_template(
    utxo: &Utxo,
    destination: &Address,
    fee_rate: u64,
    config: &ScriptConfig,
    lock_time: LockTime,
    sequence: Sequence,
) -> Result<(Transaction, u64), CrosslockError> {
    let vbytes = estimate_transaction_size(1, 1, true) + HTLC_WITNESS_EXTRA_VBYTES;
    let fee_sats = fee_for(vbytes, fee_rate);
    let min_value = fee_sats.saturating_add(config.dust_limit_sats);
    if utxo.value_sats < min_value {
        return Err(CrosslockError::InsufficientFunds {
            need: min_value,
            have: utxo.value_sats,
        });
    }

    let tx = Transaction {
        version: Version::TWO,
        lock_time,
        input: vec![TxIn {
            previous_output: utxo.outpoint(),
            script_sig: ScriptBuf::new(),
            sequence,
            witness: Witness::default(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(utxo.value_sats - fee_sats),
            script_pubkey: destination.script_pubkey(),
        }],
    };
    Ok((tx, fee_sats))
}

fn sign_lock_input<C: Signing>(
    secp: &Secp256k1<C>,
    tx: &Transaction,
    utxo: &Utxo,
    lock: &LockOutput,
    key: &SecretKey,
) -> Result<ecdsa::Signature, CrosslockError> {
    let sighash = SighashCache::new(tx)
        .p2wsh_signature_hash(
            0,
            &lock.redeem_script,
            Amount::from_sat(utxo.value_sats),
            EcdsaSighashType::All,
        )
        .map_err(|e| CrosslockError::Signing(e.to_string()))?;
    Ok(sign_digest(secp, sighash.to_byte_array(), key))
}

fn sign_digest<C: Signing>(secp: &Secp256k1<C>, digest: [u8; 32], key: &SecretKey) -> ecdsa::Signature {
    let msg = Message::from_digest(digest);
    ecdsa::Signature::sighash_all(secp.sign_ecdsa(&msg, key))
}

fn check_key<C: Signing>(
    secp: &Secp256k1<C>,
    key: &SecretKey,
    expected: &PublicKey,
    role: &str,
) -> Result<(), CrosslockError> {
    if key.public_key(secp) != *expected {
        return Err(CrosslockError::Signing(format!(
            "signing key does not match the lock's {} public key",
            role
        )));
    }
    Ok(())
}

fn finish(mut tx: Transaction, witness: Witness, fee_sats: u64) -> SignedTx {
    tx.input[0].witness = witness;
    let signed = SignedTx::new(tx, fee_sats);
    debug!(txid = %signed.txid, vsize = signed.tx.vsize(), "signed lock spend");
    signed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::build_lock_script;
    use crate::lock::tests::{key, params};
    use bitcoin::hashes::Hash;
    use bitcoin::Network;
    use crosslock_core::types::SecretHash;

    fn regtest() -> ScriptConfig {
        ScriptConfig {
            network: Network::Regtest,
            ..ScriptConfig::default()
        }
    }

    fn wallet_address(seed: u8) -> Address {
        let (_, pk) = key(seed);
        Address::p2wpkh(&CompressedPublicKey(pk), Network::Regtest)
    }

    fn utxo(byte: u8, vout: u32, value_sats: u64) -> Utxo {
        Utxo {
            txid: Txid::from_byte_array([byte; 32]),
            vout,
            value_sats,
        }
    }

    fn lock() -> LockOutput {
        build_lock_script(&params(800_000), Network::Regtest).unwrap()
    }

    fn secret() -> Secret {
        Secret::from_bytes([0x42; 32])
    }

    #[test]
    fn funding_is_deterministic() {
        let (payer, _) = key(1);
        let utxos = vec![utxo(0xaa, 0, 60_000), utxo(0xbb, 1, 70_000)];
        let change = wallet_address(1);
        let a = build_funding_transaction(&lock(), 100_000, &utxos, &payer, &change, 5, &regtest())
            .unwrap();
        let b = build_funding_transaction(&lock(), 100_000, &utxos, &payer, &change, 5, &regtest())
            .unwrap();
        assert_eq!(a.txid, b.txid);
        assert_eq!(a.raw(), b.raw());
    }

    #[test]
    fn funding_pays_lock_and_returns_change() {
        let (payer, _) = key(1);
        let utxos = vec![utxo(0xaa, 0, 60_000), utxo(0xbb, 1, 70_000), utxo(0xcc, 2, 9_000)];
        let change = wallet_address(1);
        let lock = lock();
        let signed =
            build_funding_transaction(&lock, 100_000, &utxos, &payer, &change, 5, &regtest()).unwrap();

        // Two UTXOs suffice; the third is left alone.
        assert_eq!(signed.tx.input.len(), 2);
        assert_eq!(signed.tx.output.len(), 2);
        assert_eq!(signed.tx.output[0].value, Amount::from_sat(100_000));
        assert_eq!(signed.tx.output[0].script_pubkey, lock.script_pubkey);
        assert_eq!(signed.tx.output[1].script_pubkey, change.script_pubkey());

        let expected_fee = fee_for(estimate_transaction_size(2, 2, true), 5);
        assert_eq!(signed.fee_sats, expected_fee);
        assert_eq!(
            signed.tx.output[1].value.to_sat(),
            130_000 - 100_000 - expected_fee
        );
        for input in &signed.tx.input {
            assert_eq!(input.witness.len(), 2);
        }
    }

    #[test]
    fn dust_change_goes_to_fee() {
        let (payer, _) = key(1);
        let fee = fee_for(estimate_transaction_size(1, 2, true), 5);
        let utxos = vec![utxo(0xaa, 0, 100_000 + fee + 100)];
        let signed = build_funding_transaction(
            &lock(),
            100_000,
            &utxos,
            &payer,
            &wallet_address(1),
            5,
            &regtest(),
        )
        .unwrap();
        assert_eq!(signed.tx.output.len(), 1);
        assert_eq!(signed.fee_sats, fee + 100);
    }

    #[test]
    fn funding_without_change_when_change_unaffordable() {
        let (payer, _) = key(1);
        let single = fee_for(estimate_transaction_size(1, 1, true), 5);
        let with_change = fee_for(estimate_transaction_size(1, 2, true), 5);
        let value = 100_000 + single + 50;
        assert!(value < 100_000 + with_change);

        let signed = build_funding_transaction(
            &lock(),
            100_000,
            &[utxo(0xaa, 0, value)],
            &payer,
            &wallet_address(1),
            5,
            &regtest(),
        )
        .unwrap();
        assert_eq!(signed.tx.output.len(), 1);
        assert_eq!(signed.fee_sats, single + 50);

        let err = build_funding_transaction(
            &lock(),
            100_000,
            &[utxo(0xaa, 0, 100_000 + single - 1)],
            &payer,
            &wallet_address(1),
            5,
            &regtest(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CrosslockError::InsufficientFunds { need, have } if need == 100_000 + single && have == need - 1
        ));
    }

    #[test]
    fn insufficient_utxos_rejected() {
        let (payer, _) = key(1);
        let utxos = vec![utxo(0xaa, 0, 10_000)];
        let err = build_funding_transaction(
            &lock(),
            100_000,
            &utxos,
            &payer,
            &wallet_address(1),
            5,
            &regtest(),
        )
        .unwrap_err();
        assert!(matches!(err, CrosslockError::InsufficientFunds { have: 10_000, .. }));

        let err =
            build_funding_transaction(&lock(), 100_000, &[], &payer, &wallet_address(1), 5, &regtest())
                .unwrap_err();
        assert!(matches!(err, CrosslockError::InsufficientFunds { have: 0, .. }));
    }

    #[test]
    fn zero_amount_rejected() {
        let (payer, _) = key(1);
        let utxos = vec![utxo(0xaa, 0, 10_000)];
        assert!(matches!(
            build_funding_transaction(&lock(), 0, &utxos, &payer, &wallet_address(1), 5, &regtest()),
            Err(CrosslockError::ScriptConstruction(_))
        ));
    }

    #[test]
    fn redemption_witness_reveals_secret() {
        let (payee, payee_pk) = key(2);
        let lock = lock();
        let funding = utxo(0xdd, 0, 100_000);
        let signed = build_redemption_transaction(
            &funding,
            &lock,
            &secret(),
            &payee,
            &wallet_address(2),
            5,
            &regtest(),
        )
        .unwrap();

        assert_eq!(signed.tx.lock_time, LockTime::ZERO);
        let witness: Vec<Vec<u8>> = signed.tx.input[0].witness.to_vec();
        assert_eq!(witness.len(), 4);
        assert_eq!(witness[1], secret().as_bytes().to_vec());
        assert_eq!(witness[2], vec![0x01]);
        assert_eq!(witness[3], lock.redeem_script.to_bytes());

        // The signature verifies under the payee key for the P2WSH sighash.
        let sig = ecdsa::Signature::from_slice(&witness[0]).unwrap();
        assert_eq!(sig.sighash_type, EcdsaSighashType::All);
        let sighash = SighashCache::new(&signed.tx)
            .p2wsh_signature_hash(0, &lock.redeem_script, Amount::from_sat(100_000), EcdsaSighashType::All)
            .unwrap();
        let msg = Message::from_digest(sighash.to_byte_array());
        Secp256k1::verification_only()
            .verify_ecdsa(&msg, &sig.signature, &payee_pk)
            .unwrap();
    }

    #[test]
    fn redemption_with_wrong_secret_rejected() {
        let (payee, _) = key(2);
        let wrong = Secret::from_bytes([0x43; 32]);
        assert!(matches!(
            build_redemption_transaction(
                &utxo(0xdd, 0, 100_000),
                &lock(),
                &wrong,
                &payee,
                &wallet_address(2),
                5,
                &regtest(),
            ),
            Err(CrosslockError::InvalidSecret)
        ));
    }

    #[test]
    fn redemption_with_wrong_key_rejected() {
        let (not_payee, _) = key(9);
        assert!(matches!(
            build_redemption_transaction(
                &utxo(0xdd, 0, 100_000),
                &lock(),
                &secret(),
                &not_payee,
                &wallet_address(2),
                5,
                &regtest(),
            ),
            Err(CrosslockError::Signing(_))
        ));
    }

    #[test]
    fn refund_sets_locktime_and_non_final_sequence() {
        let (payer, _) = key(1);
        let lock = lock();
        let signed = build_refund_transaction(
            &utxo(0xdd, 0, 100_000),
            &lock,
            &payer,
            &wallet_address(1),
            800_000,
            5,
            &regtest(),
        )
        .unwrap();

        assert_eq!(signed.tx.lock_time, LockTime::from_height(800_000).unwrap());
        assert_eq!(signed.tx.input[0].sequence, Sequence::ENABLE_LOCKTIME_NO_RBF);
        assert!(signed.tx.input[0].sequence.enables_absolute_lock_time());
        let witness: Vec<Vec<u8>> = signed.tx.input[0].witness.to_vec();
        assert_eq!(witness.len(), 3);
        assert!(witness[1].is_empty());
        assert_eq!(witness[2], lock.redeem_script.to_bytes());
    }

    #[test]
    fn refund_before_script_timelock_rejected() {
        let (payer, _) = key(1);
        assert!(matches!(
            build_refund_transaction(
                &utxo(0xdd, 0, 100_000),
                &lock(),
                &payer,
                &wallet_address(1),
                799_999,
                5,
                &regtest(),
            ),
            Err(CrosslockError::ScriptConstruction(_))
        ));
    }

    #[test]
    fn spend_of_dust_lock_rejected() {
        let (payer, _) = key(1);
        assert!(matches!(
            build_refund_transaction(
                &utxo(0xdd, 0, 600),
                &lock(),
                &payer,
                &wallet_address(1),
                800_000,
                5,
                &regtest(),
            ),
            Err(CrosslockError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn lock_hash_matches_secret_fixture() {
        assert_eq!(lock().params.secret_hash, secret().hash());
        assert_ne!(lock().params.secret_hash, SecretHash::zero());
    }

    // ── Script interpreter ──────────────────────────────────────────────────

    fn lock_prevout(lock: &LockOutput, value_sats: u64) -> TxOut {
        TxOut {
            value: Amount::from_sat(value_sats),
            script_pubkey: lock.script_pubkey.clone(),
        }
    }

    #[test]
    fn funding_passes_consensus_verification() {
        let (payer, payer_pk) = key(1);
        let utxos = vec![utxo(0xaa, 0, 60_000), utxo(0xbb, 1, 70_000)];
        let signed = build_funding_transaction(
            &lock(),
            100_000,
            &utxos,
            &payer,
            &wallet_address(1),
            5,
            &regtest(),
        )
        .unwrap();
        let payer_spk = ScriptBuf::new_p2wpkh(&CompressedPublicKey(payer_pk).wpubkey_hash());
        signed
            .tx
            .verify(|op| {
                utxos.iter().find(|u| u.outpoint() == *op).map(|u| TxOut {
                    value: Amount::from_sat(u.value_sats),
                    script_pubkey: payer_spk.clone(),
                })
            })
            .unwrap();
    }

    #[test]
    fn redemption_passes_consensus_verification() {
        let (payee, _) = key(2);
        let lock = lock();
        let funding = utxo(0xdd, 0, 100_000);
        let signed = build_redemption_transaction(
            &funding,
            &lock,
            &secret(),
            &payee,
            &wallet_address(2),
            5,
            &regtest(),
        )
        .unwrap();
        let prevout = |op: &OutPoint| (*op == funding.outpoint()).then(|| lock_prevout(&lock, 100_000));
        signed.tx.verify(prevout).unwrap();

        // Swapping in another preimage keeps the signature valid but fails OP_EQUALVERIFY.
        let mut forged = signed.tx.clone();
        let mut items = forged.input[0].witness.to_vec();
        items[1] = vec![0x43; 32];
        forged.input[0].witness = Witness::from_slice(&items);
        assert!(forged.verify(prevout).is_err());

        // The payee cannot take the timelock branch.
        let mut wrong_branch = signed.tx.clone();
        let items = wrong_branch.input[0].witness.to_vec();
        wrong_branch.input[0].witness =
            Witness::from_slice(&[items[0].clone(), Vec::new(), items[3].clone()]);
        assert!(wrong_branch.verify(prevout).is_err());
    }

    #[test]
    fn refund_passes_consensus_verification() {
        let (payer, _) = key(1);
        let lock = lock();
        let funding = utxo(0xdd, 0, 100_000);
        let signed = build_refund_transaction(
            &funding,
            &lock,
            &payer,
            &wallet_address(1),
            800_000,
            5,
            &regtest(),
        )
        .unwrap();
        let prevout = |op: &OutPoint| (*op == funding.outpoint()).then(|| lock_prevout(&lock, 100_000));
        signed.tx.verify(prevout).unwrap();

        // A final sequence disables CLTV and is rejected.
        let mut final_seq = signed.tx.clone();
        final_seq.input[0].sequence = Sequence::MAX;
        assert!(final_seq.verify(prevout).is_err());
    }
}
