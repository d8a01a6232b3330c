//! The hash/time-locked witness script.
//!
//! ```text
//! OP_IF
//!   OP_SHA256 <32-byte secret_hash> OP_EQUALVERIFY
//!   <33-byte payee_pubkey> OP_CHECKSIG
//! OP_ELSE
//!   <timelock_height> OP_CHECKLOCKTIMEVERIFY OP_DROP
//!   <33-byte payer_pubkey> OP_CHECKSIG
//! OP_ENDIF
//! ```
//!
//! The output is P2WSH: `OP_0 <SHA256(redeem_script)>`. Single SHA-256 is
//! used for the hash-lock so the same secret/hash pair is valid on both legs.

use bitcoin::opcodes::all::{
    OP_CHECKSIG, OP_CLTV, OP_DROP, OP_ELSE, OP_ENDIF, OP_EQUALVERIFY, OP_IF, OP_SHA256,
};
use bitcoin::opcodes::Opcode;
use bitcoin::script::{Builder, Instruction};
use bitcoin::secp256k1::PublicKey;
use bitcoin::{Address, Network, Script, ScriptBuf, TxOut};
use crosslock_core::constants::{COMPRESSED_PUBKEY_LEN, LOCKTIME_THRESHOLD, SECRET_LEN};
use crosslock_core::error::CrosslockError;
use crosslock_core::types::{BlockHeight, HtlcParams, PartyKey, SecretHash};

/// Locking output derived from one leg's parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockOutput {
    pub params: HtlcParams,
    /// The witness script revealed at spend time.
    pub redeem_script: ScriptBuf,
    /// `OP_0 <SHA256(redeem_script)>`.
    pub script_pubkey: ScriptBuf,
    pub address: Address,
    pub payer_pubkey: PublicKey,
    pub payee_pubkey: PublicKey,
}

impl LockOutput {
    pub fn timelock_height(&self) -> BlockHeight {
        // build_lock_script rejects heights that do not fit.
        self.params.timelock as BlockHeight
    }
}

/// Build the lock script and P2WSH address for `params`.
///
/// Identical inputs always produce byte-identical output.
pub fn build_lock_script(params: &HtlcParams, network: Network) -> Result<LockOutput, CrosslockError> {
    let payee_pubkey = parse_pubkey("payee", &params.payee)?;
    let payer_pubkey = parse_pubkey("payer", &params.payer)?;
    let height = checked_height(params.timelock)?;

    let redeem_script = htlc_script(&params.secret_hash, &payee_pubkey, &payer_pubkey, height);
    let script_pubkey = ScriptBuf::new_p2wsh(&redeem_script.wscript_hash());
    let address = Address::p2wsh(&redeem_script, network);

    Ok(LockOutput {
        params: params.clone(),
        redeem_script,
        script_pubkey,
        address,
        payer_pubkey,
        payee_pubkey,
    })
}

fn htlc_script(
    secret_hash: &SecretHash,
    payee: &PublicKey,
    payer: &PublicKey,
    height: BlockHeight,
) -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_IF)
        .push_opcode(OP_SHA256)
        .push_slice(secret_hash.as_bytes())
        .push_opcode(OP_EQUALVERIFY)
        .push_key(&bitcoin::PublicKey::new(*payee))
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ELSE)
        .push_int(i64::from(height))
        .push_opcode(OP_CLTV)
        .push_opcode(OP_DROP)
        .push_key(&bitcoin::PublicKey::new(*payer))
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ENDIF)
        .into_script()
}

fn parse_pubkey(role: &str, key: &PartyKey) -> Result<PublicKey, CrosslockError> {
    if key.as_bytes().len() != COMPRESSED_PUBKEY_LEN {
        return Err(CrosslockError::ScriptConstruction(format!(
            "{} public key must be {} bytes, got {}",
            role,
            COMPRESSED_PUBKEY_LEN,
            key.as_bytes().len()
        )));
    }
    PublicKey::from_slice(key.as_bytes()).map_err(|e| {
        CrosslockError::ScriptConstruction(format!("{} public key is not on the curve: {}", role, e))
    })
}

fn checked_height(timelock: u64) -> Result<BlockHeight, CrosslockError> {
    if timelock == 0 || timelock >= u64::from(LOCKTIME_THRESHOLD) {
        return Err(CrosslockError::ScriptConstruction(format!(
            "timelock {} is not a block height in 1..{}",
            timelock, LOCKTIME_THRESHOLD
        )));
    }
    Ok(timelock as BlockHeight)
}

/// Recover the parameters from a witness script, or `None` if it is not
/// exactly a lock script as `build_lock_script` would emit it.
pub fn parse_lock_script(script: &Script) -> Option<HtlcParams> {
    let ins: Vec<Instruction<'_>> = script.instructions().collect::<Result<_, _>>().ok()?;
    if ins.len() != 13 {
        return None;
    }

    let op_at = |i: usize, expected: Opcode| matches!(&ins[i], Instruction::Op(op) if *op == expected);
    let push_at = |i: usize, len: usize| match &ins[i] {
        Instruction::PushBytes(pb) if pb.len() == len => Some(pb.as_bytes().to_vec()),
        _ => None,
    };

    let shape_ok = op_at(0, OP_IF)
        && op_at(1, OP_SHA256)
        && op_at(3, OP_EQUALVERIFY)
        && op_at(5, OP_CHECKSIG)
        && op_at(6, OP_ELSE)
        && op_at(8, OP_CLTV)
        && op_at(9, OP_DROP)
        && op_at(11, OP_CHECKSIG)
        && op_at(12, OP_ENDIF);
    if !shape_ok {
        return None;
    }

    let hash: [u8; SECRET_LEN] = push_at(2, SECRET_LEN)?.try_into().ok()?;
    let payee = push_at(4, COMPRESSED_PUBKEY_LEN)?;
    let payer = push_at(10, COMPRESSED_PUBKEY_LEN)?;
    let height = instruction_number(&ins[7])?;
    if height <= 0 {
        return None;
    }

    let params = HtlcParams {
        secret_hash: SecretHash::from_bytes(hash),
        payer: PartyKey(payer),
        payee: PartyKey(payee),
        timelock: height as u64,
    };

    // Reject non-minimal encodings and off-curve keys by rebuilding.
    let payee_pk = parse_pubkey("payee", &params.payee).ok()?;
    let payer_pk = parse_pubkey("payer", &params.payer).ok()?;
    let rebuilt = htlc_script(
        &params.secret_hash,
        &payee_pk,
        &payer_pk,
        checked_height(params.timelock).ok()?,
    );
    (rebuilt.as_bytes() == script.as_bytes()).then_some(params)
}

fn instruction_number(ins: &Instruction<'_>) -> Option<i64> {
    match ins {
        Instruction::Op(op) => {
            let code = op.to_u8();
            // OP_PUSHNUM_1 ..= OP_PUSHNUM_16
            (0x51..=0x60).contains(&code).then(|| i64::from(code - 0x50))
        }
        Instruction::PushBytes(pb) => decode_script_num(pb.as_bytes()),
    }
}

/// Little-endian sign-magnitude script number, at most 5 bytes for CLTV.
fn decode_script_num(bytes: &[u8]) -> Option<i64> {
    if bytes.is_empty() {
        return Some(0);
    }
    if bytes.len() > 5 {
        return None;
    }
    let mut value: i64 = 0;
    for (i, b) in bytes.iter().enumerate() {
        value |= i64::from(*b) << (8 * i);
    }
    let last = bytes[bytes.len() - 1];
    if last & 0x80 != 0 {
        let mask = !(0x80i64 << (8 * (bytes.len() - 1)));
        Some(-(value & mask))
    } else {
        Some(value)
    }
}

/// True when `output` pays to `lock`'s P2WSH script.
pub fn lock_output_matches(output: &TxOut, lock: &LockOutput) -> bool {
    output.script_pubkey == lock.script_pubkey
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bitcoin::secp256k1::{Secp256k1, SecretKey};
    use crosslock_core::types::Secret;

    pub(crate) fn key(seed: u8) -> (SecretKey, PublicKey) {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[seed; 32]).unwrap();
        (sk, PublicKey::from_secret_key(&secp, &sk))
    }

    pub(crate) fn params(timelock: u64) -> HtlcParams {
        let (_, payer) = key(1);
        let (_, payee) = key(2);
        HtlcParams {
            secret_hash: Secret::from_bytes([0x42; 32]).hash(),
            payer: PartyKey(payer.serialize().to_vec()),
            payee: PartyKey(payee.serialize().to_vec()),
            timelock,
        }
    }

    #[test]
    fn script_layout_is_byte_exact() {
        let p = params(800_000);
        let lock = build_lock_script(&p, Network::Regtest).unwrap();
        let b = lock.redeem_script.as_bytes();

        assert_eq!(b.len(), 114);
        assert_eq!(b[0], 0x63); // OP_IF
        assert_eq!(b[1], 0xa8); // OP_SHA256
        assert_eq!(b[2], 0x20);
        assert_eq!(&b[3..35], p.secret_hash.as_bytes());
        assert_eq!(b[35], 0x88); // OP_EQUALVERIFY
        assert_eq!(b[36], 0x21);
        assert_eq!(&b[37..70], p.payee.as_bytes());
        assert_eq!(b[70], 0xac); // OP_CHECKSIG
        assert_eq!(b[71], 0x67); // OP_ELSE
        assert_eq!(&b[72..76], &[0x03, 0x00, 0x35, 0x0c]); // 800_000 LE
        assert_eq!(b[76], 0xb1); // OP_CHECKLOCKTIMEVERIFY
        assert_eq!(b[77], 0x75); // OP_DROP
        assert_eq!(b[78], 0x21);
        assert_eq!(&b[79..112], p.payer.as_bytes());
        assert_eq!(b[112], 0xac);
        assert_eq!(b[113], 0x68); // OP_ENDIF
    }

    #[test]
    fn output_is_p2wsh_of_single_sha256() {
        let lock = build_lock_script(&params(800_000), Network::Regtest).unwrap();
        let spk = lock.script_pubkey.as_bytes();
        assert_eq!(spk.len(), 34);
        assert_eq!(spk[0], 0x00);
        assert_eq!(spk[1], 0x20);
        let digest = crosslock_crypto::sha256(lock.redeem_script.as_bytes());
        assert_eq!(&spk[2..], &digest);
        assert!(lock.script_pubkey.is_p2wsh());
        assert_eq!(lock.address.script_pubkey(), lock.script_pubkey);
    }

    #[test]
    fn identical_params_give_identical_output() {
        let a = build_lock_script(&params(800_000), Network::Bitcoin).unwrap();
        let b = build_lock_script(&params(800_000), Network::Bitcoin).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.redeem_script.as_bytes(), b.redeem_script.as_bytes());
        assert_eq!(a.address.to_string(), b.address.to_string());
        let c = build_lock_script(&params(800_001), Network::Bitcoin).unwrap();
        assert_ne!(a.script_pubkey, c.script_pubkey);
    }

    #[test]
    fn bad_key_length_rejected() {
        let mut p = params(800_000);
        p.payee = PartyKey(vec![0x02; 32]);
        assert!(matches!(
            build_lock_script(&p, Network::Regtest),
            Err(CrosslockError::ScriptConstruction(_))
        ));
    }

    #[test]
    fn off_curve_key_rejected() {
        let mut p = params(800_000);
        p.payer = PartyKey(vec![0x05; 33]);
        assert!(matches!(
            build_lock_script(&p, Network::Regtest),
            Err(CrosslockError::ScriptConstruction(_))
        ));
    }

    #[test]
    fn timestamp_locktime_rejected() {
        for t in [0u64, 500_000_000, 1_700_000_000] {
            assert!(build_lock_script(&params(t), Network::Regtest).is_err());
        }
    }

    #[test]
    fn parse_inverts_build() {
        for height in [5u64, 16, 17, 127, 128, 800_000, 499_999_999] {
            let p = params(height);
            let lock = build_lock_script(&p, Network::Regtest).unwrap();
            assert_eq!(parse_lock_script(&lock.redeem_script), Some(p));
        }
    }

    #[test]
    fn parse_rejects_foreign_scripts() {
        let lock = build_lock_script(&params(800_000), Network::Regtest).unwrap();
        assert_eq!(parse_lock_script(&lock.script_pubkey), None);

        let mut bytes = lock.redeem_script.to_bytes();
        bytes[113] = 0x51; // replace OP_ENDIF
        assert_eq!(parse_lock_script(&ScriptBuf::from_bytes(bytes)), None);

        assert_eq!(parse_lock_script(&ScriptBuf::from_bytes(vec![0x4c])), None);
    }

    #[test]
    fn script_num_decoding() {
        assert_eq!(decode_script_num(&[]), Some(0));
        assert_eq!(decode_script_num(&[0x00, 0x35, 0x0c]), Some(800_000));
        assert_eq!(decode_script_num(&[0x80, 0x00]), Some(128));
        assert_eq!(decode_script_num(&[0x81]), Some(-1));
        assert_eq!(decode_script_num(&[1, 2, 3, 4, 5, 6]), None);
    }
}
