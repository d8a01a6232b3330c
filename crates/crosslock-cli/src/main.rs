//! crosslock
//!
//! Offline operator tool for HTLC cross-chain swaps. Generates secrets and
//! fill plans, derives lock scripts, checks timelock ordering and pulls
//! revealed secrets out of raw transactions. Nothing here talks to a node;
//! output is JSON on stdout, logs go to stderr.
//!
//! Usage:
//!   crosslock secret
//!   crosslock fill-secrets   --max-fills <n>
//!   crosslock plan           --total <amount> --max-fills <n> [--with-secrets]
//!   crosslock lock-script    --secret-hash <hex> --payer <hex> --payee <hex> --timelock <height> [--network <net>]
//!   crosslock inspect-script --script <hex>
//!   crosslock check-ordering --source <t> --destination <t> [--exclusive-period <secs>]
//!   crosslock escrow-windows --timelock <unix_ts>
//!   crosslock estimate-fee   --inputs <n> --outputs <n> [--fee-rate <sat/vB>] [--legacy]
//!   crosslock extract-secret --tx <hex> --secret-hash <hex>

use std::path::PathBuf;

use anyhow::{bail, Context};
use bitcoin::{Network, ScriptBuf};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{debug, info};

use crosslock_core::types::{to_prefixed_hex, HtlcParams, PartyKey, SecretHash};
use crosslock_crypto::{
    build_merkle_tree, generate_fill_secrets, generate_secret, plan_partial_fills,
};
use crosslock_script::{
    build_lock_script, estimate_transaction_size, extract_secret_from_spend, fee_for,
    parse_lock_script,
};
use crosslock_timelock::validate_ordering;

mod config;
use config::CrosslockConfig;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "crosslock",
    version,
    about = "Crosslock — offline tooling for HTLC cross-chain swaps"
)]
struct Args {
    /// Path to a JSON config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a fresh secret and its SHA-256 hash.
    Secret,

    /// Generate `max_fills + 1` secrets and the merkle root over their hashes.
    FillSecrets {
        #[arg(long)]
        max_fills: u32,
    },

    /// Split an order into partial fills.
    Plan {
        #[arg(long)]
        total: u128,
        #[arg(long)]
        max_fills: u32,
        /// Also generate fill secrets and bind each fill to its proof.
        #[arg(long, default_value_t = false)]
        with_secrets: bool,
    },

    /// Derive the lock script and P2WSH address for one script-chain leg.
    LockScript {
        /// SHA-256 secret hash (hex, 32 bytes).
        #[arg(long)]
        secret_hash: String,
        /// Compressed public key of the funding party (hex, 33 bytes).
        #[arg(long)]
        payer: String,
        /// Compressed public key of the redeeming party (hex, 33 bytes).
        #[arg(long)]
        payee: String,
        /// Absolute block height of the refund path.
        #[arg(long)]
        timelock: u64,
        /// Overrides the configured network (bitcoin, testnet, signet, regtest).
        #[arg(long)]
        network: Option<Network>,
    },

    /// Recover the parameters of a lock script from its bytes.
    InspectScript {
        /// Redeem script (hex).
        #[arg(long)]
        script: String,
    },

    /// Check that the destination leg expires early enough.
    CheckOrdering {
        #[arg(long)]
        source: u64,
        #[arg(long)]
        destination: u64,
        /// Overrides the configured exclusive period.
        #[arg(long)]
        exclusive_period: Option<u64>,
    },

    /// Print the withdrawal windows of an escrow with the given timelock.
    EscrowWindows {
        #[arg(long)]
        timelock: u64,
    },

    /// Estimate the size and fee of a transaction.
    EstimateFee {
        #[arg(long)]
        inputs: usize,
        #[arg(long)]
        outputs: usize,
        /// sat/vB; defaults to the configured rate.
        #[arg(long)]
        fee_rate: Option<u64>,
        /// Price inputs as legacy P2PKH spends.
        #[arg(long, default_value_t = false)]
        legacy: bool,
    },

    /// Find the secret revealed by a raw transaction.
    ExtractSecret {
        /// Raw transaction (hex).
        #[arg(long)]
        tx: String,
        #[arg(long)]
        secret_hash: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,crosslock=debug")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => CrosslockConfig::load(path)?,
        None => CrosslockConfig::default(),
    };
    debug!(?config, "configuration loaded");

    let output = run(args.command, &config)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run(command: Command, config: &CrosslockConfig) -> anyhow::Result<serde_json::Value> {
    match command {
        // ── Secrets ──────────────────────────────────────────────────────────
        Command::Secret => {
            let pair = generate_secret();
            info!(hash = %pair.hash, "generated secret");
            Ok(json!({ "secret": pair.secret, "hash": pair.hash }))
        }

        Command::FillSecrets { max_fills } => {
            let pairs = generate_fill_secrets(max_fills)?;
            let hashes: Vec<SecretHash> = pairs.iter().map(|p| p.hash).collect();
            let tree = build_merkle_tree(&hashes)?;
            info!(count = pairs.len(), "generated fill secrets");
            Ok(json!({
                "root": to_prefixed_hex(&tree.root()),
                "secrets": pairs,
            }))
        }

        Command::Plan {
            total,
            max_fills,
            with_secrets,
        } => {
            let plan = plan_partial_fills(total, max_fills)?;
            if !with_secrets {
                return Ok(serde_json::to_value(&plan)?);
            }
            let secrets = generate_fill_secrets(max_fills)?;
            let bound = plan.bind(&secrets)?;
            let fills: Vec<serde_json::Value> = bound
                .fills
                .iter()
                .map(|f| {
                    json!({
                        "fill": f.fill_number,
                        "amount": f.amount.to_string(),
                        "secret_index": f.secret_index,
                        "secret_hash": f.secret_hash,
                        "proof": f.proof.siblings.iter().map(|s| to_prefixed_hex(s)).collect::<Vec<_>>(),
                        "path": f.proof.path,
                    })
                })
                .collect();
            Ok(json!({
                "total": total.to_string(),
                "root": to_prefixed_hex(&bound.root),
                "fills": fills,
                "secrets": secrets,
            }))
        }

        // ── Script chain ─────────────────────────────────────────────────────
        Command::LockScript {
            secret_hash,
            payer,
            payee,
            timelock,
            network,
        } => {
            let params = HtlcParams {
                secret_hash: SecretHash::from_hex(&secret_hash)?,
                payer: PartyKey(decode_hex(&payer).context("decoding --payer")?),
                payee: PartyKey(decode_hex(&payee).context("decoding --payee")?),
                timelock,
            };
            let network = network.unwrap_or(config.script.network);
            let lock = build_lock_script(&params, network)?;
            info!(address = %lock.address, timelock, "derived lock script");
            Ok(json!({
                "address": lock.address.to_string(),
                "redeem_script": hex::encode(lock.redeem_script.as_bytes()),
                "script_pubkey": hex::encode(lock.script_pubkey.as_bytes()),
                "network": network.to_string(),
            }))
        }

        Command::InspectScript { script } => {
            let bytes = decode_hex(&script).context("decoding --script")?;
            let script = ScriptBuf::from_bytes(bytes);
            match parse_lock_script(&script) {
                Some(params) => Ok(serde_json::to_value(&params)?),
                None => bail!("not a crosslock HTLC script"),
            }
        }

        Command::EstimateFee {
            inputs,
            outputs,
            fee_rate,
            legacy,
        } => {
            let vbytes = estimate_transaction_size(inputs, outputs, !legacy);
            let rate = fee_rate.unwrap_or(config.script.default_fee_rate);
            Ok(json!({
                "vbytes": vbytes,
                "fee_rate": rate,
                "fee_sats": fee_for(vbytes, rate),
            }))
        }

        Command::ExtractSecret { tx, secret_hash } => {
            let raw = decode_hex(&tx).context("decoding --tx")?;
            let hash = SecretHash::from_hex(&secret_hash)?;
            match extract_secret_from_spend(&raw, &hash) {
                Some(secret) => Ok(json!({ "secret": secret })),
                None => bail!("transaction does not reveal a secret for {}", hash),
            }
        }

        // ── Timelocks ────────────────────────────────────────────────────────
        Command::CheckOrdering {
            source,
            destination,
            exclusive_period,
        } => {
            let exclusive = exclusive_period.unwrap_or(config.coordinator.exclusive_period);
            validate_ordering(source, destination, exclusive)?;
            Ok(json!({
                "safe": true,
                "margin": source - destination - exclusive,
            }))
        }

        Command::EscrowWindows { timelock } => {
            let escrow = &config.escrow;
            Ok(json!({
                "withdrawer_until": timelock,
                "public_withdraw_from": timelock.saturating_sub(escrow.exclusive_period_secs),
                "refund_from": timelock,
                "emergency_recover_from": timelock.saturating_add(escrow.emergency_delay_secs),
            }))
        }
    }
}

fn decode_hex(s: &str) -> anyhow::Result<Vec<u8>> {
    Ok(hex::decode(s.strip_prefix("0x").unwrap_or(s))?)
}
