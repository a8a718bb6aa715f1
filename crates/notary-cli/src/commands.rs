use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;
use serde_json::json;

use notary_crypto::{verify_proof, Fingerprinter, MerkleTree};
use notary_engine::{LedgerCheck, VerificationStatus, Verifier};
use notary_ledger::LedgerBackend;
use notary_server::{NotaryServer, ServiceConfig};
use notary_store::InMemoryRecordStore;
use notary_types::{BatchId, DetachedProof, Fingerprint, NodeHash};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Fingerprint(args) => cmd_fingerprint(args, format),
        Command::Merkle(args) => cmd_merkle(args, format),
        Command::VerifyProof(args) => cmd_verify_proof(args, format).await,
        Command::CheckConfig(args) => cmd_check_config(args, format),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<ServiceConfig> {
    ServiceConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

// ---- serve ----

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    let server = NotaryServer::open(config).context("starting notary server")?;
    server.serve().await?;
    Ok(())
}

// ---- fingerprint ----

/// Stream a file through SHA-256.
pub fn fingerprint_file(path: &Path) -> anyhow::Result<Fingerprint> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Fingerprinter::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("reading {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

fn cmd_fingerprint(args: FingerprintArgs, format: OutputFormat) -> anyhow::Result<()> {
    let fp = fingerprint_file(&args.file)?;
    match format {
        OutputFormat::Json => print_json(&json!({
            "file": args.file.display().to_string(),
            "fingerprint": fp,
        })),
        OutputFormat::Text => {
            println!("{}  {}", fp.to_hex().yellow(), args.file.display());
            Ok(())
        }
    }
}

// ---- merkle ----

#[derive(Debug, Serialize)]
pub struct MerkleReport {
    pub root: NodeHash,
    pub leaf_count: usize,
    pub proofs: Vec<LeafProof>,
}

#[derive(Debug, Serialize)]
pub struct LeafProof {
    pub leaf: Fingerprint,
    pub proof: Vec<NodeHash>,
}

/// Root and per-leaf proofs, in the order the leaves were given.
pub fn merkle_report(leaves: &[String]) -> anyhow::Result<MerkleReport> {
    let leaves = leaves
        .iter()
        .map(|s| Fingerprint::from_hex(s).with_context(|| format!("invalid leaf `{s}`")))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let tree = MerkleTree::build(leaves.clone())?;
    let proofs = leaves
        .into_iter()
        .map(|leaf| LeafProof {
            proof: tree.proof_for(&leaf).unwrap_or_default(),
            leaf,
        })
        .collect();
    Ok(MerkleReport {
        root: tree.root(),
        leaf_count: tree.leaf_count(),
        proofs,
    })
}

fn cmd_merkle(args: MerkleArgs, format: OutputFormat) -> anyhow::Result<()> {
    let report = merkle_report(&args.leaves)?;
    if format == OutputFormat::Json {
        return print_json(&report);
    }
    println!("root: {} ({} leaves)", report.root.to_hex().green().bold(), report.leaf_count);
    for entry in &report.proofs {
        println!("  {}", entry.leaf.to_hex().yellow());
        if entry.proof.is_empty() {
            println!("    {}", "(no siblings)".dimmed());
        }
        for sibling in &entry.proof {
            println!("    {}", sibling.to_hex());
        }
    }
    Ok(())
}

// ---- verify-proof ----

#[derive(Debug, Serialize)]
pub struct ProofCheck {
    pub status: VerificationStatus,
    pub reason: String,
    pub ledger: LedgerCheck,
    pub fingerprint: Fingerprint,
    pub root: NodeHash,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,
}

/// Check proof material without a store or ledger. When `artifact` is
/// given it must match the proof's fingerprint.
pub fn check_proof(proof: &DetachedProof, artifact: Option<&Fingerprint>) -> ProofCheck {
    let (status, reason) = match artifact {
        Some(actual) if *actual != proof.fingerprint => (
            VerificationStatus::NotVerified,
            format!(
                "artifact fingerprint {} does not match the proof",
                actual.short_hex()
            ),
        ),
        _ if !verify_proof(&proof.fingerprint, &proof.proof, &proof.root) => (
            VerificationStatus::NotVerified,
            "merkle proof does not lead to the stated root".to_string(),
        ),
        _ => (
            VerificationStatus::Verified,
            "merkle proof valid; ledger not consulted (pass --ledger to confirm the root)"
                .to_string(),
        ),
    };
    ProofCheck {
        status,
        reason,
        ledger: LedgerCheck::Skipped,
        fingerprint: proof.fingerprint,
        root: proof.root,
        batch_id: proof.batch_id.clone(),
    }
}

/// Confirm a locally valid proof against the ledger named in `config`.
/// Proofs that already failed locally are returned unchanged.
pub async fn confirm_on_ledger(
    check: ProofCheck,
    proof: &DetachedProof,
    config: &ServiceConfig,
) -> anyhow::Result<ProofCheck> {
    if check.status != VerificationStatus::Verified {
        return Ok(check);
    }
    if proof.batch_id.is_none() {
        return Ok(ProofCheck {
            status: VerificationStatus::NotVerified,
            reason: "bundle has no batch id to look up on the ledger".to_string(),
            ..check
        });
    }
    let ledger = notary_ledger::connect(&config.engine.ledger).context("connecting to the ledger")?;
    let verifier = Verifier::new(Arc::new(InMemoryRecordStore::new()), ledger, 1);
    let result = verifier.verify_detached(proof).await;
    Ok(ProofCheck {
        status: result.status,
        reason: result.reason,
        ledger: result.ledger,
        ..check
    })
}

async fn cmd_verify_proof(args: VerifyProofArgs, format: OutputFormat) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.bundle)
        .with_context(|| format!("reading {}", args.bundle.display()))?;
    let proof: DetachedProof = serde_json::from_str(&raw)
        .with_context(|| format!("parsing proof bundle {}", args.bundle.display()))?;
    let artifact = args.artifact.as_deref().map(fingerprint_file).transpose()?;
    let mut check = check_proof(&proof, artifact.as_ref());
    if let Some(path) = &args.ledger {
        let config = load_config(path)?;
        check = confirm_on_ledger(check, &proof, &config).await?;
    }

    match format {
        OutputFormat::Json => print_json(&check)?,
        OutputFormat::Text => {
            let status = match check.status {
                VerificationStatus::Verified => format!("✓ {}", check.status).green().bold(),
                _ => format!("✗ {}", check.status).red().bold(),
            };
            println!("{status}: {}", check.reason);
            println!("  ledger:      {}", format!("{:?}", check.ledger).to_lowercase().dimmed());
            println!("  fingerprint: {}", check.fingerprint.to_hex().yellow());
            println!("  root:        {}", check.root.to_hex());
            if let Some(batch) = &check.batch_id {
                println!("  batch:       {}", batch.as_str().cyan());
            }
        }
    }
    if check.status != VerificationStatus::Verified {
        bail!("proof did not verify");
    }
    Ok(())
}

// ---- check-config ----

fn cmd_check_config(args: CheckConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let ledger = &config.engine.ledger;
    let issuer_key = match ledger.backend {
        LedgerBackend::Memory => None,
        LedgerBackend::Rpc => Some(ledger.resolve_issuer_key().map(|key| key.public_key())),
    };

    if format == OutputFormat::Json {
        let mut value = serde_json::to_value(&config)?;
        if let Some(result) = &issuer_key {
            value["issuer_key"] = match result {
                Ok(public) => json!({ "ok": true, "public_key": public.to_hex() }),
                Err(e) => json!({ "ok": false, "error": e.to_string() }),
            };
        }
        return print_json(&value);
    }

    println!("{} {} is valid", "✓".green().bold(), args.config.display());
    println!("  bind:       {}", config.server.bind_addr.to_string().bold());
    let scheduler = &config.engine.scheduler;
    if scheduler.enabled {
        println!(
            "  scheduler:  every {}s, up to {} records per batch",
            scheduler.interval_secs, scheduler.batch_size
        );
    } else {
        println!("  scheduler:  {}", "manual triggers only".dimmed());
    }
    match ledger.backend {
        LedgerBackend::Memory => println!("  ledger:     {}", "memory".cyan()),
        LedgerBackend::Rpc => println!(
            "  ledger:     {} {}",
            "rpc".cyan(),
            ledger.rpc_url.as_deref().unwrap_or_default()
        ),
    }
    match issuer_key {
        Some(Ok(public)) => println!("  issuer key: {}", public.to_hex().yellow()),
        Some(Err(e)) => println!("  issuer key: {} ({e})", "unavailable".red()),
        None => {}
    }
    Ok(())
}
