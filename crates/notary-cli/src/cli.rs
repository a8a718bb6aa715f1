use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "notary",
    about = "Notary: credential anchoring and verification",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API and background anchoring
    Serve(ServeArgs),
    /// Print the SHA-256 fingerprint of a file
    Fingerprint(FingerprintArgs),
    /// Build a Merkle tree from hex fingerprints and print root and proofs
    Merkle(MerkleArgs),
    /// Check an exported proof bundle offline
    VerifyProof(VerifyProofArgs),
    /// Validate a service configuration file
    CheckConfig(CheckConfigArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(short, long, env = "NOTARY_CONFIG")]
    pub config: Option<PathBuf>,
    /// Override `server.bind_addr`
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct FingerprintArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct MerkleArgs {
    #[arg(required = true)]
    pub leaves: Vec<String>,
}

#[derive(Args)]
pub struct VerifyProofArgs {
    pub bundle: PathBuf,
    /// Also check that this file's bytes match the bundle's fingerprint
    #[arg(long)]
    pub artifact: Option<PathBuf>,
    /// Service config whose `[ledger]` section is used to confirm the root
    #[arg(long, value_name = "TOML")]
    pub ledger: Option<PathBuf>,
}

#[derive(Args)]
pub struct CheckConfigArgs {
    pub config: PathBuf,
}
