use crate::logging::LogFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "agentpay",
    version,
    about = "Signed spending mandates for autonomous agents, with threshold-verified signatures"
)]
pub struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "AGENTPAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Registry database file (overrides the configuration file and AGENTPAY_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate an Ed25519 identity (did:key)
    Keygen(KeygenArgs),
    /// Execute one JSON request and print the JSON response
    Call(CallArgs),
    /// Answer newline-delimited JSON requests from stdin until EOF
    Serve,
    Version,
}

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Write the identity (including the private key) to this file
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Force overwrite an existing file
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Request file, or `-` for stdin
    #[arg(long, short, default_value = "-")]
    pub request: PathBuf,

    /// Exit with a non-zero code when a verification completes with a refusal
    #[arg(long)]
    pub strict: bool,

    #[arg(long)]
    pub pretty: bool,
}
