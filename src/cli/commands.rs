use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "quorum",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_TIMESTAMP"), ")"),
    about = "Multi-model AI smart contract audit"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Audit a contract from a local file or a block explorer
    Audit(AuditArgs),
    /// List the agents configured for each tier
    Agents(AgentsArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone)]
pub struct AuditArgs {
    /// Path to a Solidity source file
    #[arg(short, long, conflicts_with = "address", required_unless_present = "address")]
    pub file: Option<String>,

    /// Deployed contract address to fetch verified source for
    #[arg(short, long)]
    pub address: Option<String>,

    /// Network for --address (mainnet, sepolia, polygon, arbitrum, optimism, base, bsc)
    #[arg(long, default_value = "mainnet")]
    pub network: String,

    /// Contract name to prioritize (defaults to the detected main contract)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Analysis tier: free or premium
    #[arg(short, long, default_value = "free")]
    pub tier: String,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Output directory for reports (overrides config)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Report formats to write: json, markdown or both (overrides config)
    #[arg(long)]
    pub format: Option<String>,

    /// Do not write report files
    #[arg(long)]
    pub no_save: bool,

    /// Print the full report as JSON to stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct AgentsArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Only show this tier
    #[arg(short, long)]
    pub tier: Option<String>,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Path to YAML config file
    pub config: String,
}
