use clap::Parser;
use quorum::cli::{self, Commands};
use quorum::config;
use quorum::errors::QuorumError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, 0) => "warn",
        (_, 0) => "info",
        (_, 1) => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(!cli.no_color)
            .with_writer(std::io::stderr)
            .init();
    }
    if cli.no_color {
        console::set_colors_enabled(false);
    }

    let result = match cli.command {
        Commands::Audit(args) => cli::audit::handle_audit(args, cli.quiet).await,
        Commands::Agents(args) => cli::agents::handle_agents(args).await,
        Commands::Validate(args) => handle_validate(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let exit_code = match &e {
            QuorumError::Config(_) | QuorumError::Yaml(_) => 2,
            QuorumError::Authentication(_) => 4,
            QuorumError::Input(_) => 5,
            QuorumError::NotVerified(_) => 6,
            _ => 1,
        };
        std::process::exit(exit_code);
    }
}

async fn handle_validate(args: cli::commands::ValidateArgs) -> Result<(), QuorumError> {
    let path = std::path::PathBuf::from(&args.config);
    let config = config::parse_config(&path).await?;
    let registry = config.registry()?;
    println!(
        "Configuration is valid: {} ({} agents)",
        args.config,
        registry.all().count()
    );
    Ok(())
}
