use clap::Parser;
use tracing_subscriber::EnvFilter;

use clip_consensus::cli;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("clip_consensus=debug,info")
    } else {
        EnvFilter::new("clip_consensus=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        cli::Commands::Consensus(args) => {
            cli::consensus::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Weights(args) => {
            cli::weights::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Features(args) => {
            cli::features::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Variants(args) => {
            cli::variants::run(args, cli.format, cli.verbose)?;
        }
    }

    Ok(())
}
