use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use docqa::cli::commands::{
    handle_ask, handle_config, handle_documents, handle_ingest, handle_serve, handle_status,
};
use docqa::cli::{Cli, Commands};
use docqa::models::{Config, OutputFormat};
use docqa::server::shutdown_signal;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "docqa=debug,info" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let resolved = Config::load().unwrap_or_default();
    let format = cli.format.unwrap_or(resolved.config.output.default_format);
    let verbose = cli.verbose;

    // `serve` drains in-flight requests itself; the other commands stop at the signal.
    let command = match cli.command {
        Commands::Serve(args) => return handle_serve(args).await,
        other => other,
    };

    tokio::select! {
        result = run_command(command, format, verbose) => {
            result?;
        }
        _ = shutdown_signal() => {
            eprintln!("\nReceived shutdown signal, cleaning up...");
        }
    }

    Ok(())
}

async fn run_command(command: Commands, format: OutputFormat, verbose: bool) -> Result<()> {
    match command {
        Commands::Serve(args) => handle_serve(args).await?,
        Commands::Ingest(args) => handle_ingest(args, format, verbose).await?,
        Commands::Ask(args) => handle_ask(args, format, verbose).await?,
        Commands::Documents => handle_documents(format, verbose).await?,
        Commands::Status => handle_status(format, verbose).await?,
        Commands::Config(cmd) => handle_config(cmd, format, verbose).await?,
    }

    Ok(())
}
