//! # Appraisal
//!
//! Entry point: loads `.env`, parses the command line, installs the tracing
//! subscriber and dispatches to [`appraisal::cli::run`].

use appraisal::cli::{Cli, run};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
