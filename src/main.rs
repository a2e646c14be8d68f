use clap::Parser;
use tfc_upload::cli::{run, Cli};
use tracing::Level;

#[tokio::main]
async fn main() {
    // Load environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // stdout carries the run status lines; diagnostics go to stderr.
    let level = if cli.debug { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    // `run` has already printed the failure; only the exit status is left.
    match run(cli).await {
        Ok(()) => tracing::info!("CLI completed successfully"),
        Err(e) => {
            tracing::debug!(error = %e, "CLI exited with error");
            std::process::exit(1);
        }
    }
}
