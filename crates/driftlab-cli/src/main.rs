//! driftlab - logical-clock drift simulator CLI

use clap::Parser;
use tracing::info;

use driftlab_cli::{
    cli::Cli,
    commands::CommandDispatcher,
    config::AppConfig,
    error::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    setup_logging(cli.verbose);

    // Load configuration
    let config = load_configuration(&cli)?;

    // Execute the command
    CommandDispatcher::execute(cli, config).await
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    if let Some(config_path) = &cli.config {
        info!("Loading configuration from: {}", config_path.display());
        AppConfig::load_from_file(config_path)
    } else {
        info!("Using default configuration");
        Ok(AppConfig::default())
    }
}
