/// Threadline console client - main entry point
use std::env;
use threadline_core::{cli_app, Config};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse configuration
    let args: Vec<String> = env::args().collect();
    let config = Config::from_args(&args)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    info!("Starting Threadline");
    info!("   Server: {}", config.base_url);
    info!("   Notes:  {}", config.notes_path);
    info!("   Poll interval: {:?}", config.poll_interval);

    cli_app::run(config).await
}
