//! Main entry point for the inat-photo-downloader CLI

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use inat_photo_downloader::cli::Cli;
use inat_photo_downloader::shutdown::ShutdownCoordinator;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing(debug: bool) {
    // Check if JSON output is requested via environment variable
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let default_directive = if debug {
        "inat_photo_downloader=debug"
    } else {
        "inat_photo_downloader=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    // Install the Ctrl+C handler; the pipeline polls the shared flag
    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - finishing current observation...");
                shutdown.request_shutdown();
            }
        }
    });

    match cli.execute(shutdown).await {
        Ok(summary) => {
            print!("{summary}");
        }
        Err(e) => {
            error!("Run failed: {}", e);
            std::process::exit(1);
        }
    }
}
