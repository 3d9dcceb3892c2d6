use anyhow::Result;
use clap::Parser;
use cloudtile::cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Storage and remote endpoint settings may come from a .env file.
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout only carries command output.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "cloudtile starting");
    let result = run(cli).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "cloudtile failed");
    }
    result
}
