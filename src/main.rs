mod config;
mod encoding;
mod error;
mod repository;
mod routes;
mod server;
mod store;
#[cfg(test)]
mod testing;

use anyhow::Context;
use clap::Parser;
use config::{Args, Config};
use server::Server;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting msgboard in {:?} mode", args.mode);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(&args).context("Configuration error")?;

    let server = Server::bind(&config)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("Server listening on: {}", server.local_addr());

    server.run().await?;

    Ok(())
}
