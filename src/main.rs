//! TCP Message Relay - Entry Point
//!
//! Parses the command line, binds the listener and runs the relay.

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tcp_relay::{Config, Relay};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=tcp_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tcp_relay=info")),
        )
        .init();

    let config = Config::parse();

    // Bind failure aborts startup
    let relay = Relay::bind(&config).await?;
    info!("Relay listening on {}", relay.local_addr()?);

    relay.run().await;

    Ok(())
}
