//! Logs in to Frisquet Connect and prints the account's sites.
//!
//! Credentials come from the environment:
//!
//! ```text
//! FRISQUET_USERNAME=me@example.com FRISQUET_PASSWORD=secret \
//!     cargo run --example list_devices
//! ```
//!
//! Set `RUST_LOG=frisquet_connect=debug` to follow session renewals.

use frisquet_connect::{Client, Error, PlatformConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("frisquet_connect=info,list_devices=info")),
        )
        .init();

    let platform = PlatformConfig {
        hostname: std::env::var("FRISQUET_HOSTNAME").ok(),
        username: std::env::var("FRISQUET_USERNAME").ok(),
        password: std::env::var("FRISQUET_PASSWORD").ok(),
        ..Default::default()
    };
    let client = Client::from_platform_config(&platform)?;

    let session = client.login().await?;
    println!("Profile: {}", session.utilisateur);

    // The token is attached automatically from here on.
    let sites = client.get::<serde_json::Value>("sites").await?;
    println!("Sites ({:?}, {} attempt(s)):", sites.latency, sites.attempts);
    println!("{:#}", sites.data);

    Ok(())
}
