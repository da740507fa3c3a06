//! # frisquet-connect - Frisquet Connect API client
//!
//! An HTTP client for the Frisquet Connect heating backend, built on top of
//! `reqwest`. The backend authenticates with a session token passed as a
//! `token` query parameter and answers 401 or 403 once that token expires.
//! The client hides this: on such a response it backs off, logs in again with
//! the configured credentials and replays the request with the new token.
//!
//! ## Quick Start
//!
//! ```no_run
//! use frisquet_connect::{Client, ClientConfig};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Site {
//!     nom: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), frisquet_connect::Error> {
//!     let config = ClientConfig::new(
//!         frisquet_connect::DEFAULT_HOSTNAME,
//!         "me@example.com",
//!         "secret",
//!     )?;
//!     let client = Client::new(config)?;
//!
//!     // Optional: the first rejected request logs in on its own.
//!     let session = client.login().await?;
//!     println!("Profile: {}", session.utilisateur);
//!
//!     let site = client.get::<Site>("sites/42").await?;
//!     println!("Site {} ({:?})", site.data.nom, site.latency);
//!     Ok(())
//! }
//! ```
//!
//! ## Session renewal
//!
//! For the N-th authentication failure seen by a client, the wait before
//! logging in is `1s * 2^max(1, N)` plus up to 100ms of jitter, followed by a
//! 500ms pause before the replay. The counter is never reset. Concurrent
//! requests that fail together share a single login.
//!
//! ```no_run
//! use frisquet_connect::{Client, ClientConfig, ReauthPolicy};
//!
//! # fn example() -> Result<(), frisquet_connect::Error> {
//! let client = Client::builder()
//!     .config(ClientConfig::new("https://api.example.com", "me", "secret")?)
//!     // Stop growing after 2^6 seconds.
//!     .reauth_policy(ReauthPolicy::builder().max_exponent(6).build())
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Every request, unexpected status and renewal is reported through
//! `tracing`. Tokens and passwords are never logged.

mod client;
mod config;
mod error;
pub mod interceptor;
pub mod metadata;
pub mod reauth;
mod response;
mod session;

pub use client::{Client, ClientBuilder, LoginResponse, AUTH_PATH};
pub use config::{
    ClientConfig, PlatformConfig, DEFAULT_APP_ID, DEFAULT_HOSTNAME, DEFAULT_USER_AGENT,
    PASSWORD_ENV_VAR,
};
pub use error::{Error, Result};
pub use reauth::ReauthPolicy;
pub use response::{RawResponse, Response};
