//! Dinedash - authenticated session client library
//!
//! This library provides the session layer of the Dinedash food-delivery
//! client: an HTTP client that attaches bearer tokens, refreshes them when
//! they expire, and makes concurrent requests share a single refresh.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `client`: The authenticated [`ApiClient`] and its builder
//! - `auth`: Credential storage, JWT claims, the refresh coordinator, and
//!   the auth service endpoints
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli` / `commands`: Command-line interface and handlers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dinedash::auth::session::LogOnlyNotifier;
//! use dinedash::auth::store::open_store;
//! use dinedash::{ApiClient, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     let store = open_store(&config.store)?;
//!     let client = ApiClient::from_config(&config, store, Arc::new(LogOnlyNotifier))?;
//!     client.sign_in("customer", "jane@example.com", "secret").await?;
//!     let orders = client.get("/order-service/order/user-orders").await?;
//!     println!("{}", orders.text().await?);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use client::{ApiClient, ApiClientBuilder};
pub use config::Config;
pub use error::{ApiError, ApiResult, DinedashError, Result};
