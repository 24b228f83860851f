/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `session`: sign in, sign out, and session status
- `request`: send an authenticated request and print the response

Handlers build an [`ApiClient`] from the loaded configuration and the
selected credential store, then delegate to it.
*/

use std::sync::Arc;

use colored::Colorize;

use crate::auth::session::LogoutNotifier;
use crate::auth::store::open_store;
use crate::client::ApiClient;
use crate::config::Config;
use crate::error::Result;

pub mod request;
pub mod session;

/// Builds a client for CLI use.
///
/// When a refresh fails and the session ends, the user is told to sign in
/// again.
pub fn build_client(config: &Config) -> Result<ApiClient> {
    let store = open_store(&config.store)?;
    let logout: Arc<dyn LogoutNotifier> = Arc::new(|| {
        eprintln!(
            "{}",
            "Session expired. Run `dinedash signin` to sign in again.".yellow()
        );
    });
    ApiClient::from_config(config, store, logout)
}
