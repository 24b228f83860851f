//! Command-line interface definition for Dinedash
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for signing in and out, inspecting the session, and
//! sending authenticated requests to the backend services.

use clap::{Parser, Subcommand};

use crate::config::StoreBackend;

/// Dinedash - session client for the food-delivery backend
///
/// Signs in against the auth service, keeps the issued tokens fresh, and
/// sends authenticated requests on your behalf.
#[derive(Parser, Debug, Clone)]
#[command(name = "dinedash")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the API base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Override the credential store backend
    #[arg(long, value_parser = parse_store_backend)]
    pub store: Option<StoreBackend>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Dinedash
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Sign in and store the issued tokens
    Signin {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "DINEDASH_PASSWORD", hide_env_values = true)]
        password: String,

        /// Role to sign in as (customer, restaurant-admin, delivery)
        #[arg(short, long, default_value = "customer")]
        role: String,
    },

    /// Forget the stored tokens
    Signout,

    /// Show whether a valid session is stored
    Status,

    /// Send an authenticated request and print the response
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: String,

        /// Path relative to the API base URL
        path: String,

        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,

        /// Extra header as `Name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
}

fn parse_store_backend(s: &str) -> Result<StoreBackend, String> {
    StoreBackend::parse_str(s)
        .ok_or_else(|| format!("unknown store backend '{s}' (expected memory, file or keyring)"))
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
