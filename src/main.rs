//! Dinedash - session client CLI
//!
#![doc = "Dinedash - session client CLI"]
#![doc = "Main entry point for the Dinedash command-line client."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dinedash::cli::{Cli, Commands};
use dinedash::commands;
use dinedash::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    let client = commands::build_client(&config)?;

    match cli.command {
        Commands::Signin {
            email,
            password,
            role,
        } => {
            tracing::info!("Signing in as {} ({})", email, role);
            commands::session::sign_in(&client, &role, &email, &password).await
        }
        Commands::Signout => {
            tracing::info!("Signing out");
            commands::session::sign_out(&client)
        }
        Commands::Status => commands::session::status(&client),
        Commands::Request {
            method,
            path,
            body,
            headers,
        } => {
            let args = commands::request::RequestArgs {
                method,
                path,
                body,
                headers,
            };
            commands::request::run_request(&client, args).await
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects debug output.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "dinedash=debug"
    } else {
        "dinedash=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
