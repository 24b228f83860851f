//! Configuration management for Dinedash
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{DinedashError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Upper bound accepted for any timeout setting, in seconds.
const MAX_TIMEOUT_SECONDS: u64 = 300;

/// Main configuration structure for Dinedash
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend API settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Auth service and refresh behaviour
    #[serde(default)]
    pub auth: AuthConfig,
    /// Credential storage
    #[serde(default)]
    pub store: StoreConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every request path is resolved against
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for each individual request (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Auth service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Base URL of the auth service.
    ///
    /// When unset, `<api.base_url>/auth-service/user` is used.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Upper bound on a single refresh call (seconds)
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout_seconds: u64,

    /// Treat access tokens as expired this many seconds before `exp`
    #[serde(default)]
    pub expiry_leeway_seconds: u64,
}

fn default_refresh_timeout() -> u64 {
    10
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            refresh_timeout_seconds: default_refresh_timeout(),
            expiry_leeway_seconds: 0,
        }
    }
}

/// Credential store backend selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local; credentials are lost on exit
    Memory,
    /// JSON file on disk
    #[default]
    File,
    /// OS native keyring
    Keyring,
}

impl StoreBackend {
    /// Parse a backend name (case-insensitive)
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            "file" => Some(Self::File),
            "keyring" => Some(Self::Keyring),
            _ => None,
        }
    }
}

/// Credential store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Which backend to use
    #[serde(default)]
    pub backend: StoreBackend,

    /// File path for the `file` backend; platform data dir when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DinedashError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| DinedashError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("DINEDASH_API_BASE_URL") {
            self.api.base_url = base_url;
        }

        if let Ok(auth_url) = std::env::var("DINEDASH_AUTH_BASE_URL") {
            self.auth.base_url = Some(auth_url);
        }

        if let Ok(timeout) = std::env::var("DINEDASH_REQUEST_TIMEOUT_SECONDS") {
            match timeout.parse() {
                Ok(t) => self.api.request_timeout_seconds = t,
                Err(_) => tracing::warn!("Invalid DINEDASH_REQUEST_TIMEOUT_SECONDS: {}", timeout),
            }
        }

        if let Ok(timeout) = std::env::var("DINEDASH_REFRESH_TIMEOUT_SECONDS") {
            match timeout.parse() {
                Ok(t) => self.auth.refresh_timeout_seconds = t,
                Err(_) => tracing::warn!("Invalid DINEDASH_REFRESH_TIMEOUT_SECONDS: {}", timeout),
            }
        }

        if let Ok(leeway) = std::env::var("DINEDASH_EXPIRY_LEEWAY_SECONDS") {
            match leeway.parse() {
                Ok(l) => self.auth.expiry_leeway_seconds = l,
                Err(_) => tracing::warn!("Invalid DINEDASH_EXPIRY_LEEWAY_SECONDS: {}", leeway),
            }
        }

        if let Ok(backend) = std::env::var("DINEDASH_STORE_BACKEND") {
            match StoreBackend::parse_str(&backend) {
                Some(b) => self.store.backend = b,
                None => tracing::warn!("Invalid DINEDASH_STORE_BACKEND: {}", backend),
            }
        }

        if let Ok(path) = std::env::var("DINEDASH_STORE_PATH") {
            self.store.path = Some(PathBuf::from(path));
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(base_url) = &cli.base_url {
            self.api.base_url = base_url.clone();
        }
        if let Some(backend) = cli.store {
            self.store.backend = backend;
        }
    }

    /// Base URL of the auth service, explicit or derived from the API base
    pub fn auth_base_url(&self) -> String {
        match &self.auth.base_url {
            Some(url) => url.clone(),
            None => format!(
                "{}/auth-service/user",
                self.api.base_url.trim_end_matches('/')
            ),
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        validate_url("api.base_url", &self.api.base_url)?;
        validate_url("auth.base_url", &self.auth_base_url())?;

        validate_timeout("api.request_timeout_seconds", self.api.request_timeout_seconds)?;
        validate_timeout(
            "auth.refresh_timeout_seconds",
            self.auth.refresh_timeout_seconds,
        )?;

        if self.auth.expiry_leeway_seconds > 3600 {
            return Err(DinedashError::Config(
                "auth.expiry_leeway_seconds must be less than or equal to 3600".to_string(),
            )
            .into());
        }

        if let Some(path) = &self.store.path {
            if path.as_os_str().is_empty() {
                return Err(
                    DinedashError::Config("store.path cannot be empty".to_string()).into(),
                );
            }
        }

        Ok(())
    }
}

fn validate_url(field: &str, value: &str) -> Result<()> {
    let url = url::Url::parse(value)
        .map_err(|e| DinedashError::Config(format!("{} is not a valid URL: {}", field, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DinedashError::Config(format!(
            "{} must use http or https, got {}",
            field,
            url.scheme()
        ))
        .into());
    }
    Ok(())
}

fn validate_timeout(field: &str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(DinedashError::Config(format!("{} must be greater than 0", field)).into());
    }
    if value > MAX_TIMEOUT_SECONDS {
        return Err(DinedashError::Config(format!(
            "{} must be less than or equal to {}",
            field, MAX_TIMEOUT_SECONDS
        ))
        .into());
    }
    Ok(())
}
