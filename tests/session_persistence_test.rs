//! Configuration loading and file-backed sessions, end to end

mod common;

use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use serial_test::serial;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dinedash::auth::session::LogOnlyNotifier;
use dinedash::auth::store::open_store;
use dinedash::cli::Cli;
use dinedash::config::{Config, StoreBackend};
use dinedash::ApiClient;

use common::{counting_logout, mint_token, temp_config_file};

fn clear_env() {
    for key in [
        "DINEDASH_API_BASE_URL",
        "DINEDASH_AUTH_BASE_URL",
        "DINEDASH_REQUEST_TIMEOUT_SECONDS",
        "DINEDASH_REFRESH_TIMEOUT_SECONDS",
        "DINEDASH_EXPIRY_LEEWAY_SECONDS",
        "DINEDASH_STORE_BACKEND",
        "DINEDASH_STORE_PATH",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_cli_overrides_env_and_env_overrides_file() {
    clear_env();
    let (_dir, config_path) = temp_config_file(
        r#"
api:
  base_url: "http://file.example:3000/api"
  request_timeout_seconds: 12
auth:
  refresh_timeout_seconds: 4
store:
  backend: keyring
"#,
    );
    std::env::set_var("DINEDASH_API_BASE_URL", "http://env.example:3000/api");
    std::env::set_var("DINEDASH_REFRESH_TIMEOUT_SECONDS", "6");

    let cli = Cli::try_parse_from([
        "dinedash",
        "--base-url",
        "http://cli.example:3000/api",
        "--store",
        "memory",
        "status",
    ])
    .unwrap();
    let config = Config::load(config_path.to_str().unwrap(), &cli).unwrap();
    clear_env();

    assert_eq!(config.api.base_url, "http://cli.example:3000/api");
    assert_eq!(config.api.request_timeout_seconds, 12);
    assert_eq!(config.auth.refresh_timeout_seconds, 6);
    assert_eq!(config.store.backend, StoreBackend::Memory);
    assert_eq!(
        config.auth_base_url(),
        "http://cli.example:3000/api/auth-service/user"
    );
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_missing_config_file_falls_back_to_defaults() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.yaml");

    let cli = Cli::try_parse_from(["dinedash", "status"]).unwrap();
    let config = Config::load(missing.to_str().unwrap(), &cli).unwrap();

    assert_eq!(config.api.base_url, "http://localhost:3000/api");
    assert_eq!(config.store.backend, StoreBackend::File);
    assert!(config.validate().is_ok());
}

#[tokio::test]
#[serial]
async fn test_file_backed_session_survives_client_restart() {
    clear_env();
    let server = MockServer::start().await;
    let access = mint_token(3600, Some("delivery"));

    Mock::given(method("POST"))
        .and(path("/auth-service/user/signin/delivery"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "accessToken": access, "refreshToken": "refresh-1" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.api.base_url = server.uri();
    config.store.backend = StoreBackend::File;
    config.store.path = Some(dir.path().join("session").join("credentials.json"));
    config.validate().unwrap();

    let first = ApiClient::from_config(
        &config,
        open_store(&config.store).unwrap(),
        Arc::new(LogOnlyNotifier),
    )
    .unwrap();
    first
        .sign_in("delivery", "rider@example.com", "secret")
        .await
        .unwrap();

    let (logout, logouts) = counting_logout();
    let second =
        ApiClient::from_config(&config, open_store(&config.store).unwrap(), logout).unwrap();

    assert!(second.is_authenticated());
    assert_eq!(second.session().role().unwrap().as_deref(), Some("delivery"));

    second.sign_out().unwrap();
    let third = ApiClient::from_config(
        &config,
        open_store(&config.store).unwrap(),
        Arc::new(LogOnlyNotifier),
    )
    .unwrap();
    assert!(!third.is_authenticated());
    assert_eq!(logouts.load(std::sync::atomic::Ordering::SeqCst), 1);
}
