use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tempfile::TempDir;
use url::Url;
use wiremock::MockServer;

use dinedash::auth::session::LogoutNotifier;
use dinedash::auth::store::{
    CredentialStore, MemoryStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, ROLE_KEY,
};
use dinedash::ApiClient;

/// Builds an unsigned JWT whose `exp` is `exp_offset_secs` from now.
#[allow(dead_code)]
pub fn mint_token(exp_offset_secs: i64, role: Option<&str>) -> String {
    let exp = chrono::Utc::now().timestamp() + exp_offset_secs;
    let payload = match role {
        Some(role) => serde_json::json!({ "exp": exp, "role": role }),
        None => serde_json::json!({ "exp": exp }),
    };
    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

/// Logout notifier that counts invocations.
#[allow(dead_code)]
pub fn counting_logout() -> (Arc<dyn LogoutNotifier>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let notifier: Arc<dyn LogoutNotifier> = Arc::new(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    (notifier, count)
}

/// Everything a client test needs to inspect after the fact.
#[allow(dead_code)]
pub struct Harness {
    pub client: ApiClient,
    pub store: Arc<MemoryStore>,
    pub logouts: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl Harness {
    pub fn logout_count(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        self.store.get(key).expect("memory store read")
    }
}

/// Client against `server` with the auth service mounted under
/// `/auth-service/user`, seeded with the given credentials.
#[allow(dead_code)]
pub fn harness(
    server: &MockServer,
    access_token: Option<&str>,
    refresh_token: Option<&str>,
) -> Harness {
    harness_with_refresh_timeout(server, access_token, refresh_token, Duration::from_secs(5))
}

#[allow(dead_code)]
pub fn harness_with_refresh_timeout(
    server: &MockServer,
    access_token: Option<&str>,
    refresh_token: Option<&str>,
    refresh_timeout: Duration,
) -> Harness {
    let store = Arc::new(MemoryStore::new());
    if let Some(token) = access_token {
        store.set(ACCESS_TOKEN_KEY, token).expect("seed access token");
    }
    if let Some(token) = refresh_token {
        store
            .set(REFRESH_TOKEN_KEY, token)
            .expect("seed refresh token");
    }

    let (logout, logouts) = counting_logout();
    let base = Url::parse(&server.uri()).expect("valid mock server url");
    let auth_base =
        Url::parse(&format!("{}/auth-service/user", server.uri())).expect("valid auth url");

    let client = ApiClient::builder(base)
        .store(store.clone())
        .auth_base_url(auth_base)
        .logout_notifier(logout)
        .refresh_timeout(refresh_timeout)
        .build()
        .expect("client builds");

    Harness {
        client,
        store,
        logouts,
    }
}

/// Keys the session writes, for assertions on a cleared store.
#[allow(dead_code)]
pub const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, ROLE_KEY];

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
