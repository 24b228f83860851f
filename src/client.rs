//! Authenticated HTTP client for the Dinedash backend services
//!
//! [`ApiClient`] issues requests against a fixed base URL, attaching the
//! stored access token as `Authorization: Bearer <token>`. Callers never see
//! an expired-token failure unless refreshing the token itself fails:
//!
//! 1. Before sending, an access token whose `exp` claim has passed (or
//!    cannot be read) is refreshed through the shared
//!    [`RefreshCoordinator`].
//! 2. If the backend still answers `401 Unauthorized` to a request that
//!    carried a token, the token is refreshed and the request is retried
//!    exactly once. A second `401` surfaces as
//!    [`ApiError::AuthRefreshFailed`].
//!
//! Requests sent while no token is stored go out unauthenticated, and a
//! `401` on such a request is an ordinary [`ApiError::Backend`].
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use dinedash::auth::store::MemoryStore;
//! use dinedash::client::ApiClient;
//!
//! # async fn example() -> dinedash::error::Result<()> {
//! let client = ApiClient::builder(url::Url::parse("http://localhost:3000/api")?)
//!     .store(Arc::new(MemoryStore::new()))
//!     .build()?;
//!
//! let response = client.get("/order-service/order/user-orders").await?;
//! println!("{}", response.text().await?);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Response, StatusCode};
use serde_json::Value;
use url::Url;

use crate::auth::backend::{AuthBackend, HttpAuthBackend, SignInRequest};
use crate::auth::coordinator::RefreshCoordinator;
use crate::auth::session::{LogOnlyNotifier, LogoutNotifier, Role, Session};
use crate::auth::store::{CredentialStore, MemoryStore};
use crate::config::Config;
use crate::error::{ApiError, ApiResult, DinedashError, Result};

/// Joins a relative `path` onto `base`, keeping the base path.
///
/// Unlike [`Url::join`], a leading `/` in `path` does not discard the base
/// path: `http://h/api` + `/orders` is `http://h/api/orders`.
pub(crate) fn join_url(base: &Url, path: &str) -> ApiResult<Url> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| ApiError::InvalidRequest(format!("invalid path {path}: {e}")))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // The pattern is a constant; compilation cannot fail at runtime.
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern must compile")
    })
}

/// Retry bookkeeping carried through a single logical request.
#[derive(Debug, Clone, Copy, Default)]
struct RequestContext {
    retried: bool,
}

impl RequestContext {
    fn retry(self) -> Self {
        Self { retried: true }
    }
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// HTTP client that manages bearer credentials transparently.
///
/// Cloning is cheap; clones share the HTTP connection pool, the credential
/// store and the refresh state.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    session: Session,
    backend: Arc<dyn AuthBackend>,
    coordinator: RefreshCoordinator,
    logout: Arc<dyn LogoutNotifier>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Starts building a client for `base_url`.
    pub fn builder(base_url: Url) -> ApiClientBuilder {
        ApiClientBuilder::new(base_url)
    }

    /// Builds a client from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DinedashError::Config`] if a configured URL does not parse.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn CredentialStore>,
        logout: Arc<dyn LogoutNotifier>,
    ) -> Result<Self> {
        let base_url = Url::parse(&config.api.base_url)
            .map_err(|e| DinedashError::Config(format!("Invalid api.base_url: {}", e)))?;
        let auth_base = Url::parse(&config.auth_base_url())
            .map_err(|e| DinedashError::Config(format!("Invalid auth base URL: {}", e)))?;
        let leeway = i64::try_from(config.auth.expiry_leeway_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                DinedashError::Config(format!(
                    "auth.expiry_leeway_seconds out of range: {}",
                    config.auth.expiry_leeway_seconds
                ))
            })?;

        Self::builder(base_url)
            .store(store)
            .auth_base_url(auth_base)
            .logout_notifier(logout)
            .request_timeout(Duration::from_secs(config.api.request_timeout_seconds))
            .refresh_timeout(Duration::from_secs(config.auth.refresh_timeout_seconds))
            .expiry_leeway(leeway)
            .build()
    }

    /// The base URL request paths are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The session backing this client.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Sends a request to `path` relative to the base URL.
    ///
    /// `body`, when given, is sent as JSON with
    /// `Content-Type: application/json`. Any `Authorization` entry in
    /// `headers` is ignored; the client manages that header itself.
    ///
    /// # Returns
    ///
    /// The backend response, untouched, when its status is 2xx.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Network`] when no response was received.
    /// - [`ApiError::AuthRefreshFailed`] when the token could not be
    ///   refreshed, or the request was rejected again after a refresh.
    /// - [`ApiError::Backend`] for any other non-2xx status.
    /// - [`ApiError::InvalidRequest`] when `path` does not form a valid URL.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        headers: Option<&HashMap<String, String>>,
    ) -> ApiResult<Response> {
        let url = join_url(&self.base_url, path)?;
        let ctx = RequestContext::default();

        let token = self.credential().await?;
        let response = self
            .send(&method, &url, body, headers, token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return finish(ctx, response).await;
        }
        let Some(rejected) = token else {
            return finish(ctx, response).await;
        };

        tracing::debug!(%method, %url, "Request rejected with 401; refreshing and retrying once");
        let ctx = ctx.retry();
        let fresh = self.coordinator.refresh(Some(&rejected)).await?;
        let response = self
            .send(&method, &url, body, headers, Some(&fresh))
            .await?;
        finish(ctx, response).await
    }

    /// Sends a `GET` request.
    pub async fn get(&self, path: &str) -> ApiResult<Response> {
        self.request(Method::GET, path, None, None).await
    }

    /// Sends a `POST` request with a JSON body.
    pub async fn post(&self, path: &str, body: &Value) -> ApiResult<Response> {
        self.request(Method::POST, path, Some(body), None).await
    }

    /// Sends a `PUT` request with a JSON body.
    pub async fn put(&self, path: &str, body: &Value) -> ApiResult<Response> {
        self.request(Method::PUT, path, Some(body), None).await
    }

    /// Sends a `PATCH` request with a JSON body.
    pub async fn patch(&self, path: &str, body: &Value) -> ApiResult<Response> {
        self.request(Method::PATCH, path, Some(body), None).await
    }

    /// Sends a `DELETE` request.
    pub async fn delete(&self, path: &str) -> ApiResult<Response> {
        self.request(Method::DELETE, path, None, None).await
    }

    /// Signs in and stores the issued credentials.
    ///
    /// Returns the role carried by the new access token, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] for a malformed email address
    /// (no request is sent), otherwise whatever the sign-in call returned.
    pub async fn sign_in(
        &self,
        role: &str,
        email: &str,
        password: &str,
    ) -> ApiResult<Option<String>> {
        if !email_pattern().is_match(email) {
            return Err(ApiError::InvalidRequest(format!(
                "invalid email address: {email}"
            )));
        }

        let request = SignInRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let pair = self.backend.sign_in(role, &request).await?;
        let granted = self.session.store_tokens(&pair)?;

        match granted.as_deref() {
            Some(claim) if Role::from_claim(claim).is_none() => {
                tracing::warn!("Unknown user role: {}", claim)
            }
            Some(claim) => tracing::info!("Signed in as {}", claim),
            None => tracing::info!("Signed in"),
        }
        Ok(granted)
    }

    /// Ends the session locally and notifies the logout collaborator.
    pub fn sign_out(&self) -> ApiResult<()> {
        self.session.logout(self.logout.as_ref())
    }

    /// Returns `true` when an unexpired access token is stored.
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    /// Token to attach to the first attempt of a request.
    async fn credential(&self) -> ApiResult<Option<String>> {
        let Some(token) = self.session.access_token()? else {
            tracing::debug!("No access token stored; sending unauthenticated");
            return Ok(None);
        };

        if !self.session.is_expired(&token) {
            return Ok(Some(token));
        }

        tracing::debug!("Access token expired; waiting for refresh");
        self.coordinator.refresh(Some(&token)).await.map(Some)
    }

    async fn send(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
        headers: Option<&HashMap<String, String>>,
        token: Option<&str>,
    ) -> ApiResult<Response> {
        let mut req = self.http.request(method.clone(), url.clone());

        for (name, value) in headers.into_iter().flatten() {
            if name.eq_ignore_ascii_case(AUTHORIZATION.as_str()) {
                tracing::debug!("Ignoring caller-supplied Authorization header");
                continue;
            }
            req = req.header(name.as_str(), value.as_str());
        }

        if let Some(body) = body {
            req = req.json(body);
        }

        if let Some(token) = token {
            req = req.bearer_auth(token);
        }

        req.send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))
    }
}

/// Maps a response to the caller-facing outcome.
async fn finish(ctx: RequestContext, response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED && ctx.retried {
        return Err(ApiError::AuthRefreshFailed(format!(
            "request rejected with {status} after credential refresh"
        )));
    }

    Err(ApiError::Backend {
        status: status.as_u16(),
        body,
    })
}

// ---------------------------------------------------------------------------
// ApiClientBuilder
// ---------------------------------------------------------------------------

/// Builder for [`ApiClient`].
///
/// Unset parts default to: an in-memory store, the HTTP auth backend at
/// `<base>/auth-service/user`, a logging-only logout notifier, a 30 second
/// request timeout, a 10 second refresh timeout and no expiry leeway.
pub struct ApiClientBuilder {
    base_url: Url,
    store: Option<Arc<dyn CredentialStore>>,
    backend: Option<Arc<dyn AuthBackend>>,
    auth_base_url: Option<Url>,
    logout: Option<Arc<dyn LogoutNotifier>>,
    request_timeout: Duration,
    refresh_timeout: Duration,
    expiry_leeway: chrono::Duration,
}

impl ApiClientBuilder {
    fn new(base_url: Url) -> Self {
        Self {
            base_url,
            store: None,
            backend: None,
            auth_base_url: None,
            logout: None,
            request_timeout: Duration::from_secs(30),
            refresh_timeout: Duration::from_secs(10),
            expiry_leeway: chrono::Duration::zero(),
        }
    }

    /// Credential store to read and write tokens.
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Custom auth backend. Takes precedence over [`Self::auth_base_url`].
    pub fn auth_backend(mut self, backend: Arc<dyn AuthBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Base URL for the built-in HTTP auth backend.
    pub fn auth_base_url(mut self, url: Url) -> Self {
        self.auth_base_url = Some(url);
        self
    }

    /// Collaborator notified when a failed refresh ends the session.
    pub fn logout_notifier(mut self, logout: Arc<dyn LogoutNotifier>) -> Self {
        self.logout = Some(logout);
        self
    }

    /// Timeout applied to every individual HTTP request.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Upper bound on a single refresh call.
    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Refresh tokens this long before their `exp` claim.
    pub fn expiry_leeway(mut self, leeway: chrono::Duration) -> Self {
        self.expiry_leeway = leeway;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`DinedashError::Http`] if the HTTP client cannot be
    /// constructed, or [`DinedashError::Config`] if the derived auth URL is
    /// invalid.
    pub fn build(self) -> Result<ApiClient> {
        let http = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(DinedashError::Http)?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let session = Session::new(store, self.expiry_leeway);

        let backend: Arc<dyn AuthBackend> = match self.backend {
            Some(backend) => backend,
            None => {
                let auth_base = match self.auth_base_url {
                    Some(url) => url,
                    None => join_url(&self.base_url, "auth-service/user")
                        .map_err(|e| DinedashError::Config(e.to_string()))?,
                };
                Arc::new(HttpAuthBackend::new(http.clone(), auth_base))
            }
        };

        let logout = self.logout.unwrap_or_else(|| Arc::new(LogOnlyNotifier));
        let coordinator = RefreshCoordinator::new(
            session.clone(),
            Arc::clone(&backend),
            Arc::clone(&logout),
            self.refresh_timeout,
        );

        Ok(ApiClient {
            http,
            base_url: self.base_url,
            session,
            backend,
            coordinator,
            logout,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // join_url
    // -----------------------------------------------------------------------

    #[test]
    fn test_join_url_keeps_base_path() {
        let base = Url::parse("http://localhost:3000/api").unwrap();
        let url = join_url(&base, "/order-service/order/user-orders").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/api/order-service/order/user-orders"
        );
    }

    #[test]
    fn test_join_url_handles_trailing_slash_and_relative_path() {
        let base = Url::parse("http://localhost:3000/api/").unwrap();
        let url = join_url(&base, "restaurants?open=true").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/restaurants?open=true");
    }

    #[test]
    fn test_join_url_on_bare_host() {
        let base = Url::parse("http://127.0.0.1:8080").unwrap();
        let url = join_url(&base, "/refresh-token").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/refresh-token");
    }

    // -----------------------------------------------------------------------
    // email validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_email_pattern_accepts_plain_address() {
        assert!(email_pattern().is_match("jane@example.com"));
    }

    #[test]
    fn test_email_pattern_rejects_malformed_addresses() {
        assert!(!email_pattern().is_match("jane@example"));
        assert!(!email_pattern().is_match("jane example@x.com"));
        assert!(!email_pattern().is_match("@example.com"));
    }

    // -----------------------------------------------------------------------
    // RequestContext
    // -----------------------------------------------------------------------

    #[test]
    fn test_request_context_retry_marks_retried() {
        let ctx = RequestContext::default();
        assert!(!ctx.retried);
        assert!(ctx.retry().retried);
        // `retry` returns a new value; `ctx` is unchanged.
        assert!(!ctx.retried);
    }

    // -----------------------------------------------------------------------
    // Builder defaults
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_builder_defaults_to_unauthenticated_memory_session() {
        let client = ApiClient::builder(Url::parse("http://localhost:3000/api").unwrap())
            .build()
            .unwrap();
        assert!(!client.is_authenticated());
        assert_eq!(client.base_url().as_str(), "http://localhost:3000/api");
    }

    #[tokio::test]
    async fn test_from_config_rejects_out_of_range_leeway() {
        let mut config = Config::default();
        config.auth.expiry_leeway_seconds = u64::MAX;
        let result = ApiClient::from_config(
            &config,
            Arc::new(MemoryStore::new()),
            Arc::new(LogOnlyNotifier),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_from_config_accepts_configured_leeway() {
        let mut config = Config::default();
        config.auth.expiry_leeway_seconds = 60;
        let client = ApiClient::from_config(
            &config,
            Arc::new(MemoryStore::new()),
            Arc::new(LogOnlyNotifier),
        )
        .unwrap();
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn test_sign_in_rejects_invalid_email_before_sending() {
        // Port 9 (discard) is never contacted because validation fails first.
        let client = ApiClient::builder(Url::parse("http://127.0.0.1:9").unwrap())
            .build()
            .unwrap();
        let err = client
            .sign_in("customer", "not-an-email", "secret")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }
}
