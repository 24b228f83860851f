//! Auth service endpoints consumed by the client
//!
//! [`AuthBackend`] is the seam between the session logic and the network.
//! [`HttpAuthBackend`] talks to the real auth service:
//!
//! - `POST <auth-base>/refresh-token` with `{"refreshToken": "..."}`
//! - `POST <auth-base>/signin/<role>` with `{"email": "...", "password": "..."}`
//!
//! Both return `{"accessToken": "...", "refreshToken": "..."}` on success.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::join_url;
use crate::error::{ApiError, ApiResult};

/// Access/refresh token pair as returned by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Short-lived bearer token.
    pub access_token: String,
    /// Long-lived token exchanged for a new pair.
    pub refresh_token: String,
}

/// Sign-in form body.
#[derive(Debug, Clone, Serialize)]
pub struct SignInRequest {
    /// Account email address.
    pub email: String,
    /// Account password.
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Operations the client needs from the auth service.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchanges `refresh_token` for a new token pair.
    ///
    /// Any failure, including a network failure, is reported as
    /// [`ApiError::AuthRefreshFailed`].
    async fn refresh(&self, refresh_token: &str) -> ApiResult<TokenPair>;

    /// Signs in with email and password for the given role.
    async fn sign_in(&self, role: &str, request: &SignInRequest) -> ApiResult<TokenPair>;
}

/// [`AuthBackend`] implementation over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAuthBackend {
    http: reqwest::Client,
    auth_base: Url,
}

impl HttpAuthBackend {
    /// Creates a backend rooted at `auth_base`
    /// (e.g. `http://localhost:3000/api/auth-service/user`).
    pub fn new(http: reqwest::Client, auth_base: Url) -> Self {
        Self { http, auth_base }
    }

    /// Base URL of the auth service.
    pub fn auth_base(&self) -> &Url {
        &self.auth_base
    }

    /// `<auth-base>/signin/<role>` with `role` encoded as one path segment.
    fn signin_url(&self, role: &str) -> ApiResult<Url> {
        let mut url = join_url(&self.auth_base, "signin")?;
        url.path_segments_mut()
            .map_err(|_| {
                ApiError::InvalidRequest(format!(
                    "auth base URL cannot carry a path: {}",
                    self.auth_base
                ))
            })?
            .push(role);
        Ok(url)
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn refresh(&self, refresh_token: &str) -> ApiResult<TokenPair> {
        let url = join_url(&self.auth_base, "refresh-token")?;
        tracing::debug!(%url, "Requesting token refresh");

        let resp = self
            .http
            .post(url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| ApiError::AuthRefreshFailed(format!("refresh request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::AuthRefreshFailed(format!(
                "refresh endpoint returned {status}: {body}"
            )));
        }

        resp.json::<TokenPair>().await.map_err(|e| {
            ApiError::AuthRefreshFailed(format!("failed to parse refresh response: {e}"))
        })
    }

    async fn sign_in(&self, role: &str, request: &SignInRequest) -> ApiResult<TokenPair> {
        let url = self.signin_url(role)?;
        tracing::debug!(%url, "Signing in");

        let resp = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<TokenPair>()
            .await
            .map_err(|e| ApiError::Backend {
                status: status.as_u16(),
                body: format!("unexpected sign-in response: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_pair_uses_camel_case_on_the_wire() {
        let pair: TokenPair =
            serde_json::from_str(r#"{"accessToken":"a","refreshToken":"r"}"#).unwrap();
        assert_eq!(pair.access_token, "a");
        assert_eq!(pair.refresh_token, "r");
    }

    #[test]
    fn test_token_pair_requires_both_tokens() {
        let result = serde_json::from_str::<TokenPair>(r#"{"accessToken":"a"}"#);
        assert!(result.is_err());
    }

    fn backend(auth_base: &str) -> HttpAuthBackend {
        HttpAuthBackend::new(reqwest::Client::new(), Url::parse(auth_base).unwrap())
    }

    #[test]
    fn test_signin_url_appends_role_segment() {
        let url = backend("http://localhost:3000/api/auth-service/user")
            .signin_url("restaurant-admin")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/api/auth-service/user/signin/restaurant-admin"
        );
    }

    #[test]
    fn test_signin_url_encodes_role_with_path_characters() {
        let url = backend("http://localhost:3000/api/auth-service/user")
            .signin_url("admin/../refresh-token?x=1")
            .unwrap();
        assert_eq!(
            url.path(),
            "/api/auth-service/user/signin/admin%2F..%2Frefresh-token%3Fx=1"
        );
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_refresh_request_body_shape() {
        let body = serde_json::to_value(RefreshRequest {
            refresh_token: "r1",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "refreshToken": "r1" }));
    }
}
