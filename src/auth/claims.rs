//! Bearer token claim decoding
//!
//! Access tokens issued by the auth service are JWTs. The client does not
//! verify signatures. It only reads the payload segment to learn when the
//! token expires and which role it carries.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};

// ---------------------------------------------------------------------------
// TokenClaims
// ---------------------------------------------------------------------------

/// The subset of JWT payload claims the client cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    /// Expiry as seconds since the Unix epoch.
    #[serde(default)]
    pub exp: Option<i64>,

    /// Account role (`customer`, `restaurant-admin`, `delivery`).
    #[serde(default)]
    pub role: Option<String>,
}

impl TokenClaims {
    /// Returns the expiry as a UTC timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MalformedCredential`] when the `exp` claim is
    /// missing or out of range.
    pub fn expires_at(&self) -> ApiResult<DateTime<Utc>> {
        let exp = self
            .exp
            .ok_or_else(|| ApiError::MalformedCredential("token has no exp claim".to_string()))?;
        DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| ApiError::MalformedCredential(format!("exp claim out of range: {exp}")))
    }
}

/// Decodes the payload segment of a JWT without verifying it.
///
/// Padded and unpadded base64url payloads are both accepted.
///
/// # Errors
///
/// Returns [`ApiError::MalformedCredential`] if the token does not have three
/// dot-separated segments, the payload is not base64url, or it is not a JSON
/// object.
///
/// # Examples
///
/// ```
/// use dinedash::auth::claims::decode_claims;
///
/// // {"exp":1800000000,"role":"customer"}
/// let token = "e30.eyJleHAiOjE4MDAwMDAwMDAsInJvbGUiOiJjdXN0b21lciJ9.sig";
/// let claims = decode_claims(token).unwrap();
/// assert_eq!(claims.exp, Some(1_800_000_000));
/// assert_eq!(claims.role.as_deref(), Some("customer"));
/// ```
pub fn decode_claims(token: &str) -> ApiResult<TokenClaims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(ApiError::MalformedCredential(format!(
            "expected 3 token segments, found {}",
            segments.len()
        )));
    }

    let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .map_err(|e| ApiError::MalformedCredential(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&payload)
        .map_err(|e| ApiError::MalformedCredential(format!("payload is not valid JSON: {e}")))
}

/// Returns `true` if `token` should be treated as expired at `now`.
///
/// A token is expired once `now` is past `exp - leeway`. A token whose
/// expiry cannot be decoded is always expired, so an unreadable credential
/// forces a refresh instead of being sent as-is.
pub fn is_expired_at(token: &str, now: DateTime<Utc>, leeway: Duration) -> bool {
    match decode_claims(token).and_then(|claims| claims.expires_at()) {
        Ok(expires_at) => match expires_at.checked_sub_signed(leeway) {
            Some(deadline) => now > deadline,
            None => {
                tracing::warn!("Access token expiry out of range; treating as expired");
                true
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "Access token expiry unreadable; treating as expired");
            true
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
