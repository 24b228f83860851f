//! Session state over a credential store
//!
//! [`Session`] is a thin typed view over a [`CredentialStore`]: it knows
//! which keys hold which credential, derives the account role from the
//! access token, and ends the session by clearing everything and notifying
//! the application through a [`LogoutNotifier`].

use std::fmt;
use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::auth::backend::TokenPair;
use crate::auth::claims::{decode_claims, is_expired_at};
use crate::auth::store::{CredentialStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, ROLE_KEY};
use crate::error::ApiResult;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Account roles issued by the auth service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// A customer ordering food
    Customer,
    /// A restaurant administrator managing a menu
    RestaurantAdmin,
    /// A delivery rider
    Delivery,
}

impl Role {
    /// Parses the `role` claim value. Returns `None` for unknown roles.
    pub fn from_claim(value: &str) -> Option<Self> {
        match value {
            "customer" => Some(Self::Customer),
            "restaurant-admin" => Some(Self::RestaurantAdmin),
            "delivery" => Some(Self::Delivery),
            _ => None,
        }
    }

    /// The claim value for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::RestaurantAdmin => "restaurant-admin",
            Self::Delivery => "delivery",
        }
    }

    /// The application page a user with this role lands on after sign-in.
    pub fn landing_path(self) -> &'static str {
        match self {
            Self::Customer => "/",
            Self::RestaurantAdmin => "/admin",
            Self::Delivery => "/delivery-rider",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// LogoutNotifier
// ---------------------------------------------------------------------------

/// Receives a notification when the session ends.
///
/// Implemented for any `Fn() + Send + Sync` closure.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use dinedash::auth::session::LogoutNotifier;
///
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&fired);
/// let notifier = move || flag.store(true, Ordering::SeqCst);
/// notifier.on_logout();
/// assert!(fired.load(Ordering::SeqCst));
/// ```
pub trait LogoutNotifier: Send + Sync {
    /// Called once after the credential store has been cleared.
    fn on_logout(&self);
}

impl<F> LogoutNotifier for F
where
    F: Fn() + Send + Sync,
{
    fn on_logout(&self) {
        self()
    }
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyNotifier;

impl LogoutNotifier for LogOnlyNotifier {
    fn on_logout(&self) {
        tracing::info!("Session ended");
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Typed access to the credentials held in a [`CredentialStore`].
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn CredentialStore>,
    leeway: Duration,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a session view over `store`.
    ///
    /// `leeway` makes tokens count as expired that many seconds before their
    /// `exp` claim.
    pub fn new(store: Arc<dyn CredentialStore>, leeway: Duration) -> Self {
        Self { store, leeway }
    }

    /// The stored access token, if any.
    pub fn access_token(&self) -> ApiResult<Option<String>> {
        self.store.get(ACCESS_TOKEN_KEY)
    }

    /// The stored refresh token, if any.
    pub fn refresh_token(&self) -> ApiResult<Option<String>> {
        self.store.get(REFRESH_TOKEN_KEY)
    }

    /// The stored role, if any.
    pub fn role(&self) -> ApiResult<Option<String>> {
        self.store.get(ROLE_KEY)
    }

    /// Returns `true` if `token` should be refreshed before use.
    pub fn is_expired(&self, token: &str) -> bool {
        is_expired_at(token, Utc::now(), self.leeway)
    }

    /// Returns `true` when an unexpired access token is stored.
    ///
    /// A store read failure counts as unauthenticated.
    pub fn is_authenticated(&self) -> bool {
        match self.access_token() {
            Ok(Some(token)) => !self.is_expired(&token),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read access token");
                false
            }
        }
    }

    /// Persists a token pair and the role carried by its access token.
    ///
    /// Returns the role claim, if the access token carries one. A stale role
    /// from a previous session is removed when the new token has none.
    pub fn store_tokens(&self, pair: &TokenPair) -> ApiResult<Option<String>> {
        self.store.set(ACCESS_TOKEN_KEY, &pair.access_token)?;
        self.store.set(REFRESH_TOKEN_KEY, &pair.refresh_token)?;

        let role = decode_claims(&pair.access_token)
            .ok()
            .and_then(|claims| claims.role);
        match &role {
            Some(role) => self.store.set(ROLE_KEY, role)?,
            None => self.store.remove(ROLE_KEY)?,
        }
        Ok(role)
    }

    /// Removes every session credential from the store.
    pub fn clear(&self) -> ApiResult<()> {
        self.store.remove(ACCESS_TOKEN_KEY)?;
        self.store.remove(REFRESH_TOKEN_KEY)?;
        self.store.remove(ROLE_KEY)
    }

    /// Ends the session: clears the store, then notifies `notifier`.
    ///
    /// The notifier fires even if clearing fails, so the application always
    /// learns the session is over.
    pub fn logout(&self, notifier: &dyn LogoutNotifier) -> ApiResult<()> {
        let cleared = self.clear();
        if let Err(e) = &cleared {
            tracing::warn!(error = %e, "Failed to clear credentials during logout");
        }
        notifier.on_logout();
        cleared
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
