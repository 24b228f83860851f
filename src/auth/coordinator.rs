//! Single-flight access token refresh
//!
//! [`RefreshCoordinator`] guarantees that at most one refresh call is in
//! flight per client. The first caller that needs a new access token moves
//! the state from `Idle` to `Refreshing` and starts the refresh on a
//! spawned task; every caller, the first included, waits in a FIFO queue
//! for that refresh's outcome.
//!
//! When the refresh settles, the queue is drained and the state returns to
//! `Idle` under the same lock acquisition, so no new refresh can start while
//! waiters from the previous one are still unresumed.
//!
//! A failed refresh is fatal for the session: the credential store is
//! cleared and the logout notifier fires exactly once, no matter how many
//! callers were waiting.

use std::collections::VecDeque;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::oneshot;

use crate::auth::backend::AuthBackend;
use crate::auth::session::{LogoutNotifier, Session};
use crate::error::{ApiError, ApiResult};

type Waiter = oneshot::Sender<ApiResult<String>>;

enum RefreshState {
    Idle,
    Refreshing { waiters: VecDeque<Waiter> },
}

struct Inner {
    state: Mutex<RefreshState>,
    session: Session,
    backend: Arc<dyn AuthBackend>,
    logout: Arc<dyn LogoutNotifier>,
    timeout: Duration,
}

/// Coordinates access token refreshes across concurrent requests.
///
/// Cloning is cheap and clones share the same state.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

impl RefreshCoordinator {
    /// Creates an idle coordinator.
    ///
    /// # Arguments
    ///
    /// * `session` - Credential view read for the refresh token and written
    ///   with the new pair.
    /// * `backend` - Auth service used for the refresh call.
    /// * `logout` - Notified once per failed refresh.
    /// * `timeout` - Upper bound on a single refresh call.
    pub fn new(
        session: Session,
        backend: Arc<dyn AuthBackend>,
        logout: Arc<dyn LogoutNotifier>,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(RefreshState::Idle),
                session,
                backend,
                logout,
                timeout,
            }),
        }
    }

    /// Returns `true` while a refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.inner.lock_state(), RefreshState::Refreshing { .. })
    }

    /// Returns a usable access token, refreshing if needed.
    ///
    /// `rejected` is the token the caller found expired or had refused by
    /// the backend. If the store already holds a different, unexpired token
    /// (another caller refreshed in the meantime) it is returned without a
    /// new refresh. If the store holds no access token at all, the session
    /// has already ended and the call fails without refreshing or logging
    /// out again. Otherwise the caller joins the in-flight refresh or starts
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::AuthRefreshFailed`] if the refresh fails or times
    /// out, or if no refresh token is stored. By then the session has been
    /// cleared and the logout notifier has fired. Also returned, without a
    /// second logout, when `rejected` is set but the session already ended.
    pub async fn refresh(&self, rejected: Option<&str>) -> ApiResult<String> {
        let rx = {
            let mut state = self.inner.lock_state();
            let (tx, rx) = oneshot::channel();
            match &mut *state {
                RefreshState::Refreshing { waiters } => {
                    waiters.push_back(tx);
                    tracing::debug!(waiters = waiters.len(), "Joined in-flight token refresh");
                }
                RefreshState::Idle => {
                    let current = self.inner.session.access_token()?;
                    if rejected.is_some() && current.is_none() {
                        // A previous refresh already failed and logged out.
                        tracing::debug!("Session already ended; not refreshing");
                        return Err(ApiError::AuthRefreshFailed("session ended".to_string()));
                    }
                    if let Some(current) = self.inner.replacement_for(current, rejected) {
                        tracing::debug!("Access token already replaced; skipping refresh");
                        return Ok(current);
                    }

                    let mut waiters = VecDeque::new();
                    waiters.push_back(tx);
                    *state = RefreshState::Refreshing { waiters };

                    let inner = Arc::clone(&self.inner);
                    tokio::spawn(async move { inner.run_refresh().await });
                }
            }
            rx
        };

        rx.await.unwrap_or_else(|_| {
            Err(ApiError::AuthRefreshFailed(
                "refresh task ended without a result".to_string(),
            ))
        })
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stored token that supersedes `rejected`, if one exists and is fresh.
    fn replacement_for(&self, current: Option<String>, rejected: Option<&str>) -> Option<String> {
        current.filter(|token| {
            Some(token.as_str()) != rejected && !self.session.is_expired(token)
        })
    }

    async fn run_refresh(self: Arc<Self>) {
        let outcome = AssertUnwindSafe(self.exchange())
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(ApiError::AuthRefreshFailed(
                    "refresh task panicked".to_string(),
                ))
            });

        match &outcome {
            Ok(_) => tracing::info!("Access token refreshed"),
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed; ending session");
                // Logged inside logout; waiters still receive the refresh error.
                let _ = self.session.logout(self.logout.as_ref());
            }
        }

        let mut state = self.lock_state();
        let waiters = match std::mem::replace(&mut *state, RefreshState::Idle) {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => VecDeque::new(),
        };
        tracing::debug!(waiters = waiters.len(), "Resuming requests after refresh");
        for waiter in waiters {
            // A dropped receiver means that caller was cancelled.
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn exchange(&self) -> ApiResult<String> {
        let refresh_token = self
            .session
            .refresh_token()
            .map_err(|e| ApiError::AuthRefreshFailed(e.to_string()))?
            .ok_or_else(|| ApiError::AuthRefreshFailed("no refresh token stored".to_string()))?;

        let pair = tokio::time::timeout(self.timeout, self.backend.refresh(&refresh_token))
            .await
            .map_err(|_| {
                ApiError::AuthRefreshFailed(format!(
                    "refresh timed out after {}s",
                    self.timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| match e {
                ApiError::AuthRefreshFailed(_) => e,
                other => ApiError::AuthRefreshFailed(other.to_string()),
            })?;

        self.session
            .store_tokens(&pair)
            .map_err(|e| ApiError::AuthRefreshFailed(e.to_string()))?;

        Ok(pair.access_token)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
