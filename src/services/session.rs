//! Session controller — the authentication state machine.
//!
//! ARCHITECTURE
//! ============
//! `SessionService` is built once at startup with injected identity and
//! profile clients and shared by `Arc`. Each operation publishes `Loading`
//! under a fresh ticket, talks to the provider, reconciles the profile table,
//! and publishes a terminal status if its ticket is still current.
//!
//! Typed errors are returned to the caller; the published status only
//! carries the message string.
//!
//! TRADE-OFFS
//! ==========
//! Registration creates the credential and then the profile with no
//! compensation. A profile insert failure leaves an orphaned credential,
//! which is logged with its user id for manual repair.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::callback::{self, CallbackError};
use super::status::{SessionStatus, StatusBoard, StatusSnapshot};
use crate::error::ErrorCode;
use crate::identity::{CallbackTokens, IdentityError, IdentityProvider, OAuthProvider, ProviderUser};
use crate::profile::{Profile, ProfileStore, ProfileStoreError};

pub const MSG_REGISTERED: &str = "Account created successfully!";
pub const MSG_LOGGED_IN: &str = "Login successful!";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    ProfileStore(#[from] ProfileStoreError),
    #[error(transparent)]
    Callback(#[from] CallbackError),
    #[error("{0}")]
    Unknown(String),
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Identity(e) => e.error_code(),
            Self::ProfileStore(e) => e.error_code(),
            Self::Callback(e) => e.error_code(),
            Self::Unknown(_) => "E_UNKNOWN",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Identity(e) => e.retryable(),
            Self::ProfileStore(e) => e.retryable(),
            Self::Callback(_) | Self::Unknown(_) => false,
        }
    }
}

// =============================================================================
// INPUTS
// =============================================================================

/// Fields submitted on sign-up.
#[derive(Clone, Deserialize)]
pub struct Registration {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phonenumber: String,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("firstname", &self.firstname)
            .field("lastname", &self.lastname)
            .field("email", &self.email)
            .field("phonenumber", &self.phonenumber)
            .finish_non_exhaustive()
    }
}

/// Split a display name on the first space into (first, last).
#[must_use]
pub fn split_full_name(full_name: Option<&str>) -> (String, String) {
    let full_name = full_name.unwrap_or_default().trim();
    match full_name.split_once(' ') {
        Some((first, last)) => (first.to_owned(), last.to_owned()),
        None => (full_name.to_owned(), String::new()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "operation panicked".to_owned()
    }
}

// =============================================================================
// SERVICE
// =============================================================================

pub struct SessionService {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    status: StatusBoard,
}

impl SessionService {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { identity, profiles, status: StatusBoard::new() }
    }

    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        self.status.current()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.subscribe()
    }

    /// Return to `Idle`. In-flight operations will not publish afterwards.
    pub fn reset(&self) {
        let seq = self.status.reset();
        debug!(seq, "session status reset");
    }

    /// Run `op` between `Loading` and a terminal status. Panics inside the
    /// operation become `SessionError::Unknown` instead of unwinding.
    async fn run<T, F>(&self, name: &'static str, success: &str, op: F) -> Result<T, SessionError>
    where
        F: Future<Output = Result<T, SessionError>>,
    {
        let ticket = self.status.begin();
        let seq = ticket.seq();
        debug!(op = name, seq, "operation started");

        let result = AssertUnwindSafe(op)
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(SessionError::Unknown(panic_message(panic.as_ref()))));

        let status = match &result {
            Ok(_) => {
                info!(op = name, seq, "operation succeeded");
                SessionStatus::Success(success.to_owned())
            }
            Err(e) => {
                warn!(op = name, seq, code = e.error_code(), error = %e, "operation failed");
                SessionStatus::Error(e.to_string())
            }
        };
        if !self.status.finish(ticket, status) {
            debug!(op = name, seq, "superseded; outcome not published");
        }
        result
    }

    async fn require_user(&self) -> Result<ProviderUser, SessionError> {
        Ok(self
            .identity
            .current_user()
            .await?
            .ok_or(IdentityError::MissingUserId)?)
    }

    // -------------------------------------------------------------------------
    // register
    // -------------------------------------------------------------------------

    /// Create a credential and its profile row.
    ///
    /// # Errors
    ///
    /// Provider rejection, a missing user id, or a profile insert failure.
    pub async fn register(&self, registration: Registration) -> Result<Profile, SessionError> {
        self.run("register", MSG_REGISTERED, self.register_inner(registration))
            .await
    }

    async fn register_inner(&self, registration: Registration) -> Result<Profile, SessionError> {
        let Registration { firstname, lastname, email, password, phonenumber } = registration;

        let user = self.identity.sign_up(&email, &password).await?;

        let profile = Profile { id: user.id, firstname, lastname, email, phonenumber };
        if let Err(e) = self.profiles.insert(&profile).await {
            warn!(user_id = %profile.id, error = %e, "credential created without profile");
            return Err(e.into());
        }
        Ok(profile)
    }

    // -------------------------------------------------------------------------
    // authenticate
    // -------------------------------------------------------------------------

    /// Sign in and load the existing profile.
    ///
    /// # Errors
    ///
    /// Provider rejection, a missing user id, or a missing/unreadable profile.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Profile, SessionError> {
        self.run("authenticate", MSG_LOGGED_IN, self.authenticate_inner(email, password))
            .await
    }

    async fn authenticate_inner(&self, email: &str, password: &str) -> Result<Profile, SessionError> {
        let user = self.identity.sign_in(email, password).await?;
        let profile = self
            .profiles
            .get_by_id(&user.id)
            .await?
            .ok_or(ProfileStoreError::NotFound(user.id))?;
        Ok(profile)
    }

    // -------------------------------------------------------------------------
    // federated login
    // -------------------------------------------------------------------------

    /// Obtain the provider's authorization URL and hand it to `launch`.
    ///
    /// Leaves the status at `Loading` on success: the outcome is only known
    /// once the redirect comes back.
    ///
    /// # Errors
    ///
    /// The provider could not produce an authorization URL.
    pub async fn begin_federated_login<F>(&self, provider: OAuthProvider, launch: F) -> Result<String, SessionError>
    where
        F: FnOnce(&str) + Send,
    {
        let ticket = self.status.begin();
        match self.identity.authorize_url(provider).await {
            Ok(url) => {
                info!(%provider, seq = ticket.seq(), "federated login started");
                launch(&url);
                Ok(url)
            }
            Err(e) => {
                let err = SessionError::from(e);
                warn!(%provider, code = err.error_code(), error = %err, "federated login could not start");
                let seq = ticket.seq();
                if !self.status.finish(ticket, SessionStatus::Error(err.to_string())) {
                    debug!(op = "begin_federated_login", seq, "superseded; outcome not published");
                }
                Err(err)
            }
        }
    }

    /// Reconcile the profile for the session the provider just established.
    ///
    /// # Errors
    ///
    /// No provider session, or the profile could neither be read nor created.
    pub async fn complete_federated_login(&self) -> Result<Profile, SessionError> {
        self.run("complete_federated_login", MSG_LOGGED_IN, async {
            let user = self.require_user().await?;
            self.sync_federated_profile(user).await
        })
        .await
    }

    /// Deep-link entry point: parse the redirect, adopt its session, then
    /// complete the federated login.
    ///
    /// A URL that carries neither tokens nor a provider error is rejected
    /// without touching the status.
    ///
    /// # Errors
    ///
    /// Unparseable or token-less URL, provider denial, or any failure of
    /// [`SessionService::complete_federated_login`].
    pub async fn handle_redirect(&self, url: &str) -> Result<Profile, SessionError> {
        self.finish_redirect(callback::parse_callback(url)).await
    }

    /// Same as [`SessionService::handle_redirect`] for an already-parsed
    /// redirect (for example an HTTP query string).
    ///
    /// # Errors
    ///
    /// See [`SessionService::handle_redirect`].
    pub async fn finish_redirect(&self, parsed: Result<CallbackTokens, CallbackError>) -> Result<Profile, SessionError> {
        if let Err(e @ (CallbackError::InvalidUrl(_) | CallbackError::MissingToken)) = parsed {
            debug!(error = %e, "not a federated-login redirect");
            return Err(e.into());
        }

        self.run("complete_federated_login", MSG_LOGGED_IN, async {
            let tokens = parsed?;
            let user = self.identity.establish_session(&tokens).await?;
            self.sync_federated_profile(user).await
        })
        .await
    }

    /// Find or create the profile for `user`.
    async fn sync_federated_profile(&self, user: ProviderUser) -> Result<Profile, SessionError> {
        let (firstname, lastname) = split_full_name(user.metadata_str("full_name").as_deref());

        // A failed lookup is indistinguishable from absence here; the insert
        // below resolves the ambiguity through its conflict check.
        let existing = match self.profiles.get_by_id(&user.id).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "profile lookup failed; treating as absent");
                None
            }
        };
        if let Some(profile) = existing {
            return Ok(profile);
        }

        let profile = Profile {
            id: user.id,
            firstname,
            lastname,
            email: user.email.unwrap_or_default(),
            phonenumber: String::new(),
        };
        match self.profiles.insert(&profile).await {
            Ok(()) => {
                info!(user_id = %profile.id, "profile created from federated identity");
                Ok(profile)
            }
            Err(ProfileStoreError::Conflict(id)) => {
                debug!(user_id = %id, "profile appeared concurrently; using stored row");
                Ok(self
                    .profiles
                    .get_by_id(&id)
                    .await?
                    .ok_or(ProfileStoreError::NotFound(id))?)
            }
            Err(e) => Err(e.into()),
        }
    }

    // -------------------------------------------------------------------------
    // end session
    // -------------------------------------------------------------------------

    /// Sign out, reset to `Idle`, then call `on_complete` exactly once.
    ///
    /// The reset and the callback happen even if the provider call fails;
    /// that failure is still returned.
    ///
    /// # Errors
    ///
    /// The provider sign-out call failed.
    pub async fn end_session<F>(&self, on_complete: F) -> Result<(), SessionError>
    where
        F: FnOnce() + Send,
    {
        let result = self.identity.sign_out().await;
        let seq = self.status.reset();
        match &result {
            Ok(()) => info!(seq, "session ended"),
            Err(e) => warn!(seq, error = %e, "provider sign-out failed; local session cleared"),
        }
        on_complete();
        result.map_err(Into::into)
    }

    // -------------------------------------------------------------------------
    // queries
    // -------------------------------------------------------------------------

    /// Profile of the signed-in user. Any failure reads as `None`.
    pub async fn fetch_current_profile(&self) -> Option<Profile> {
        let user = match self.identity.current_user().await {
            Ok(user) => user?,
            Err(e) => {
                debug!(error = %e, "current user unavailable");
                return None;
            }
        };
        match self.profiles.get_by_id(&user.id).await {
            Ok(profile) => profile,
            Err(e) => {
                debug!(user_id = %user.id, error = %e, "current profile unavailable");
                None
            }
        }
    }
}

/// Run an operation on its own task so that dropping the caller (for
/// example a disconnected HTTP client) cannot cancel it halfway.
///
/// # Errors
///
/// The operation's own error, or `Unknown` if the task was cancelled.
pub async fn run_detached<T, Fut>(op: Fut) -> Result<T, SessionError>
where
    Fut: Future<Output = Result<T, SessionError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(op)
        .await
        .map_err(|e| SessionError::Unknown(e.to_string()))?
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
