//! Session lifecycle: restoring, establishing and ending a login.
//!
//! [`Session`] is the single owner of the session token. It keeps the
//! token store and the request client's `Authorization` header in step:
//!
//! * [`bootstrap`](Session::bootstrap) restores a stored token on launch
//!   and validates it against the profile endpoint
//! * [`handle_redirect`](Session::handle_redirect) exchanges the code of a
//!   login redirect for a new token
//! * [`logout`](Session::logout) ends the session on both ends
//!
//! These operations are serialized, so a double tap or two redirects
//! arriving back to back run one after the other.
//!
//! # State
//!
//! The current [`SessionState`] is published on a watch channel. It starts
//! as [`Checking`](SessionState::Checking) and settles on
//! [`Authenticated`](SessionState::Authenticated) or
//! [`Unauthenticated`](SessionState::Unauthenticated).
//!
//! # Example
//!
//! ```rust
//! let session = Session::new(&config)?;
//! match session.bootstrap().await {
//!     SessionState::Authenticated(profile) => println!("hi {}", profile.display_name),
//!     _ => println!("please log in: {}", session.backend().login_url()?),
//! }
//! ```

use tokio::sync::{broadcast, mpsc, watch, Mutex};

use crate::{
    backend::Backend,
    config::Config,
    error::Result,
    protocol::auth::{AuthResponse, UserProfile},
    redirect::RedirectPattern,
    store::{FileTokenStore, TokenStore},
};

/// Where the session stands.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// The stored token is being looked up or validated.
    #[default]
    Checking,

    /// A valid token is attached; the profile was just fetched.
    Authenticated(UserProfile),

    /// No valid token; the user must log in.
    Unauthenticated,
}

impl SessionState {
    #[must_use]
    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            Self::Authenticated(profile) => Some(profile),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Owner of the session token and the login state.
pub struct Session {
    backend: Backend,
    store: Box<dyn TokenStore>,
    redirect: RedirectPattern,

    state: watch::Sender<SessionState>,
    alerts: broadcast::Sender<String>,

    /// Held for the duration of every operation that mutates the token.
    mutation: Mutex<()>,
}

impl Session {
    /// Shown when a login fails without an explanation from the backend.
    pub const LOGIN_FAILED: &'static str = "Could not fetch profile after login.";

    /// Undelivered alerts kept for slow subscribers.
    const ALERT_CAPACITY: usize = 16;

    /// Creates a session that persists its token in `config.token_file`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_store(config, FileTokenStore::new(&config.token_file))
    }

    /// Creates a session that persists its token in `store`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn with_store<S>(config: &Config, store: S) -> Result<Self>
    where
        S: TokenStore + 'static,
    {
        let (state, _) = watch::channel(SessionState::Checking);
        let (alerts, _) = broadcast::channel(Self::ALERT_CAPACITY);

        Ok(Self {
            backend: Backend::new(config)?,
            store: Box::new(store),
            redirect: config.redirect.clone(),
            state,
            alerts,
            mutation: Mutex::new(()),
        })
    }

    /// The backend, for feature calls. Requests carry the current token.
    #[must_use]
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Receives every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Receives user-facing messages of failed logins from
    /// [`serve_redirects`](Self::serve_redirects).
    #[must_use]
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<String> {
        self.alerts.subscribe()
    }

    /// Restores the stored session, if any.
    ///
    /// Never fails: a missing token, a storage fault and a token the
    /// backend does not accept all end in
    /// [`Unauthenticated`](SessionState::Unauthenticated). In the latter two
    /// cases the stored token is discarded.
    pub async fn bootstrap(&self) -> SessionState {
        let _guard = self.mutation.lock().await;
        self.publish(SessionState::Checking);

        let token = match self.store.load().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                info!("no stored session");
                return self.publish(SessionState::Unauthenticated);
            }
            Err(e) => {
                error!("failed to load stored session: {e}");
                self.discard().await;
                return self.publish(SessionState::Unauthenticated);
            }
        };

        debug!("found stored session, validating");
        self.backend.http_client().set_auth_token(Some(&token));

        match self.backend.me().await {
            Ok(profile) => {
                info!("session restored for user {}", profile.id);
                self.publish(SessionState::Authenticated(profile))
            }
            Err(e) => {
                warn!("failed to restore session: {e}");
                self.discard().await;
                self.publish(SessionState::Unauthenticated)
            }
        }
    }

    /// Attaches the stored token without validating it, so that
    /// [`logout`](Self::logout) can invalidate it on the backend even when
    /// the backend cannot currently confirm it.
    ///
    /// Returns whether a token was attached. The state is left unchanged.
    pub async fn attach_stored(&self) -> bool {
        let _guard = self.mutation.lock().await;

        match self.store.load().await {
            Ok(Some(token)) => {
                self.backend.http_client().set_auth_token(Some(&token));
                true
            }
            Ok(None) => false,
            Err(e) => {
                error!("failed to load stored session: {e}");
                false
            }
        }
    }

    /// Handles a URL delivered to the app.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - `url` is not a login redirect; nothing happened
    /// * `Ok(Some(profile))` - logged in; the token is attached and stored
    ///
    /// # Errors
    ///
    /// * [`MalformedRedirect`](crate::error::ErrorKind::MalformedRedirect)
    ///   if the redirect has no code; no request is made and no state changes
    /// * [`ExchangeFailed`](crate::error::ErrorKind::ExchangeFailed) if the
    ///   backend rejects the code
    /// * [`NetworkFault`](crate::error::ErrorKind::NetworkFault) if the
    ///   backend could not be reached
    /// * [`StorageFault`](crate::error::ErrorKind::StorageFault) if the new
    ///   token could not be stored; the session is then left logged out
    pub async fn handle_redirect(&self, url: &str) -> Result<Option<UserProfile>> {
        let Some(code) = self.redirect.extract_code(url)? else {
            return Ok(None);
        };

        let _guard = self.mutation.lock().await;
        info!("exchanging login code");

        let AuthResponse { profile, token } = self.backend.exchange_code(code).await?;

        // Attach first so no request issued after this call goes out
        // unauthenticated, then persist.
        self.backend.http_client().set_auth_token(Some(&token));
        if let Err(e) = self.store.save(&token).await {
            error!("failed to store session: {e}");
            self.discard().await;
            self.publish(SessionState::Unauthenticated);
            return Err(e);
        }

        info!("logged in as user {}", profile.id);
        self.publish(SessionState::Authenticated(profile.clone()));
        Ok(Some(profile))
    }

    /// Handles `initial` (the URL the app was launched with) and then every
    /// URL received on `urls`, until the sender is dropped.
    ///
    /// Failures do not stop the loop. They are logged and their user-facing
    /// message is sent to [alert subscribers](Self::subscribe_alerts).
    pub async fn serve_redirects(&self, initial: Option<String>, mut urls: mpsc::Receiver<String>) {
        if let Some(url) = initial {
            self.serve_redirect(&url).await;
        }

        while let Some(url) = urls.recv().await {
            self.serve_redirect(&url).await;
        }

        debug!("redirect listener stopped");
    }

    async fn serve_redirect(&self, url: &str) {
        if let Err(e) = self.handle_redirect(url).await {
            error!("login failed: {e}");
            // Nobody listening is fine; the error is logged.
            let _ = self.alerts.send(e.user_message(Self::LOGIN_FAILED));
        }
    }

    /// Ends the session.
    ///
    /// The backend is asked to invalidate the token first. Whatever its
    /// answer, the header and the stored token are then removed and the
    /// state becomes [`Unauthenticated`](SessionState::Unauthenticated).
    pub async fn logout(&self) {
        let _guard = self.mutation.lock().await;

        match self.backend.logout().await {
            Ok(()) => info!("server session invalidated"),
            Err(e) => warn!("error logging out from server, continuing client-side logout: {e}"),
        }

        self.backend.http_client().set_auth_token(None);
        if let Err(e) = self.store.clear().await {
            error!("failed to remove stored session: {e}");
        }

        info!("logged out");
        self.publish(SessionState::Unauthenticated);
    }

    /// Removes the token from storage and from the request client.
    async fn discard(&self) {
        if let Err(e) = self.store.clear().await {
            error!("failed to remove stored session: {e}");
        }
        self.backend.http_client().set_auth_token(None);
    }

    fn publish(&self, state: SessionState) -> SessionState {
        self.state.send_replace(state.clone());
        state
    }
}
