//! Authentication service.
//!
//! Tracks the visitor's sign-in state in the session. The backend issues the
//! token and owns the accounts; this service only stores what it returns.
//!
//! # State machine
//!
//! ```text
//! LoggedOut --login--> LoggingIn --ok--> LoggedIn --logout / 401--> LoggedOut
//!                          \--fail / abandoned--> LoggedOut
//! ```
//!
//! A login whose request never finished (client gone, server shutting down)
//! leaves `LoggingIn` behind; [`hydrate`] ignores it once it is older than
//! [`LOGIN_DEADLINE`].

mod error;

pub use error::AuthError;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::api::{AuthPayload, Backend, CompleteSignupRequest, Envelope, User};
use crate::models::{AuthPhase, session_keys};
use crate::services::cart::CartService;
use crate::services::notifications::{NotificationCenter, Toast};
use crate::services::validation::{self, FieldErrors};

/// How long a `LoggingIn` phase is honored. Longer than any backend call
/// the login makes.
pub const LOGIN_DEADLINE: TimeDelta = TimeDelta::seconds(60);

/// Sign-in state read from a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub phase: AuthPhase,
    pub user: Option<User>,
}

impl AuthState {
    /// Whether a user is signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.phase == AuthPhase::LoggedIn && self.user.is_some()
    }

    /// Whether the signed-in user has the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.is_authenticated() && self.user.as_ref().is_some_and(User::is_admin)
    }

    /// Whether a login is in flight for this session.
    #[must_use]
    pub fn is_logging_in(&self) -> bool {
        self.phase == AuthPhase::LoggingIn
    }
}

/// Read the sign-in state from the session.
///
/// A user entry that no longer decodes, or a token without a user (or the
/// reverse), is purged and reads as logged out.
pub async fn hydrate(session: &Session) -> AuthState {
    let phase = session
        .get::<AuthPhase>(session_keys::AUTH_PHASE)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();

    if phase == AuthPhase::LoggingIn {
        if login_in_flight(session).await {
            return AuthState { phase, user: None };
        }
        warn!("Abandoning a login that never completed");
        if let Err(e) = session.remove_value(session_keys::LOGIN_STARTED_AT).await {
            warn!("Failed to clear login start time: {e}");
        }
        if let Err(e) = session
            .insert(session_keys::AUTH_PHASE, AuthPhase::LoggedOut)
            .await
        {
            warn!("Failed to reset auth phase: {e}");
        }
    }

    let user = match session.get::<User>(session_keys::CURRENT_USER).await {
        Ok(user) => user,
        Err(e) => {
            warn!("Discarding unreadable user entry in session: {e}");
            clear_identity(session).await;
            return AuthState::default();
        }
    };

    match (token(session).await, user) {
        (Some(_), Some(user)) => AuthState {
            phase: AuthPhase::LoggedIn,
            user: Some(user),
        },
        (None, None) => AuthState::default(),
        _ => {
            clear_identity(session).await;
            AuthState::default()
        }
    }
}

/// The signed-in user, if any.
pub async fn current_user(session: &Session) -> Option<User> {
    hydrate(session).await.user
}

/// Sign out: drop the token, the user and everything tied to them.
///
/// Makes no backend call.
///
/// # Errors
///
/// Returns an error if the session store fails.
#[instrument(skip(session))]
pub async fn logout(session: &Session) -> Result<(), AuthError> {
    for key in [
        session_keys::TOKEN,
        session_keys::LEGACY_TOKEN,
        session_keys::CURRENT_USER,
        session_keys::LOGIN_STARTED_AT,
        session_keys::CART_SNAPSHOT,
        session_keys::GUEST_CART,
        session_keys::CHECKOUT,
        session_keys::CHAT,
        session_keys::PENDING_SIGNUP,
    ] {
        session.remove_value(key).await?;
    }
    session
        .insert(session_keys::AUTH_PHASE, AuthPhase::LoggedOut)
        .await?;
    session.cycle_id().await?;
    info!("User logged out");
    Ok(())
}

/// Whether the session's `LoggingIn` phase started within [`LOGIN_DEADLINE`].
async fn login_in_flight(session: &Session) -> bool {
    session
        .get::<DateTime<Utc>>(session_keys::LOGIN_STARTED_AT)
        .await
        .ok()
        .flatten()
        .is_some_and(|started| Utc::now() - started < LOGIN_DEADLINE)
}

async fn token(session: &Session) -> Option<String> {
    for key in [session_keys::TOKEN, session_keys::LEGACY_TOKEN] {
        if let Ok(Some(token)) = session.get::<String>(key).await
            && !token.is_empty()
        {
            return Some(token);
        }
    }
    None
}

async fn clear_identity(session: &Session) {
    for key in [
        session_keys::TOKEN,
        session_keys::LEGACY_TOKEN,
        session_keys::CURRENT_USER,
        session_keys::LOGIN_STARTED_AT,
    ] {
        if let Err(e) = session.remove_value(key).await {
            warn!("Failed to clear {key} from session: {e}");
        }
    }
    if let Err(e) = session
        .insert(session_keys::AUTH_PHASE, AuthPhase::LoggedOut)
        .await
    {
        warn!("Failed to reset auth phase: {e}");
    }
}

// =============================================================================
// AuthService
// =============================================================================

/// Sign-in operations for one request.
pub struct AuthService<'a> {
    session: &'a Session,
    backend: &'a Backend,
    notifications: &'a NotificationCenter,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(
        session: &'a Session,
        backend: &'a Backend,
        notifications: &'a NotificationCenter,
    ) -> Self {
        Self {
            session,
            backend,
            notifications,
        }
    }

    /// Sign in with a username and password.
    ///
    /// On success the token and user are stored, the session id is cycled and
    /// any guest cart lines are merged into the user's cart. On failure the
    /// session is left logged out and an error toast is queued. Never fails.
    #[instrument(skip(self, password, cart))]
    pub async fn login(&self, username: &str, password: &SecretString, cart: &CartService) -> bool {
        if let Err(e) = self.begin_login().await {
            warn!("Failed to mark login in progress: {e}");
        }

        let result: Result<User, AuthError> = async {
            let payload = self.backend.login(username, password).await?.into_data()?;
            self.establish(payload).await
        }
        .await;

        match result {
            Ok(user) => {
                info!(user_id = %user.id, "User logged in");
                cart.merge_guest_cart(self.session, self.backend).await;
                true
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                clear_identity(self.session).await;
                self.notifications
                    .push(self.session, Toast::error(e.user_message()))
                    .await;
                false
            }
        }
    }

    /// Accept a token handed over by the OAuth2 redirect and load the user
    /// it belongs to.
    ///
    /// # Errors
    ///
    /// Returns an error (and leaves the session logged out) if the backend
    /// does not accept the token.
    #[instrument(skip_all)]
    pub async fn accept_token(&self, token: &str, cart: &CartService) -> Result<User, AuthError> {
        self.begin_login().await?;
        self.session
            .insert(session_keys::TOKEN, token.to_string())
            .await?;

        let user = match self.backend.get_profile().await.and_then(Envelope::into_data) {
            Ok(user) => user,
            Err(e) => {
                clear_identity(self.session).await;
                return Err(e.into());
            }
        };

        let user = self
            .establish(AuthPayload {
                token: token.to_string(),
                user,
            })
            .await?;
        info!(user_id = %user.id, "User logged in via OAuth2");
        cart.merge_guest_cart(self.session, self.backend).await;
        Ok(user)
    }

    /// Finish a social signup and sign the new user in.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the details.
    #[instrument(skip_all)]
    pub async fn complete_signup(
        &self,
        request: &CompleteSignupRequest,
        cart: &CartService,
    ) -> Result<User, AuthError> {
        let payload = self
            .backend
            .complete_oauth_signup(request)
            .await?
            .into_data()?;
        let user = self.establish(payload).await?;
        self.session
            .remove_value(session_keys::PENDING_SIGNUP)
            .await?;
        cart.merge_guest_cart(self.session, self.backend).await;
        Ok(user)
    }

    /// Replace the cached user after a profile or preferences update.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn refresh_user(&self, user: &User) -> Result<(), AuthError> {
        self.session
            .insert(session_keys::CURRENT_USER, user)
            .await?;
        Ok(())
    }

    async fn begin_login(&self) -> Result<(), AuthError> {
        self.session
            .insert(session_keys::AUTH_PHASE, AuthPhase::LoggingIn)
            .await?;
        self.session
            .insert(session_keys::LOGIN_STARTED_AT, Utc::now())
            .await?;
        // Concurrent requests of this visitor render the "signing you in" page.
        self.session.save().await?;
        Ok(())
    }

    async fn establish(&self, payload: AuthPayload) -> Result<User, AuthError> {
        self.session
            .insert(session_keys::TOKEN, payload.token)
            .await?;
        self.session
            .remove_value(session_keys::LEGACY_TOKEN)
            .await?;
        self.session
            .insert(session_keys::CURRENT_USER, &payload.user)
            .await?;
        self.session.cycle_id().await?;
        self.session
            .remove_value(session_keys::LOGIN_STARTED_AT)
            .await?;
        self.session
            .insert(session_keys::AUTH_PHASE, AuthPhase::LoggedIn)
            .await?;
        Ok(payload.user)
    }
}

// =============================================================================
// Form validation
// =============================================================================

/// Validate the login form.
#[must_use]
pub fn validate_login(username: &str, password: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    validation::require(&mut errors, "username", username, "Username");
    validation::require(&mut errors, "password", password, "Password");
    errors
}

/// Validate the registration form.
#[must_use]
pub fn validate_registration(
    username: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> FieldErrors {
    let mut errors = FieldErrors::new();
    validation::require(&mut errors, "username", username, "Username");
    validation::require(&mut errors, "email", email, "Email");
    validation::email(&mut errors, "email", email);
    validation::new_password(
        &mut errors,
        "password",
        "confirm_password",
        password,
        confirm_password,
    );
    errors
}

/// Validate a form that only carries an email.
#[must_use]
pub fn validate_email_only(email: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    validation::require(&mut errors, "email", email, "Email");
    validation::email(&mut errors, "email", email);
    errors
}

/// Validate the reset password form.
#[must_use]
pub fn validate_reset(token: &str, password: &str, confirm_password: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if token.trim().is_empty() {
        errors.insert("token", "This reset link is invalid or incomplete".to_string());
    }
    validation::new_password(
        &mut errors,
        "password",
        "confirm_password",
        password,
        confirm_password,
    );
    errors
}

/// Validate the change password form.
#[must_use]
pub fn validate_password_change(current: &str, new: &str, confirm: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    validation::require(&mut errors, "current_password", current, "Current password");
    validation::new_password(&mut errors, "new_password", "confirm_password", new, confirm);
    if errors.is_empty() && current == new {
        errors.insert(
            "new_password",
            "New password must differ from the current one".to_string(),
        );
    }
    errors
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::api::ApiClient;
    use crate::config::BackendConfig;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn user() -> User {
        serde_json::from_value(json!({"id": 1, "username": "alice", "role": "USER"})).unwrap()
    }

    #[tokio::test]
    async fn empty_session_is_logged_out() {
        let state = hydrate(&session()).await;
        assert_eq!(state, AuthState::default());
        assert!(!state.is_authenticated());
    }

    #[tokio::test]
    async fn token_and_user_hydrate_as_logged_in() {
        let session = session();
        session.insert(session_keys::LEGACY_TOKEN, "abc").await.unwrap();
        session.insert(session_keys::CURRENT_USER, user()).await.unwrap();

        let state = hydrate(&session).await;
        assert!(state.is_authenticated());
        assert!(!state.is_admin());
    }

    #[tokio::test]
    async fn corrupt_user_entry_is_purged() {
        let session = session();
        session.insert(session_keys::TOKEN, "abc").await.unwrap();
        session
            .insert(session_keys::CURRENT_USER, json!({"name": 42}))
            .await
            .unwrap();

        let state = hydrate(&session).await;
        assert!(!state.is_authenticated());
        assert!(
            session
                .get::<String>(session_keys::TOKEN)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            session
                .get_value(session_keys::CURRENT_USER)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn logout_clears_identity_and_cart_state() {
        let session = session();
        session.insert(session_keys::TOKEN, "abc").await.unwrap();
        session.insert(session_keys::CURRENT_USER, user()).await.unwrap();
        session.insert(session_keys::CART_SNAPSHOT, json!({"items": []})).await.unwrap();
        session.insert(session_keys::CHECKOUT, json!({"step": "payment"})).await.unwrap();
        session.insert(session_keys::CHAT, json!({"messages": []})).await.unwrap();

        logout(&session).await.unwrap();

        for key in [
            session_keys::TOKEN,
            session_keys::CURRENT_USER,
            session_keys::CART_SNAPSHOT,
            session_keys::CHECKOUT,
            session_keys::CHAT,
        ] {
            assert!(session.get_value(key).await.unwrap().is_none(), "{key} not cleared");
        }
        assert!(!hydrate(&session).await.is_authenticated());
    }

    /// A backend that accepts connections and never answers.
    async fn silent_backend() -> Backend {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let config = BackendConfig::with_base_url(&format!("http://{addr}/api")).unwrap();
        ApiClient::new(&config).unwrap().anonymous()
    }

    #[tokio::test]
    async fn abandoned_login_does_not_block_the_session() {
        let session = session();
        session.insert(session_keys::TOKEN, "abc").await.unwrap();
        session.insert(session_keys::CURRENT_USER, user()).await.unwrap();

        let backend = silent_backend().await;
        let notifications = NotificationCenter::new();
        let cart = CartService::new(notifications.clone());
        let auth = AuthService::new(&session, &backend, &notifications);
        let password = SecretString::from("correct-horse-battery");

        let dropped = tokio::time::timeout(
            Duration::from_millis(200),
            auth.login("alice", &password, &cart),
        )
        .await;
        assert!(dropped.is_err());
        assert!(hydrate(&session).await.is_logging_in());

        // Pretend the login started before the deadline.
        let long_ago = Utc::now() - LOGIN_DEADLINE - TimeDelta::seconds(1);
        session
            .insert(session_keys::LOGIN_STARTED_AT, long_ago)
            .await
            .unwrap();

        let state = hydrate(&session).await;
        assert!(!state.is_logging_in());
        assert!(state.is_authenticated());
        assert_eq!(
            session
                .get::<AuthPhase>(session_keys::AUTH_PHASE)
                .await
                .unwrap(),
            Some(AuthPhase::LoggedOut)
        );
    }

    #[tokio::test]
    async fn logging_in_without_a_start_time_reads_as_logged_out() {
        let session = session();
        session
            .insert(session_keys::AUTH_PHASE, AuthPhase::LoggingIn)
            .await
            .unwrap();

        let state = hydrate(&session).await;
        assert_eq!(state, AuthState::default());
    }

    #[test]
    fn registration_reports_each_bad_field() {
        let errors = validate_registration("", "nope", "short", "other");
        assert!(errors.contains_key("username"));
        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("password"));
        assert!(errors.contains_key("confirm_password"));

        assert!(validate_registration("alice", "a@example.com", "hunter2hunter2", "hunter2hunter2").is_empty());
    }

    #[test]
    fn password_change_must_differ() {
        let errors = validate_password_change("same-password", "same-password", "same-password");
        assert!(errors.contains_key("new_password"));
    }
}
