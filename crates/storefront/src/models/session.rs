//! Session-related types.
//!
//! Types stored in the session for authentication, cart and chat state.

use serde::{Deserialize, Serialize};

use shopfront_core::ChatSessionId;

use crate::api::ChatMessage;

/// Authentication phase of a visitor session.
///
/// `LoggedOut -> LoggingIn -> LoggedIn`, and back to `LoggedOut` on logout,
/// a failed login, or a token the backend no longer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    #[default]
    LoggedOut,
    LoggingIn,
    LoggedIn,
}

/// Chat assistant state: the backend session and the transcript shown so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatState {
    pub session_id: Option<ChatSessionId>,
    pub messages: Vec<ChatMessage>,
}

/// Session keys.
pub mod session_keys {
    /// Bearer token for the backend.
    pub const TOKEN: &str = "token";

    /// Older name of the token key; still read, and cleared with it.
    pub const LEGACY_TOKEN: &str = "authToken";

    /// Cached backend user record.
    pub const CURRENT_USER: &str = "user";

    /// [`super::AuthPhase`] of the session.
    pub const AUTH_PHASE: &str = "auth_phase";

    /// When the pending login started; a `LoggingIn` phase older than
    /// the login deadline is abandoned.
    pub const LOGIN_STARTED_AT: &str = "login_started_at";

    /// Last cart returned by the backend.
    pub const CART_SNAPSHOT: &str = "cart";

    /// Lines added while signed out, merged on login.
    pub const GUEST_CART: &str = "guest_cart";

    /// Stable key for a guest's cart mutations.
    pub const GUEST_KEY: &str = "guest_key";

    /// Pending toasts.
    pub const TOASTS: &str = "toasts";

    /// Checkout wizard state.
    pub const CHECKOUT: &str = "checkout";

    /// Chat assistant state.
    pub const CHAT: &str = "chat";

    /// Product ids selected for comparison.
    pub const COMPARE: &str = "compare";

    /// Product ids on the wishlist.
    pub const WISHLIST: &str = "wishlist";

    /// Email of a social signup that still needs details.
    pub const PENDING_SIGNUP: &str = "pending_signup";
}
