//! Server-side visitor sessions.
//!
//! A session carries what a single-page client would keep in local storage:
//! the backend token, the cached user, the cart snapshot, the checkout wizard
//! and pending toasts. Sessions are held in memory, so a restart signs
//! everyone out.

use tower_sessions::cookie::{SameSite, time::Duration};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::StorefrontConfig;

pub const SESSION_COOKIE_NAME: &str = "shopfront_session";

/// Idle time after which a visitor's session is dropped.
const IDLE_TIMEOUT: Duration = Duration::days(7);

/// Session layer over a fresh in-memory store. The cookie is only marked
/// `Secure` when the public base URL is HTTPS.
#[must_use]
pub fn create_session_layer(config: &StorefrontConfig) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_path("/")
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_secure(config.is_secure())
        .with_expiry(Expiry::OnInactivity(IDLE_TIMEOUT))
}
