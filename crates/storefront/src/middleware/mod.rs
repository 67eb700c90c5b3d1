//! Request plumbing shared by every storefront route.
//!
//! Layers, outermost first, as [`crate::app`] stacks them: Sentry, tracing,
//! request ids, the CSP nonce, security headers, then sessions. The sign-in
//! forms and the `/api` helpers additionally sit behind a per-client rate
//! limiter.
//!
//! The extractors ([`RequireAuth`], [`RequireAdmin`], [`OptionalAuth`],
//! [`PageContext`]) read the visitor's session, so they only work under the
//! session layer.

pub mod auth;
pub mod context;
pub mod csp;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{OptionalAuth, RequireAdmin, RequireAuth};
pub use context::PageContext;
pub use csp::{CspNonce, csp_nonce_middleware};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
