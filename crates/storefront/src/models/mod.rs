//! Session-held models for the storefront.
//!
//! Everything the browser application kept in local storage lives in the
//! visitor's server-side session instead, under the keys in [`session_keys`].

pub mod session;

pub use session::{AuthPhase, ChatState, session_keys};
