//! Authentication error types.

use thiserror::Error;

use crate::api::ApiError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The backend refused or failed the request.
    #[error("backend error: {0}")]
    Api(#[from] ApiError),

    /// The session store failed.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl AuthError {
    /// Message suitable for a toast or an inline form error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(ApiError::Unauthorized) => "Invalid username or password.".to_string(),
            Self::Api(e) => e.user_message(),
            Self::Session(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}
