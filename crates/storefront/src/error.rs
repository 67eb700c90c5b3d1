//! Handler errors and their HTTP rendering.
//!
//! Server-side failures are reported to Sentry before the response is
//! built; visitors only ever see a generic message for those. An expired
//! backend token turns into a redirect to the login page.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::api::ApiError;
use crate::services::auth::AuthError;
use crate::services::checkout::CheckoutError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Session(e) => Self::Session(e),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl AppError {
    fn is_server_error(&self) -> bool {
        match self {
            Self::Session(_) | Self::Internal(_) => true,
            Self::Api(ApiError::Transport(_) | ApiError::Decode(_) | ApiError::InvalidPath(_)) => {
                true
            }
            Self::Api(ApiError::Status { status, .. }) => status.is_server_error(),
            Self::Auth(AuthError::Session(_)) => true,
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // An expired token was already evicted; send the visitor to sign in.
        if matches!(
            self,
            Self::Api(ApiError::Unauthorized) | Self::Auth(AuthError::Api(ApiError::Unauthorized))
        ) {
            return Redirect::to("/login?expired=1").into_response();
        }

        let status = match &self {
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Api(err) | Self::Auth(AuthError::Api(err)) => match err {
                ApiError::Status { status, .. } if status.is_client_error() => *status,
                ApiError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Auth(AuthError::Session(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        };

        // Only backend validation messages are shown verbatim.
        let message = match &self {
            Self::Session(_) | Self::Internal(_) | Self::Auth(AuthError::Session(_)) => {
                "Internal server error".to_string()
            }
            Self::Api(err) | Self::Auth(AuthError::Api(err)) => match err {
                ApiError::Status { .. } | ApiError::Rejected(_) if !status.is_server_error() => {
                    err.user_message()
                }
                _ => "The shop is temporarily unavailable. Please try again shortly.".to_string(),
            },
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Tag subsequent Sentry events with the signed-in customer.
pub fn set_sentry_user(user_id: &impl ToString, username: Option<&str>) {
    let user = sentry::User {
        id: Some(user_id.to_string()),
        username: username.map(str::to_owned),
        ..Default::default()
    };
    sentry::configure_scope(|scope| scope.set_user(Some(user)));
}

/// Forget the customer on sign-out.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| scope.set_user(None));
}

/// Record a storefront action (cart change, checkout step) so it shows up in
/// the trail of any later Sentry event.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let data = data
        .unwrap_or_default()
        .iter()
        .map(|(k, v)| ((*k).to_owned(), serde_json::Value::from(*v)))
        .collect();
    sentry::add_breadcrumb(sentry::Breadcrumb {
        category: Some(category.to_owned()),
        message: Some(message.to_owned()),
        level: sentry::Level::Info,
        data,
        ..Default::default()
    });
}

#[cfg(test)]
mod tests {
    use axum::http::header::LOCATION;

    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn messages_name_the_problem() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn local_errors_map_to_statuses() {
        assert_eq!(
            status_of(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn backend_statuses_map_through() {
        assert_eq!(
            status_of(AppError::Api(ApiError::Status {
                status: StatusCode::NOT_FOUND,
                message: None,
            })),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::Api(ApiError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: Some("db down".into()),
            })),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(AppError::Api(ApiError::Rejected("Out of stock".into()))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn expired_token_redirects_to_login() {
        let response = AppError::Api(ApiError::Unauthorized).into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/login?expired=1");
    }
}
