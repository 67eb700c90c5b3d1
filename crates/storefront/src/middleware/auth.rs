//! Authentication extractors.
//!
//! Route guards for pages that need a signed-in user or an admin:
//! - signed out: redirect to `/login` (401 for `/api/` paths)
//! - login in flight for this session: a "signing you in" page that refreshes
//! - signed in without the admin role on an admin page: "Access Denied" (403)

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::api::User;
use crate::filters;
use crate::services::auth::{self, AuthState};
use crate::state::AppState;

use super::context::PageContext;
use super::csp::CspNonce;

/// Shown while the session's login request is still running.
#[derive(Template, WebTemplate)]
#[template(path = "auth/signing_in.html")]
pub struct SigningInTemplate {
    pub ctx: PageContext,
}

/// Shown to signed-in users without the required role.
#[derive(Template, WebTemplate)]
#[template(path = "errors/access_denied.html")]
pub struct AccessDeniedTemplate {
    pub ctx: PageContext,
}

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn orders(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Orders for {}", user.username)
/// }
/// ```
pub struct RequireAuth(pub User);

/// Extractor that requires a signed-in admin.
pub struct RequireAdmin(pub User);

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is
/// signed in.
pub struct OptionalAuth(pub Option<User>);

/// Why a guarded page was not served.
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests), then back to `next`.
    RedirectToLogin { next: String },
    /// Unauthorized response (for API requests).
    Unauthorized,
    /// A login for this session is still in flight.
    SigningIn(Box<PageContext>),
    /// Signed in, but not allowed here.
    Forbidden(Box<PageContext>),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin { next } => {
                Redirect::to(&format!("/login?next={}", urlencoding::encode(&next))).into_response()
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::SigningIn(ctx) => SigningInTemplate { ctx: *ctx }.into_response(),
            Self::Forbidden(ctx) => {
                (StatusCode::FORBIDDEN, AccessDeniedTemplate { ctx: *ctx }).into_response()
            }
        }
    }
}

/// Session and auth state of the request, or the rejection for a signed-out
/// visitor.
async fn guard(parts: &mut Parts, state: &AppState) -> Result<(Session, AuthState), AuthRejection> {
    let session = parts
        .extensions
        .get::<Session>()
        .cloned()
        .ok_or(AuthRejection::Unauthorized)?;
    let auth = auth::hydrate(&session).await;

    if auth.is_authenticated() {
        return Ok((session, auth));
    }

    let path = parts.uri.path().to_string();
    if path.starts_with("/api/") {
        return Err(AuthRejection::Unauthorized);
    }

    if auth.is_logging_in() {
        let nonce = CspNonce::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});
        let ctx = PageContext::build(state, &session, &nonce, &path).await;
        return Err(AuthRejection::SigningIn(Box::new(ctx)));
    }

    let next = parts
        .uri
        .path_and_query()
        .map_or(path, ToString::to_string);
    Err(AuthRejection::RedirectToLogin { next })
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let (_, auth) = guard(parts, state).await?;
        auth.user.map(Self).ok_or(AuthRejection::Unauthorized)
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let (session, auth) = guard(parts, state).await?;
        if !auth.is_admin() {
            tracing::warn!(path = %parts.uri.path(), "Non-admin user denied access");
            let nonce = CspNonce::from_request_parts(parts, state)
                .await
                .unwrap_or_else(|never| match never {});
            let ctx = PageContext::build(state, &session, &nonce, parts.uri.path()).await;
            return Err(AuthRejection::Forbidden(Box::new(ctx)));
        }
        auth.user.map(Self).ok_or(AuthRejection::Unauthorized)
    }
}

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => auth::current_user(session).await,
            None => None,
        };

        Ok(Self(user))
    }
}
