//! Social login route handlers.
//!
//! The backend runs the OAuth2 dance with the provider and redirects the
//! browser here with either a token, an error, or (for a first login that
//! lacks required details) the email of a pending signup.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::api::CompleteSignupRequest;
use crate::error::{Result, set_sentry_user};
use crate::filters;
use crate::middleware::{CspNonce, PageContext};
use crate::models::session_keys;
use crate::services::validation::{self, non_blank};
use crate::services::{AuthService, FieldErrors, Toast};
use crate::state::AppState;

use super::backend;

/// Query of the provider redirect.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SuccessQuery {
    pub token: Option<String>,
    pub error: Option<String>,
}

/// Query of the signup completion page.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupQuery {
    pub email: Option<String>,
}

/// Signup completion form data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompleteSignupForm {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

impl CompleteSignupForm {
    fn validate(&self, email: &str) -> std::result::Result<CompleteSignupRequest, FieldErrors> {
        let mut errors = FieldErrors::new();
        validation::require(&mut errors, "username", &self.username, "Username");
        validation::phone(&mut errors, "phone", &self.phone);
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(CompleteSignupRequest {
            email: email.to_string(),
            username: self.username.trim().to_string(),
            first_name: non_blank(&self.first_name),
            last_name: non_blank(&self.last_name),
            phone: non_blank(&self.phone),
        })
    }
}

/// Signup completion page template.
#[derive(Template, WebTemplate)]
#[template(path = "oauth2/complete_signup.html")]
pub struct CompleteSignupTemplate {
    pub ctx: PageContext,
    pub email: String,
    pub form: CompleteSignupForm,
    pub errors: FieldErrors,
}

/// Land from the provider: sign in with the token, or report the error.
#[instrument(skip_all)]
pub async fn success(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SuccessQuery>,
) -> Response {
    let notifications = state.notifications();

    if let Some(error) = query.error.as_deref().and_then(non_blank) {
        warn!(%error, "Social login failed");
        notifications
            .push(&session, Toast::error(format!("Social sign-in failed: {error}")))
            .await;
        return Redirect::to("/login").into_response();
    }

    let Some(token) = query.token.as_deref().and_then(non_blank) else {
        notifications
            .push(&session, Toast::error("Social sign-in did not return a token."))
            .await;
        return Redirect::to("/login").into_response();
    };

    let backend = backend(&state, &session);
    match AuthService::new(&session, &backend, notifications)
        .accept_token(&token, state.cart())
        .await
    {
        Ok(user) => {
            set_sentry_user(&user.id, Some(&user.username));
            notifications
                .push(
                    &session,
                    Toast::success(format!("Welcome, {}!", user.display_name())),
                )
                .await;
            Redirect::to("/").into_response()
        }
        Err(e) => {
            warn!(error = %e, "Social login token rejected");
            notifications
                .push(&session, Toast::error(e.user_message()))
                .await;
            Redirect::to("/login").into_response()
        }
    }
}

/// Ask for the details the provider did not supply.
#[instrument(skip_all)]
pub async fn complete_signup_page(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Query(query): Query<SignupQuery>,
) -> Result<Response> {
    let email = match query.email.as_deref().and_then(non_blank) {
        Some(email) => {
            session
                .insert(session_keys::PENDING_SIGNUP, &email)
                .await?;
            Some(email)
        }
        None => pending_email(&session).await,
    };

    let Some(email) = email else {
        state
            .notifications()
            .push(&session, Toast::error("There is no social signup to complete."))
            .await;
        return Ok(Redirect::to("/login").into_response());
    };

    let ctx = PageContext::build(&state, &session, &nonce, "/oauth2/complete-signup").await;
    Ok(CompleteSignupTemplate {
        ctx,
        email,
        form: CompleteSignupForm::default(),
        errors: FieldErrors::new(),
    }
    .into_response())
}

/// Finish the social signup and sign the new user in.
#[instrument(skip_all, fields(username = %form.username))]
pub async fn complete_signup(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Form(form): Form<CompleteSignupForm>,
) -> Result<Response> {
    let Some(email) = pending_email(&session).await else {
        state
            .notifications()
            .push(&session, Toast::error("There is no social signup to complete."))
            .await;
        return Ok(Redirect::to("/login").into_response());
    };

    let errors = match form.validate(&email) {
        Ok(request) => {
            let backend = backend(&state, &session);
            match AuthService::new(&session, &backend, state.notifications())
                .complete_signup(&request, state.cart())
                .await
            {
                Ok(user) => {
                    info!(user_id = %user.id, "Social signup completed");
                    set_sentry_user(&user.id, Some(&user.username));
                    state
                        .notifications()
                        .push(&session, Toast::success("Your account is ready. Welcome!"))
                        .await;
                    return Ok(Redirect::to("/").into_response());
                }
                Err(e) => {
                    warn!(error = %e, "Social signup rejected");
                    let mut errors = FieldErrors::new();
                    errors.insert("username", e.user_message());
                    errors
                }
            }
        }
        Err(errors) => errors,
    };

    let ctx = PageContext::build(&state, &session, &nonce, "/oauth2/complete-signup").await;
    Ok(CompleteSignupTemplate {
        ctx,
        email,
        form,
        errors,
    }
    .into_response())
}

async fn pending_email(session: &Session) -> Option<String> {
    session
        .get::<String>(session_keys::PENDING_SIGNUP)
        .await
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_needs_a_username_and_a_valid_phone() {
        let form = CompleteSignupForm {
            phone: "12".into(),
            ..CompleteSignupForm::default()
        };
        let errors = form.validate("an@example.com").err().unwrap_or_default();
        assert!(errors.contains_key("username"));
        assert!(errors.contains_key("phone"));

        let form = CompleteSignupForm {
            username: " an ".into(),
            ..CompleteSignupForm::default()
        };
        let request = form.validate("an@example.com").ok();
        assert!(request.is_some_and(|r| r.username == "an" && r.phone.is_none()));
    }
}
