//! Authentication route handlers.
//!
//! Handles login, registration, email verification and password reset
//! against the backend's auth endpoints. The token the backend issues stays
//! in the server-side session.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::api::{Envelope, RegisterRequest};
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{CspNonce, PageContext};
use crate::services::auth::{
    self, AuthService, validate_email_only, validate_login, validate_registration, validate_reset,
};
use crate::services::validation::non_blank;
use crate::services::{FieldErrors, Toast};
use crate::state::AppState;

use super::{backend, local_path};

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

/// Form that only carries an email.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EmailForm {
    pub email: String,
}

/// Reset password form data.
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ResetPasswordForm {
    pub token: String,
    pub password: String,
    pub confirm_password: String,
}

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters of the login page.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginQuery {
    pub next: Option<String>,
    /// Set when a guarded request found the token expired.
    pub expired: Option<String>,
}

/// Query carrying a token from an emailed link.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TokenQuery {
    pub token: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub ctx: PageContext,
    pub username: String,
    pub next: String,
    pub errors: FieldErrors,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub ctx: PageContext,
    pub form: RegisterForm,
    pub errors: FieldErrors,
}

/// Email verification page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/verify_email.html")]
pub struct VerifyEmailTemplate {
    pub ctx: PageContext,
    /// `None` when no token was given (the "check your inbox" page).
    pub verified: Option<bool>,
    pub message: String,
}

/// Forgot password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub ctx: PageContext,
    pub email: String,
    pub errors: FieldErrors,
}

/// Reset password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_password.html")]
pub struct ResetPasswordTemplate {
    pub ctx: PageContext,
    pub token: String,
    pub errors: FieldErrors,
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
#[instrument(skip_all)]
pub async fn login_page(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Query(query): Query<LoginQuery>,
) -> Response {
    let next = local_path(query.next.as_deref(), "/");
    if auth::current_user(&session).await.is_some() {
        return Redirect::to(&next).into_response();
    }

    if query.expired.is_some() {
        state
            .notifications()
            .push(
                &session,
                Toast::info("Your session has expired. Please sign in again."),
            )
            .await;
    }

    let ctx = PageContext::build(&state, &session, &nonce, "/login").await;
    LoginTemplate {
        ctx,
        username: String::new(),
        next,
        errors: FieldErrors::new(),
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip_all, fields(username = %form.username))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = local_path(form.next.as_deref(), "/");
    let username = form.username.trim().to_string();
    let errors = validate_login(&username, &form.password);

    if errors.is_empty() {
        let backend = backend(&state, &session);
        let password = SecretString::from(form.password);
        let signed_in = AuthService::new(&session, &backend, state.notifications())
            .login(&username, &password, state.cart())
            .await;

        if signed_in {
            if let Some(user) = auth::current_user(&session).await {
                set_sentry_user(&user.id, Some(&user.username));
                state
                    .notifications()
                    .push(
                        &session,
                        Toast::success(format!("Welcome back, {}!", user.display_name())),
                    )
                    .await;
            }
            return Redirect::to(&next).into_response();
        }
    }

    let ctx = PageContext::build(&state, &session, &nonce, "/login").await;
    LoginTemplate {
        ctx,
        username,
        next,
        errors,
    }
    .into_response()
}

/// Handle logout.
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<Response> {
    auth::logout(&session).await?;
    clear_sentry_user();
    info!("User logged out");
    state
        .notifications()
        .push(&session, Toast::info("You have been signed out."))
        .await;
    Ok(Redirect::to("/").into_response())
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
#[instrument(skip_all)]
pub async fn register_page(ctx: PageContext) -> RegisterTemplate {
    RegisterTemplate {
        ctx,
        form: RegisterForm::default(),
        errors: FieldErrors::new(),
    }
}

/// Handle registration form submission.
#[instrument(skip_all, fields(username = %form.username))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Form(mut form): Form<RegisterForm>,
) -> Response {
    let errors = validate_registration(
        &form.username,
        &form.email,
        &form.password,
        &form.confirm_password,
    );

    if errors.is_empty() {
        let request = RegisterRequest {
            username: form.username.trim().to_string(),
            email: form.email.trim().to_string(),
            password: form.password.clone(),
            first_name: non_blank(&form.first_name),
            last_name: non_blank(&form.last_name),
            phone: non_blank(&form.phone),
        };
        match backend(&state, &session)
            .register(&request)
            .await
            .and_then(Envelope::into_data)
        {
            Ok(user) => {
                info!(user_id = %user.id, "Account registered");
                state
                    .notifications()
                    .push(
                        &session,
                        Toast::success(
                            "Account created. Check your inbox to verify your email, then sign in.",
                        ),
                    )
                    .await;
                return Redirect::to("/login").into_response();
            }
            Err(e) => {
                warn!(error = %e, "Registration rejected");
                state
                    .notifications()
                    .push(&session, Toast::error(e.user_message()))
                    .await;
            }
        }
    }

    // Never echo passwords back into the page.
    form.password.clear();
    form.confirm_password.clear();
    let ctx = PageContext::build(&state, &session, &nonce, "/register").await;
    RegisterTemplate { ctx, form, errors }.into_response()
}

// =============================================================================
// Email Verification Routes
// =============================================================================

/// Verify an email address from the emailed link.
#[instrument(skip_all)]
pub async fn verify_email(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Query(query): Query<TokenQuery>,
) -> VerifyEmailTemplate {
    let Some(token) = query.token.as_deref().and_then(non_blank) else {
        return VerifyEmailTemplate {
            ctx,
            verified: None,
            message: "We sent you a link to verify your email address.".to_string(),
        };
    };

    match backend(&state, &session)
        .verify_email(&token)
        .await
        .and_then(Envelope::into_ack)
    {
        Ok(message) => {
            info!("Email verified");
            VerifyEmailTemplate {
                ctx,
                verified: Some(true),
                message: message
                    .unwrap_or_else(|| "Your email address is verified. You can sign in now.".into()),
            }
        }
        Err(e) => {
            warn!(error = %e, "Email verification failed");
            VerifyEmailTemplate {
                ctx,
                verified: Some(false),
                message: e.user_message(),
            }
        }
    }
}

/// Send the verification email again.
#[instrument(skip_all)]
pub async fn resend_verification(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<EmailForm>,
) -> Response {
    let email = form.email.trim();
    let toast = if let Some(message) = validate_email_only(email).get("email") {
        Toast::error(message.clone())
    } else {
        match backend(&state, &session)
            .resend_verification(email)
            .await
            .and_then(Envelope::into_ack)
        {
            Ok(_) => Toast::success("Verification email sent. Check your inbox."),
            Err(e) => {
                warn!(error = %e, "Resend verification failed");
                Toast::error(e.user_message())
            }
        }
    };
    state.notifications().push(&session, toast).await;
    Redirect::to("/verify-email").into_response()
}

// =============================================================================
// Password Reset Routes
// =============================================================================

/// Display the forgot password page.
#[instrument(skip_all)]
pub async fn forgot_password_page(ctx: PageContext) -> ForgotPasswordTemplate {
    ForgotPasswordTemplate {
        ctx,
        email: String::new(),
        errors: FieldErrors::new(),
    }
}

/// Handle forgot password form submission.
///
/// The outcome is the same whether or not the address has an account.
#[instrument(skip_all)]
pub async fn forgot_password(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Form(form): Form<EmailForm>,
) -> Response {
    let email = form.email.trim().to_string();
    let errors = validate_email_only(&email);
    if !errors.is_empty() {
        let ctx = PageContext::build(&state, &session, &nonce, "/forgot-password").await;
        return ForgotPasswordTemplate { ctx, email, errors }.into_response();
    }

    if let Err(e) = backend(&state, &session)
        .forgot_password(&email)
        .await
        .and_then(Envelope::into_ack)
    {
        warn!(error = %e, "Forgot password request failed");
    }

    state
        .notifications()
        .push(
            &session,
            Toast::info("If an account exists for that email, a reset link is on its way."),
        )
        .await;
    Redirect::to("/login").into_response()
}

/// Display the reset password page.
#[instrument(skip_all)]
pub async fn reset_password_page(
    ctx: PageContext,
    Query(query): Query<TokenQuery>,
) -> ResetPasswordTemplate {
    let token = query.token.unwrap_or_default();
    let mut errors = FieldErrors::new();
    if token.trim().is_empty() {
        errors.insert("token", "This reset link is invalid or incomplete".to_string());
    }
    ResetPasswordTemplate { ctx, token, errors }
}

/// Handle reset password form submission.
#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Form(form): Form<ResetPasswordForm>,
) -> Response {
    let mut errors = validate_reset(&form.token, &form.password, &form.confirm_password);

    if errors.is_empty() {
        let password = SecretString::from(form.password);
        match backend(&state, &session)
            .reset_password(form.token.trim(), &password)
            .await
            .and_then(Envelope::into_ack)
        {
            Ok(_) => {
                info!("Password reset");
                state
                    .notifications()
                    .push(
                        &session,
                        Toast::success("Your password has been reset. Please sign in."),
                    )
                    .await;
                return Redirect::to("/login").into_response();
            }
            Err(e) => {
                warn!(error = %e, "Password reset rejected");
                errors.insert("token", e.user_message());
            }
        }
    }

    let ctx = PageContext::build(&state, &session, &nonce, "/reset-password").await;
    ResetPasswordTemplate {
        ctx,
        token: form.token,
        errors,
    }
    .into_response()
}
