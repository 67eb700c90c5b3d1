//! Account route handlers: profile, preferences, password, favorites.
//!
//! These routes require authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use shopfront_core::ProductId;

use crate::api::{Backend, Envelope, Preferences, Product, ProfileUpdate, User};
use crate::error::Result;
use crate::filters;
use crate::middleware::{CspNonce, PageContext, RequireAuth};
use crate::services::auth::validate_password_change;
use crate::services::validation::{self, non_blank};
use crate::services::{AuthService, FieldErrors, Toast};
use crate::state::AppState;

use super::{backend, local_path};

// =============================================================================
// Form Types
// =============================================================================

/// Profile form data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

impl From<&User> for ProfileForm {
    fn from(user: &User) -> Self {
        Self {
            first_name: user.first_name.clone().unwrap_or_default(),
            last_name: user.last_name.clone().unwrap_or_default(),
            email: user.email.clone(),
            phone: user.phone.clone().unwrap_or_default(),
        }
    }
}

/// Preferences form data. Unchecked boxes are simply absent.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PreferencesForm {
    pub personalization_enabled: Option<String>,
    pub chatbot_enabled: Option<String>,
    pub recommendations_enabled: Option<String>,
}

impl PreferencesForm {
    fn to_preferences(&self) -> Preferences {
        Preferences {
            personalization_enabled: self.personalization_enabled.is_some(),
            chatbot_enabled: self.chatbot_enabled.is_some(),
            recommendations_enabled: self.recommendations_enabled.is_some(),
        }
    }
}

/// Change password form data.
#[derive(Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// Favorite toggle form data.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NextForm {
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/profile.html")]
pub struct ProfileTemplate {
    pub ctx: PageContext,
    pub user: User,
    pub profile: ProfileForm,
    pub errors: FieldErrors,
}

/// Favorites page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/favorites.html")]
pub struct FavoritesTemplate {
    pub ctx: PageContext,
    pub products: Vec<Product>,
}

// =============================================================================
// Profile
// =============================================================================

/// Display the profile page with a fresh copy of the user.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn profile(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    RequireAuth(user): RequireAuth,
) -> Result<ProfileTemplate> {
    let backend = backend(&state, &session);
    let user = match backend.get_profile().await.and_then(Envelope::into_data) {
        Ok(fresh) => {
            auth_service(&state, &session, &backend)
                .refresh_user(&fresh)
                .await?;
            fresh
        }
        Err(e) => {
            warn!(error = %e, "Showing cached profile");
            user
        }
    };
    render_profile(&state, &session, &nonce, user, None, FieldErrors::new()).await
}

/// Update name, email and phone.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    RequireAuth(user): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Result<Response> {
    let mut errors = FieldErrors::new();
    validation::require(&mut errors, "email", &form.email, "Email");
    validation::email(&mut errors, "email", &form.email);
    validation::phone(&mut errors, "phone", &form.phone);
    if !errors.is_empty() {
        return Ok(render_profile(&state, &session, &nonce, user, Some(form), errors)
            .await?
            .into_response());
    }

    let update = ProfileUpdate {
        first_name: non_blank(&form.first_name),
        last_name: non_blank(&form.last_name),
        email: form.email.trim().to_string(),
        phone: non_blank(&form.phone),
    };
    let backend = backend(&state, &session);
    match backend.update_profile(&update).await.and_then(Envelope::into_data) {
        Ok(updated) => {
            auth_service(&state, &session, &backend)
                .refresh_user(&updated)
                .await?;
            info!("Profile updated");
            toast(&state, &session, Toast::success("Profile updated.")).await;
            Ok(Redirect::to("/profile").into_response())
        }
        Err(e) => {
            warn!(error = %e, "Profile update rejected");
            toast(&state, &session, Toast::error(e.user_message())).await;
            Ok(render_profile(&state, &session, &nonce, user, Some(form), errors)
                .await?
                .into_response())
        }
    }
}

/// Update the preference flags.
#[instrument(skip_all)]
pub async fn update_preferences(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_user): RequireAuth,
    Form(form): Form<PreferencesForm>,
) -> Result<Response> {
    let backend = backend(&state, &session);
    match backend
        .update_preferences(&form.to_preferences())
        .await
        .and_then(Envelope::into_data)
    {
        Ok(updated) => {
            auth_service(&state, &session, &backend)
                .refresh_user(&updated)
                .await?;
            toast(&state, &session, Toast::success("Preferences saved.")).await;
        }
        Err(e) => {
            warn!(error = %e, "Preferences update rejected");
            toast(&state, &session, Toast::error(e.user_message())).await;
        }
    }
    Ok(Redirect::to("/profile#preferences").into_response())
}

/// Change the password.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    RequireAuth(user): RequireAuth,
    Form(form): Form<PasswordForm>,
) -> Result<Response> {
    let errors = validate_password_change(
        &form.current_password,
        &form.new_password,
        &form.confirm_password,
    );
    if !errors.is_empty() {
        return Ok(render_profile(&state, &session, &nonce, user, None, errors)
            .await?
            .into_response());
    }

    let current = SecretString::from(form.current_password);
    let new = SecretString::from(form.new_password);
    match backend(&state, &session)
        .change_password(&current, &new)
        .await
        .and_then(Envelope::into_ack)
    {
        Ok(_) => {
            info!("Password changed");
            toast(&state, &session, Toast::success("Password changed.")).await;
            Ok(Redirect::to("/profile").into_response())
        }
        Err(e) => {
            warn!(error = %e, "Password change rejected");
            let mut errors = FieldErrors::new();
            errors.insert("current_password", e.user_message());
            Ok(render_profile(&state, &session, &nonce, user, None, errors)
                .await?
                .into_response())
        }
    }
}

// =============================================================================
// Favorites
// =============================================================================

/// Display the favorites.
#[instrument(skip_all)]
pub async fn favorites(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_user): RequireAuth,
    ctx: PageContext,
) -> Result<FavoritesTemplate> {
    let products = backend(&state, &session)
        .get_favorites()
        .await?
        .into_data()?;
    Ok(FavoritesTemplate { ctx, products })
}

/// Mark a product as favorite.
#[instrument(skip(state, session, _user, form))]
pub async fn add_favorite(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<ProductId>,
    Form(form): Form<NextForm>,
) -> Response {
    let result = backend(&state, &session)
        .add_favorite(id)
        .await
        .and_then(Envelope::into_ack);
    let message = match result {
        Ok(_) => Toast::success("Added to your favorites."),
        Err(e) => Toast::error(e.user_message()),
    };
    toast(&state, &session, message).await;
    Redirect::to(&local_path(form.next.as_deref(), "/favorites")).into_response()
}

/// Unmark a favorite.
#[instrument(skip(state, session, _user, form))]
pub async fn remove_favorite(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<ProductId>,
    Form(form): Form<NextForm>,
) -> Response {
    let result = backend(&state, &session)
        .remove_favorite(id)
        .await
        .and_then(Envelope::into_ack);
    let message = match result {
        Ok(_) => Toast::info("Removed from your favorites."),
        Err(e) => Toast::error(e.user_message()),
    };
    toast(&state, &session, message).await;
    Redirect::to(&local_path(form.next.as_deref(), "/favorites")).into_response()
}

// =============================================================================
// Helpers
// =============================================================================

fn auth_service<'a>(state: &'a AppState, session: &'a Session, backend: &'a Backend) -> AuthService<'a> {
    AuthService::new(session, backend, state.notifications())
}

async fn toast(state: &AppState, session: &Session, toast: Toast) {
    state.notifications().push(session, toast).await;
}

async fn render_profile(
    state: &AppState,
    session: &Session,
    nonce: &CspNonce,
    user: User,
    form: Option<ProfileForm>,
    errors: FieldErrors,
) -> Result<ProfileTemplate> {
    let ctx = PageContext::build(state, session, nonce, "/profile").await;
    Ok(ProfileTemplate {
        ctx,
        profile: form.unwrap_or_else(|| ProfileForm::from(&user)),
        user,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchecked_preferences_are_off() {
        let form = PreferencesForm {
            chatbot_enabled: Some("on".into()),
            ..PreferencesForm::default()
        };
        let preferences = form.to_preferences();
        assert!(preferences.chatbot_enabled);
        assert!(!preferences.personalization_enabled);
        assert!(!preferences.recommendations_enabled);
    }
}
