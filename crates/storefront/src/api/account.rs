//! Authentication and account endpoints.

use secrecy::{ExposeSecret, SecretString};
use shopfront_core::ProductId;
use tracing::instrument;

use super::types::{
    AuthPayload, ChangePasswordRequest, CompleteSignupRequest, EmailRequest, LoginRequest,
    Preferences, Product, ProfileUpdate, RegisterRequest, ResetPasswordRequest, User,
};
use super::{ApiError, Backend, Envelope};

#[derive(serde::Serialize)]
struct TokenRequest<'a> {
    token: &'a str,
}

impl Backend {
    // =========================================================================
    // Authentication
    // =========================================================================

    /// Exchange credentials for a token and the user record.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Envelope<AuthPayload>, ApiError> {
        self.post(
            "auth/login",
            &LoginRequest {
                username,
                password: password.expose_secret(),
            },
        )
        .await
    }

    /// Create an account. The backend sends a verification email.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<Envelope<User>, ApiError> {
        self.post("auth/register", request).await
    }

    /// Confirm an email address with the token from the verification link.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn verify_email(&self, token: &str) -> Result<Envelope<serde_json::Value>, ApiError> {
        self.post("auth/verify-email", &TokenRequest { token }).await
    }

    /// Send the verification email again.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn resend_verification(
        &self,
        email: &str,
    ) -> Result<Envelope<serde_json::Value>, ApiError> {
        self.post("auth/resend-verification", &EmailRequest { email })
            .await
    }

    /// Start the password reset flow.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<Envelope<serde_json::Value>, ApiError> {
        self.post("auth/forgot-password", &EmailRequest { email })
            .await
    }

    /// Finish the password reset flow.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip_all)]
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &SecretString,
    ) -> Result<Envelope<serde_json::Value>, ApiError> {
        self.post(
            "auth/reset-password",
            &ResetPasswordRequest {
                token,
                new_password: new_password.expose_secret(),
            },
        )
        .await
    }

    /// Change the signed-in user's password.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        current_password: &SecretString,
        new_password: &SecretString,
    ) -> Result<Envelope<serde_json::Value>, ApiError> {
        self.post(
            "auth/change-password",
            &ChangePasswordRequest {
                current_password: current_password.expose_secret(),
                new_password: new_password.expose_secret(),
            },
        )
        .await
    }

    /// Finish a social signup that needs extra details.
    ///
    /// The pending signup is identified by the token the OAuth2 provider
    /// redirect left in the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn complete_oauth_signup(
        &self,
        request: &CompleteSignupRequest,
    ) -> Result<Envelope<AuthPayload>, ApiError> {
        self.post("auth/oauth2/complete-signup", request).await
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// The signed-in user's profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn get_profile(&self) -> Result<Envelope<User>, ApiError> {
        self.get("users/profile").await
    }

    /// Update name, email and phone.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Envelope<User>, ApiError> {
        self.put("users/profile", update).await
    }

    /// Update personalization preferences.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn update_preferences(
        &self,
        preferences: &Preferences,
    ) -> Result<Envelope<User>, ApiError> {
        self.put("users/preferences", preferences).await
    }

    // =========================================================================
    // Favorites
    // =========================================================================

    /// Products the signed-in user marked as favorite.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn get_favorites(&self) -> Result<Envelope<Vec<Product>>, ApiError> {
        self.get("users/favorites").await
    }

    /// Mark a product as favorite.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn add_favorite(&self, id: ProductId) -> Result<Envelope<serde_json::Value>, ApiError> {
        self.post_empty(&format!("users/favorites/{id}")).await
    }

    /// Unmark a favorite.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn remove_favorite(
        &self,
        id: ProductId,
    ) -> Result<Envelope<serde_json::Value>, ApiError> {
        self.delete(&format!("users/favorites/{id}")).await
    }
}
