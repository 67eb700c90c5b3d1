//! Per-page context shared by every template.
//!
//! Gathers what the navbar and layout need on every page: the signed-in user,
//! the cart badge count, the toasts queued for this page view, the CSP nonce
//! and whether any catalog data on the page came from the demo catalog.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use rust_decimal::Decimal;
use tower_sessions::Session;

use shopfront_core::{Currency, Money};

use crate::api::{Fetched, User};
use crate::services::auth;
use crate::services::notifications::Toast;
use crate::state::AppState;

use super::csp::CspNonce;

/// Layout data for one rendered page.
#[derive(Debug, Clone)]
pub struct PageContext {
    /// Signed-in user.
    pub user: Option<User>,
    /// Whether the user may see the admin pages.
    pub is_admin: bool,
    /// Units in the cart.
    pub cart_count: u32,
    /// Toasts to show once; drained from the session.
    pub toasts: Vec<Toast>,
    /// Script nonce for this response.
    pub nonce: String,
    /// Set when demo data is shown because the backend is down.
    pub degraded: bool,
    /// Request path, for active nav links and post-login redirects.
    pub path: String,
    currency: Currency,
}

impl PageContext {
    /// Build the context for a page about to be rendered.
    ///
    /// Drains the session's toasts, so only call this when the response is a
    /// page (not a redirect).
    pub async fn build(state: &AppState, session: &Session, nonce: &CspNonce, path: &str) -> Self {
        let auth = auth::hydrate(session).await;
        let cart_count = state.cart().item_count(session).await;
        let toasts = state.notifications().drain(session).await;
        Self {
            is_admin: auth.is_admin(),
            user: auth.user,
            cart_count,
            toasts,
            nonce: nonce.value().to_string(),
            degraded: false,
            path: path.to_string(),
            currency: state.config().currency,
        }
    }

    /// Context without a session (error pages rendered outside the session
    /// layer).
    #[must_use]
    pub fn anonymous(state: &AppState, nonce: &CspNonce, path: &str) -> Self {
        Self {
            user: None,
            is_admin: false,
            cart_count: 0,
            toasts: Vec::new(),
            nonce: nonce.value().to_string(),
            degraded: false,
            path: path.to_string(),
            currency: state.config().currency,
        }
    }

    /// Show a toast on this page.
    pub fn toast(&mut self, toast: Toast) {
        self.toasts.push(toast);
    }

    /// Unwrap a catalog read, remembering if it was demo data.
    pub fn take<T>(&mut self, fetched: Fetched<T>) -> T {
        self.degraded |= fetched.degraded;
        fetched.data
    }

    /// Format an amount in the shop currency. Templates may hand over the
    /// amount behind any number of references.
    #[must_use]
    pub fn money(&self, amount: impl Amount) -> String {
        Money::new(amount.amount(), self.currency).display()
    }

    /// Whether the user is signed in.
    #[must_use]
    pub const fn signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Whether the chat assistant should be offered.
    #[must_use]
    pub fn chatbot_enabled(&self) -> bool {
        self.user.as_ref().is_none_or(|u| u.chatbot_enabled)
    }

    /// Whether a nav link is for the current section.
    #[must_use]
    pub fn is_active(&self, prefix: &str) -> bool {
        if prefix == "/" {
            self.path == "/"
        } else {
            self.path.starts_with(prefix)
        }
    }
}

impl FromRequestParts<AppState> for PageContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let nonce = CspNonce::from_request_parts(parts, state).await?;
        let path = parts.uri.path().to_string();
        Ok(match parts.extensions.get::<Session>().cloned() {
            Some(session) => Self::build(state, &session, &nonce, &path).await,
            None => Self::anonymous(state, &nonce, &path),
        })
    }
}

/// A price as templates see it: a [`Decimal`] or a reference to one.
pub trait Amount {
    fn amount(&self) -> Decimal;
}

impl Amount for Decimal {
    fn amount(&self) -> Decimal {
        *self
    }
}

impl<T: Amount + ?Sized> Amount for &T {
    fn amount(&self) -> Decimal {
        (**self).amount()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_reads_through_references() {
        let price = Decimal::new(120_000, 0);
        let by_ref = &price;
        assert_eq!(price.amount(), price);
        assert_eq!(by_ref.amount(), price);
        let twice = &by_ref;
        assert_eq!(twice.amount(), price);
    }
}
