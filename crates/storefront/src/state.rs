//! Handler state: configuration, the backend client and the process-wide
//! services.

use std::sync::Arc;

use crate::api::{ApiClient, ApiError};
use crate::config::StorefrontConfig;
use crate::services::{CartService, NotificationCenter};

/// Cloned into every handler; all fields sit behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    api: ApiClient,
    notifications: NotificationCenter,
    cart: CartService,
}

impl AppState {
    /// Build the backend client and wire the cart service to the shared
    /// notification hub.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the HTTP client cannot be constructed.
    pub fn new(config: StorefrontConfig) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.backend)?;
        let notifications = NotificationCenter::new();
        let cart = CartService::new(notifications.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                api,
                notifications,
                cart,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Toasts and loading flags published by services.
    #[must_use]
    pub fn notifications(&self) -> &NotificationCenter {
        &self.inner.notifications
    }

    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }
}
