//! Commerce backend REST client.
//!
//! # Architecture
//!
//! - One method per backend endpoint, grouped by area (catalog, cart, orders,
//!   account, chat, admin, shipping)
//! - Every 2xx response is normalized into an [`Envelope`]
//! - The backend is the source of truth: no local sync, no retries
//! - Catalog reads are cached in memory via `moka` and may fall back to the
//!   bundled demo catalog when degraded mode is enabled
//!
//! # Sessions
//!
//! [`ApiClient`] is shared by the whole process. Handlers call the backend
//! through a [`Backend`], a per-request handle bound to the visitor's session:
//! - the bearer token is read from the session (`token`, or the legacy
//!   `authToken` key) and attached to every request
//! - a 401 response evicts the token and the cached user from the session
//!
//! # Example
//!
//! ```rust,ignore
//! let backend = state.api().for_session(&session);
//! let product = backend.get_product(ProductId::new(7)).await?;
//! let cart = backend.add_to_cart(product.data.id, 2).await?;
//! ```

mod account;
mod admin;
mod cache;
mod cart;
mod catalog;
mod chat;
pub mod envelope;
pub mod fallback;
mod orders;
mod shipping;
pub mod types;

pub use envelope::Envelope;
pub use types::*;

use std::sync::Arc;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tower_sessions::Session;
use tracing::{debug, warn};
use url::Url;

use crate::config::{BackendConfig, DegradedMode};
use crate::models::session_keys;

use cache::{CacheKey, CacheValue};

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connect, timeout, body read).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered 401; the session token has been evicted.
    #[error("Unauthorized")]
    Unauthorized,

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {}", .message.as_deref().unwrap_or("no details"))]
    Status {
        /// HTTP status code.
        status: StatusCode,
        /// Message extracted from the response body, if any.
        message: Option<String>,
    },

    /// The backend answered 2xx but reported `success: false`.
    #[error("Rejected by backend: {0}")]
    Rejected(String),

    /// The backend reported success without a payload.
    #[error("Backend response had no data")]
    MissingData,

    /// The response body did not match the expected shape.
    #[error("JSON decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// An endpoint path could not be joined onto the base URL.
    #[error("Invalid endpoint path: {0}")]
    InvalidPath(#[from] url::ParseError),
}

impl ApiError {
    /// Whether this failure means the backend is unreachable or broken, as
    /// opposed to refusing this particular request.
    #[must_use]
    pub fn is_outage(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }

    /// Message suitable for a toast.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Status {
                message: Some(message),
                status,
            } if status.is_client_error() => message.clone(),
            Self::Rejected(message) => message.clone(),
            Self::Unauthorized => "Your session has expired. Please sign in again.".to_string(),
            Self::Status { status, .. } if status.as_u16() == 404 => {
                "The requested item was not found.".to_string()
            }
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

/// A catalog read result, flagged when it came from the demo catalog.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    /// The data.
    pub data: T,
    /// True when the backend was unavailable and demo data was served.
    pub degraded: bool,
}

impl<T> Fetched<T> {
    const fn live(data: T) -> Self {
        Self {
            data,
            degraded: false,
        }
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Process-wide client for the commerce backend.
///
/// Cheaply cloneable; holds the connection pool, the base URL and the catalog
/// cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    base_url: Url,
    degraded_mode: DegradedMode,
    cache: Option<Cache<CacheKey, CacheValue>>,
}

impl ApiClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("shopfront-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = (!config.catalog_cache_ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(1000)
                .time_to_live(config.catalog_cache_ttl)
                .build()
        });

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                http,
                base_url: config.base_url.clone(),
                degraded_mode: config.degraded_mode,
                cache,
            }),
        })
    }

    /// Per-request handle that authenticates with the session's token.
    #[must_use]
    pub fn for_session(&self, session: &Session) -> Backend {
        Backend {
            client: self.clone(),
            session: Some(session.clone()),
        }
    }

    /// Handle without a session: no bearer token, nothing to evict.
    #[must_use]
    pub fn anonymous(&self) -> Backend {
        Backend {
            client: self.clone(),
            session: None,
        }
    }

    /// Drop every cached catalog entry.
    pub fn invalidate_catalog(&self) {
        if let Some(cache) = &self.inner.cache {
            cache.invalidate_all();
        }
    }
}

// =============================================================================
// Backend (per-request handle)
// =============================================================================

/// Backend handle bound to one visitor session.
#[derive(Clone)]
pub struct Backend {
    client: ApiClient,
    session: Option<Session>,
}

impl Backend {
    /// The session token, if the visitor is signed in.
    async fn bearer(&self) -> Option<SecretString> {
        let session = self.session.as_ref()?;
        for key in [session_keys::TOKEN, session_keys::LEGACY_TOKEN] {
            if let Ok(Some(token)) = session.get::<String>(key).await
                && !token.is_empty()
            {
                return Some(SecretString::from(token));
            }
        }
        None
    }

    /// Remove the token (both keys) and the cached user after a 401.
    async fn evict_token(&self) {
        let Some(session) = &self.session else {
            return;
        };
        for key in [
            session_keys::TOKEN,
            session_keys::LEGACY_TOKEN,
            session_keys::CURRENT_USER,
            session_keys::AUTH_PHASE,
        ] {
            if let Err(e) = session.remove_value(key).await {
                tracing::error!("Failed to evict {key} from session: {e}");
            }
        }
    }

    /// Execute one request and normalize the response.
    async fn send<T, F>(&self, method: Method, path: &str, configure: F) -> Result<Envelope<T>, ApiError>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let url = self
            .client
            .inner
            .base_url
            .join(path.trim_start_matches('/'))?;

        let mut request = self.client.inner.http.request(method.clone(), url);
        if let Some(token) = self.bearer().await {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = configure(request).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            debug!(%method, path, "Backend returned 401, evicting session token");
            self.evict_token().await;
            return Err(ApiError::Unauthorized);
        }

        let body = response.text().await?;

        if !status.is_success() {
            warn!(
                %method,
                path,
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Backend returned non-success status"
            );
            return Err(ApiError::Status {
                status,
                message: envelope::error_message(&body),
            });
        }

        let value = if body.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&body).map_err(|e| {
                tracing::error!(
                    error = %e,
                    path,
                    body = %body.chars().take(500).collect::<String>(),
                    "Failed to parse backend response"
                );
                ApiError::Decode(e)
            })?
        };

        Envelope::normalize(value).decode()
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>, ApiError> {
        self.send(Method::GET, path, |r| r).await
    }

    async fn get_with<T, Q>(&self, path: &str, query: &Q) -> Result<Envelope<T>, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.send(Method::GET, path, |r| r.query(query)).await
    }

    async fn post<T, B>(&self, path: &str, body: &B) -> Result<Envelope<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Method::POST, path, |r| r.json(body)).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>, ApiError> {
        self.send(Method::POST, path, |r| r).await
    }

    async fn put<T, B>(&self, path: &str, body: &B) -> Result<Envelope<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Method::PUT, path, |r| r.json(body)).await
    }

    async fn put_empty<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>, ApiError> {
        self.send(Method::PUT, path, |r| r).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>, ApiError> {
        self.send(Method::DELETE, path, |r| r).await
    }

    // =========================================================================
    // Catalog cache and degraded mode
    // =========================================================================

    fn cache(&self) -> Option<&Cache<CacheKey, CacheValue>> {
        self.client.inner.cache.as_ref()
    }

    /// Apply the degraded-mode policy to a failed catalog read.
    fn degrade<T>(
        &self,
        err: ApiError,
        what: &str,
        fallback: impl FnOnce() -> Option<T>,
    ) -> Result<Fetched<T>, ApiError> {
        if self.client.inner.degraded_mode == DegradedMode::Demo
            && err.is_outage()
            && let Some(data) = fallback()
        {
            warn!(error = %err, what, "Backend unavailable, serving demo catalog");
            return Ok(Fetched {
                data,
                degraded: true,
            });
        }
        Err(err)
    }

    /// Liveness probe against the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or answers 5xx.
    pub async fn ping(&self) -> Result<(), ApiError> {
        match self.get::<serde_json::Value>("categories/with-count").await {
            Ok(_) => Ok(()),
            Err(ApiError::Status { status, .. }) if !status.is_server_error() => Ok(()),
            Err(e) => Err(e),
        }
    }
}
