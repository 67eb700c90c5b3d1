//! End-to-end test harness for the Shopfront storefront.
//!
//! Each [`TestContext`] starts two servers on ephemeral ports:
//!
//! - a mock commerce backend ([`mock`]) speaking the same camelCase JSON
//!   envelopes as the real one, with a small fixed catalog, two accounts and
//!   per-token carts;
//! - the storefront itself, built with [`shopfront_storefront::app`] and
//!   pointed at the mock.
//!
//! Requests go through a cookie-keeping [`reqwest::Client`], so a test drives
//! the storefront like a browser would.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! Auth form posts share a per-app rate limiter (a burst of five), so a
//! single test keeps to five sign-in attempts or spawns a second context.

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

pub mod mock;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use reqwest::{Client, Response, StatusCode, redirect::Policy};
use secrecy::SecretString;
use tokio::net::TcpListener;

use shopfront_core::Currency;
use shopfront_storefront::config::{BackendConfig, StorefrontConfig};
use shopfront_storefront::state::AppState;

pub use mock::{ADMIN, ALICE, Account, MockBackend};

/// A running storefront in front of a mock backend.
pub struct TestContext {
    /// Browser-like client with a cookie jar.
    pub client: Client,
    /// Storefront origin, without a trailing slash.
    pub base_url: String,
    /// The mock backend, for inspecting what the storefront sent it.
    pub backend: MockBackend,
}

/// A fetched page.
pub struct Page {
    pub status: StatusCode,
    /// Path of the final URL, after redirects.
    pub path: String,
    /// Query of the final URL, if any.
    pub query: Option<String>,
    pub body: String,
}

impl Page {
    async fn read(response: Response) -> Self {
        let status = response.status();
        let path = response.url().path().to_string();
        let query = response.url().query().map(str::to_string);
        let body = response.text().await.expect("Failed to read response body");
        Self {
            status,
            path,
            query,
            body,
        }
    }

    /// Whether the body contains the text.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.body.contains(needle)
    }
}

impl TestContext {
    /// Start a mock backend and a storefront in front of it.
    pub async fn spawn() -> Self {
        let backend = MockBackend::spawn().await;

        let config = StorefrontConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            base_url: "http://127.0.0.1".to_string(),
            session_secret: SecretString::from("integration-test-session-secret-with-enough-entropy"),
            backend: BackendConfig::with_base_url(&backend.base_url)
                .expect("Mock backend URL should be valid"),
            currency: Currency::Vnd,
            sentry_dsn: None,
            sentry_environment: None,
        };
        let state = AppState::new(config).expect("Failed to build app state");
        let app = shopfront_storefront::app(state);

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("Failed to bind storefront listener");
        let addr = listener.local_addr().expect("Listener has no address");
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Storefront server failed");
        });

        let client = Client::builder()
            .cookie_store(true)
            .redirect(Policy::limited(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: format!("http://{addr}"),
            backend,
        }
    }

    /// Absolute URL of a storefront path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET a page, following redirects.
    pub async fn get(&self, path: &str) -> Page {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed");
        Page::read(response).await
    }

    /// POST a form, following the redirect that answers it.
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Page {
        let response = self
            .client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("POST request failed");
        Page::read(response).await
    }

    /// Sign in through the login form.
    pub async fn login(&self, account: &Account) -> Page {
        self.post_form(
            "/login",
            &[
                ("username", account.username),
                ("password", account.password),
                ("next", "/"),
            ],
        )
        .await
    }

    /// Add a product to the cart from its product page.
    pub async fn add_to_cart(&self, product_id: i64, quantity: u32) -> Page {
        let product_id = product_id.to_string();
        let quantity = quantity.to_string();
        self.post_form(
            "/cart/add",
            &[
                ("product_id", product_id.as_str()),
                ("quantity", quantity.as_str()),
                ("next", "/cart"),
            ],
        )
        .await
    }
}
