//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                           - Home page (featured products, categories)
//!
//! # Catalog
//! GET  /products                   - Product listing (search, filter, sort, paginate)
//! GET  /products/{id}              - Product detail with reviews
//! POST /products/{id}/reviews      - Post a review (auth)
//! GET  /reviews                    - Review browser (?product=id)
//!
//! # Cart
//! GET  /cart                       - Cart page
//! POST /cart/add                   - Add a product
//! POST /cart/update                - Set a line's quantity (0 removes)
//! POST /cart/remove                - Remove a line
//! POST /cart/clear                 - Empty the cart
//! POST /cart/promo                 - Apply a promo code (auth)
//! POST /cart/promo/remove          - Remove the promo code (auth)
//!
//! # Checkout (auth)
//! GET  /checkout                   - Current wizard step
//! POST /checkout/review            - Leave Review (stock check)
//! POST /checkout/shipping          - Submit the address (fee quote)
//! POST /checkout/payment           - Choose the payment method
//! POST /checkout/confirm           - Place the order
//! POST /checkout/back              - One step back
//! POST /checkout/restart           - Start over
//!
//! # Orders & account (auth)
//! GET  /orders                     - Order history
//! GET  /orders/{id}                - Order detail
//! POST /orders/{id}/cancel         - Cancel an order
//! GET  /profile                    - Profile, preferences, password
//! POST /profile                    - Update profile
//! POST /profile/preferences        - Update preferences
//! POST /profile/password           - Change password
//! GET  /favorites                  - Favorites (server backed)
//! POST /favorites/{id}[/remove]    - Add / remove a favorite
//!
//! # Session lists
//! GET  /wishlist                   - Wishlist
//! POST /wishlist/{id}[/remove]     - Add / remove
//! GET  /compare                    - Side-by-side comparison
//! POST /compare/{id}[/remove]      - Add / remove
//! POST /compare/clear              - Empty the tray
//!
//! # Assistant & support
//! GET  /chatbot                    - Chat transcript
//! POST /chatbot                    - Send a message
//! POST /chatbot/reset              - Start a new conversation
//! GET  /support                    - Support form
//! POST /support                    - Open a ticket
//!
//! # Auth
//! GET  /login                      - Login page (?next=, ?expired=1)
//! POST /login                      - Login action
//! GET  /register                   - Register page
//! POST /register                   - Register action
//! GET  /verify-email               - Verify the address (?token=)
//! POST /verify-email/resend        - Send the verification email again
//! GET  /forgot-password            - Forgot password page
//! POST /forgot-password            - Send reset email
//! GET  /reset-password             - Reset password page (?token=)
//! POST /reset-password             - Reset action
//! POST /logout                     - Logout action
//! GET  /oauth2/success             - Social login redirect target
//! GET  /oauth2/complete-signup     - Missing signup details form
//! POST /oauth2/complete-signup     - Finish social signup
//!
//! # Admin (admin role)
//! GET  /admin                      - Dashboard
//! GET  /admin/users                - Users
//! GET  /admin/inventory            - Inventory
//! POST /admin/inventory/{id}       - Set a stock level
//!
//! # JSON helpers
//! GET  /api/shipping/provinces                 - Provinces
//! GET  /api/shipping/provinces/{id}/districts  - Districts of a province
//! GET  /api/shipping/districts/{id}/wards      - Wards of a district
//! GET  /api/cart/status                        - Badge count and busy flag
//! ```

pub mod account;
pub mod admin;
pub mod api;
pub mod auth;
pub mod cart;
pub mod chatbot;
pub mod checkout;
pub mod home;
pub mod lists;
pub mod oauth2;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod support;

use axum::{
    Router,
    routing::{get, post},
};
use tower_sessions::Session;

use crate::api::Backend;
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
///
/// Form submissions share one rate limit budget; the pages themselves are
/// not limited.
pub fn auth_routes() -> Router<AppState> {
    let limit = auth_rate_limiter();

    Router::new()
        .route(
            "/login",
            get(auth::login_page).merge(post(auth::login).layer(limit.clone())),
        )
        .route(
            "/register",
            get(auth::register_page).merge(post(auth::register).layer(limit.clone())),
        )
        .route("/verify-email", get(auth::verify_email))
        .route(
            "/verify-email/resend",
            post(auth::resend_verification).layer(limit.clone()),
        )
        .route(
            "/forgot-password",
            get(auth::forgot_password_page).merge(post(auth::forgot_password).layer(limit.clone())),
        )
        .route(
            "/reset-password",
            get(auth::reset_password_page).merge(post(auth::reset_password).layer(limit.clone())),
        )
        .route("/logout", post(auth::logout))
        .route("/oauth2/success", get(oauth2::success))
        .route(
            "/oauth2/complete-signup",
            get(oauth2::complete_signup_page).merge(post(oauth2::complete_signup).layer(limit)),
        )
}

/// Create the catalog routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
        .route("/{id}/reviews", post(products::add_review))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/promo", post(cart::apply_promo))
        .route("/promo/remove", post(cart::remove_promo))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route("/review", post(checkout::confirm_review))
        .route("/shipping", post(checkout::submit_shipping))
        .route("/payment", post(checkout::submit_payment))
        .route("/confirm", post(checkout::place_order))
        .route("/back", post(checkout::back))
        .route("/restart", post(checkout::restart))
}

/// Create the account routes router (orders, profile, favorites).
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/cancel", post(orders::cancel))
        .route("/profile", get(account::profile).post(account::update_profile))
        .route("/profile/preferences", post(account::update_preferences))
        .route("/profile/password", post(account::change_password))
        .route("/favorites", get(account::favorites))
        .route("/favorites/{id}", post(account::add_favorite))
        .route("/favorites/{id}/remove", post(account::remove_favorite))
}

/// Create the session list routes router (wishlist, compare).
pub fn list_routes() -> Router<AppState> {
    Router::new()
        .route("/wishlist", get(lists::wishlist))
        .route("/wishlist/{id}", post(lists::add_to_wishlist))
        .route("/wishlist/{id}/remove", post(lists::remove_from_wishlist))
        .route("/compare", get(lists::compare))
        .route("/compare/clear", post(lists::clear_compare))
        .route("/compare/{id}", post(lists::add_to_compare))
        .route("/compare/{id}/remove", post(lists::remove_from_compare))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin::dashboard))
        .route("/users", get(admin::users))
        .route("/inventory", get(admin::inventory))
        .route("/inventory/{id}", post(admin::update_stock))
}

/// Create the JSON helper routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/shipping/provinces", get(api::provinces))
        .route("/shipping/provinces/{id}/districts", get(api::districts))
        .route("/shipping/districts/{id}/wards", get(api::wards))
        .route("/cart/status", get(api::cart_status))
        .layer(api_rate_limiter())
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Home page
        .route("/", get(home::home))
        // Catalog
        .nest("/products", product_routes())
        .route("/reviews", get(reviews::index))
        // Cart and checkout
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        // Signed-in pages
        .merge(account_routes())
        .merge(list_routes())
        // Assistant and support
        .route("/chatbot", get(chatbot::show).post(chatbot::send))
        .route("/chatbot/reset", post(chatbot::reset))
        .route("/support", get(support::show).post(support::submit))
        // Auth
        .merge(auth_routes())
        // Admin
        .nest("/admin", admin_routes())
        // JSON helpers
        .nest("/api", api_routes())
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Backend client bound to the request's session.
fn backend(state: &AppState, session: &Session) -> Backend {
    state.api().for_session(session)
}

/// A same-site path to send the visitor to after a form, or `fallback`.
///
/// Rejects absolute and protocol-relative URLs so a crafted `next` cannot
/// redirect off the site.
fn local_path(next: Option<&str>, fallback: &str) -> String {
    match next.map(str::trim) {
        Some(path)
            if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') =>
        {
            path.to_string()
        }
        _ => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_path_only_allows_site_paths() {
        assert_eq!(local_path(Some("/orders?page=2"), "/"), "/orders?page=2");
        assert_eq!(local_path(Some("https://evil.test/"), "/"), "/");
        assert_eq!(local_path(Some("//evil.test"), "/"), "/");
        assert_eq!(local_path(Some("/\\evil.test"), "/"), "/");
        assert_eq!(local_path(None, "/cart"), "/cart");
    }
}
