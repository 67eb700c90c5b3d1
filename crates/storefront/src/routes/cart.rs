//! Cart route handlers.
//!
//! Every mutation goes through [`crate::services::CartService`], which keeps
//! the session's cart snapshot in step with the backend, then redirects back
//! to where the form was posted from. Guests edit their session lines.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{debug, instrument};

use shopfront_core::{CartItemId, ProductId};

use crate::api::{Cart, Product};
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{CspNonce, PageContext, RequireAuth};
use crate::services::{Toast, auth};
use crate::state::AppState;

use super::{backend, local_path};

/// A guest's cart line resolved against the catalog.
#[derive(Debug, Clone)]
pub struct GuestLineView {
    pub product: Product,
    pub quantity: u32,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub ctx: PageContext,
    /// Server cart (signed-in visitors).
    pub cart: Cart,
    /// Session lines (guests).
    pub guest_lines: Vec<GuestLineView>,
    pub busy: bool,
}

const fn one() -> u32 {
    1
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub next: Option<String>,
}

/// Update cart form data. Signed-in visitors post `item_id`, guests
/// `product_id`.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub item_id: Option<CartItemId>,
    pub product_id: Option<ProductId>,
    pub quantity: u32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub item_id: Option<CartItemId>,
    pub product_id: Option<ProductId>,
}

/// Promo code form data.
#[derive(Debug, Deserialize)]
pub struct PromoForm {
    #[serde(default)]
    pub code: String,
}

/// Display the cart page.
///
/// Signed-in visitors get a fresh copy of their server cart; guests see
/// their session lines with current catalog prices.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
) -> Result<CartShowTemplate> {
    let cart_service = state.cart();
    let signed_in = auth::hydrate(&session).await.is_authenticated();

    let mut guest_lines = Vec::new();
    let mut degraded = false;
    if signed_in {
        cart_service.refresh(&session, &backend(&state, &session)).await;
    } else {
        let backend = backend(&state, &session);
        for line in cart_service.guest_lines(&session).await {
            match backend.get_product(line.product_id).await {
                Ok(fetched) => {
                    degraded |= fetched.degraded;
                    guest_lines.push(GuestLineView {
                        product: fetched.data,
                        quantity: line.quantity,
                    });
                }
                Err(e) => debug!(product_id = %line.product_id, error = %e, "Skipping guest line"),
            }
        }
    }

    // Built after the refresh so its toasts and badge count are current.
    let mut ctx = PageContext::build(&state, &session, &nonce, "/cart").await;
    ctx.degraded |= degraded;

    Ok(CartShowTemplate {
        cart: cart_service.snapshot(&session).await,
        busy: cart_service.is_busy(&session).await,
        ctx,
        guest_lines,
    })
}

/// Add a product to the cart.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> Response {
    let signed_in = auth::hydrate(&session).await.is_authenticated();
    let added = state
        .cart()
        .add_to_cart(&session, &backend(&state, &session), form.product_id, form.quantity)
        .await;

    if added {
        let product_id = form.product_id.to_string();
        add_breadcrumb("cart", "Added to cart", Some(&[("product_id", product_id.as_str())]));
    }

    // Guests already got a toast from the session line.
    if added && signed_in {
        state
            .notifications()
            .push(&session, Toast::success("Added to your cart."))
            .await;
    }
    Redirect::to(&local_path(form.next.as_deref(), "/cart")).into_response()
}

/// Set a line's quantity; zero removes the line.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<UpdateCartForm>,
) -> Response {
    let cart = state.cart();
    match (form.item_id, form.product_id) {
        (Some(item_id), _) => {
            cart.update_cart_item(&session, &backend(&state, &session), item_id, form.quantity)
                .await;
        }
        (None, Some(product_id)) => {
            cart.set_guest_quantity(&session, product_id, form.quantity)
                .await;
        }
        (None, None) => {}
    }
    Redirect::to("/cart").into_response()
}

/// Remove a line.
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RemoveFromCartForm>,
) -> Response {
    let cart = state.cart();
    let removed = match (form.item_id, form.product_id) {
        (Some(item_id), _) => {
            cart.remove_from_cart(&session, &backend(&state, &session), item_id)
                .await
        }
        (None, Some(product_id)) => cart.set_guest_quantity(&session, product_id, 0).await,
        (None, None) => false,
    };
    if removed {
        state
            .notifications()
            .push(&session, Toast::info("Item removed."))
            .await;
    }
    Redirect::to("/cart").into_response()
}

/// Empty the cart.
#[instrument(skip_all)]
pub async fn clear(State(state): State<AppState>, session: Session) -> Response {
    let cart = state.cart();
    if auth::hydrate(&session).await.is_authenticated() {
        cart.clear_cart(&session, &backend(&state, &session)).await;
    } else {
        cart.clear_guest_lines(&session).await;
    }
    Redirect::to("/cart").into_response()
}

/// Apply a promo code. The backend decides whether it is valid.
#[instrument(skip(state, session, _user))]
pub async fn apply_promo(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_user): RequireAuth,
    Form(form): Form<PromoForm>,
) -> Response {
    let applied = state
        .cart()
        .apply_promo_code(&session, &backend(&state, &session), &form.code)
        .await;
    if applied {
        state
            .notifications()
            .push(&session, Toast::success("Promo code applied."))
            .await;
    }
    Redirect::to("/cart").into_response()
}

/// Remove the promo code.
#[instrument(skip_all)]
pub async fn remove_promo(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_user): RequireAuth,
) -> Response {
    state
        .cart()
        .remove_promo_code(&session, &backend(&state, &session))
        .await;
    Redirect::to("/cart").into_response()
}
