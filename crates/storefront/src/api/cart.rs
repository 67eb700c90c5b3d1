//! Cart endpoints.
//!
//! Every mutation answers with the full recomputed cart; callers replace
//! their snapshot with it and never patch lines locally.

use shopfront_core::{CartItemId, ProductId};
use tracing::instrument;

use super::types::{
    AddToCartRequest, Cart, GuestCartLine, MergeCartRequest, PromoCodeRequest, QuantityRequest,
    StockCheck,
};
use super::{ApiError, Backend, Envelope};

impl Backend {
    /// Fetch the signed-in user's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn get_cart(&self) -> Result<Envelope<Cart>, ApiError> {
        self.get("cart").await
    }

    /// Add a product to the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_to_cart(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Envelope<Cart>, ApiError> {
        self.post(
            "cart/items",
            &AddToCartRequest {
                product_id,
                quantity,
            },
        )
        .await
    }

    /// Set the quantity of one cart line.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn update_cart_item(
        &self,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<Envelope<Cart>, ApiError> {
        self.put(&format!("cart/items/{item_id}"), &QuantityRequest { quantity })
            .await
    }

    /// Remove one cart line.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove_from_cart(&self, item_id: CartItemId) -> Result<Envelope<Cart>, ApiError> {
        self.delete(&format!("cart/items/{item_id}")).await
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<Envelope<Cart>, ApiError> {
        self.delete("cart").await
    }

    /// Apply a promo code. The backend reports unknown or expired codes with
    /// `success: false` and a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn apply_promo_code(&self, code: &str) -> Result<Envelope<Cart>, ApiError> {
        self.post("cart/promo", &PromoCodeRequest { code }).await
    }

    /// Remove the applied promo code.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn remove_promo_code(&self) -> Result<Envelope<Cart>, ApiError> {
        self.delete("cart/promo").await
    }

    /// Merge guest cart lines into the signed-in user's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn merge_guest_cart(&self, lines: &[GuestCartLine]) -> Result<Envelope<Cart>, ApiError> {
        self.post("cart/merge", &MergeCartRequest { items: lines })
            .await
    }

    /// Re-validate stock for every line of the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn validate_cart_stock(&self) -> Result<Envelope<StockCheck>, ApiError> {
        self.post_empty("cart/validate").await
    }
}
