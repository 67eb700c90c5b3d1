//! Order endpoints.

use shopfront_core::OrderId;
use tracing::instrument;

use super::types::{CreateOrderRequest, Order};
use super::{ApiError, Backend, Envelope};

impl Backend {
    /// Place an order from the current cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, request), fields(payment = request.payment_method.code()))]
    pub async fn create_order(&self, request: &CreateOrderRequest) -> Result<Envelope<Order>, ApiError> {
        self.post("orders", request).await
    }

    /// The signed-in user's orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn get_orders(&self) -> Result<Envelope<Vec<Order>>, ApiError> {
        self.get("orders").await
    }

    /// One order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get_order(&self, id: OrderId) -> Result<Envelope<Order>, ApiError> {
        self.get(&format!("orders/{id}")).await
    }

    /// Cancel a pending or confirmed order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn cancel_order(&self, id: OrderId) -> Result<Envelope<Order>, ApiError> {
        self.put_empty(&format!("orders/{id}/cancel")).await
    }
}
