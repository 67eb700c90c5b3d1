//! Admin endpoints. The backend enforces the admin role on every call.

use shopfront_core::ProductId;
use tracing::instrument;

use super::types::{DashboardStats, InventoryItem, QuantityRequest, User};
use super::{ApiError, Backend, Envelope};

impl Backend {
    /// All registered users.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn get_admin_users(&self) -> Result<Envelope<Vec<User>>, ApiError> {
        self.get("admin/users").await
    }

    /// Stock levels for every product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn get_admin_inventory(&self) -> Result<Envelope<Vec<InventoryItem>>, ApiError> {
        self.get("admin/inventory").await
    }

    /// Set the stock level of a product.
    ///
    /// Clears the catalog cache so product pages show the new level.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn update_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Envelope<InventoryItem>, ApiError> {
        let envelope = self
            .put(
                &format!("admin/inventory/{product_id}"),
                &QuantityRequest { quantity },
            )
            .await?;
        self.client.invalidate_catalog();
        Ok(envelope)
    }

    /// Headline figures for the dashboard.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn get_dashboard_stats(&self) -> Result<Envelope<DashboardStats>, ApiError> {
        self.get("admin/dashboard/stats").await
    }
}
