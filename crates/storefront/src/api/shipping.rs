//! Shipping lookups and support tickets.

use shopfront_core::{DistrictId, ProvinceId};
use tracing::instrument;

use super::types::{District, Province, ShippingFee, ShippingFeeRequest, SupportTicket, Ward};
use super::{ApiError, Backend, Envelope};

impl Backend {
    /// Provinces that can be shipped to.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn get_provinces(&self) -> Result<Envelope<Vec<Province>>, ApiError> {
        self.get("shipping/provinces").await
    }

    /// Districts of a province.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(province_id = %province_id))]
    pub async fn get_districts(
        &self,
        province_id: ProvinceId,
    ) -> Result<Envelope<Vec<District>>, ApiError> {
        self.get(&format!("shipping/provinces/{province_id}/districts"))
            .await
    }

    /// Wards of a district.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(district_id = %district_id))]
    pub async fn get_wards(&self, district_id: DistrictId) -> Result<Envelope<Vec<Ward>>, ApiError> {
        self.get(&format!("shipping/districts/{district_id}/wards"))
            .await
    }

    /// Quote the shipping fee for an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, request), fields(district_id = %request.district_id))]
    pub async fn calculate_shipping_fee(
        &self,
        request: &ShippingFeeRequest<'_>,
    ) -> Result<Envelope<ShippingFee>, ApiError> {
        self.post("shipping/fee", request).await
    }

    /// Open a support ticket.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, ticket), fields(subject = %ticket.subject))]
    pub async fn create_support_ticket(
        &self,
        ticket: &SupportTicket,
    ) -> Result<Envelope<serde_json::Value>, ApiError> {
        self.post("support/tickets", ticket).await
    }
}
