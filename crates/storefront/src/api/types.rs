//! Wire types for the commerce backend.
//!
//! The backend speaks camelCase JSON. Records are mirrored as-is; money is
//! decoded into [`Decimal`] and every aggregate (cart totals, order totals)
//! is taken from the backend, never recomputed here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfront_core::{
    CartId, CartItemId, CategoryId, ChatSender, ChatSessionId, DistrictId, OrderId,
    OrderStatus, PaymentMethod, ProductId, ProvinceId, ReviewId, Role, UserId,
};

// =============================================================================
// Users & auth
// =============================================================================

/// A storefront user as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Single role field used by some endpoints.
    #[serde(default)]
    pub role: Option<String>,
    /// Role list used by others.
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, alias = "isEmailVerified")]
    pub email_verified: bool,
    #[serde(default = "default_true")]
    pub personalization_enabled: bool,
    #[serde(default = "default_true")]
    pub chatbot_enabled: bool,
    #[serde(default = "default_true")]
    pub recommendations_enabled: bool,
}

const fn default_true() -> bool {
    true
}

impl User {
    /// Whether any of the user's roles is the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role
            .iter()
            .chain(self.roles.iter())
            .any(|r| Role::from_backend(r) == Role::Admin)
    }

    /// Name to greet the user with.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if full.is_empty() {
            self.username.clone()
        } else {
            full
        }
    }
}

/// Login request body.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Successful login/signup payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    #[serde(alias = "accessToken")]
    pub token: String,
    pub user: User,
}

/// Registration request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Body for endpoints that only take an email.
#[derive(Debug, Serialize)]
pub struct EmailRequest<'a> {
    pub email: &'a str,
}

/// Password reset body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest<'a> {
    pub token: &'a str,
    pub new_password: &'a str,
}

/// Password change body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest<'a> {
    pub current_password: &'a str,
    pub new_password: &'a str,
}

/// OAuth2 signup completion body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSignupRequest {
    pub email: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Profile update body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
}

/// Preference flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub personalization_enabled: bool,
    pub chatbot_enabled: bool,
    pub recommendations_enabled: bool,
}

// =============================================================================
// Catalog
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    #[serde(default, alias = "stock")]
    pub stock_quantity: i64,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default, alias = "categoryName")]
    pub category: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: i64,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Product {
    /// First image to show for the product, if any.
    #[must_use]
    pub fn main_image(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .or_else(|| self.images.first().map(String::as_str))
    }

    /// Whether at least one unit is available.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }
}

/// One page of products (Spring-style page object).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    #[serde(default)]
    pub content: Vec<Product>,
    #[serde(default)]
    pub total_elements: i64,
    #[serde(default)]
    pub total_pages: u32,
    /// Zero-based page index.
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub size: u32,
}

/// Product listing filters.
#[derive(Debug, Clone, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<Decimal>,
}

/// A category with its product count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub product_count: i64,
}

/// A product review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    #[serde(default, alias = "username")]
    pub user_name: Option<String>,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    #[serde(default, deserialize_with = "lenient_datetime::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
}

/// New review body.
#[derive(Debug, Clone, Serialize)]
pub struct NewReview {
    pub rating: u8,
    pub comment: String,
}

// =============================================================================
// Cart
// =============================================================================

/// The server-computed cart aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(default)]
    pub id: Option<CartId>,
    #[serde(default, alias = "cartItems")]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(default, alias = "tax")]
    pub tax_amount: Decimal,
    #[serde(default, alias = "shippingAmount")]
    pub shipping_fee: Decimal,
    #[serde(default)]
    pub discount_amount: Decimal,
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default, alias = "total")]
    pub total_amount: Decimal,
}

impl Cart {
    /// Number of units across all lines (badge count).
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One cart line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default, alias = "productImage")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock_quantity: Option<i64>,
    #[serde(default)]
    pub subtotal: Option<Decimal>,
}

/// A line of a guest cart held in the session until login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestCartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Add-to-cart body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Cart line quantity update body.
#[derive(Debug, Serialize)]
pub struct QuantityRequest {
    pub quantity: u32,
}

/// Promo code body.
#[derive(Debug, Serialize)]
pub struct PromoCodeRequest<'a> {
    pub code: &'a str,
}

/// Guest cart merge body.
#[derive(Debug, Serialize)]
pub struct MergeCartRequest<'a> {
    pub items: &'a [GuestCartLine],
}

/// Result of the backend's stock re-validation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockCheck {
    #[serde(default = "default_true")]
    pub valid: bool,
    #[serde(default)]
    pub issues: Vec<StockIssue>,
}

impl StockCheck {
    /// Whether every line can be fulfilled.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.valid && self.issues.is_empty()
    }
}

/// A cart line that cannot be fulfilled.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockIssue {
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: String,
    pub requested: u32,
    pub available: i64,
}

// =============================================================================
// Orders & shipping
// =============================================================================

/// Shipping address entered at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address_line: String,
    pub province_id: Option<ProvinceId>,
    pub province_name: String,
    pub district_id: Option<DistrictId>,
    pub district_name: String,
    pub ward_code: String,
    pub ward_name: String,
}

impl ShippingAddress {
    /// One-line rendering for summaries.
    #[must_use]
    pub fn one_line(&self) -> String {
        [
            self.address_line.as_str(),
            self.ward_name.as_str(),
            self.district_name.as_str(),
            self.province_name.as_str(),
        ]
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Order creation body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub shipping_fee: Decimal,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default, alias = "orderItems")]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(default)]
    pub shipping_fee: Decimal,
    #[serde(default)]
    pub discount_amount: Decimal,
    #[serde(default, alias = "total")]
    pub total_amount: Decimal,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default, deserialize_with = "lenient_datetime::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Order number to display, falling back to the id.
    #[must_use]
    pub fn reference(&self) -> String {
        self.order_number
            .clone()
            .unwrap_or_else(|| format!("#{}", self.id))
    }
}

/// One order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A province.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Province {
    pub id: ProvinceId,
    pub name: String,
}

/// A district.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct District {
    pub id: DistrictId,
    pub name: String,
}

/// A ward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ward {
    pub code: String,
    pub name: String,
}

/// Shipping fee calculation body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingFeeRequest<'a> {
    pub province_id: ProvinceId,
    pub district_id: DistrictId,
    pub ward_code: &'a str,
    pub item_count: u32,
}

/// Shipping fee quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingFee {
    pub fee: Decimal,
    #[serde(default)]
    pub estimated_days: Option<u32>,
}

// =============================================================================
// Chatbot, support, admin
// =============================================================================

/// A chatbot session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    #[serde(alias = "sessionId")]
    pub id: ChatSessionId,
}

/// Chat message body.
#[derive(Debug, Serialize)]
pub struct ChatMessageRequest<'a> {
    pub message: &'a str,
}

/// The bot's reply to one message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    #[serde(alias = "response", alias = "message")]
    pub reply: String,
}

/// One message of a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender: ChatSender,
    #[serde(alias = "content")]
    pub text: String,
    #[serde(default, deserialize_with = "lenient_datetime::deserialize")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    /// Whether the visitor wrote this message.
    #[must_use]
    pub fn from_user(&self) -> bool {
        self.sender == ChatSender::User
    }
}

/// Support ticket body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportTicket {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
}

/// Admin dashboard figures.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_orders: i64,
    pub total_products: i64,
    pub total_revenue: Decimal,
    pub pending_orders: i64,
    pub low_stock_products: i64,
}

/// One row of the admin inventory view.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: String,
    #[serde(alias = "stock")]
    pub stock_quantity: i64,
    #[serde(default)]
    pub reserved_quantity: i64,
    #[serde(default)]
    pub low_stock_threshold: Option<i64>,
}

impl InventoryItem {
    /// Whether the stock is at or under the threshold (default 5).
    #[must_use]
    pub fn is_low(&self) -> bool {
        self.stock_quantity <= self.low_stock_threshold.unwrap_or(5)
    }
}

/// Timestamps arrive either as RFC 3339 or as zone-less local date-times
/// (which the backend writes in UTC). Anything unparseable becomes `None`
/// rather than failing the whole record.
mod lenient_datetime {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse))
    }

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn user_admin_detection_reads_both_role_fields() {
        let mut user: User = serde_json::from_value(json!({
            "id": 1, "username": "alice", "email": "a@example.com", "role": "ROLE_ADMIN"
        }))
        .unwrap();
        assert!(user.is_admin());

        user.role = None;
        user.roles = vec!["USER".into(), "ADMIN".into()];
        assert!(user.is_admin());

        user.roles = vec!["ROLE_USER".into()];
        assert!(!user.is_admin());
    }

    #[test]
    fn user_preferences_default_to_enabled() {
        let user: User = serde_json::from_value(json!({"id": 2, "username": "bob"})).unwrap();
        assert!(user.personalization_enabled && user.chatbot_enabled);
        assert!(!user.email_verified);
        assert_eq!(user.display_name(), "bob");
    }

    #[test]
    fn cart_decodes_backend_aliases() {
        let cart: Cart = serde_json::from_value(json!({
            "id": 10,
            "cartItems": [
                {"id": 1, "productId": 7, "productName": "Kettle", "price": 250000, "quantity": 2},
                {"id": 2, "productId": 8, "productName": "Mug", "price": "45000.5", "quantity": 1}
            ],
            "subtotal": 545000.5,
            "total": 560000,
            "promoCode": "TET"
        }))
        .unwrap();
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.total_amount, Decimal::new(560_000, 0));
        assert_eq!(cart.discount_amount, Decimal::ZERO);
        assert_eq!(cart.promo_code.as_deref(), Some("TET"));
    }

    #[test]
    fn product_query_omits_unset_filters() {
        let query = ProductQuery {
            page: Some(0),
            search: Some("tea".into()),
            ..ProductQuery::default()
        };
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value, json!({"page": 0, "search": "tea"}));
    }

    #[test]
    fn timestamps_accept_local_and_offset_forms() {
        assert!(lenient_datetime::parse("2025-03-01T08:30:00Z").is_some());
        assert!(lenient_datetime::parse("2025-03-01T08:30:00.123").is_some());
        assert!(lenient_datetime::parse("yesterday").is_none());

        let review: Review = serde_json::from_value(json!({
            "id": 1, "rating": 5, "comment": "Great", "createdAt": "2025-03-01T08:30:00"
        }))
        .unwrap();
        assert!(review.created_at.is_some());
    }

    #[test]
    fn address_one_line_skips_blank_parts() {
        let address = ShippingAddress {
            address_line: "12 Ly Thuong Kiet".into(),
            district_name: "Hoan Kiem".into(),
            province_name: "Ha Noi".into(),
            ..ShippingAddress::default()
        };
        assert_eq!(address.one_line(), "12 Ly Thuong Kiet, Hoan Kiem, Ha Noi");
    }
}
