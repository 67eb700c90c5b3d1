//! Checkout wizard.
//!
//! `Review -> Shipping -> Payment -> Confirm`, then `Completed`. The wizard
//! lives in the visitor's session so a reload keeps the entered data; logout
//! drops it.
//!
//! Leaving Review re-checks stock with the backend and leaving Shipping asks
//! the backend for the shipping fee. A failed side effect queues a toast and
//! the wizard stays where it was.

mod validation;

pub use validation::{PaymentForm, ShippingForm, validate_payment, validate_shipping};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_sessions::Session;
use tracing::{debug, info, instrument, warn};

use shopfront_core::{OrderId, PaymentMethod};

use crate::api::{
    ApiError, Backend, CreateOrderRequest, Envelope, Order, ShippingAddress, ShippingFee,
    ShippingFeeRequest, StockCheck,
};
use crate::models::session_keys;
use crate::services::cart::CartService;
use crate::services::notifications::{NotificationCenter, Toast};
use crate::services::validation::{FieldErrors, non_blank};

/// A wizard step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Review,
    Shipping,
    Payment,
    Confirm,
    /// The order was placed.
    Completed { order_id: OrderId },
}

impl Step {
    /// The four steps shown in the progress bar.
    pub const VISIBLE: [Self; 4] = [Self::Review, Self::Shipping, Self::Payment, Self::Confirm];

    /// Zero-based position.
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::Review => 0,
            Self::Shipping => 1,
            Self::Payment => 2,
            Self::Confirm => 3,
            Self::Completed { .. } => 4,
        }
    }

    /// Progress bar label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Review => "Review cart",
            Self::Shipping => "Shipping",
            Self::Payment => "Payment",
            Self::Confirm => "Confirm",
            Self::Completed { .. } => "Done",
        }
    }

    const fn previous(self) -> Self {
        match self {
            Self::Review | Self::Shipping => Self::Review,
            Self::Payment => Self::Shipping,
            Self::Confirm => Self::Payment,
            done @ Self::Completed { .. } => done,
        }
    }
}

/// Everything entered so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wizard {
    pub step: Step,
    pub shipping: ShippingAddress,
    pub note: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub wallet_provider: Option<String>,
    pub shipping_fee: Option<ShippingFee>,
}

impl Wizard {
    /// Move one step back, keeping the entered data. Never goes below Review.
    pub const fn back(&mut self) {
        self.step = self.step.previous();
    }

    /// Whether the wizard finished with a placed order.
    #[must_use]
    pub const fn order_id(&self) -> Option<OrderId> {
        match self.step {
            Step::Completed { order_id } => Some(order_id),
            _ => None,
        }
    }

    fn order_request(&self) -> Option<CreateOrderRequest> {
        Some(CreateOrderRequest {
            shipping_address: self.shipping.clone(),
            payment_method: self.payment_method?,
            wallet_provider: self.wallet_provider.clone(),
            note: self.note.clone(),
            shipping_fee: self.shipping_fee?.fee,
        })
    }
}

/// Why a wizard step did not advance.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The form has invalid fields; re-render it with these errors.
    #[error("invalid form")]
    Invalid(FieldErrors),

    /// A backend check or call failed; a toast explains why.
    #[error("step blocked")]
    Blocked,

    /// The request does not match the wizard's current step.
    #[error("not at the {0:?} step")]
    WrongStep(Step),

    /// The session store failed.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// Wizard operations for one request.
pub struct CheckoutService<'a> {
    session: &'a Session,
    backend: &'a Backend,
    cart: &'a CartService,
    notifications: &'a NotificationCenter,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        session: &'a Session,
        backend: &'a Backend,
        cart: &'a CartService,
        notifications: &'a NotificationCenter,
    ) -> Self {
        Self {
            session,
            backend,
            cart,
            notifications,
        }
    }

    /// The wizard as stored in the session, or a fresh one.
    pub async fn load(&self) -> Wizard {
        match self.session.get::<Wizard>(session_keys::CHECKOUT).await {
            Ok(wizard) => wizard.unwrap_or_default(),
            Err(e) => {
                warn!("Discarding unreadable checkout state: {e}");
                Wizard::default()
            }
        }
    }

    async fn save(&self, wizard: &Wizard) -> Result<(), CheckoutError> {
        self.session.insert(session_keys::CHECKOUT, wizard).await?;
        Ok(())
    }

    /// Start over (after a completed order, or on request).
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn reset(&self) -> Result<(), CheckoutError> {
        self.session.remove_value(session_keys::CHECKOUT).await?;
        Ok(())
    }

    /// Step back once.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn back(&self) -> Result<Wizard, CheckoutError> {
        let mut wizard = self.load().await;
        wizard.back();
        self.save(&wizard).await?;
        Ok(wizard)
    }

    /// Leave Review: the cart must be non-empty and every line in stock.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Blocked`] if the cart is empty, a line is out
    /// of stock or the stock check fails.
    #[instrument(skip(self))]
    pub async fn confirm_review(&self) -> Result<Wizard, CheckoutError> {
        let mut wizard = self.expect_step(Step::Review).await?;

        if self.cart.snapshot(self.session).await.is_empty() {
            self.toast(Toast::error("Your cart is empty.")).await;
            return Err(CheckoutError::Blocked);
        }

        let check = match self.backend.validate_cart_stock().await.and_then(Envelope::into_data) {
            Ok(check) => check,
            Err(e) => return Err(self.blocked(&e, "check stock").await),
        };
        if !check.is_ok() {
            self.toast(Toast::error(stock_message(&check))).await;
            return Err(CheckoutError::Blocked);
        }

        wizard.step = Step::Shipping;
        self.save(&wizard).await?;
        Ok(wizard)
    }

    /// Leave Shipping: validate the address and quote the shipping fee.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Invalid`] with the field errors, or
    /// [`CheckoutError::Blocked`] if the fee cannot be computed.
    #[instrument(skip_all)]
    pub async fn submit_shipping(&self, form: &ShippingForm) -> Result<Wizard, CheckoutError> {
        let mut wizard = self.expect_step(Step::Shipping).await?;

        // Keep what was typed even when it does not validate.
        wizard.note = non_blank(&form.note);
        let mut address = match validate_shipping(form) {
            Ok(address) => address,
            Err(errors) => {
                self.save(&wizard).await?;
                return Err(CheckoutError::Invalid(errors));
            }
        };
        self.fill_place_names(&mut address).await;

        let (Some(province_id), Some(district_id)) = (address.province_id, address.district_id)
        else {
            return Err(CheckoutError::Blocked);
        };
        let item_count = self.cart.snapshot(self.session).await.item_count();
        let request = ShippingFeeRequest {
            province_id,
            district_id,
            ward_code: &address.ward_code,
            item_count,
        };

        let fee = match self
            .backend
            .calculate_shipping_fee(&request)
            .await
            .and_then(Envelope::into_data)
        {
            Ok(fee) => fee,
            Err(e) => {
                wizard.shipping = address;
                self.save(&wizard).await?;
                return Err(self.blocked(&e, "calculate the shipping fee").await);
            }
        };

        debug!(fee = %fee.fee, "Shipping fee quoted");
        wizard.shipping = address;
        wizard.shipping_fee = Some(fee);
        wizard.step = Step::Payment;
        self.save(&wizard).await?;
        Ok(wizard)
    }

    /// Leave Payment.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Invalid`] with the field errors.
    #[instrument(skip_all)]
    pub async fn submit_payment(&self, form: &PaymentForm) -> Result<Wizard, CheckoutError> {
        let mut wizard = self.expect_step(Step::Payment).await?;
        let (method, wallet) = validate_payment(form).map_err(CheckoutError::Invalid)?;
        wizard.payment_method = Some(method);
        wizard.wallet_provider = wallet;
        wizard.step = Step::Confirm;
        self.save(&wizard).await?;
        Ok(wizard)
    }

    /// Place the order. On success the server cart is emptied and the wizard
    /// completes; on failure it stays on Confirm for a retry.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Blocked`] if the backend rejects the order.
    #[instrument(skip(self))]
    pub async fn place_order(&self) -> Result<Order, CheckoutError> {
        let mut wizard = self.expect_step(Step::Confirm).await?;

        let Some(request) = wizard.order_request() else {
            // Confirm reached without payment or fee: redo those steps.
            wizard.step = Step::Shipping;
            self.save(&wizard).await?;
            return Err(CheckoutError::WrongStep(Step::Confirm));
        };

        let order = match self.backend.create_order(&request).await.and_then(Envelope::into_data) {
            Ok(order) => order,
            Err(e) => return Err(self.blocked(&e, "place your order").await),
        };

        info!(order_id = %order.id, "Order placed");
        if !self.cart.clear_cart(self.session, self.backend).await {
            warn!(order_id = %order.id, "Order placed but the cart could not be emptied");
            self.cart.forget(self.session).await;
        }
        wizard.step = Step::Completed { order_id: order.id };
        self.save(&wizard).await?;
        self.toast(Toast::success(format!("Order {} placed.", order.reference())))
            .await;
        Ok(order)
    }

    async fn expect_step(&self, step: Step) -> Result<Wizard, CheckoutError> {
        let wizard = self.load().await;
        if wizard.step == step {
            Ok(wizard)
        } else {
            Err(CheckoutError::WrongStep(wizard.step))
        }
    }

    /// Best effort: the names are only used for display.
    async fn fill_place_names(&self, address: &mut ShippingAddress) {
        let (Some(province_id), Some(district_id)) = (address.province_id, address.district_id)
        else {
            return;
        };

        if let Ok(provinces) = self.backend.get_provinces().await.and_then(Envelope::into_data)
            && let Some(p) = provinces.into_iter().find(|p| p.id == province_id)
        {
            address.province_name = p.name;
        }
        if let Ok(districts) = self
            .backend
            .get_districts(province_id)
            .await
            .and_then(Envelope::into_data)
            && let Some(d) = districts.into_iter().find(|d| d.id == district_id)
        {
            address.district_name = d.name;
        }
        if let Ok(wards) = self.backend.get_wards(district_id).await.and_then(Envelope::into_data)
            && let Some(w) = wards.into_iter().find(|w| w.code == address.ward_code)
        {
            address.ward_name = w.name;
        }
    }

    async fn blocked(&self, error: &ApiError, action: &str) -> CheckoutError {
        warn!(error = %error, "Could not {action}");
        let message = match error {
            ApiError::Rejected(message) => message.clone(),
            ApiError::Status { .. } | ApiError::Unauthorized => error.user_message(),
            _ => format!("Could not {action}. Please try again."),
        };
        self.toast(Toast::error(message)).await;
        CheckoutError::Blocked
    }

    async fn toast(&self, toast: Toast) {
        self.notifications.push(self.session, toast).await;
    }
}

fn stock_message(check: &StockCheck) -> String {
    if check.issues.is_empty() {
        return "Some items in your cart are no longer available.".to_string();
    }
    let lines = check
        .issues
        .iter()
        .map(|issue| {
            format!(
                "{} (only {} left, {} requested)",
                issue.product_name,
                issue.available.max(0),
                issue.requested
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("Not enough stock: {lines}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use shopfront_core::ProductId;

    use super::*;
    use crate::api::StockIssue;

    #[test]
    fn back_never_goes_below_review() {
        let mut wizard = Wizard {
            step: Step::Confirm,
            note: Some("Call first".into()),
            ..Wizard::default()
        };
        wizard.back();
        assert_eq!(wizard.step, Step::Payment);
        wizard.back();
        wizard.back();
        assert_eq!(wizard.step, Step::Review);
        wizard.back();
        assert_eq!(wizard.step, Step::Review);
        assert_eq!(wizard.note.as_deref(), Some("Call first"));
    }

    #[test]
    fn completed_is_terminal() {
        let mut wizard = Wizard {
            step: Step::Completed {
                order_id: OrderId::new(9),
            },
            ..Wizard::default()
        };
        wizard.back();
        assert_eq!(wizard.order_id(), Some(OrderId::new(9)));
        assert_eq!(wizard.step.index(), 4);
    }

    #[test]
    fn order_request_needs_payment_and_fee() {
        let mut wizard = Wizard::default();
        assert!(wizard.order_request().is_none());

        wizard.payment_method = Some(PaymentMethod::Cod);
        wizard.shipping_fee = Some(ShippingFee {
            fee: Decimal::new(30_000, 0),
            estimated_days: Some(3),
        });
        let request = wizard.order_request().unwrap();
        assert_eq!(request.shipping_fee, Decimal::new(30_000, 0));
    }

    #[test]
    fn wizard_survives_a_session_round_trip() {
        let wizard = Wizard {
            step: Step::Completed {
                order_id: OrderId::new(3),
            },
            payment_method: Some(PaymentMethod::BankTransfer),
            ..Wizard::default()
        };
        let json = serde_json::to_value(&wizard).unwrap();
        assert_eq!(serde_json::from_value::<Wizard>(json).unwrap(), wizard);
    }

    #[test]
    fn stock_message_lists_short_lines() {
        let check = StockCheck {
            valid: false,
            issues: vec![StockIssue {
                product_id: ProductId::new(1),
                product_name: "Kettle".into(),
                requested: 3,
                available: 1,
            }],
        };
        assert_eq!(
            stock_message(&check),
            "Not enough stock: Kettle (only 1 left, 3 requested)"
        );
    }
}
