//! Checkout route handlers.
//!
//! `GET /checkout` renders whatever step the session's wizard is on. Each
//! step posts to its own endpoint; a valid submission redirects back to
//! `/checkout`, an invalid one re-renders the step with the field errors.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{instrument, warn};

use shopfront_core::{DistrictId, PaymentMethod, ProvinceId};

use crate::api::{Backend, Cart, District, Envelope, Province, Ward};
use crate::error::Result;
use crate::filters;
use crate::middleware::{CspNonce, PageContext, RequireAuth};
use crate::services::checkout::{PaymentForm, ShippingForm, Step, Wizard};
use crate::services::{CheckoutError, CheckoutService, FieldErrors};
use crate::state::AppState;

use super::backend;

/// Progress bar entry.
#[derive(Debug, Clone)]
pub struct StepView {
    pub number: u8,
    pub label: &'static str,
    pub done: bool,
    pub active: bool,
}

/// A payment method radio button.
#[derive(Debug, Clone)]
pub struct PaymentOption {
    pub code: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// Checkout page template (every step).
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub ctx: PageContext,
    pub wizard: Wizard,
    pub steps: Vec<StepView>,
    pub cart: Cart,
    pub errors: FieldErrors,
    pub shipping: ShippingForm,
    pub payment: PaymentForm,
    pub payment_options: Vec<PaymentOption>,
    pub provinces: Vec<Province>,
    pub districts: Vec<District>,
    pub wards: Vec<Ward>,
}

impl CheckoutTemplate {
    /// Whether the wizard is on the given step.
    #[must_use]
    pub fn at(&self, step: &str) -> bool {
        matches!(
            (step, self.wizard.step),
            ("review", Step::Review)
                | ("shipping", Step::Shipping)
                | ("payment", Step::Payment)
                | ("confirm", Step::Confirm)
                | ("completed", Step::Completed { .. })
        )
    }
}

/// Display the current step.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    RequireAuth(user): RequireAuth,
) -> Result<CheckoutTemplate> {
    let backend = backend(&state, &session);
    let wizard = service(&state, &session, &backend).load().await;
    if wizard.step == Step::Review {
        state.cart().refresh(&session, &backend).await;
    }
    render(&state, &session, &backend, &nonce, wizard, None, None, FieldErrors::new()).await
}

/// Leave the review step.
#[instrument(skip_all)]
pub async fn confirm_review(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_user): RequireAuth,
) -> Result<Response> {
    let backend = backend(&state, &session);
    settle(service(&state, &session, &backend).confirm_review().await)
}

/// Submit the shipping address.
#[instrument(skip_all)]
pub async fn submit_shipping(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    RequireAuth(_user): RequireAuth,
    Form(form): Form<ShippingForm>,
) -> Result<Response> {
    let backend = backend(&state, &session);
    match service(&state, &session, &backend).submit_shipping(&form).await {
        Err(CheckoutError::Invalid(errors)) => {
            let wizard = service(&state, &session, &backend).load().await;
            Ok(render(&state, &session, &backend, &nonce, wizard, Some(form), None, errors)
                .await?
                .into_response())
        }
        other => settle(other),
    }
}

/// Submit the payment method.
#[instrument(skip_all)]
pub async fn submit_payment(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    RequireAuth(_user): RequireAuth,
    Form(form): Form<PaymentForm>,
) -> Result<Response> {
    let backend = backend(&state, &session);
    match service(&state, &session, &backend).submit_payment(&form).await {
        Err(CheckoutError::Invalid(errors)) => {
            let wizard = service(&state, &session, &backend).load().await;
            Ok(render(&state, &session, &backend, &nonce, wizard, None, Some(form), errors)
                .await?
                .into_response())
        }
        other => settle(other),
    }
}

/// Place the order.
#[instrument(skip_all)]
pub async fn place_order(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_user): RequireAuth,
) -> Result<Response> {
    let backend = backend(&state, &session);
    settle(service(&state, &session, &backend).place_order().await)
}

/// Go back one step.
#[instrument(skip_all)]
pub async fn back(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_user): RequireAuth,
) -> Result<Response> {
    let backend = backend(&state, &session);
    settle(service(&state, &session, &backend).back().await)
}

/// Start a new checkout.
#[instrument(skip_all)]
pub async fn restart(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_user): RequireAuth,
) -> Result<Response> {
    let backend = backend(&state, &session);
    let completed = service(&state, &session, &backend).load().await.order_id().is_some();
    service(&state, &session, &backend).reset().await?;
    let next = if completed { "/products" } else { "/checkout" };
    Ok(Redirect::to(next).into_response())
}

// =============================================================================
// Helpers
// =============================================================================

fn service<'a>(state: &'a AppState, session: &'a Session, backend: &'a Backend) -> CheckoutService<'a> {
    CheckoutService::new(session, backend, state.cart(), state.notifications())
}

/// Outcome of a step transition: back to the wizard, whether it advanced or
/// was blocked (the toast explains).
fn settle<T>(result: std::result::Result<T, CheckoutError>) -> Result<Response> {
    match result {
        Ok(_) | Err(CheckoutError::Blocked | CheckoutError::Invalid(_)) => {
            Ok(Redirect::to("/checkout").into_response())
        }
        Err(CheckoutError::WrongStep(step)) => {
            warn!(?step, "Checkout form posted out of order");
            Ok(Redirect::to("/checkout").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn render(
    state: &AppState,
    session: &Session,
    backend: &Backend,
    nonce: &CspNonce,
    wizard: Wizard,
    shipping: Option<ShippingForm>,
    payment: Option<PaymentForm>,
    errors: FieldErrors,
) -> Result<CheckoutTemplate> {
    let shipping =
        shipping.unwrap_or_else(|| ShippingForm::from_address(&wizard.shipping, wizard.note.as_deref()));
    let payment = payment.unwrap_or_else(|| PaymentForm {
        payment_method: wizard
            .payment_method
            .map(|m| m.code().to_string())
            .unwrap_or_default(),
        wallet_provider: wizard.wallet_provider.clone().unwrap_or_default(),
    });

    let (provinces, districts, wards) = if wizard.step == Step::Shipping {
        places(backend, &shipping).await
    } else {
        (Vec::new(), Vec::new(), Vec::new())
    };

    let payment_options = PaymentMethod::ALL
        .iter()
        .map(|method| PaymentOption {
            code: method.code(),
            label: method.label(),
            selected: payment.payment_method == method.code(),
        })
        .collect();

    let steps = Step::VISIBLE
        .iter()
        .map(|step| StepView {
            number: step.index() + 1,
            label: step.label(),
            done: step.index() < wizard.step.index(),
            active: *step == wizard.step,
        })
        .collect();

    let ctx = PageContext::build(state, session, nonce, "/checkout").await;
    Ok(CheckoutTemplate {
        ctx,
        steps,
        cart: state.cart().snapshot(session).await,
        errors,
        shipping,
        payment,
        payment_options,
        provinces,
        districts,
        wards,
        wizard,
    })
}

/// Province, district and ward options for the shipping form, following
/// what is already selected. Lookups that fail leave their list empty.
async fn places(backend: &Backend, form: &ShippingForm) -> (Vec<Province>, Vec<District>, Vec<Ward>) {
    let provinces = backend
        .get_provinces()
        .await
        .and_then(Envelope::into_data)
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load provinces");
            Vec::new()
        });

    let districts = match form.province_id.trim().parse::<ProvinceId>() {
        Ok(id) => backend
            .get_districts(id)
            .await
            .and_then(Envelope::into_data)
            .unwrap_or_default(),
        Err(_) => Vec::new(),
    };

    let wards = match form.district_id.trim().parse::<DistrictId>() {
        Ok(id) => backend
            .get_wards(id)
            .await
            .and_then(Envelope::into_data)
            .unwrap_or_default(),
        Err(_) => Vec::new(),
    };

    (provinces, districts, wards)
}
