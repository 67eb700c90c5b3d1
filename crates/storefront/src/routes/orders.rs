//! Order history route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use shopfront_core::OrderId;

use crate::api::{ApiError, Envelope, Order};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth};
use crate::services::Toast;
use crate::state::AppState;

use super::backend;

/// Order history page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub ctx: PageContext,
    pub orders: Vec<Order>,
}

/// Order detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub ctx: PageContext,
    pub order: Order,
}

/// Display the signed-in user's orders, newest first.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    ctx: PageContext,
) -> Result<OrdersIndexTemplate> {
    let mut orders = backend(&state, &session)
        .get_orders()
        .await?
        .into_data()?;
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(OrdersIndexTemplate { ctx, orders })
}

/// Display one order.
#[instrument(skip(state, session, _user, ctx))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_user): RequireAuth,
    ctx: PageContext,
    Path(id): Path<OrderId>,
) -> Result<OrderShowTemplate> {
    let order = match backend(&state, &session).get_order(id).await {
        Ok(envelope) => envelope.into_data()?,
        Err(ApiError::Status { status, .. })
            if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN =>
        {
            return Err(AppError::NotFound(format!("Order {id}")));
        }
        Err(e) => return Err(e.into()),
    };
    Ok(OrderShowTemplate { ctx, order })
}

/// Cancel an order. The backend decides whether it still can be.
#[instrument(skip(state, session, _user))]
pub async fn cancel(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Response {
    let toast = match backend(&state, &session)
        .cancel_order(id)
        .await
        .and_then(Envelope::into_data)
    {
        Ok(order) => {
            info!(order_id = %id, "Order cancelled");
            Toast::success(format!("Order {} was cancelled.", order.reference()))
        }
        Err(e) => {
            warn!(order_id = %id, error = %e, "Cancellation failed");
            Toast::error(e.user_message())
        }
    };
    state.notifications().push(&session, toast).await;
    Redirect::to(&format!("/orders/{id}")).into_response()
}
