//! Admin route handlers.
//!
//! Every handler takes [`RequireAdmin`]; the backend checks the role again on
//! its side.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use shopfront_core::ProductId;

use crate::api::{DashboardStats, Envelope, InventoryItem, User};
use crate::error::Result;
use crate::filters;
use crate::middleware::{PageContext, RequireAdmin};
use crate::services::Toast;
use crate::state::AppState;

use super::backend;

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub ctx: PageContext,
    pub stats: DashboardStats,
}

/// Users template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/users.html")]
pub struct UsersTemplate {
    pub ctx: PageContext,
    pub users: Vec<User>,
}

/// Inventory template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/inventory.html")]
pub struct InventoryTemplate {
    pub ctx: PageContext,
    /// Low stock rows first, then by name.
    pub items: Vec<InventoryItem>,
}

/// Stock update form data.
#[derive(Debug, Deserialize)]
pub struct StockForm {
    pub quantity: u32,
}

/// Display the dashboard figures.
#[instrument(skip_all, fields(admin = %admin.username))]
pub async fn dashboard(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    ctx: PageContext,
) -> Result<DashboardTemplate> {
    let stats = backend(&state, &session)
        .get_dashboard_stats()
        .await?
        .into_data()?;
    Ok(DashboardTemplate { ctx, stats })
}

/// List the registered users.
#[instrument(skip_all)]
pub async fn users(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(_admin): RequireAdmin,
    ctx: PageContext,
) -> Result<UsersTemplate> {
    let users = backend(&state, &session)
        .get_admin_users()
        .await?
        .into_data()?;
    Ok(UsersTemplate { ctx, users })
}

/// Show stock levels.
#[instrument(skip_all)]
pub async fn inventory(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(_admin): RequireAdmin,
    ctx: PageContext,
) -> Result<InventoryTemplate> {
    let mut items = backend(&state, &session)
        .get_admin_inventory()
        .await?
        .into_data()?;
    sort_inventory(&mut items);
    Ok(InventoryTemplate { ctx, items })
}

/// Set the stock level of one product.
#[instrument(skip(state, session, _admin))]
pub async fn update_stock(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Form(form): Form<StockForm>,
) -> Response {
    let toast = match backend(&state, &session)
        .update_stock(id, form.quantity)
        .await
        .and_then(Envelope::into_data)
    {
        Ok(item) => {
            info!(product_id = %id, quantity = item.stock_quantity, "Stock updated");
            Toast::success(format!(
                "Stock for {} set to {}.",
                if item.product_name.is_empty() {
                    format!("product #{id}")
                } else {
                    item.product_name
                },
                item.stock_quantity
            ))
        }
        Err(e) => {
            warn!(product_id = %id, error = %e, "Stock update rejected");
            Toast::error(e.user_message())
        }
    };
    state.notifications().push(&session, toast).await;
    Redirect::to("/admin/inventory").into_response()
}

fn sort_inventory(items: &mut [InventoryItem]) {
    items.sort_by(|a, b| {
        b.is_low()
            .cmp(&a.is_low())
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, name: &str, stock: i64) -> InventoryItem {
        InventoryItem {
            product_id: ProductId::new(id),
            product_name: name.to_string(),
            stock_quantity: stock,
            reserved_quantity: 0,
            low_stock_threshold: None,
        }
    }

    #[test]
    fn low_stock_rows_come_first() {
        let mut items = vec![item(1, "Apron", 50), item(2, "Whisk", 2), item(3, "Bowl", 3)];
        sort_inventory(&mut items);
        let names: Vec<_> = items.iter().map(|i| i.product_name.as_str()).collect();
        assert_eq!(names, vec!["Bowl", "Whisk", "Apron"]);
    }
}
