//! Wishlist and compare route handlers.
//!
//! Both lists live in the visitor's session, so they work signed out too.
//! Their ids are resolved against the catalog on every view; products the
//! catalog no longer knows are dropped from the page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{debug, instrument};

use shopfront_core::ProductId;

use crate::api::{Backend, Product};
use crate::error::Result;
use crate::filters;
use crate::middleware::PageContext;
use crate::services::lists::{Added, COMPARE_LIMIT};
use crate::services::{ProductList, Toast};
use crate::state::AppState;

use super::account::NextForm;
use super::{backend, local_path};

/// Wishlist page template.
#[derive(Template, WebTemplate)]
#[template(path = "lists/wishlist.html")]
pub struct WishlistTemplate {
    pub ctx: PageContext,
    pub products: Vec<Product>,
}

/// Compare page template.
#[derive(Template, WebTemplate)]
#[template(path = "lists/compare.html")]
pub struct CompareTemplate {
    pub ctx: PageContext,
    pub products: Vec<Product>,
    pub limit: usize,
}

/// Display the wishlist.
#[instrument(skip_all)]
pub async fn wishlist(
    State(state): State<AppState>,
    session: Session,
    mut ctx: PageContext,
) -> WishlistTemplate {
    let ids = ProductList::WISHLIST.ids(&session).await;
    let products = resolve(&backend(&state, &session), &mut ctx, &ids).await;
    WishlistTemplate { ctx, products }
}

/// Display the compare tray side by side.
#[instrument(skip_all)]
pub async fn compare(
    State(state): State<AppState>,
    session: Session,
    mut ctx: PageContext,
) -> CompareTemplate {
    let ids = ProductList::COMPARE.ids(&session).await;
    let products = resolve(&backend(&state, &session), &mut ctx, &ids).await;
    CompareTemplate {
        ctx,
        products,
        limit: COMPARE_LIMIT,
    }
}

/// Add to the wishlist.
#[instrument(skip(state, session, form))]
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ProductId>,
    Form(form): Form<NextForm>,
) -> Result<Response> {
    let toast = match ProductList::WISHLIST.add(&session, id).await? {
        Added::AlreadyPresent => Toast::info("Already on your wishlist."),
        Added::Added | Added::Full => Toast::success("Added to your wishlist."),
    };
    state.notifications().push(&session, toast).await;
    Ok(Redirect::to(&local_path(form.next.as_deref(), "/wishlist")).into_response())
}

/// Remove from the wishlist.
#[instrument(skip(state, session, form))]
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ProductId>,
    Form(form): Form<NextForm>,
) -> Result<Response> {
    ProductList::WISHLIST.remove(&session, id).await?;
    state
        .notifications()
        .push(&session, Toast::info("Removed from your wishlist."))
        .await;
    Ok(Redirect::to(&local_path(form.next.as_deref(), "/wishlist")).into_response())
}

/// Add to the compare tray.
#[instrument(skip(state, session, form))]
pub async fn add_to_compare(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ProductId>,
    Form(form): Form<NextForm>,
) -> Result<Response> {
    let toast = match ProductList::COMPARE.add(&session, id).await? {
        Added::Added => Toast::success("Added to compare."),
        Added::AlreadyPresent => Toast::info("Already in your comparison."),
        Added::Full => Toast::warning(format!(
            "You can compare up to {COMPARE_LIMIT} products. Remove one first."
        )),
    };
    state.notifications().push(&session, toast).await;
    Ok(Redirect::to(&local_path(form.next.as_deref(), "/compare")).into_response())
}

/// Remove from the compare tray.
#[instrument(skip(session))]
pub async fn remove_from_compare(session: Session, Path(id): Path<ProductId>) -> Result<Response> {
    ProductList::COMPARE.remove(&session, id).await?;
    Ok(Redirect::to("/compare").into_response())
}

/// Empty the compare tray.
#[instrument(skip_all)]
pub async fn clear_compare(session: Session) -> Result<Response> {
    ProductList::COMPARE.clear(&session).await?;
    Ok(Redirect::to("/compare").into_response())
}

/// Look the ids up in the catalog, keeping their order.
pub(super) async fn resolve(backend: &Backend, ctx: &mut PageContext, ids: &[ProductId]) -> Vec<Product> {
    let mut products = Vec::with_capacity(ids.len());
    for &id in ids {
        match backend.get_product(id).await {
            Ok(fetched) => products.push(ctx.take(fetched)),
            Err(e) => debug!(product_id = %id, error = %e, "Skipping unknown product"),
        }
    }
    products
}
