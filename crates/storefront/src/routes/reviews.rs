//! Review browser route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Query, State};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{instrument, warn};

use shopfront_core::ProductId;

use crate::api::{Product, ProductQuery, Review};
use crate::error::Result;
use crate::filters;
use crate::middleware::PageContext;
use crate::state::AppState;

use super::backend;

/// Products listed when no product is selected.
const BROWSE_SIZE: u32 = 24;

/// Query parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReviewsQuery {
    pub product: Option<String>,
}

/// Review browser template.
#[derive(Template, WebTemplate)]
#[template(path = "reviews/index.html")]
pub struct ReviewsTemplate {
    pub ctx: PageContext,
    /// Products to pick from.
    pub products: Vec<Product>,
    /// The selected product and its reviews.
    pub selected: Option<Product>,
    pub reviews: Vec<Review>,
    /// Mean rating of `reviews`.
    pub average: Option<String>,
}

/// Mean of the ratings, one decimal.
fn average(reviews: &[Review]) -> Option<String> {
    if reviews.is_empty() {
        return None;
    }
    let total: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = f64::from(total) / reviews.len() as f64;
    Some(format!("{mean:.1}"))
}

/// Browse reviews: pick a product, read what others wrote, write your own.
#[instrument(skip(state, session, ctx))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    mut ctx: PageContext,
    Query(query): Query<ReviewsQuery>,
) -> Result<ReviewsTemplate> {
    let backend = backend(&state, &session);
    let listing = ProductQuery {
        page: Some(0),
        size: Some(BROWSE_SIZE),
        sort: Some("rating".to_string()),
        ..ProductQuery::default()
    };
    let page = backend.get_products(&listing).await?;
    let products = ctx.take(page).content;

    let selected_id = query
        .product
        .as_deref()
        .and_then(|raw| raw.trim().parse::<ProductId>().ok());

    let (selected, reviews) = match selected_id {
        Some(id) => match backend.get_product(id).await {
            Ok(fetched) => {
                let product = ctx.take(fetched);
                let reviews = backend.get_product_reviews(id).await.unwrap_or_else(|e| {
                    warn!(error = %e, "Failed to load reviews");
                    Vec::new()
                });
                (Some(product), reviews)
            }
            Err(e) => {
                warn!(product_id = %id, error = %e, "Selected product not found");
                (None, Vec::new())
            }
        },
        None => (None, Vec::new()),
    };

    Ok(ReviewsTemplate {
        ctx,
        products,
        selected,
        average: average(&reviews),
        reviews,
    })
}

#[cfg(test)]
mod tests {
    use shopfront_core::ReviewId;

    use super::*;

    fn review(rating: u8) -> Review {
        Review {
            id: ReviewId::new(i64::from(rating)),
            user_name: None,
            rating,
            comment: String::new(),
            created_at: None,
        }
    }

    #[test]
    fn average_is_rounded_to_one_decimal() {
        assert_eq!(average(&[review(5), review(4), review(4)]).as_deref(), Some("4.3"));
        assert_eq!(average(&[]), None);
    }
}
