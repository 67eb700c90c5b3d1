//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{instrument, warn};

use shopfront_core::{CategoryId, ProductId};

use crate::api::{ApiError, Category, Envelope, NewReview, Product, ProductPage, ProductQuery, Review};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth};
use crate::services::{ProductList, Toast};
use crate::services::validation::non_blank;
use crate::state::AppState;

use super::backend;

/// Products per listing page.
const PAGE_SIZE: u32 = 12;

/// Sort options offered on the listing: (value, label).
pub const SORT_OPTIONS: [(&str, &str); 5] = [
    ("", "Featured"),
    ("price_asc", "Price: low to high"),
    ("price_desc", "Price: high to low"),
    ("name", "Name"),
    ("rating", "Top rated"),
];

/// Listing filters as typed into the filter form.
///
/// Everything arrives as text so that an empty field is "no filter" rather
/// than a rejected request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductFilters {
    pub search: String,
    pub category: String,
    pub brand: String,
    pub sort: String,
    pub min_price: String,
    pub max_price: String,
    /// One-based page number.
    pub page: String,
}

impl ProductFilters {
    /// The backend query for these filters. Unparseable values are ignored.
    #[must_use]
    pub fn to_query(&self) -> ProductQuery {
        ProductQuery {
            page: Some(self.page_number().saturating_sub(1)),
            size: Some(PAGE_SIZE),
            category_id: self.category.trim().parse::<CategoryId>().ok(),
            search: non_blank(&self.search),
            brand: non_blank(&self.brand),
            sort: SORT_OPTIONS
                .iter()
                .any(|(value, _)| !value.is_empty() && *value == self.sort.trim())
                .then(|| self.sort.trim().to_string()),
            min_price: self.min_price.trim().parse::<Decimal>().ok(),
            max_price: self.max_price.trim().parse::<Decimal>().ok(),
        }
    }

    /// One-based page number, defaulting to the first page.
    #[must_use]
    pub fn page_number(&self) -> u32 {
        self.page.trim().parse::<u32>().ok().filter(|p| *p > 0).unwrap_or(1)
    }

    /// Listing URL for another page with the same filters.
    #[must_use]
    pub fn page_link(&self, page: u32) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in [
            ("search", &self.search),
            ("category", &self.category),
            ("brand", &self.brand),
            ("sort", &self.sort),
            ("min_price", &self.min_price),
            ("max_price", &self.max_price),
        ] {
            if !value.trim().is_empty() {
                query.append_pair(key, value.trim());
            }
        }
        query.append_pair("page", &page.to_string());
        format!("/products?{}", query.finish())
    }

    /// Whether a category is the selected one.
    #[must_use]
    pub fn is_category(&self, id: CategoryId) -> bool {
        self.category.trim() == id.to_string()
    }

    /// Whether a sort option is the selected one.
    #[must_use]
    pub fn is_sort(&self, value: &str) -> bool {
        self.sort.trim() == value
    }
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub ctx: PageContext,
    pub page: ProductPage,
    pub categories: Vec<Category>,
    pub filter: ProductFilters,
    pub sort_options: [(&'static str, &'static str); 5],
    pub current_page: u32,
    pub total_pages: u32,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub ctx: PageContext,
    pub product: Product,
    pub reviews: Vec<Review>,
    pub is_favorite: bool,
    pub in_wishlist: bool,
    pub in_compare: bool,
}

/// Review form data.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

/// Display the product listing.
#[instrument(skip(state, session, ctx))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    mut ctx: PageContext,
    Query(filter): Query<ProductFilters>,
) -> Result<ProductsIndexTemplate> {
    let backend = backend(&state, &session);
    let query = filter.to_query();

    let page = backend.get_products(&query).await?;
    let page = ctx.take(page);
    let categories = match backend.get_categories_with_count().await {
        Ok(fetched) => ctx.take(fetched),
        Err(e) => {
            warn!(error = %e, "Failed to load categories for the filter");
            Vec::new()
        }
    };

    Ok(ProductsIndexTemplate {
        ctx,
        current_page: page.number.saturating_add(1),
        total_pages: page.total_pages,
        page,
        categories,
        filter,
        sort_options: SORT_OPTIONS,
    })
}

/// Display a product with its reviews.
#[instrument(skip(state, session, ctx))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    mut ctx: PageContext,
    Path(id): Path<ProductId>,
) -> Result<ProductShowTemplate> {
    let backend = backend(&state, &session);

    let product = match backend.get_product(id).await {
        Ok(fetched) => ctx.take(fetched),
        Err(ApiError::Status { status, .. }) if status == StatusCode::NOT_FOUND => {
            return Err(AppError::NotFound(format!("Product {id}")));
        }
        Err(e) => return Err(e.into()),
    };

    let reviews = backend.get_product_reviews(id).await.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load reviews");
        Vec::new()
    });

    let is_favorite = if ctx.signed_in() {
        backend
            .get_favorites()
            .await
            .and_then(Envelope::into_data)
            .is_ok_and(|favorites| favorites.iter().any(|p| p.id == id))
    } else {
        false
    };

    Ok(ProductShowTemplate {
        ctx,
        product,
        reviews,
        is_favorite,
        in_wishlist: ProductList::WISHLIST.contains(&session, id).await,
        in_compare: ProductList::COMPARE.contains(&session, id).await,
    })
}

/// Post a review for a product.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id))]
pub async fn add_review(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
    Form(form): Form<ReviewForm>,
) -> Response {
    let back = format!("/products/{id}#reviews");
    let notifications = state.notifications();

    let comment = form.comment.trim();
    if !(1..=5).contains(&form.rating) || comment.is_empty() {
        notifications
            .push(&session, Toast::error("Choose a rating from 1 to 5 and write a comment."))
            .await;
        return Redirect::to(&back).into_response();
    }

    let review = NewReview {
        rating: form.rating,
        comment: comment.to_string(),
    };
    let toast = match backend(&state, &session)
        .create_review(id, &review)
        .await
        .and_then(Envelope::into_ack)
    {
        Ok(_) => Toast::success("Thanks for your review!"),
        Err(e) => {
            warn!(error = %e, "Review rejected");
            Toast::error(e.user_message())
        }
    };
    notifications.push(&session, toast).await;
    Redirect::to(&back).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filters_mean_first_page_unfiltered() {
        let query = ProductFilters::default().to_query();
        assert_eq!(query.page, Some(0));
        assert_eq!(query.size, Some(PAGE_SIZE));
        assert!(query.category_id.is_none() && query.search.is_none() && query.sort.is_none());
    }

    #[test]
    fn filters_parse_what_they_can() {
        let filter = ProductFilters {
            search: " kettle ".into(),
            category: "2".into(),
            sort: "price_desc".into(),
            min_price: "abc".into(),
            max_price: "500000".into(),
            page: "3".into(),
            ..ProductFilters::default()
        };
        let query = filter.to_query();
        assert_eq!(query.page, Some(2));
        assert_eq!(query.category_id, Some(CategoryId::new(2)));
        assert_eq!(query.search.as_deref(), Some("kettle"));
        assert_eq!(query.sort.as_deref(), Some("price_desc"));
        assert!(query.min_price.is_none());
        assert_eq!(query.max_price, Some(Decimal::new(500_000, 0)));
    }

    #[test]
    fn unknown_sort_is_dropped() {
        let filter = ProductFilters {
            sort: "random".into(),
            ..ProductFilters::default()
        };
        assert!(filter.to_query().sort.is_none());
    }

    #[test]
    fn page_links_keep_filters() {
        let filter = ProductFilters {
            search: "tea cup".into(),
            category: "1".into(),
            page: "1".into(),
            ..ProductFilters::default()
        };
        assert_eq!(
            filter.page_link(2),
            "/products?search=tea+cup&category=1&page=2"
        );
    }
}
