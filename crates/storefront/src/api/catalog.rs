//! Catalog endpoints: products, categories, reviews.
//!
//! Reads are cached (see [`super::cache`]) and may degrade to the demo
//! catalog; writes are never cached and invalidate the affected entries.

use shopfront_core::ProductId;
use tracing::{debug, instrument};

use super::cache::{CacheKey, CacheValue};
use super::types::{Category, NewReview, Product, ProductPage, ProductQuery, Review};
use super::{ApiError, Backend, Envelope, Fetched, fallback};

impl Backend {
    /// List products matching the given filters.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails and degraded mode does not apply.
    #[instrument(skip(self))]
    pub async fn get_products(&self, query: &ProductQuery) -> Result<Fetched<ProductPage>, ApiError> {
        let key = CacheKey::Products(query.clone());
        if let Some(cache) = self.cache()
            && let Some(CacheValue::Products(page)) = cache.get(&key).await
        {
            debug!("Cache hit for product listing");
            return Ok(Fetched::live(page));
        }

        let result = self
            .get_with::<ProductPage, _>("products", query)
            .await
            .and_then(Envelope::into_data);

        match result {
            Ok(page) => {
                if let Some(cache) = self.cache() {
                    cache.insert(key, CacheValue::Products(page.clone())).await;
                }
                Ok(Fetched::live(page))
            }
            Err(e) => self.degrade(e, "products", || Some(fallback::product_page(query))),
        }
    }

    /// Get one product.
    ///
    /// # Errors
    ///
    /// Returns an error if the product does not exist or the request fails
    /// and degraded mode does not apply.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Fetched<Product>, ApiError> {
        let key = CacheKey::Product(id);
        if let Some(cache) = self.cache()
            && let Some(CacheValue::Product(product)) = cache.get(&key).await
        {
            debug!("Cache hit for product");
            return Ok(Fetched::live(*product));
        }

        let result = self
            .get::<Product>(&format!("products/{id}"))
            .await
            .and_then(Envelope::into_data);

        match result {
            Ok(product) => {
                if let Some(cache) = self.cache() {
                    cache
                        .insert(key, CacheValue::Product(Box::new(product.clone())))
                        .await;
                }
                Ok(Fetched::live(product))
            }
            Err(e) => self.degrade(e, "product", || fallback::product(id)),
        }
    }

    /// Featured products for the home page.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails and degraded mode does not apply.
    #[instrument(skip(self))]
    pub async fn get_featured_products(&self) -> Result<Fetched<Vec<Product>>, ApiError> {
        if let Some(cache) = self.cache()
            && let Some(CacheValue::Featured(products)) = cache.get(&CacheKey::Featured).await
        {
            return Ok(Fetched::live(products));
        }

        let result = self
            .get::<Vec<Product>>("products/featured")
            .await
            .and_then(Envelope::into_data);

        match result {
            Ok(products) => {
                if let Some(cache) = self.cache() {
                    cache
                        .insert(CacheKey::Featured, CacheValue::Featured(products.clone()))
                        .await;
                }
                Ok(Fetched::live(products))
            }
            Err(e) => self.degrade(e, "featured products", || Some(fallback::featured())),
        }
    }

    /// Categories with their product counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails and degraded mode does not apply.
    #[instrument(skip(self))]
    pub async fn get_categories_with_count(&self) -> Result<Fetched<Vec<Category>>, ApiError> {
        if let Some(cache) = self.cache()
            && let Some(CacheValue::Categories(categories)) =
                cache.get(&CacheKey::Categories).await
        {
            return Ok(Fetched::live(categories));
        }

        let result = self
            .get::<Vec<Category>>("categories/with-count")
            .await
            .and_then(Envelope::into_data);

        match result {
            Ok(categories) => {
                if let Some(cache) = self.cache() {
                    cache
                        .insert(
                            CacheKey::Categories,
                            CacheValue::Categories(categories.clone()),
                        )
                        .await;
                }
                Ok(Fetched::live(categories))
            }
            Err(e) => self.degrade(e, "categories", || Some(fallback::categories())),
        }
    }

    /// Reviews for a product, newest first as ordered by the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product_reviews(&self, id: ProductId) -> Result<Vec<Review>, ApiError> {
        let key = CacheKey::Reviews(id);
        if let Some(cache) = self.cache()
            && let Some(CacheValue::Reviews(reviews)) = cache.get(&key).await
        {
            return Ok(reviews);
        }

        let reviews = self
            .get::<Vec<Review>>(&format!("products/{id}/reviews"))
            .await?
            .into_data()?;

        if let Some(cache) = self.cache() {
            cache.insert(key, CacheValue::Reviews(reviews.clone())).await;
        }
        Ok(reviews)
    }

    /// Post a review for a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails (including 401 when signed out).
    #[instrument(skip(self, review), fields(product_id = %id))]
    pub async fn create_review(
        &self,
        id: ProductId,
        review: &NewReview,
    ) -> Result<Envelope<Review>, ApiError> {
        let envelope = self
            .post::<Review, _>(&format!("products/{id}/reviews"), review)
            .await?;
        if let Some(cache) = self.cache() {
            cache.invalidate(&CacheKey::Reviews(id)).await;
            cache.invalidate(&CacheKey::Product(id)).await;
        }
        Ok(envelope)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU16, Ordering};

    use axum::{
        Json, Router,
        extract::{Path, State},
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::get,
    };
    use serde_json::{Value, json};

    use super::*;
    use crate::api::ApiClient;
    use crate::config::{BackendConfig, DegradedMode};

    /// Catalog backend whose answer can be switched while it runs.
    struct Switchable {
        status: Arc<AtomicU16>,
        base_url: String,
    }

    impl Switchable {
        async fn spawn() -> Self {
            let status = Arc::new(AtomicU16::new(200));
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let app = Router::new()
                .route("/api/products/featured", get(featured))
                .route("/api/products/{id}", get(product))
                .with_state(Arc::clone(&status));
            tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
            Self {
                status,
                base_url: format!("http://{addr}/api"),
            }
        }

        fn answer(&self, status: StatusCode) {
            self.status.store(status.as_u16(), Ordering::SeqCst);
        }

        fn backend(&self, mode: DegradedMode) -> Backend {
            backend_at(&self.base_url, mode)
        }
    }

    fn backend_at(base_url: &str, mode: DegradedMode) -> Backend {
        let mut config = BackendConfig::with_base_url(base_url).unwrap();
        config.degraded_mode = mode;
        ApiClient::new(&config).unwrap().anonymous()
    }

    fn live_product(id: i64) -> Value {
        json!({"id": id, "name": "Live Mug", "price": 99000, "stockQuantity": 4})
    }

    fn reply(status: &AtomicU16, data: Value) -> Response {
        let status = StatusCode::from_u16(status.load(Ordering::SeqCst)).unwrap();
        if status.is_success() {
            Json(json!({"success": true, "data": data})).into_response()
        } else {
            let body = json!({"success": false, "message": "switched off"});
            (status, Json(body)).into_response()
        }
    }

    async fn featured(State(status): State<Arc<AtomicU16>>) -> Response {
        reply(&status, json!([live_product(1)]))
    }

    async fn product(State(status): State<Arc<AtomicU16>>, Path(id): Path<i64>) -> Response {
        reply(&status, live_product(id))
    }

    #[tokio::test]
    async fn server_errors_serve_demo_data_that_is_never_cached() {
        let server = Switchable::spawn().await;
        let backend = server.backend(DegradedMode::Demo);

        server.answer(StatusCode::INTERNAL_SERVER_ERROR);
        let fetched = backend.get_featured_products().await.unwrap();
        assert!(fetched.degraded);
        assert_eq!(fetched.data.len(), fallback::featured().len());

        server.answer(StatusCode::OK);
        let fetched = backend.get_featured_products().await.unwrap();
        assert!(!fetched.degraded);
        assert_eq!(fetched.data.len(), 1);
        assert_eq!(fetched.data[0].name, "Live Mug");
    }

    #[tokio::test]
    async fn client_errors_are_not_degraded() {
        let server = Switchable::spawn().await;
        let backend = server.backend(DegradedMode::Demo);
        let id = fallback::featured()[0].id;
        assert!(fallback::product(id).is_some());

        server.answer(StatusCode::NOT_FOUND);
        let result = backend.get_product(id).await;
        assert!(matches!(
            result,
            Err(ApiError::Status { status, .. }) if status == StatusCode::NOT_FOUND
        ));
    }

    #[tokio::test]
    async fn outages_propagate_when_degraded_mode_is_off() {
        let server = Switchable::spawn().await;
        server.answer(StatusCode::SERVICE_UNAVAILABLE);
        let result = server.backend(DegradedMode::Off).get_featured_products().await;
        assert!(matches!(result, Err(ApiError::Status { status, .. }) if status.is_server_error()));
    }

    #[tokio::test]
    async fn unreachable_backend_degrades_only_in_demo_mode() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/api", listener.local_addr().unwrap());
        drop(listener);

        let fetched = backend_at(&base_url, DegradedMode::Demo)
            .get_categories_with_count()
            .await
            .unwrap();
        assert!(fetched.degraded);
        assert_eq!(fetched.data, fallback::categories());

        let result = backend_at(&base_url, DegradedMode::Off)
            .get_categories_with_count()
            .await;
        assert!(matches!(result, Err(ApiError::Transport(_))));
    }
}
