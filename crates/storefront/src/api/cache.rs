//! Cache types for catalog responses.

use shopfront_core::ProductId;

use super::types::{Category, Product, ProductPage, ProductQuery, Review};

/// Cache key for catalog reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Product(ProductId),
    Products(ProductQuery),
    Featured,
    Categories,
    Reviews(ProductId),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(ProductPage),
    Featured(Vec<Product>),
    Categories(Vec<Category>),
    Reviews(Vec<Review>),
}
