//! Demo catalog served when degraded mode is on and the backend is down.
//!
//! Only used by catalog reads; see [`super::Backend::get_products`].

use rust_decimal::Decimal;
use shopfront_core::{CategoryId, ProductId};

use super::types::{Category, Product, ProductPage, ProductQuery};

const DEFAULT_PAGE_SIZE: u32 = 12;

struct DemoProduct {
    id: i64,
    name: &'static str,
    description: &'static str,
    price: i64,
    original_price: Option<i64>,
    stock: i64,
    category: i64,
    brand: &'static str,
    rating: f64,
}

const CATEGORIES: [(i64, &str, &str); 4] = [
    (1, "Electronics", "Phones, audio and accessories"),
    (2, "Home & Kitchen", "Everyday things for the house"),
    (3, "Fashion", "Clothing, bags and shoes"),
    (4, "Books", "Fiction, non-fiction and textbooks"),
];

const PRODUCTS: [DemoProduct; 8] = [
    DemoProduct {
        id: 1,
        name: "Wireless Earbuds",
        description: "Bluetooth 5.3 earbuds with a charging case.",
        price: 890_000,
        original_price: Some(1_190_000),
        stock: 42,
        category: 1,
        brand: "Soundly",
        rating: 4.5,
    },
    DemoProduct {
        id: 2,
        name: "USB-C Charger 65W",
        description: "Compact GaN charger for laptops and phones.",
        price: 550_000,
        original_price: None,
        stock: 120,
        category: 1,
        brand: "Voltix",
        rating: 4.7,
    },
    DemoProduct {
        id: 3,
        name: "Electric Kettle 1.7L",
        description: "Stainless steel kettle with auto shut-off.",
        price: 420_000,
        original_price: Some(490_000),
        stock: 18,
        category: 2,
        brand: "Homely",
        rating: 4.3,
    },
    DemoProduct {
        id: 4,
        name: "Ceramic Mug Set",
        description: "Four hand-glazed mugs, 350ml each.",
        price: 260_000,
        original_price: None,
        stock: 0,
        category: 2,
        brand: "Homely",
        rating: 4.1,
    },
    DemoProduct {
        id: 5,
        name: "Linen Shirt",
        description: "Breathable linen shirt, relaxed fit.",
        price: 380_000,
        original_price: None,
        stock: 35,
        category: 3,
        brand: "Saigon Thread",
        rating: 4.0,
    },
    DemoProduct {
        id: 6,
        name: "Canvas Backpack",
        description: "Water resistant 20L backpack with laptop sleeve.",
        price: 640_000,
        original_price: Some(720_000),
        stock: 9,
        category: 3,
        brand: "Trailmark",
        rating: 4.6,
    },
    DemoProduct {
        id: 7,
        name: "The Pragmatic Programmer",
        description: "20th anniversary edition.",
        price: 310_000,
        original_price: None,
        stock: 25,
        category: 4,
        brand: "Addison-Wesley",
        rating: 4.8,
    },
    DemoProduct {
        id: 8,
        name: "Vietnamese Home Cooking",
        description: "Recipes from a family kitchen.",
        price: 275_000,
        original_price: None,
        stock: 14,
        category: 4,
        brand: "Ten Speed",
        rating: 4.4,
    },
];

fn to_product(demo: &DemoProduct) -> Product {
    let category = CATEGORIES
        .iter()
        .find(|(id, _, _)| *id == demo.category)
        .map(|(_, name, _)| (*name).to_string());
    Product {
        id: ProductId::new(demo.id),
        name: demo.name.to_string(),
        description: Some(demo.description.to_string()),
        price: Decimal::from(demo.price),
        original_price: demo.original_price.map(Decimal::from),
        stock_quantity: demo.stock,
        category_id: Some(CategoryId::new(demo.category)),
        category,
        brand: Some(demo.brand.to_string()),
        rating: Some(demo.rating),
        review_count: 0,
        images: Vec::new(),
        image_url: None,
    }
}

/// All demo categories with their product counts.
#[must_use]
pub fn categories() -> Vec<Category> {
    CATEGORIES
        .iter()
        .map(|(id, name, description)| Category {
            id: CategoryId::new(*id),
            name: (*name).to_string(),
            description: Some((*description).to_string()),
            product_count: PRODUCTS.iter().filter(|p| p.category == *id).count() as i64,
        })
        .collect()
}

/// One demo product, if the id exists.
#[must_use]
pub fn product(id: ProductId) -> Option<Product> {
    PRODUCTS
        .iter()
        .find(|p| p.id == id.as_i64())
        .map(to_product)
}

/// The four best rated demo products.
#[must_use]
pub fn featured() -> Vec<Product> {
    let mut products: Vec<Product> = PRODUCTS.iter().map(to_product).collect();
    products.sort_by(|a, b| b.rating.unwrap_or(0.0).total_cmp(&a.rating.unwrap_or(0.0)));
    products.truncate(4);
    products
}

/// Demo products filtered, sorted and paginated like the backend listing.
#[must_use]
pub fn product_page(query: &ProductQuery) -> ProductPage {
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut matches: Vec<Product> = PRODUCTS
        .iter()
        .map(to_product)
        .filter(|p| query.category_id.is_none_or(|c| p.category_id == Some(c)))
        .filter(|p| {
            query
                .brand
                .as_deref()
                .is_none_or(|b| p.brand.as_deref().is_some_and(|pb| pb.eq_ignore_ascii_case(b)))
        })
        .filter(|p| query.min_price.is_none_or(|min| p.price >= min))
        .filter(|p| query.max_price.is_none_or(|max| p.price <= max))
        .filter(|p| {
            search
                .as_deref()
                .is_none_or(|s| p.name.to_lowercase().contains(s))
        })
        .collect();

    match query.sort.as_deref() {
        Some("price_asc") => matches.sort_by(|a, b| a.price.cmp(&b.price)),
        Some("price_desc") => matches.sort_by(|a, b| b.price.cmp(&a.price)),
        Some("name") => matches.sort_by(|a, b| a.name.cmp(&b.name)),
        Some("rating") => {
            matches.sort_by(|a, b| b.rating.unwrap_or(0.0).total_cmp(&a.rating.unwrap_or(0.0)));
        }
        _ => {}
    }

    let size = query.size.filter(|s| *s > 0).unwrap_or(DEFAULT_PAGE_SIZE);
    let number = query.page.unwrap_or(0);
    let total = matches.len();
    let content = matches
        .into_iter()
        .skip(number as usize * size as usize)
        .take(size as usize)
        .collect();

    ProductPage {
        content,
        total_elements: total as i64,
        total_pages: total.div_ceil(size as usize) as u32,
        number,
        size,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn category_counts_match_products() {
        let total: i64 = categories().iter().map(|c| c.product_count).sum();
        assert_eq!(total, PRODUCTS.len() as i64);
    }

    #[test]
    fn listing_filters_and_paginates() {
        let page = product_page(&ProductQuery {
            category_id: Some(CategoryId::new(2)),
            ..ProductQuery::default()
        });
        assert_eq!(page.total_elements, 2);
        assert!(page.content.iter().all(|p| p.category_id == Some(CategoryId::new(2))));

        let page = product_page(&ProductQuery {
            size: Some(3),
            page: Some(2),
            ..ProductQuery::default()
        });
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.content.len(), 2);
    }

    #[test]
    fn listing_sorts_by_price() {
        let page = product_page(&ProductQuery {
            sort: Some("price_asc".into()),
            ..ProductQuery::default()
        });
        let prices: Vec<_> = page.content.iter().map(|p| p.price).collect();
        let mut sorted = prices.clone();
        sorted.sort();
        assert_eq!(prices, sorted);
    }

    #[test]
    fn search_is_case_insensitive() {
        let page = product_page(&ProductQuery {
            search: Some("KETTLE".into()),
            ..ProductQuery::default()
        });
        assert_eq!(page.content.len(), 1);
        assert_eq!(page.content[0].id, ProductId::new(3));
    }

    #[test]
    fn unknown_product_is_none() {
        assert!(product(ProductId::new(999)).is_none());
        assert_eq!(featured().len(), 4);
    }
}
