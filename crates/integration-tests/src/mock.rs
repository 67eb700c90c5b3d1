//! A mock commerce backend.
//!
//! Serves the subset of the REST API the storefront pages touch, with the
//! same `{success, data, message}` envelopes and camelCase records. State is
//! kept in memory behind a mutex and can be inspected from tests.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// A backend account.
#[derive(Debug, Clone, Copy)]
pub struct Account {
    pub id: i64,
    pub username: &'static str,
    pub password: &'static str,
    pub token: &'static str,
    pub first_name: &'static str,
    pub last_name: &'static str,
    pub role: &'static str,
}

impl Account {
    /// Name the storefront greets the account with.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    fn to_json(self) -> Value {
        json!({
            "id": self.id,
            "username": self.username,
            "email": format!("{}@example.com", self.username),
            "firstName": self.first_name,
            "lastName": self.last_name,
            "role": self.role,
            "isEmailVerified": true,
        })
    }
}

/// A regular customer.
pub const ALICE: Account = Account {
    id: 1,
    username: "alice",
    password: "correct-horse-battery",
    token: "token-alice",
    first_name: "Alice",
    last_name: "Nguyen",
    role: "USER",
};

/// A store administrator.
pub const ADMIN: Account = Account {
    id: 2,
    username: "admin",
    password: "admin-pass-123",
    token: "token-admin",
    first_name: "Binh",
    last_name: "Tran",
    role: "ROLE_ADMIN",
};

static ACCOUNTS: [Account; 2] = [ALICE, ADMIN];

/// Promo code worth ten percent off.
pub const VALID_PROMO: &str = "SAVE10";

/// Flat shipping fee quoted for every address.
pub const SHIPPING_FEE: i64 = 30_000;

/// A catalog product.
#[derive(Debug, Clone, Copy)]
pub struct Product {
    pub id: i64,
    pub name: &'static str,
    pub price: i64,
    pub stock: i64,
}

/// The fixed catalog.
pub const CATALOG: [Product; 3] = [
    Product {
        id: 1,
        name: "Ceramic Mug",
        price: 120_000,
        stock: 10,
    },
    Product {
        id: 2,
        name: "Tea Kettle",
        price: 450_000,
        stock: 3,
    },
    Product {
        id: 3,
        name: "Bamboo Tray",
        price: 90_000,
        stock: 0,
    },
];

fn product(id: i64) -> Option<Product> {
    CATALOG.iter().copied().find(|p| p.id == id)
}

impl Product {
    fn to_json(self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "description": format!("A very good {}.", self.name.to_lowercase()),
            "price": self.price,
            "stockQuantity": self.stock,
            "categoryId": 1,
            "categoryName": "Kitchen",
            "rating": 4.5,
            "reviewCount": 0,
            "images": [],
        })
    }
}

#[derive(Debug, Default)]
struct CartState {
    lines: Vec<Line>,
    promo: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct Line {
    id: i64,
    product_id: i64,
    quantity: u32,
}

#[derive(Debug, Default)]
struct Store {
    carts: HashMap<&'static str, CartState>,
    next_line_id: i64,
    orders: Vec<Value>,
    /// Quantities set through `PUT /cart/items/{id}`, in the order applied.
    applied_updates: Vec<u32>,
    /// Held before applying the next quantity update.
    update_delay: Option<Duration>,
    cart_clears: usize,
}

/// Handle on a running mock backend.
#[derive(Debug, Clone)]
pub struct MockBackend {
    /// Base URL the storefront is configured with.
    pub base_url: String,
    store: Arc<Mutex<Store>>,
}

impl MockBackend {
    /// Bind an ephemeral port and serve the mock API under `/api/`.
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("Listener has no address");

        let mock = Self {
            base_url: format!("http://{addr}/api/"),
            store: Arc::new(Mutex::new(Store {
                next_line_id: 100,
                ..Store::default()
            })),
        };

        let app = Router::new()
            .nest("/api", api_routes())
            .with_state(mock.clone());
        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Mock backend failed");
        });

        mock
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().expect("Mock store poisoned")
    }

    /// `(product id, quantity)` of every line in the account's server cart.
    #[must_use]
    pub fn cart_lines(&self, account: &Account) -> Vec<(i64, u32)> {
        self.store()
            .carts
            .get(account.token)
            .map(|cart| cart.lines.iter().map(|l| (l.product_id, l.quantity)).collect())
            .unwrap_or_default()
    }

    /// Quantities written by line updates, in the order they were applied.
    #[must_use]
    pub fn applied_updates(&self) -> Vec<u32> {
        self.store().applied_updates.clone()
    }

    /// Times `DELETE /cart` was called.
    #[must_use]
    pub fn cart_clears(&self) -> usize {
        self.store().cart_clears
    }

    /// Make the next line update wait before it is applied.
    pub fn delay_next_update(&self, delay: Duration) {
        self.store().update_delay = Some(delay);
    }

    /// Every order placed so far.
    #[must_use]
    pub fn orders(&self) -> Vec<Value> {
        self.store().orders.clone()
    }
}

fn api_routes() -> Router<MockBackend> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/users/profile", get(profile))
        .route("/products", get(products))
        .route("/products/featured", get(featured))
        .route("/products/{id}", get(product_detail))
        .route("/products/{id}/reviews", get(reviews))
        .route("/categories/with-count", get(categories))
        .route("/cart", get(cart).delete(clear_cart))
        .route("/cart/items", post(add_item))
        .route("/cart/items/{id}", put(update_item).delete(remove_item))
        .route("/cart/promo", post(apply_promo).delete(remove_promo))
        .route("/cart/merge", post(merge))
        .route("/cart/validate", post(validate))
        .route("/shipping/provinces", get(provinces))
        .route("/shipping/provinces/{id}/districts", get(districts))
        .route("/shipping/districts/{id}/wards", get(wards))
        .route("/shipping/fee", post(shipping_fee))
        .route("/orders", get(orders).post(create_order))
        .route("/orders/{id}", get(order))
        .route("/admin/dashboard/stats", get(dashboard_stats))
        .fallback(|| async { failure(StatusCode::NOT_FOUND, "Not found") })
}

// =============================================================================
// Envelopes
// =============================================================================

fn ok(data: Value) -> Response {
    Json(json!({"success": true, "data": data})).into_response()
}

fn failure(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"success": false, "message": message}))).into_response()
}

fn unauthorized() -> Response {
    failure(StatusCode::UNAUTHORIZED, "Unauthorized")
}

fn caller(headers: &HeaderMap) -> Option<&'static Account> {
    let token = headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?;
    ACCOUNTS.iter().find(|a| a.token == token)
}

// =============================================================================
// Auth & catalog
// =============================================================================

async fn login(Json(body): Json<Value>) -> Response {
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    ACCOUNTS
        .iter()
        .find(|a| a.username == username && a.password == password)
        .map_or_else(unauthorized, |account| {
            ok(json!({"token": account.token, "user": account.to_json()}))
        })
}

async fn profile(headers: HeaderMap) -> Response {
    caller(&headers).map_or_else(unauthorized, |account| ok(account.to_json()))
}

async fn products() -> Response {
    let content: Vec<Value> = CATALOG.iter().map(|p| p.to_json()).collect();
    ok(json!({
        "content": content,
        "totalElements": CATALOG.len(),
        "totalPages": 1,
        "number": 0,
        "size": 12,
    }))
}

async fn featured() -> Response {
    ok(CATALOG.iter().take(2).map(|p| p.to_json()).collect())
}

async fn product_detail(Path(id): Path<i64>) -> Response {
    product(id).map_or_else(
        || failure(StatusCode::NOT_FOUND, "Product not found"),
        |p| ok(p.to_json()),
    )
}

async fn reviews(Path(_id): Path<i64>) -> Response {
    ok(json!([]))
}

async fn categories() -> Response {
    ok(json!([{"id": 1, "name": "Kitchen", "productCount": CATALOG.len()}]))
}

// =============================================================================
// Cart
// =============================================================================

fn cart_json(cart: &CartState) -> Value {
    let mut items = Vec::new();
    let mut subtotal = 0;
    for line in &cart.lines {
        let Some(p) = product(line.product_id) else {
            continue;
        };
        let line_total = p.price * i64::from(line.quantity);
        subtotal += line_total;
        items.push(json!({
            "id": line.id,
            "productId": p.id,
            "productName": p.name,
            "price": p.price,
            "quantity": line.quantity,
            "stockQuantity": p.stock,
            "subtotal": line_total,
        }));
    }
    let discount = if cart.promo.is_some() { subtotal / 10 } else { 0 };
    json!({
        "id": 1,
        "items": items,
        "subtotal": subtotal,
        "discountAmount": discount,
        "promoCode": cart.promo,
        "totalAmount": subtotal - discount,
    })
}

/// Add units of a product, refusing more than the stock.
fn add_units(store: &mut Store, token: &'static str, product_id: i64, quantity: u32) -> Result<(), Response> {
    let Some(p) = product(product_id) else {
        return Err(failure(StatusCode::NOT_FOUND, "Product not found"));
    };
    let next_id = store.next_line_id;
    let cart = store.carts.entry(token).or_default();
    let existing = cart
        .lines
        .iter()
        .find(|l| l.product_id == product_id)
        .map_or(0, |l| l.quantity);
    if i64::from(existing + quantity) > p.stock {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            &format!("Only {} of {} left in stock", p.stock, p.name),
        ));
    }
    if let Some(line) = cart.lines.iter_mut().find(|l| l.product_id == product_id) {
        line.quantity += quantity;
    } else {
        cart.lines.push(Line {
            id: next_id,
            product_id,
            quantity,
        });
        store.next_line_id += 1;
    }
    Ok(())
}

async fn cart(State(mock): State<MockBackend>, headers: HeaderMap) -> Response {
    let Some(account) = caller(&headers) else {
        return unauthorized();
    };
    let mut store = mock.store();
    ok(cart_json(store.carts.entry(account.token).or_default()))
}

async fn clear_cart(State(mock): State<MockBackend>, headers: HeaderMap) -> Response {
    let Some(account) = caller(&headers) else {
        return unauthorized();
    };
    let mut store = mock.store();
    store.cart_clears += 1;
    let cart = store.carts.entry(account.token).or_default();
    *cart = CartState::default();
    ok(cart_json(cart))
}

async fn add_item(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let Some(account) = caller(&headers) else {
        return unauthorized();
    };
    let product_id = body["productId"].as_i64().unwrap_or_default();
    let quantity = body["quantity"]
        .as_u64()
        .and_then(|q| u32::try_from(q).ok())
        .unwrap_or(1);

    let mut store = mock.store();
    if let Err(response) = add_units(&mut store, account.token, product_id, quantity) {
        return response;
    }
    ok(cart_json(store.carts.entry(account.token).or_default()))
}

async fn update_item(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    let Some(account) = caller(&headers) else {
        return unauthorized();
    };
    let quantity = body["quantity"]
        .as_u64()
        .and_then(|q| u32::try_from(q).ok())
        .unwrap_or_default();

    let delay = mock.store().update_delay.take();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let mut store = mock.store();
    store.applied_updates.push(quantity);
    let cart = store.carts.entry(account.token).or_default();
    let Some(line) = cart.lines.iter_mut().find(|l| l.id == id) else {
        return failure(StatusCode::NOT_FOUND, "Cart item not found");
    };
    if product(line.product_id).is_some_and(|p| i64::from(quantity) > p.stock) {
        return failure(StatusCode::BAD_REQUEST, "Not enough stock");
    }
    line.quantity = quantity;
    cart.lines.retain(|l| l.quantity > 0);
    ok(cart_json(cart))
}

async fn remove_item(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    let Some(account) = caller(&headers) else {
        return unauthorized();
    };
    let mut store = mock.store();
    let cart = store.carts.entry(account.token).or_default();
    cart.lines.retain(|l| l.id != id);
    ok(cart_json(cart))
}

async fn apply_promo(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let Some(account) = caller(&headers) else {
        return unauthorized();
    };
    let code = body["code"].as_str().unwrap_or_default().trim().to_uppercase();
    if code != VALID_PROMO {
        return failure(StatusCode::BAD_REQUEST, "Invalid promo code");
    }
    let mut store = mock.store();
    let cart = store.carts.entry(account.token).or_default();
    cart.promo = Some(code);
    ok(cart_json(cart))
}

async fn remove_promo(State(mock): State<MockBackend>, headers: HeaderMap) -> Response {
    let Some(account) = caller(&headers) else {
        return unauthorized();
    };
    let mut store = mock.store();
    let cart = store.carts.entry(account.token).or_default();
    cart.promo = None;
    ok(cart_json(cart))
}

async fn merge(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let Some(account) = caller(&headers) else {
        return unauthorized();
    };
    let mut store = mock.store();
    for line in body["items"].as_array().into_iter().flatten() {
        let product_id = line["productId"].as_i64().unwrap_or_default();
        let quantity = line["quantity"]
            .as_u64()
            .and_then(|q| u32::try_from(q).ok())
            .unwrap_or_default();
        // Lines beyond the stock are dropped.
        let _ = add_units(&mut store, account.token, product_id, quantity);
    }
    ok(cart_json(store.carts.entry(account.token).or_default()))
}

async fn validate(State(mock): State<MockBackend>, headers: HeaderMap) -> Response {
    let Some(account) = caller(&headers) else {
        return unauthorized();
    };
    let store = mock.store();
    let issues: Vec<Value> = store
        .carts
        .get(account.token)
        .into_iter()
        .flat_map(|cart| cart.lines.iter())
        .filter_map(|line| {
            let p = product(line.product_id)?;
            (i64::from(line.quantity) > p.stock).then(|| {
                json!({
                    "productId": p.id,
                    "productName": p.name,
                    "requested": line.quantity,
                    "available": p.stock,
                })
            })
        })
        .collect();
    ok(json!({"valid": issues.is_empty(), "issues": issues}))
}

// =============================================================================
// Shipping & orders
// =============================================================================

async fn provinces() -> Response {
    ok(json!([{"id": 1, "name": "Ha Noi"}, {"id": 79, "name": "Ho Chi Minh"}]))
}

async fn districts(Path(province_id): Path<i64>) -> Response {
    ok(json!([{"id": province_id * 100 + 1, "name": "Hoan Kiem"}]))
}

async fn wards(Path(district_id): Path<i64>) -> Response {
    ok(json!([{"code": format!("{district_id}-01"), "name": "Hang Trong"}]))
}

async fn shipping_fee(Json(_body): Json<Value>) -> Response {
    ok(json!({"fee": SHIPPING_FEE, "estimatedDays": 3}))
}

async fn create_order(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let Some(account) = caller(&headers) else {
        return unauthorized();
    };
    let mut store = mock.store();
    let totals = match store.carts.get(account.token) {
        Some(cart) if !cart.lines.is_empty() => cart_json(cart),
        _ => return failure(StatusCode::BAD_REQUEST, "Cart is empty"),
    };
    let id = 1001 + i64::try_from(store.orders.len()).unwrap_or_default();
    let order = json!({
        "id": id,
        "orderNumber": format!("SF-{id}"),
        "status": "PENDING",
        "items": totals["items"],
        "subtotal": totals["subtotal"],
        "discountAmount": totals["discountAmount"],
        "shippingFee": SHIPPING_FEE,
        "totalAmount": totals["totalAmount"].as_i64().unwrap_or_default() + SHIPPING_FEE,
        "paymentMethod": body["paymentMethod"],
        "shippingAddress": body["shippingAddress"],
        "createdAt": "2026-01-15T09:30:00",
        "username": account.username,
    });
    store.orders.push(order.clone());
    ok(order)
}

async fn orders(State(mock): State<MockBackend>, headers: HeaderMap) -> Response {
    let Some(account) = caller(&headers) else {
        return unauthorized();
    };
    let store = mock.store();
    let mine: Vec<Value> = store
        .orders
        .iter()
        .filter(|o| o["username"] == account.username)
        .cloned()
        .collect();
    ok(Value::Array(mine))
}

async fn order(
    State(mock): State<MockBackend>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    let Some(account) = caller(&headers) else {
        return unauthorized();
    };
    let store = mock.store();
    store
        .orders
        .iter()
        .find(|o| o["id"] == id && o["username"] == account.username)
        .map_or_else(
            || failure(StatusCode::NOT_FOUND, "Order not found"),
            |o| ok(o.clone()),
        )
}

async fn dashboard_stats(State(mock): State<MockBackend>, headers: HeaderMap) -> Response {
    let Some(account) = caller(&headers) else {
        return unauthorized();
    };
    if !account.role.ends_with("ADMIN") {
        return failure(StatusCode::FORBIDDEN, "Forbidden");
    }
    let store = mock.store();
    ok(json!({
        "totalUsers": ACCOUNTS.len(),
        "totalOrders": store.orders.len(),
        "totalProducts": CATALOG.len(),
        "totalRevenue": 0,
        "pendingOrders": store.orders.len(),
        "lowStockProducts": 2,
    }))
}
