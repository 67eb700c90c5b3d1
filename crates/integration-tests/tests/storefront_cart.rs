//! Cart, promo code and checkout tests.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use shopfront_integration_tests::mock::VALID_PROMO;
use shopfront_integration_tests::{ALICE, TestContext};

#[tokio::test]
async fn adding_to_the_cart_updates_the_badge() {
    let ctx = TestContext::spawn().await;
    ctx.login(&ALICE).await;

    let page = ctx.add_to_cart(1, 2).await;
    assert_eq!(page.path, "/cart");
    assert!(page.contains("Added to your cart."));
    assert!(page.contains("Ceramic Mug"));
    assert!(page.contains(r#"id="cart-badge">2<"#));
    assert_eq!(ctx.backend.cart_lines(&ALICE), vec![(1, 2)]);

    let status: Value = ctx
        .client
        .get(ctx.url("/api/cart/status"))
        .send()
        .await
        .expect("GET /api/cart/status failed")
        .json()
        .await
        .expect("Cart status is not JSON");
    assert_eq!(status["count"], 2);
    assert_eq!(status["busy"], false);
}

#[tokio::test]
async fn overlapping_quantity_updates_reach_the_backend_in_order() {
    let ctx = TestContext::spawn().await;
    ctx.login(&ALICE).await;
    ctx.add_to_cart(1, 1).await;
    let item_id = "100";

    ctx.backend.delay_next_update(Duration::from_millis(400));
    let first_form = [("item_id", item_id), ("quantity", "2")];
    let first = ctx.post_form("/cart/update", &first_form);
    let second = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        ctx.post_form("/cart/update", &[("item_id", item_id), ("quantity", "5")])
            .await
    };
    let (_, later) = tokio::join!(first, second);

    assert_eq!(ctx.backend.applied_updates(), vec![2, 5]);
    assert_eq!(ctx.backend.cart_lines(&ALICE), vec![(1, 5)]);
    assert!(later.contains(r#"id="cart-badge">5<"#));

    let status: Value = ctx
        .client
        .get(ctx.url("/api/cart/status"))
        .send()
        .await
        .expect("GET /api/cart/status failed")
        .json()
        .await
        .expect("Cart status is not JSON");
    assert_eq!(status["count"], 5);
    assert_eq!(status["busy"], false);
}

#[tokio::test]
async fn adding_beyond_the_stock_shows_the_backend_message() {
    let ctx = TestContext::spawn().await;
    ctx.login(&ALICE).await;

    let page = ctx.add_to_cart(2, 5).await;
    assert!(page.contains("Only 3 of Tea Kettle left in stock"));
    assert!(ctx.backend.cart_lines(&ALICE).is_empty());
}

#[tokio::test]
async fn guest_cart_is_merged_on_login() {
    let ctx = TestContext::spawn().await;

    let page = ctx.add_to_cart(2, 1).await;
    assert_eq!(page.path, "/cart");
    assert!(page.contains("Tea Kettle"));
    assert!(page.contains("available once you sign in"));
    assert!(ctx.backend.cart_lines(&ALICE).is_empty());

    ctx.login(&ALICE).await;
    assert_eq!(ctx.backend.cart_lines(&ALICE), vec![(2, 1)]);

    let page = ctx.get("/cart").await;
    assert!(page.contains("Tea Kettle"));
    assert!(!page.contains("available once you sign in"));
}

#[tokio::test]
async fn invalid_promo_code_is_reported_and_valid_one_applied() {
    let ctx = TestContext::spawn().await;
    ctx.login(&ALICE).await;
    ctx.add_to_cart(1, 1).await;

    let page = ctx.post_form("/cart/promo", &[("code", "BOGUS")]).await;
    assert_eq!(page.path, "/cart");
    assert!(page.contains("Invalid promo code"));
    assert!(!page.contains(VALID_PROMO));

    let page = ctx.post_form("/cart/promo", &[("code", VALID_PROMO)]).await;
    assert!(page.contains("Promo code applied."));
    assert!(page.contains(VALID_PROMO));
}

#[tokio::test]
async fn clearing_the_cart_empties_it_on_the_backend() {
    let ctx = TestContext::spawn().await;
    ctx.login(&ALICE).await;
    ctx.add_to_cart(1, 3).await;

    let page = ctx.post_form("/cart/clear", &[]).await;
    assert_eq!(page.path, "/cart");
    assert!(!page.contains("id=\"cart-badge\""));
    assert!(ctx.backend.cart_lines(&ALICE).is_empty());
}

#[tokio::test]
async fn checkout_requires_sign_in() {
    let ctx = TestContext::spawn().await;

    let page = ctx.get("/checkout").await;
    assert_eq!(page.path, "/login");
}

#[tokio::test]
async fn checkout_with_an_empty_cart_stays_on_review() {
    let ctx = TestContext::spawn().await;
    ctx.login(&ALICE).await;

    let page = ctx.post_form("/checkout/review", &[]).await;
    assert_eq!(page.path, "/checkout");
    assert!(page.contains("Your cart is empty."));
    assert!(!page.contains("action=\"/checkout/shipping\""));
}

#[tokio::test]
async fn shipping_step_reports_field_errors() {
    let ctx = TestContext::spawn().await;
    ctx.login(&ALICE).await;
    ctx.add_to_cart(1, 1).await;

    let page = ctx.post_form("/checkout/review", &[]).await;
    assert!(page.contains("action=\"/checkout/shipping\""));

    let page = ctx
        .post_form(
            "/checkout/shipping",
            &[
                ("full_name", ""),
                ("phone", "12"),
                ("address_line", "12 Hang Bai"),
                ("province_id", "1"),
                ("district_id", ""),
                ("ward_code", ""),
            ],
        )
        .await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.contains("Full name is required"));
    assert!(page.contains("Enter a phone number of 9 to 15 digits"));
    assert!(page.contains("District is required"));
    assert!(page.contains("value=\"12 Hang Bai\""));
    assert!(page.contains("action=\"/checkout/shipping\""));
}

#[tokio::test]
async fn full_checkout_places_an_order() {
    let ctx = TestContext::spawn().await;
    ctx.login(&ALICE).await;
    ctx.add_to_cart(1, 2).await;

    ctx.post_form("/checkout/review", &[]).await;
    let page = ctx
        .post_form(
            "/checkout/shipping",
            &[
                ("full_name", "Alice Nguyen"),
                ("phone", "0912345678"),
                ("email", ""),
                ("address_line", "12 Hang Bai"),
                ("province_id", "1"),
                ("district_id", "101"),
                ("ward_code", "101-01"),
                ("note", "Leave at the door"),
            ],
        )
        .await;
    assert!(page.contains("action=\"/checkout/payment\""));

    let page = ctx
        .post_form("/checkout/payment", &[("payment_method", "COD")])
        .await;
    assert!(page.contains("action=\"/checkout/confirm\""));

    let page = ctx.post_form("/checkout/confirm", &[]).await;
    assert_eq!(page.path, "/checkout");
    assert!(page.contains("Order SF-1001 placed."));
    assert!(page.contains("Thank you!"));
    assert!(!page.contains("id=\"cart-badge\""));

    let orders = ctx.backend.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["shippingAddress"]["provinceName"], "Ha Noi");
    assert_eq!(ctx.backend.cart_clears(), 1);
    assert!(ctx.backend.cart_lines(&ALICE).is_empty());

    let page = ctx.get("/cart").await;
    assert!(!page.contains("Ceramic Mug"));

    let page = ctx.get("/orders").await;
    assert!(page.contains("SF-1001"));
}

#[tokio::test]
async fn shipping_lookups_are_served_as_json() {
    let ctx = TestContext::spawn().await;

    let districts: Value = ctx
        .client
        .get(ctx.url("/api/shipping/provinces/79/districts"))
        .send()
        .await
        .expect("GET districts failed")
        .json()
        .await
        .expect("Districts are not JSON");
    assert_eq!(districts[0]["id"], 7901);
    assert_eq!(districts[0]["name"], "Hoan Kiem");
}
