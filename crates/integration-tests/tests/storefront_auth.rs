//! Sign-in, sign-out and route guard tests.
//!
//! Each test spawns its own storefront and mock backend.

use reqwest::StatusCode;

use shopfront_integration_tests::{ADMIN, ALICE, Account, TestContext};

#[tokio::test]
async fn health_endpoints_report_ok() {
    let ctx = TestContext::spawn().await;

    let health = ctx.get("/health").await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body, "ok");

    let ready = ctx.get("/health/ready").await;
    assert_eq!(ready.status, StatusCode::OK);
}

#[tokio::test]
async fn home_page_lists_featured_products() {
    let ctx = TestContext::spawn().await;

    let page = ctx.get("/").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.contains("Ceramic Mug"));
    assert!(page.contains("Sign in"));
}

#[tokio::test]
async fn login_greets_the_user_and_shows_their_links() {
    let ctx = TestContext::spawn().await;

    let page = ctx.login(&ALICE).await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.path, "/");
    assert!(page.contains(&format!("Welcome back, {}!", ALICE.display_name())));
    assert!(page.contains("href=\"/orders\""));

    // The toast is shown once.
    let again = ctx.get("/").await;
    assert!(!again.contains("Welcome back"));
}

#[tokio::test]
async fn wrong_password_rerenders_the_form_with_an_error() {
    let ctx = TestContext::spawn().await;

    let wrong = Account {
        password: "not-the-password",
        ..ALICE
    };
    let page = ctx.login(&wrong).await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.path, "/login");
    assert!(page.contains("Invalid username or password."));
    assert!(page.contains("value=\"alice\""));
    assert!(!page.contains("href=\"/orders\""));
}

#[tokio::test]
async fn guarded_page_sends_guests_to_login_and_back() {
    let ctx = TestContext::spawn().await;

    let page = ctx.get("/orders").await;
    assert_eq!(page.path, "/login");
    assert!(page.query.as_deref().is_some_and(|q| q.contains("next=%2Forders")));

    let page = ctx
        .post_form(
            "/login",
            &[
                ("username", ALICE.username),
                ("password", ALICE.password),
                ("next", "/orders"),
            ],
        )
        .await;
    assert_eq!(page.path, "/orders");
    assert!(page.contains("Your orders"));
}

#[tokio::test]
async fn logout_clears_the_session() {
    let ctx = TestContext::spawn().await;
    ctx.login(&ALICE).await;

    let page = ctx.post_form("/logout", &[]).await;
    assert_eq!(page.path, "/");
    assert!(page.contains("You have been signed out."));

    let page = ctx.get("/orders").await;
    assert_eq!(page.path, "/login");
}

#[tokio::test]
async fn login_page_redirects_signed_in_users() {
    let ctx = TestContext::spawn().await;
    ctx.login(&ALICE).await;

    let page = ctx.get("/login?next=/cart").await;
    assert_eq!(page.path, "/cart");
}

#[tokio::test]
async fn external_next_targets_are_ignored() {
    let ctx = TestContext::spawn().await;

    let page = ctx
        .post_form(
            "/login",
            &[
                ("username", ALICE.username),
                ("password", ALICE.password),
                ("next", "https://evil.example.com/"),
            ],
        )
        .await;
    assert_eq!(page.path, "/");
    assert!(page.contains("Welcome back"));
}

#[tokio::test]
async fn admin_area_requires_the_admin_role() {
    let ctx = TestContext::spawn().await;

    let page = ctx.get("/admin").await;
    assert_eq!(page.path, "/login");

    ctx.login(&ALICE).await;
    let page = ctx.get("/admin").await;
    assert_eq!(page.status, StatusCode::FORBIDDEN);
    assert!(page.contains("Access Denied"));
}

#[tokio::test]
async fn admin_sees_the_dashboard() {
    let ctx = TestContext::spawn().await;
    ctx.login(&ADMIN).await;

    let page = ctx.get("/admin").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.contains("Admin dashboard"));
}

#[tokio::test]
async fn repeated_login_attempts_are_rate_limited() {
    let ctx = TestContext::spawn().await;
    let wrong = Account {
        password: "guess",
        ..ALICE
    };

    let mut limited = false;
    for _ in 0..8 {
        let page = ctx.login(&wrong).await;
        if page.status == StatusCode::TOO_MANY_REQUESTS {
            limited = true;
            break;
        }
    }
    assert!(limited);
}

#[tokio::test]
async fn pages_carry_security_headers() {
    let ctx = TestContext::spawn().await;

    let response = ctx
        .client
        .get(ctx.url("/"))
        .send()
        .await
        .expect("GET / failed");
    let headers = response.headers();
    let csp = headers
        .get("content-security-policy")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(csp.contains("'nonce-"));
    assert_eq!(
        headers.get("x-content-type-options").and_then(|v| v.to_str().ok()),
        Some("nosniff")
    );
    assert!(headers.contains_key("x-request-id"));
}
