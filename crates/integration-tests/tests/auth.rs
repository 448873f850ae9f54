//! Account flows: register, log in, log out.

#![allow(clippy::unwrap_used)]

use bazaar_core::UserRole;
use bazaar_integration_tests::{PASSWORD, TestApp};

#[tokio::test]
async fn register_logs_in() {
    let mut app = TestApp::new();

    let resp = app
        .post_form("/register", &[("name", "Ada"), ("email", "ada@shop.test"), ("password", PASSWORD)])
        .await;
    assert!(resp.is_redirect_to("/"));

    let home = app.get("/").await;
    assert!(home.body.contains("Welcome, Ada"));
    assert!(home.body.contains("Log out"));
}

#[tokio::test]
async fn duplicate_email_is_sent_to_login() {
    let mut app = TestApp::new();
    app.create_user("Ada", "ada@shop.test", UserRole::Customer).await;

    let resp = app
        .post_form("/register", &[("name", "Other"), ("email", "ADA@shop.test"), ("password", PASSWORD)])
        .await;
    assert!(resp.is_redirect_to("/login"));
    assert!(app.get("/login").await.body.contains("already exists"));
}

#[tokio::test]
async fn weak_password_is_redisplayed() {
    let mut app = TestApp::new();

    let resp = app
        .post_form("/register", &[("name", "Ada"), ("email", "ada@shop.test"), ("password", "short")])
        .await;
    assert_eq!(resp.status, 422);
    assert!(resp.body.contains("at least 8"));
    assert!(resp.body.contains("ada@shop.test"));
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let mut app = TestApp::new();
    app.create_user("Ada", "ada@shop.test", UserRole::Customer).await;

    let resp = app
        .post_form("/login", &[("email", "ada@shop.test"), ("password", "not the password")])
        .await;
    assert_eq!(resp.status, 401);
    assert!(resp.body.contains("Invalid email or password"));

    let resp = app
        .post_form("/login", &[("email", "nobody@shop.test"), ("password", PASSWORD)])
        .await;
    assert_eq!(resp.status, 401);
}

#[tokio::test]
async fn logout_keeps_cart() {
    let mut app = TestApp::new();
    let mug = app.add_product("Mug", "2.00", 5).to_string();
    app.create_user("Ada", "ada@shop.test", UserRole::Customer).await;

    app.post_form("/add-to-cart", &[("product_id", &mug), ("quantity", "1")])
        .await;
    app.log_in("ada@shop.test").await;
    assert_eq!(app.get("/cart").await.status, 200);

    assert!(app.get("/logout").await.is_redirect_to("/"));
    let home = app.get("/").await;
    assert!(home.body.contains("logged out"));
    assert!(home.body.contains("Log in"));
    assert_eq!(app.get("/cart").await.status, 200);
}
