//! Checkout flows: order placement, hosted payment and confirmation.

#![allow(clippy::unwrap_used)]

use bazaar_core::OrderStatus;
use bazaar_integration_tests::{TestApp, TestResponse, test_config};

const CUSTOMER: [(&str, &str); 5] = [
    ("name", "Ada Shopper"),
    ("city", "Leeds"),
    ("address", "1 Market Row"),
    ("zipcode", "LS1 1AA"),
    ("email", "Ada@Shop.test"),
];

async fn fill_cart(app: &mut TestApp) {
    let mug = app.add_product("Mug", "9.99", 10).to_string();
    let towel = app.add_product("Towel", "5.00", 10).to_string();
    app.post_form("/add-to-cart", &[("product_id", &mug), ("quantity", "2")])
        .await;
    app.post_form("/add-to-cart", &[("product_id", &towel), ("quantity", "1")])
        .await;
}

fn session_id(resp: &TestResponse) -> String {
    resp.location
        .as_deref()
        .and_then(|url| url.rsplit('/').next())
        .unwrap()
        .to_owned()
}

#[tokio::test]
async fn full_checkout_marks_order_paid() {
    let mut app = TestApp::new();
    fill_cart(&mut app).await;

    let info = app.post_form("/information", &[]).await;
    assert_eq!(info.status, 200);
    assert!(info.body.contains("Shipping details"));

    let review = app.post_form("/checkout", &CUSTOMER).await;
    assert_eq!(review.status, 200);
    let orders = app.orders.orders();
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.customer.email, "ada@shop.test");
    assert_eq!(order.line_items.len(), 2);
    assert!(review.body.contains(order.invoice.as_str()));
    assert!(review.body.contains("24.98"));

    // The submitted price is ignored in favor of the stored order total.
    let invoice = order.invoice.to_string();
    let redirect = app
        .post_form("/create-checkout-session", &[("invoice", &invoice), ("price", "0.01")])
        .await;
    assert_eq!(redirect.status, 303);
    assert!(redirect.location.as_deref().unwrap().starts_with("https://checkout.gateway.test/pay/"));
    assert_eq!(app.gateway.created()[0].amount.to_string(), "24.98");
    assert_eq!(app.orders.orders()[0].status, OrderStatus::Pending);

    let id = session_id(&redirect);
    assert!(app.gateway.complete(&id));

    let done = app.get(&format!("/success?session_id={id}")).await;
    assert_eq!(done.status, 200);
    assert!(done.body.contains("Thank you"));
    assert!(done.header("refresh").is_some_and(|r| r.ends_with("url='/'")));
    assert!(done.body.contains("Ada Shopper"));
    assert!(done.body.contains(&invoice));
    assert_eq!(app.orders.orders()[0].status, OrderStatus::Paid);

    // Returning to the page again does not change anything.
    let again = app.get(&format!("/success?session_id={id}")).await;
    assert_eq!(again.status, 200);
    assert_eq!(app.orders.orders()[0].status, OrderStatus::Paid);

    assert!(app.get("/cart").await.is_redirect_to("/"));

    // A resubmitted payment form does not open a second session.
    let resent = app
        .post_form("/create-checkout-session", &[("invoice", &invoice)])
        .await;
    assert!(resent.is_redirect_to("/"));
    assert_eq!(app.gateway.created().len(), 1);
    assert!(app.get("/").await.body.contains("already been paid"));
}

#[tokio::test]
async fn unpaid_return_leaves_order_pending() {
    let mut app = TestApp::new();
    fill_cart(&mut app).await;
    app.post_form("/checkout", &CUSTOMER).await;
    let invoice = app.orders.orders()[0].invoice.to_string();

    let redirect = app
        .post_form("/create-checkout-session", &[("invoice", &invoice)])
        .await;
    let done = app
        .get(&format!("/success?session_id={}", session_id(&redirect)))
        .await;

    assert_eq!(done.status, 200);
    assert!(done.body.contains("Payment pending"));
    assert_eq!(app.orders.orders()[0].status, OrderStatus::Pending);
}

#[tokio::test]
async fn legacy_mode_marks_paid_on_session_create() {
    let mut config = test_config();
    config.mark_paid_on_session_create = true;
    let mut app = TestApp::with_config(config);
    fill_cart(&mut app).await;
    app.post_form("/checkout", &CUSTOMER).await;
    let invoice = app.orders.orders()[0].invoice.to_string();

    app.post_form("/create-checkout-session", &[("invoice", &invoice)])
        .await;
    assert_eq!(app.orders.orders()[0].status, OrderStatus::Paid);
}

#[tokio::test]
async fn checkout_without_cart_goes_home() {
    let mut app = TestApp::new();

    assert!(app.post_form("/information", &[]).await.is_redirect_to("/"));
    assert!(app.post_form("/checkout", &CUSTOMER).await.is_redirect_to("/"));

    // The missing cart wins over a bad form.
    let resp = app.post_form("/checkout", &[("name", "Ada"), ("email", "nope")]).await;
    assert!(resp.is_redirect_to("/"));
    assert!(app.orders.orders().is_empty());
}

#[tokio::test]
async fn empty_but_present_cart_still_orders() {
    let mut app = TestApp::new();
    let mug = app.add_product("Mug", "9.99", 10).to_string();
    app.post_form("/add-to-cart", &[("product_id", &mug), ("quantity", "1")])
        .await;
    app.post_form(&format!("/delete_item/{mug}"), &[]).await;

    let review = app.post_form("/checkout", &CUSTOMER).await;
    assert_eq!(review.status, 200);
    assert!(review.body.contains("0.00"));
    assert_eq!(app.orders.orders().len(), 1);
}

#[tokio::test]
async fn invalid_customer_details_are_redisplayed() {
    let mut app = TestApp::new();
    fill_cart(&mut app).await;

    let resp = app
        .post_form(
            "/checkout",
            &[("name", "Ada"), ("city", ""), ("address", "x"), ("zipcode", "1"), ("email", "ada@shop.test")],
        )
        .await;
    assert_eq!(resp.status, 422);
    assert!(resp.body.contains("city is required"));
    assert!(resp.body.contains("Ada"));
    assert!(app.orders.orders().is_empty());

    let resp = app
        .post_form(
            "/checkout",
            &[("name", "Ada"), ("city", "Leeds"), ("address", "x"), ("zipcode", "1"), ("email", "nope")],
        )
        .await;
    assert_eq!(resp.status, 422);
    assert!(app.orders.orders().is_empty());
}

#[tokio::test]
async fn unknown_invoice_goes_home() {
    let mut app = TestApp::new();

    let resp = app
        .post_form("/create-checkout-session", &[("invoice", "00112233445566778a")])
        .await;
    assert!(resp.is_redirect_to("/"));

    let resp = app
        .post_form("/create-checkout-session", &[("invoice", "garbage")])
        .await;
    assert!(resp.is_redirect_to("/"));

    assert!(app.get("/create-checkout-session").await.is_redirect_to("/"));
    assert!(app.gateway.created().is_empty());
}

#[tokio::test]
async fn gateway_outage_shows_failure_page() {
    let mut app = TestApp::new();
    fill_cart(&mut app).await;
    app.post_form("/checkout", &CUSTOMER).await;
    let invoice = app.orders.orders()[0].invoice.to_string();

    app.gateway.set_fail(true);
    let resp = app
        .post_form("/create-checkout-session", &[("invoice", &invoice)])
        .await;
    assert_eq!(resp.status, 502);
    assert!(resp.body.contains("Something went wrong"));
    assert_eq!(app.orders.orders()[0].status, OrderStatus::Pending);
}

#[tokio::test]
async fn success_with_bad_session_shows_failure_page() {
    let mut app = TestApp::new();

    let resp = app.get("/success").await;
    assert_eq!(resp.status, 502);

    let resp = app.get("/success?session_id=cs_test_404").await;
    assert_eq!(resp.status, 502);
    assert!(resp.body.contains("Something went wrong"));
}

#[tokio::test]
async fn cancel_keeps_cart() {
    let mut app = TestApp::new();
    fill_cart(&mut app).await;

    assert!(app.get("/cancel").await.is_redirect_to("/cart"));
    let page = app.get("/cart").await;
    assert_eq!(page.status, 200);
    assert!(page.body.contains("Payment cancelled"));
}
