//! Admin product management through the storefront.

#![allow(clippy::unwrap_used)]

use bazaar_core::{ProductId, UserRole};
use bazaar_integration_tests::TestApp;
use bazaar_storefront::db::Catalog;
use bazaar_storefront::storage::InMemoryStorage;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot really an image";

fn fields<'a>(name: &'a str, price: &'a str) -> [(&'a str, &'a str); 5] {
    [
        ("pid", "512"),
        ("name", name),
        ("description", "Holds coffee"),
        ("price", price),
        ("quantity", "4"),
    ]
}

async fn admin_app() -> TestApp {
    let mut app = TestApp::new();
    app.create_user("Keeper", "keeper@shop.test", UserRole::Admin).await;
    app.log_in("keeper@shop.test").await;
    app
}

#[tokio::test]
async fn visitors_are_sent_to_login() {
    let mut app = TestApp::new();
    assert!(app.get("/add_product").await.is_redirect_to("/login"));
    assert!(app.post_form("/remove?id=1", &[]).await.is_redirect_to("/login"));
}

#[tokio::test]
async fn customers_are_forbidden() {
    let mut app = TestApp::new();
    let mug = app.add_product("Mug", "2.00", 5);
    app.create_user("Ada", "ada@shop.test", UserRole::Customer).await;
    app.log_in("ada@shop.test").await;

    assert_eq!(app.get("/add_product").await.status, 403);
    assert_eq!(app.post_form(&format!("/remove?id={mug}"), &[]).await.status, 403);
    assert_eq!(app.catalog.len(), 1);
}

#[tokio::test]
async fn add_form_suggests_a_code() {
    let mut app = admin_app().await;

    let page = app.get("/add_product").await;
    assert_eq!(page.status, 200);
    assert!(page.body.contains("name=\"pid\" value=\""));
    assert!(app.get("/").await.body.contains("Add product"));
}

#[tokio::test]
async fn add_product_uploads_image() {
    let mut app = admin_app().await;

    let resp = app
        .post_multipart("/add_product", &fields("Mug", "9.99"), Some(("img", "My Mug.PNG", PNG)))
        .await;
    assert!(resp.status.is_redirection(), "{resp:?}");
    let location = resp.location.unwrap();
    assert!(location.starts_with("/product/"));

    let objects = app.storage.objects();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].1, "image/png");
    assert_eq!(objects[0].2, PNG.len());

    let id: ProductId = location.trim_start_matches("/product/").parse().unwrap();
    let product = app.catalog.get(id).await.unwrap().unwrap();
    assert_eq!(product.name, "Mug");
    assert_eq!(product.stock, 4);
    assert!(product.image_url.starts_with(InMemoryStorage::BASE_URL));

    let page = app.get(&location).await;
    assert!(page.body.contains("Mug was added"));
}

#[tokio::test]
async fn add_requires_a_valid_image() {
    let mut app = admin_app().await;

    let resp = app.post_multipart("/add_product", &fields("Mug", "9.99"), None).await;
    assert_eq!(resp.status, 422);
    assert!(resp.body.contains("An image is required"));

    let resp = app
        .post_multipart("/add_product", &fields("Mug", "9.99"), Some(("img", "notes.txt", b"hello")))
        .await;
    assert_eq!(resp.status, 422);
    assert!(resp.body.contains("JPG, PNG"));

    app.storage.set_fail(true);
    let resp = app
        .post_multipart("/add_product", &fields("Mug", "9.99"), Some(("img", "mug.png", PNG)))
        .await;
    assert_eq!(resp.status, 422);
    assert!(resp.body.contains("could not be uploaded"));

    assert!(app.catalog.is_empty());
}

#[tokio::test]
async fn add_rejects_bad_fields() {
    let mut app = admin_app().await;

    let resp = app
        .post_multipart("/add_product", &fields("Mug", "-3"), Some(("img", "mug.png", PNG)))
        .await;
    assert_eq!(resp.status, 422);
    assert!(resp.body.contains("non-negative"));
    assert!(app.catalog.is_empty());
    assert!(app.storage.objects().is_empty());
}

#[tokio::test]
async fn edit_keeps_image_unless_replaced() {
    let mut app = admin_app().await;
    let mug = app.add_product("Mug", "2.00", 5);
    let original = app.catalog.get(mug).await.unwrap().unwrap().image_url;

    let page = app.get(&format!("/edit_product?id={mug}")).await;
    assert_eq!(page.status, 200);
    assert!(page.body.contains("2.00"));

    let resp = app
        .post_multipart(&format!("/edit_product?id={mug}"), &fields("Big mug", "12.50"), None)
        .await;
    assert!(resp.is_redirect_to(&format!("/product/{mug}")));
    let product = app.catalog.get(mug).await.unwrap().unwrap();
    assert_eq!(product.name, "Big mug");
    assert_eq!(product.price.to_string(), "12.50");
    assert_eq!(product.image_url, original);

    app.post_multipart(&format!("/edit_product?id={mug}"), &fields("Big mug", "12.50"), Some(("img", "new.jpg", PNG)))
        .await;
    let product = app.catalog.get(mug).await.unwrap().unwrap();
    assert_ne!(product.image_url, original);
    assert_eq!(app.storage.objects()[0].1, "image/jpeg");
}

#[tokio::test]
async fn remove_product() {
    let mut app = admin_app().await;
    let mug = app.add_product("Mug", "2.00", 5);

    let confirm = app.get(&format!("/remove?id={mug}")).await;
    assert_eq!(confirm.status, 200);
    assert!(confirm.body.contains("Remove Mug?"));

    assert!(app.post_form(&format!("/remove?id={mug}"), &[]).await.is_redirect_to("/"));
    assert!(app.catalog.is_empty());
    assert_eq!(app.get(&format!("/product/{mug}")).await.status, 404);
    assert_eq!(app.post_form(&format!("/remove?id={mug}"), &[]).await.status, 404);
}

#[tokio::test]
async fn unknown_products_are_not_found() {
    let mut app = admin_app().await;

    assert_eq!(app.get("/edit_product?id=42").await.status, 404);
    assert_eq!(app.get("/edit_product").await.status, 404);
    assert_eq!(app.get("/remove?id=abc").await.status, 404);
}
