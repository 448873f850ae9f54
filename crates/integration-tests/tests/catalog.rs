//! Catalog browsing, search and probes.

#![allow(clippy::unwrap_used)]

use bazaar_integration_tests::TestApp;

fn position(body: &str, needle: &str) -> usize {
    body.find(needle).unwrap()
}

#[tokio::test]
async fn listing_paginates() {
    let mut app = TestApp::new();
    for i in 0..10 {
        app.add_product(&format!("Item{i}"), "1.00", 3);
    }

    let first = app.get("/").await;
    assert_eq!(first.status, 200);
    assert!(first.body.contains("Page 1 of 2"));
    assert!(first.body.contains("Item0"));
    assert!(!first.body.contains("Item9"));

    let second = app.get("/?page=2").await;
    assert!(second.body.contains("Page 2 of 2"));
    assert!(second.body.contains("Item9"));

    let small = app.get("/?per_page=5&page=2").await;
    assert!(small.body.contains("Page 2 of 2"));
    assert!(small.body.contains("Item5"));

    let junk = app.get("/?page=abc").await;
    assert_eq!(junk.status, 200);
    assert!(junk.body.contains("Page 1 of 2"));
}

#[tokio::test]
async fn listing_sorts() {
    let mut app = TestApp::new();
    app.add_product("Lantern", "10.00", 2);
    app.add_product("Chandelier", "50.00", 9);
    app.add_product("Pebble", "1.00", 0);

    let by_stock = app.get("/").await.body;
    assert!(position(&by_stock, "Chandelier") < position(&by_stock, "Lantern"));
    assert!(position(&by_stock, "Lantern") < position(&by_stock, "Pebble"));

    let cheapest = app.get("/?sort=Price%3A+Low+to+High").await.body;
    assert!(position(&cheapest, "Pebble") < position(&cheapest, "Lantern"));
    assert!(position(&cheapest, "Lantern") < position(&cheapest, "Chandelier"));

    let newest = app.get("/?sort=Newest+Arrivals").await.body;
    assert!(position(&newest, "Pebble") < position(&newest, "Chandelier"));

    let sold_out = app.get("/?sort=Out+of+Stock").await.body;
    assert!(sold_out.contains("Pebble"));
    assert!(!sold_out.contains("Lantern"));
    assert!(!sold_out.contains("Chandelier"));
}

#[tokio::test]
async fn search_matches_case_insensitively() {
    let mut app = TestApp::new();
    app.add_product("Lantern", "10.00", 2);
    app.add_product("Pebble", "1.00", 0);

    let found = app.get("/result?q=LANT").await;
    assert_eq!(found.status, 200);
    assert!(found.body.contains("Lantern"));
    assert!(!found.body.contains("Pebble"));

    let nothing = app.get("/result?q=").await;
    assert!(nothing.body.contains("Nothing matched"));

    let missing = app.get("/result").await;
    assert!(missing.body.contains("Nothing matched"));
}

#[tokio::test]
async fn product_detail() {
    let mut app = TestApp::new();
    let lantern = app.add_product("Lantern", "10.00", 2);
    let pebble = app.add_product("Pebble", "1.00", 0);

    let page = app.get(&format!("/product/{lantern}")).await;
    assert_eq!(page.status, 200);
    assert!(page.body.contains("A fine Lantern"));
    assert!(page.body.contains("2 in stock"));

    let sold_out = app.get(&format!("/product/{pebble}")).await;
    assert!(sold_out.body.contains("Out of stock"));

    assert_eq!(app.get("/product/999").await.status, 404);
    assert_eq!(app.get("/product/abc").await.status, 404);
}

#[tokio::test]
async fn probes_and_static_files() {
    let mut app = TestApp::new();

    let health = app.get("/health").await;
    assert_eq!(health.status, 200);
    assert_eq!(health.body, "ok");
    assert_eq!(app.get("/health/ready").await.status, 200);
    assert_eq!(app.get("/static/css/main.css").await.status, 200);
}
