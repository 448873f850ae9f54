//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                  - Liveness check
//! GET  /health/ready            - Readiness check (database)
//!
//! # Catalog
//! GET|POST /?page=&per_page=&sort= - Product listing
//! GET  /result?q=               - Keyword search
//! GET  /product/{id}            - Product detail
//!
//! # Cart
//! POST /add-to-cart             - Add a product
//! GET|POST /cart                - Cart page
//! POST /update_cart/{id}        - Change a line's quantity
//! POST /delete_item/{id}        - Remove a line
//! GET  /clearcart               - Drop the cart
//!
//! # Checkout
//! POST /information             - Customer details form
//! POST /checkout                - Create the order
//! GET|POST /create-checkout-session - Redirect to the hosted payment page
//! GET  /success?session_id=     - Payment return page
//! GET  /cancel                  - Payment cancelled
//!
//! # Auth
//! GET|POST /register            - Create an account
//! GET|POST /login               - Log in
//! GET  /logout                  - Log out
//!
//! # Admin (requires admin policy)
//! GET|POST /add_product         - Create a product
//! GET|POST /edit_product?id=    - Edit a product
//! GET|POST /remove?id=          - Delete a product
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod health;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderMap, header},
    routing::{get, post},
};
use tower_sessions::Session;

use crate::middleware::{load_cart, take_notices};
use crate::models::{CurrentUser, Notice, session_keys};
use crate::state::AppState;

/// Largest accepted admin form, image included.
const ADMIN_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Data every full page needs: header, account links and notices.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub notices: Vec<Notice>,
    pub user: Option<CurrentUser>,
    pub is_admin: bool,
    pub cart_count: u64,
}

impl Layout {
    /// Gather layout data, draining queued notices.
    pub async fn load(state: &AppState, session: &Session) -> Self {
        let user = session
            .get::<CurrentUser>(session_keys::CURRENT_USER)
            .await
            .ok()
            .flatten();
        let cart_count = load_cart(session)
            .await
            .ok()
            .flatten()
            .map_or(0, |cart| cart.item_count());

        Self {
            notices: take_notices(session).await,
            is_admin: user.as_ref().is_some_and(|u| state.is_admin(u)),
            user,
            cart_count,
        }
    }

    /// Add a notice for the page being rendered now.
    #[must_use]
    pub fn with_notice(mut self, notice: Notice) -> Self {
        self.notices.push(notice);
        self
    }
}

/// Where to send the visitor back to: the `Referer` if it points into this
/// site, `fallback` otherwise.
pub fn back_to(headers: &HeaderMap, base_url: &str, fallback: &str) -> String {
    let Some(referer) = headers.get(header::REFERER).and_then(|v| v.to_str().ok()) else {
        return fallback.to_owned();
    };

    let path = referer.strip_prefix(base_url).unwrap_or(referer);
    if path.is_empty() {
        return "/".to_owned();
    }
    if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') {
        return path.to_owned();
    }
    fallback.to_owned()
}

/// Catalog routes.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalog::index).post(catalog::index))
        .route("/result", get(catalog::result))
        .route("/product/{id}", get(catalog::show))
}

/// Cart routes.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/add-to-cart", post(cart::add))
        .route("/cart", get(cart::show).post(cart::show))
        .route("/update_cart/{product_id}", post(cart::update))
        .route("/delete_item/{product_id}", post(cart::remove))
        .route("/clearcart", get(cart::clear))
}

/// Checkout routes.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/information", post(checkout::information))
        .route("/checkout", post(checkout::checkout))
        .route(
            "/create-checkout-session",
            get(checkout::create_session).post(checkout::create_session),
        )
        .route("/success", get(checkout::success))
        .route("/cancel", get(checkout::cancel))
}

/// Auth routes.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", get(auth::logout))
}

/// Admin product routes.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/add_product", get(admin::add_page).post(admin::add))
        .route("/edit_product", get(admin::edit_page).post(admin::edit))
        .route("/remove", get(admin::remove_page).post(admin::remove))
        .layer(DefaultBodyLimit::max(ADMIN_BODY_LIMIT))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .merge(catalog_routes())
        .merge(cart_routes())
        .merge(checkout_routes())
        .merge(auth_routes())
        .merge(admin_routes())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn with_referer(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static("")));
        headers
    }

    #[test]
    fn test_back_to_same_site() {
        let base = "https://shop.test";
        assert_eq!(back_to(&with_referer("https://shop.test/product/3"), base, "/"), "/product/3");
        assert_eq!(back_to(&with_referer("https://shop.test"), base, "/cart"), "/");
        assert_eq!(back_to(&with_referer("/?page=2"), base, "/"), "/?page=2");
    }

    #[test]
    fn test_back_to_rejects_foreign_referers() {
        let base = "https://shop.test";
        assert_eq!(back_to(&with_referer("https://evil.test/phish"), base, "/"), "/");
        assert_eq!(back_to(&with_referer("//evil.test"), base, "/cart"), "/cart");
        assert_eq!(back_to(&HeaderMap::new(), base, "/cart"), "/cart");
    }
}
