//! Test harness for the Bazaar storefront.
//!
//! [`TestApp`] builds the real router over in-memory backends and a
//! `MemoryStore` session store, then drives it with `tower::ServiceExt`.
//! The session cookie is carried between requests, so a test reads like a
//! single visitor clicking through the site.
//!
//! ```rust,ignore
//! let mut app = TestApp::new();
//! let mug = app.add_product("Mug", "9.99", 5);
//! let resp = app.post_form("/add-to-cart", &[("product_id", &mug.to_string()), ("quantity", "2")]).await;
//! assert!(resp.is_redirect_to("/"));
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use secrecy::SecretString;
use tower::ServiceExt;
use tower_sessions::{MemoryStore, SessionStore, session::Id};

use bazaar_core::{Email, ProductId, UserRole};
use bazaar_storefront::config::{
    DEFAULT_B2_API_BASE, DEFAULT_STRIPE_API_BASE, StorageConfig, StorefrontConfig, StripeConfig,
};
use bazaar_storefront::db::UserStore;
use bazaar_storefront::db::memory::{InMemoryCatalog, InMemoryOrderStore, InMemoryUserStore};
use bazaar_storefront::models::{Product, ProductDraft};
use bazaar_storefront::payments::{InMemoryPaymentGateway, Payer};
use bazaar_storefront::services::auth::hash_password;
use bazaar_storefront::state::{AppState, Backends};
use bazaar_storefront::storage::InMemoryStorage;

/// Public URL the test storefront believes it runs at.
pub const BASE_URL: &str = "http://shop.test";

/// Password given to accounts created with [`TestApp::create_user`].
pub const PASSWORD: &str = "correct horse battery";

/// A response with its body read into memory.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// A response header as text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether this is a redirect to `path`.
    #[must_use]
    pub fn is_redirect_to(&self, path: &str) -> bool {
        self.status.is_redirection() && self.location.as_deref() == Some(path)
    }
}

/// Configuration for tests. Nothing in it reaches the network.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://unused@localhost/unused"),
        host: [127, 0, 0, 1].into(),
        port: 0,
        base_url: BASE_URL.to_owned(),
        stripe: StripeConfig {
            secret_key: SecretString::from("sk_test_unused"),
            api_base: DEFAULT_STRIPE_API_BASE.to_owned(),
            currency: "usd".to_owned(),
            product_label: "Bazaar order".to_owned(),
        },
        storage: StorageConfig {
            key_id: "unused".to_owned(),
            application_key: SecretString::from("unused"),
            bucket: "unused".to_owned(),
            api_base: DEFAULT_B2_API_BASE.to_owned(),
        },
        catalog_page_size: 8,
        mark_paid_on_session_create: false,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// The storefront router plus handles on every in-memory backend.
pub struct TestApp {
    router: Router,
    cookie: Option<String>,
    pub sessions: MemoryStore,
    pub catalog: Arc<InMemoryCatalog>,
    pub orders: Arc<InMemoryOrderStore>,
    pub users: Arc<InMemoryUserStore>,
    pub gateway: InMemoryPaymentGateway,
    pub storage: InMemoryStorage,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// A storefront with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// A storefront with a custom configuration.
    #[must_use]
    pub fn with_config(config: StorefrontConfig) -> Self {
        let catalog = Arc::new(InMemoryCatalog::new());
        let orders = Arc::new(InMemoryOrderStore::new());
        let users = Arc::new(InMemoryUserStore::new());
        let gateway = InMemoryPaymentGateway::new(Payer {
            name: Some("Ada Shopper".to_owned()),
            email: Some("ada@shop.test".to_owned()),
        });
        let storage = InMemoryStorage::default();

        let backends = Backends {
            catalog: catalog.clone(),
            orders: orders.clone(),
            users: users.clone(),
            payments: Arc::new(gateway.clone()),
            storage: Arc::new(storage.clone()),
        };
        let sessions = MemoryStore::default();
        let router = bazaar_storefront::app(AppState::new(config, backends), sessions.clone());

        Self {
            router,
            cookie: None,
            sessions,
            catalog,
            orders,
            users,
            gateway,
            storage,
        }
    }

    /// Put a product straight into the catalog and return its id.
    pub fn add_product(&self, name: &str, price: &str, stock: u32) -> ProductId {
        let id = ProductId::new(i32::try_from(self.catalog.len()).unwrap() + 1);
        self.catalog.put(Product {
            id,
            pid: 1000 + id.as_i32(),
            name: name.to_owned(),
            description: format!("A fine {name}"),
            price: price.parse().unwrap(),
            image_url: format!("https://files.storage.test/{id}.png"),
            stock,
        });
        id
    }

    /// Draft with the same fields as [`add_product`](Self::add_product).
    #[must_use]
    pub fn draft(name: &str, price: &str, stock: u32) -> ProductDraft {
        ProductDraft {
            pid: 7,
            name: name.to_owned(),
            description: String::new(),
            price: price.parse().unwrap(),
            image_url: None,
            stock,
        }
    }

    /// Register an account directly in the store.
    pub async fn create_user(&self, name: &str, email: &str, role: UserRole) {
        let email = Email::parse(email).unwrap();
        self.users
            .create(name, &email, &hash_password(PASSWORD).unwrap())
            .await
            .unwrap();
        if role != UserRole::Customer {
            self.users.set_role(&email, role).await.unwrap();
        }
    }

    /// Log in through the login form.
    pub async fn log_in(&mut self, email: &str) {
        let resp = self.post_form("/login", &[("email", email), ("password", PASSWORD)]).await;
        assert!(resp.is_redirect_to("/"), "login failed: {resp:?}");
    }

    /// Forget the session cookie, as a new visitor.
    pub fn forget_session(&mut self) {
        self.cookie = None;
    }

    /// Overwrite one value in the current visitor's stored session, as if an
    /// older release had written it. The visitor must already have a session.
    pub async fn set_session_value(&self, key: &str, value: serde_json::Value) {
        let cookie = self.cookie.as_deref().unwrap();
        let (_, raw_id) = cookie.split_once('=').unwrap();
        let id: Id = raw_id.parse().unwrap();

        let mut record = self.sessions.load(&id).await.unwrap().unwrap();
        record.data.insert(key.to_owned(), value);
        self.sessions.save(&record).await.unwrap();
    }

    /// Send a request, carrying and updating the session cookie.
    pub async fn send(&mut self, mut request: Request<Body>) -> TestResponse {
        if let Some(cookie) = &self.cookie {
            request
                .headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let response = self.router.clone().oneshot(request).await.unwrap();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap_or_default();
            self.cookie = Some(pair.to_owned());
        }

        let status = response.status();
        let headers = response.headers().clone();
        let location = headers
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_owned());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();

        TestResponse {
            status,
            location,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    /// `GET path`.
    pub async fn get(&mut self, path: &str) -> TestResponse {
        self.send(Request::get(path).body(Body::empty()).unwrap()).await
    }

    /// `POST path` with a url-encoded form.
    pub async fn post_form(&mut self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        self.post_form_with_referer(path, fields, None).await
    }

    /// `POST path` with a url-encoded form and a `Referer` header.
    pub async fn post_form_with_referer(
        &mut self,
        path: &str,
        fields: &[(&str, &str)],
        referer: Option<&str>,
    ) -> TestResponse {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let mut builder = Request::post(path).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(referer) = referer {
            builder = builder.header(header::REFERER, referer);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    /// `POST path` with a multipart form. `file` is `(field, file name, bytes)`.
    pub async fn post_multipart(
        &mut self,
        path: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &str, &[u8])>,
    ) -> TestResponse {
        const BOUNDARY: &str = "bazaar-test-boundary";

        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                    .as_bytes(),
            );
        }
        if let Some((name, file_name, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::post(path)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}
