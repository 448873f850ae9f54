//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::{Catalog, OrderStore, PgCatalog, PgOrderStore, PgUserStore, UserStore};
use crate::models::CurrentUser;
use crate::payments::{PaymentGateway, StripeClient};
use crate::services::{CheckoutService, is_admin};
use crate::storage::{B2Client, ObjectStorage};

/// Authorization policy deciding who may use the admin screens.
pub type AdminPolicy = fn(&CurrentUser) -> bool;

/// The collaborators handlers talk to.
///
/// Production wiring uses `PostgreSQL`, Stripe and B2; tests swap in the
/// in-memory implementations.
#[derive(Clone)]
pub struct Backends {
    pub catalog: Arc<dyn Catalog>,
    pub orders: Arc<dyn OrderStore>,
    pub users: Arc<dyn UserStore>,
    pub payments: Arc<dyn PaymentGateway>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl Backends {
    /// Production backends over a database pool.
    #[must_use]
    pub fn production(pool: &PgPool, config: &StorefrontConfig) -> Self {
        Self {
            catalog: Arc::new(PgCatalog::new(pool.clone())),
            orders: Arc::new(PgOrderStore::new(pool.clone())),
            users: Arc::new(PgUserStore::new(pool.clone())),
            payments: Arc::new(StripeClient::new(&config.stripe)),
            storage: Arc::new(B2Client::new(&config.storage)),
        }
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the catalog, order ledger and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backends: Backends,
    admin_policy: AdminPolicy,
}

impl AppState {
    /// Create a new application state with the role-based admin policy.
    #[must_use]
    pub fn new(config: StorefrontConfig, backends: Backends) -> Self {
        Self::with_admin_policy(config, backends, is_admin)
    }

    /// Create a new application state with a custom admin policy.
    #[must_use]
    pub fn with_admin_policy(
        config: StorefrontConfig,
        backends: Backends,
        admin_policy: AdminPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                backends,
                admin_policy,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Product catalog.
    #[must_use]
    pub fn catalog(&self) -> &dyn Catalog {
        self.inner.backends.catalog.as_ref()
    }

    /// Order storage.
    #[must_use]
    pub fn orders(&self) -> &dyn OrderStore {
        self.inner.backends.orders.as_ref()
    }

    /// Account storage.
    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.inner.backends.users.as_ref()
    }

    /// Image storage.
    #[must_use]
    pub fn storage(&self) -> &dyn ObjectStorage {
        self.inner.backends.storage.as_ref()
    }

    /// Checkout service wired to this state's ledger and gateway.
    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        let config = self.config();
        CheckoutService::new(
            self.orders(),
            self.inner.backends.payments.as_ref(),
            &config.base_url,
        )
        .mark_paid_on_create(config.mark_paid_on_session_create)
    }

    /// Whether `user` may use the admin screens.
    #[must_use]
    pub fn is_admin(&self, user: &CurrentUser) -> bool {
        (self.inner.admin_policy)(user)
    }
}
