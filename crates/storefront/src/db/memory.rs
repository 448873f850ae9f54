//! In-memory implementations of the repository traits.
//!
//! Used by unit and integration tests, and handy for running the storefront
//! without a database. Behavior mirrors the `PostgreSQL` implementations:
//! the same orderings, the same `Conflict`/`NotFound` cases.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use bazaar_core::{Email, Invoice, OrderId, OrderStatus, ProductId, UserId, UserRole};

use super::{Catalog, OrderStore, RepositoryError, UserStore};
use crate::models::{CatalogSort, ListingQuery, NewOrder, Order, Page, Product, ProductDraft, User};

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Default)]
struct CatalogState {
    products: BTreeMap<ProductId, Product>,
    next_id: i32,
    should_fail: bool,
}

impl CatalogState {
    fn available(&self) -> Result<(), RepositoryError> {
        if self.should_fail {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

/// In-memory product catalog.
#[derive(Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog holding `products`, keeping their ids.
    #[must_use]
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let catalog = Self::new();
        for product in products {
            catalog.put(product);
        }
        catalog
    }

    /// Insert or replace a product, keeping its id.
    pub fn put(&self, product: Product) {
        let mut state = write(&self.state);
        state.next_id = state.next_id.max(product.id.as_i32());
        state.products.insert(product.id, product);
    }

    /// Change a product's stock level.
    pub fn set_stock(&self, id: ProductId, stock: u32) {
        if let Some(product) = write(&self.state).products.get_mut(&id) {
            product.stock = stock;
        }
    }

    /// Make every subsequent call fail as if the database were unreachable.
    pub fn set_fail(&self, should_fail: bool) {
        write(&self.state).should_fail = should_fail;
    }

    /// Number of products in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.state).products.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn matches_keyword(product: &Product, needle: &str) -> bool {
    product.name.to_lowercase().contains(needle)
        || product.description.to_lowercase().contains(needle)
        || product.pid.to_string().contains(needle)
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let state = read(&self.state);
        state.available()?;
        Ok(state.products.get(&id).cloned())
    }

    async fn list(&self, query: ListingQuery) -> Result<Page<Product>, RepositoryError> {
        let state = read(&self.state);
        state.available()?;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| query.sort != CatalogSort::OutOfStock || p.stock < 1)
            .cloned()
            .collect();

        match query.sort {
            CatalogSort::StockDesc => products.sort_by(|a, b| b.stock.cmp(&a.stock).then(a.id.cmp(&b.id))),
            CatalogSort::PriceAsc => products.sort_by(|a, b| a.price.cmp(&b.price).then(a.id.cmp(&b.id))),
            CatalogSort::PriceDesc => products.sort_by(|a, b| b.price.cmp(&a.price).then(a.id.cmp(&b.id))),
            CatalogSort::Newest => products.sort_by(|a, b| b.id.cmp(&a.id)),
            CatalogSort::OutOfStock => products.sort_by_key(|p| p.id),
        }

        let total = products.len() as u64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let items = products
            .into_iter()
            .skip(offset)
            .take(query.per_page as usize)
            .collect();

        Ok(Page {
            items,
            page: query.page,
            per_page: query.per_page,
            total,
        })
    }

    async fn search(&self, keyword: &str, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let needle = keyword.trim().to_lowercase();
        let state = read(&self.state);
        state.available()?;
        Ok(state
            .products
            .values()
            .filter(|p| matches_keyword(p, &needle))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn create(&self, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        let mut state = write(&self.state);
        state.available()?;
        state.next_id += 1;
        let product = Product {
            id: ProductId::new(state.next_id),
            pid: draft.pid,
            name: draft.name.clone(),
            description: draft.description.clone(),
            price: draft.price,
            image_url: draft.image_url.clone().unwrap_or_default(),
            stock: draft.stock,
        };
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update(&self, id: ProductId, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        let mut state = write(&self.state);
        state.available()?;
        let product = state.products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        product.pid = draft.pid;
        product.name.clone_from(&draft.name);
        product.description.clone_from(&draft.description);
        product.price = draft.price;
        product.stock = draft.stock;
        if let Some(image_url) = &draft.image_url {
            product.image_url.clone_from(image_url);
        }
        Ok(product.clone())
    }

    async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let mut state = write(&self.state);
        state.available()?;
        state.products.remove(&id).map(|_| ()).ok_or(RepositoryError::NotFound)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        read(&self.state).available()
    }
}

// =============================================================================
// Orders
// =============================================================================

/// In-memory order store.
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<Vec<Order>>,
}

impl InMemoryOrderStore {
    /// Create an empty order store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored order, oldest first.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        read(&self.orders).clone()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut orders = write(&self.orders);
        if orders.iter().any(|o| o.invoice == order.invoice) {
            return Err(RepositoryError::Conflict("invoice already exists".to_owned()));
        }

        let id = i32::try_from(orders.len() + 1)
            .map_err(|_| RepositoryError::Conflict("order id space exhausted".to_owned()))?;
        let stored = Order {
            id: OrderId::new(id),
            invoice: order.invoice.clone(),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            customer: order.customer.clone(),
            line_items: order.line_items.clone(),
        };
        orders.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_invoice(&self, invoice: &Invoice) -> Result<Option<Order>, RepositoryError> {
        Ok(read(&self.orders).iter().find(|o| &o.invoice == invoice).cloned())
    }

    async fn mark_paid(&self, invoice: &Invoice) -> Result<bool, RepositoryError> {
        let mut orders = write(&self.orders);
        match orders.iter_mut().find(|o| &o.invoice == invoice) {
            Some(order) if order.status == OrderStatus::Pending => {
                order.status = OrderStatus::Paid;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// =============================================================================
// Users
// =============================================================================

/// In-memory user store.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<(User, String)>>,
}

impl InMemoryUserStore {
    /// Create an empty user store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_credentials(&self, email: &Email) -> Result<Option<(User, String)>, RepositoryError> {
        Ok(read(&self.users).iter().find(|(u, _)| &u.email == email).cloned())
    }

    async fn create(&self, name: &str, email: &Email, password_hash: &str) -> Result<User, RepositoryError> {
        let mut users = write(&self.users);
        if users.iter().any(|(u, _)| &u.email == email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let id = i32::try_from(users.len() + 1)
            .map_err(|_| RepositoryError::Conflict("user id space exhausted".to_owned()))?;
        let user = User {
            id: UserId::new(id),
            name: name.to_owned(),
            email: email.clone(),
            role: UserRole::Customer,
            created_at: Utc::now(),
        };
        users.push((user.clone(), password_hash.to_owned()));
        Ok(user)
    }

    async fn set_role(&self, email: &Email, role: UserRole) -> Result<User, RepositoryError> {
        let mut users = write(&self.users);
        let (user, _) = users
            .iter_mut()
            .find(|(u, _)| &u.email == email)
            .ok_or(RepositoryError::NotFound)?;
        user.role = role;
        Ok(user.clone())
    }
}
