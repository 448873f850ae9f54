//! Order ledger.
//!
//! Orders are created `Pending` from a frozen copy of the cart and the
//! customer details, and move to `Paid` at most once.

use thiserror::Error;
use tracing::instrument;

use bazaar_core::{Invoice, Price};

use super::cart::compute_total;
use crate::db::{OrderStore, RepositoryError};
use crate::models::{Cart, CustomerInfo, NewOrder, Order};

/// Attempts at drawing an unused invoice before giving up.
const MAX_INVOICE_ATTEMPTS: usize = 5;

/// Errors that can occur in the order ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No cart in the session.
    #[error("no cart to check out")]
    EmptyCart,

    /// No order with this invoice.
    #[error("order {0} not found")]
    NotFound(Invoice),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A freshly created order with its grand total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub order: Order,
    pub total: Price,
}

/// Creates orders and records payment.
pub struct OrderLedger<'a> {
    store: &'a dyn OrderStore,
    next_invoice: fn() -> Invoice,
}

impl<'a> OrderLedger<'a> {
    /// Create a ledger over `store` with random invoices.
    #[must_use]
    pub fn new(store: &'a dyn OrderStore) -> Self {
        Self {
            store,
            next_invoice: Invoice::generate,
        }
    }

    /// Replace the invoice generator.
    #[must_use]
    pub fn with_invoice_source(mut self, next_invoice: fn() -> Invoice) -> Self {
        self.next_invoice = next_invoice;
        self
    }

    /// Persist a `Pending` order for the session's cart.
    ///
    /// `cart` is `None` when the session has no cart key. A present but empty
    /// cart still produces an order.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::EmptyCart` if there is no cart.
    /// Returns `LedgerError::Repository` if storage fails or every invoice
    /// drawn was already taken.
    #[instrument(skip(self, customer, cart))]
    pub async fn create_order(
        &self,
        customer: CustomerInfo,
        cart: Option<&Cart>,
    ) -> Result<PlacedOrder, LedgerError> {
        let cart = cart.ok_or(LedgerError::EmptyCart)?;
        let total = compute_total(cart);

        let mut new_order = NewOrder {
            invoice: (self.next_invoice)(),
            customer,
            line_items: cart.clone(),
        };

        let mut attempt = 1;
        loop {
            match self.store.insert(&new_order).await {
                Ok(order) => {
                    tracing::info!(invoice = %order.invoice, total = %total, "Order created");
                    return Ok(PlacedOrder { order, total });
                }
                Err(RepositoryError::Conflict(reason)) if attempt < MAX_INVOICE_ATTEMPTS => {
                    tracing::warn!(invoice = %new_order.invoice, %reason, "Invoice collision, drawing another");
                    new_order.invoice = (self.next_invoice)();
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Look up an order.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NotFound` if no order has this invoice.
    pub async fn find(&self, invoice: &Invoice) -> Result<Order, LedgerError> {
        self.store
            .find_by_invoice(invoice)
            .await?
            .ok_or_else(|| LedgerError::NotFound(invoice.clone()))
    }

    /// Mark an order paid. Paying an already paid order is a no-op.
    ///
    /// Returns `true` if this call moved the order to `Paid`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NotFound` if no order has this invoice.
    #[instrument(skip(self), fields(invoice = %invoice))]
    pub async fn mark_paid(&self, invoice: &Invoice) -> Result<bool, LedgerError> {
        let order = self.find(invoice).await?;
        if order.is_paid() {
            tracing::debug!("Order already paid");
            return Ok(false);
        }

        let changed = self.store.mark_paid(invoice).await?;
        if changed {
            tracing::info!("Order marked paid");
        }
        Ok(changed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::db::memory::InMemoryOrderStore;
    use crate::models::CartLineItem;
    use bazaar_core::OrderStatus;

    fn customer() -> CustomerInfo {
        CustomerInfo::new("Ada", "London", "12 Engine Row", "NW1", "ada@example.com").unwrap()
    }

    fn cart() -> Cart {
        Cart::single(
            "7",
            CartLineItem {
                name: "Mug".into(),
                unit_price: "9.99".parse().unwrap(),
                quantity: 2,
                image_url: String::new(),
                pid: 1,
            },
        )
    }

    #[tokio::test]
    async fn test_create_without_cart_persists_nothing() {
        let store = InMemoryOrderStore::new();
        let ledger = OrderLedger::new(&store);

        assert!(matches!(
            ledger.create_order(customer(), None).await,
            Err(LedgerError::EmptyCart)
        ));
        assert!(store.orders().is_empty());
    }

    #[tokio::test]
    async fn test_create_freezes_cart_and_totals() {
        let store = InMemoryOrderStore::new();
        let ledger = OrderLedger::new(&store);
        let mut cart = cart();

        let placed = ledger.create_order(customer(), Some(&cart)).await.unwrap();
        assert_eq!(placed.total.to_string(), "19.98");
        assert_eq!(placed.order.status, OrderStatus::Pending);

        cart.get_mut("7").unwrap().quantity = 9;
        let stored = ledger.find(&placed.order.invoice).await.unwrap();
        assert_eq!(stored.line_items.get("7").unwrap().quantity, 2);
        assert_eq!(stored.customer.email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_present_but_empty_cart_is_allowed() {
        let store = InMemoryOrderStore::new();
        let ledger = OrderLedger::new(&store);

        let placed = ledger.create_order(customer(), Some(&Cart::default())).await.unwrap();
        assert_eq!(placed.total.to_string(), "0.00");
    }

    #[tokio::test]
    async fn test_invoices_unique() {
        let store = InMemoryOrderStore::new();
        let ledger = OrderLedger::new(&store);

        let mut seen = HashSet::new();
        for _ in 0..50 {
            let placed = ledger.create_order(customer(), Some(&cart())).await.unwrap();
            assert!(seen.insert(placed.order.invoice));
        }
    }

    static DRAWS: AtomicUsize = AtomicUsize::new(0);

    fn colliding_invoices() -> Invoice {
        // First two draws return the same token.
        let n = DRAWS.fetch_add(1, Ordering::SeqCst);
        let token = if n < 2 { "aaaaaaaaaaaaaaaaaa" } else { "bbbbbbbbbbbbbbbbbb" };
        token.parse().unwrap()
    }

    #[tokio::test]
    async fn test_collision_retries_with_new_invoice() {
        let store = InMemoryOrderStore::new();
        let ledger = OrderLedger::new(&store).with_invoice_source(colliding_invoices);

        let first = ledger.create_order(customer(), Some(&cart())).await.unwrap();
        let second = ledger.create_order(customer(), Some(&cart())).await.unwrap();

        assert_eq!(first.order.invoice.as_str(), "aaaaaaaaaaaaaaaaaa");
        assert_eq!(second.order.invoice.as_str(), "bbbbbbbbbbbbbbbbbb");
        assert_eq!(store.orders().len(), 2);
    }

    #[tokio::test]
    async fn test_mark_paid_idempotent() {
        let store = InMemoryOrderStore::new();
        let ledger = OrderLedger::new(&store);
        let placed = ledger.create_order(customer(), Some(&cart())).await.unwrap();
        let invoice = placed.order.invoice;

        assert!(ledger.mark_paid(&invoice).await.unwrap());
        assert!(!ledger.mark_paid(&invoice).await.unwrap());
        assert!(ledger.find(&invoice).await.unwrap().is_paid());
    }

    #[tokio::test]
    async fn test_mark_paid_unknown_invoice() {
        let store = InMemoryOrderStore::new();
        let ledger = OrderLedger::new(&store);

        assert!(matches!(
            ledger.mark_paid(&Invoice::generate()).await,
            Err(LedgerError::NotFound(_))
        ));
    }
}
