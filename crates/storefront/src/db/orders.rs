//! Order ledger storage.
//!
//! Orders are append-only apart from the `Pending` to `Paid` status move.
//! Customer details and the cart snapshot are stored as JSON text via
//! [`super::codec`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bazaar_core::{Invoice, OrderId, OrderStatus};

use super::{RepositoryError, codec};
use crate::models::{NewOrder, Order};

/// Persistence for orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new `Pending` order.
    ///
    /// Returns `RepositoryError::Conflict` if the invoice is already taken.
    async fn insert(&self, order: &NewOrder) -> Result<Order, RepositoryError>;

    /// Look up an order by its invoice token.
    async fn find_by_invoice(&self, invoice: &Invoice) -> Result<Option<Order>, RepositoryError>;

    /// Move a `Pending` order to `Paid`.
    ///
    /// Returns `true` if this call changed the status, `false` if the order
    /// was already paid or does not exist.
    async fn mark_paid(&self, invoice: &Invoice) -> Result<bool, RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    invoice: String,
    status: String,
    date_created: DateTime<Utc>,
    customer: Option<String>,
    orders: Option<String>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = |what: &str, e: &dyn std::fmt::Display| {
            RepositoryError::DataCorruption(format!("order {id}: invalid {what}: {e}"))
        };

        let invoice = row.invoice.parse::<Invoice>().map_err(|e| corrupt("invoice", &e))?;
        let status = row.status.parse::<OrderStatus>().map_err(|e| corrupt("status", &e))?;
        let customer = codec::decode(row.customer.as_deref()).map_err(|e| corrupt("customer", &e))?;
        let line_items = codec::decode(row.orders.as_deref()).map_err(|e| corrupt("line items", &e))?;

        Ok(Self {
            id: OrderId::new(id),
            invoice,
            status,
            created_at: row.date_created,
            customer,
            line_items,
        })
    }
}

/// `PostgreSQL`-backed order store.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let customer = codec::encode(Some(&order.customer))
            .map_err(|e| RepositoryError::DataCorruption(format!("unencodable customer: {e}")))?;
        let line_items = codec::encode(Some(&order.line_items))
            .map_err(|e| RepositoryError::DataCorruption(format!("unencodable line items: {e}")))?;

        let row = sqlx::query_as::<_, OrderRow>(
            r"
            INSERT INTO storefront.customer_order (invoice, status, customer, orders)
            VALUES ($1, $2, $3, $4)
            RETURNING id, invoice, status, date_created, customer, orders
            ",
        )
        .bind(order.invoice.as_str())
        .bind(OrderStatus::Pending.as_str())
        .bind(customer)
        .bind(line_items)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "invoice"))?;

        Order::try_from(row)
    }

    async fn find_by_invoice(&self, invoice: &Invoice) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, invoice, status, date_created, customer, orders
            FROM storefront.customer_order
            WHERE invoice = $1
            ",
        )
        .bind(invoice.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn mark_paid(&self, invoice: &Invoice) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.customer_order
            SET status = $2
            WHERE invoice = $1 AND status = $3
            ",
        )
        .bind(invoice.as_str())
        .bind(OrderStatus::Paid.as_str())
        .bind(OrderStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
