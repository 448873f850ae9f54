//! Product catalog repository.
//!
//! Product rows are written by the admin screens and read by the listing,
//! search, product page and cart engine.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use bazaar_core::{Price, ProductId};

use super::RepositoryError;
use crate::models::{CatalogSort, ListingQuery, Page, Product, ProductDraft};

/// Upper bound on rows returned by a keyword search.
pub const SEARCH_LIMIT: u32 = 1000;

/// Read and write access to the product catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Look up a product by id.
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// One page of the catalog in the requested order.
    async fn list(&self, query: ListingQuery) -> Result<Page<Product>, RepositoryError>;

    /// Products whose name, description or code contains `keyword`
    /// (case-insensitive), at most `limit` of them, oldest first.
    async fn search(&self, keyword: &str, limit: u32) -> Result<Vec<Product>, RepositoryError>;

    /// Insert a new product.
    async fn create(&self, draft: &ProductDraft) -> Result<Product, RepositoryError>;

    /// Replace a product's fields. A `None` image keeps the stored one.
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    async fn update(&self, id: ProductId, draft: &ProductDraft) -> Result<Product, RepositoryError>;

    /// Delete a product.
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    async fn delete(&self, id: ProductId) -> Result<(), RepositoryError>;

    /// Cheap round trip used by the readiness probe.
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i32,
    pid: i32,
    name: String,
    description: String,
    price: Decimal,
    img: String,
    stock: i32,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let price = Price::new(row.price).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid price for product {}: {e}", row.id))
        })?;
        let stock = u32::try_from(row.stock).map_err(|_| {
            RepositoryError::DataCorruption(format!("negative stock for product {}", row.id))
        })?;

        Ok(Self {
            id: ProductId::new(row.id),
            pid: row.pid,
            name: row.name,
            description: row.description,
            price,
            image_url: row.img,
            stock,
        })
    }
}

/// Filter and ordering clauses for each catalog sort.
///
/// Every ordering ends on `id` so pages stay stable between requests.
const fn listing_clauses(sort: CatalogSort) -> (&'static str, &'static str) {
    match sort {
        CatalogSort::StockDesc => ("", "stock DESC, id ASC"),
        CatalogSort::PriceAsc => ("", "price ASC, id ASC"),
        CatalogSort::PriceDesc => ("", "price DESC, id ASC"),
        CatalogSort::Newest => ("", "id DESC"),
        CatalogSort::OutOfStock => ("WHERE stock < 1", "id ASC"),
    }
}

/// Escape `LIKE` wildcards so a keyword only ever matches literally.
fn like_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    escaped.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn stock_column(stock: u32) -> Result<i32, RepositoryError> {
    i32::try_from(stock).map_err(|_| RepositoryError::Conflict(format!("stock {stock} is too large")))
}

const COLUMNS: &str = "id, pid, name, description, price, img, stock";

/// `PostgreSQL`-backed catalog.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {COLUMNS} FROM storefront.product WHERE id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    async fn list(&self, query: ListingQuery) -> Result<Page<Product>, RepositoryError> {
        let (filter, order) = listing_clauses(query.sort);

        let count_sql = format!("SELECT COUNT(*) FROM storefront.product {filter}");
        let total: i64 = sqlx::query_scalar(&count_sql).fetch_one(&self.pool).await?;

        let sql = format!(
            "SELECT {COLUMNS} FROM storefront.product {filter} ORDER BY {order} LIMIT $1 OFFSET $2"
        );
        let offset = i64::try_from(query.offset()).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(i64::from(query.per_page))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            page: query.page,
            per_page: query.per_page,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn search(&self, keyword: &str, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            r"SELECT {COLUMNS} FROM storefront.product
              WHERE name ILIKE $1 OR description ILIKE $1 OR CAST(pid AS TEXT) ILIKE $1
              ORDER BY id ASC
              LIMIT $2"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(like_pattern(keyword.trim()))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    async fn create(&self, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        let sql = format!(
            "INSERT INTO storefront.product (pid, name, description, price, img, stock)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(draft.pid)
            .bind(&draft.name)
            .bind(&draft.description)
            .bind(draft.price.amount())
            .bind(draft.image_url.as_deref().unwrap_or_default())
            .bind(stock_column(draft.stock)?)
            .fetch_one(&self.pool)
            .await?;

        Product::try_from(row)
    }

    async fn update(&self, id: ProductId, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        let sql = format!(
            "UPDATE storefront.product
             SET pid = $2, name = $3, description = $4, price = $5,
                 img = COALESCE($6, img), stock = $7
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .bind(draft.pid)
            .bind(&draft.name)
            .bind(&draft.description)
            .bind(draft.price.amount())
            .bind(draft.image_url.as_deref())
            .bind(stock_column(draft.stock)?)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or(RepositoryError::NotFound).and_then(Product::try_from)
    }

    async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.product WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("mug"), "%mug%");
        assert_eq!(like_pattern("50%_off"), r"%50\%\_off%");
        assert_eq!(like_pattern(r"a\b"), r"%a\\b%");
    }

    #[test]
    fn test_out_of_stock_filters() {
        let (filter, _) = listing_clauses(CatalogSort::OutOfStock);
        assert!(filter.contains("stock < 1"));
        let (filter, order) = listing_clauses(CatalogSort::default());
        assert!(filter.is_empty());
        assert!(order.starts_with("stock DESC"));
    }
}
