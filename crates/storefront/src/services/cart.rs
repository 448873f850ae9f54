//! Cart engine.
//!
//! Pure operations over a caller-supplied [`Cart`] and a read-only
//! [`Catalog`]. The session layer loads the cart, hands it in, and writes it
//! back; nothing here touches the session directly.
//!
//! Lines snapshot name, price, image and pid when added. Only the quantity
//! ever changes afterwards, and only [`update_quantity`] checks stock.

use thiserror::Error;
use tracing::instrument;

use bazaar_core::{Price, ProductId};

use crate::db::{Catalog, RepositoryError};
use crate::models::{Cart, CartLineItem};

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Product id is malformed, not in the catalog, or not in the cart.
    #[error("product {0} not found")]
    NotFound(String),

    /// Product is already in the cart; the existing line is left as is.
    #[error("product {0} is already in the cart")]
    DuplicateItem(String),

    /// Quantity below one.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// Catalog lookup failed.
    #[error("catalog error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Result of a quantity update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Quantity set exactly as requested.
    Updated,
    /// Request exceeded stock; quantity clamped to `stock`.
    StockLimited {
        /// Stock level the line was clamped to.
        stock: u32,
    },
}

/// Whether the visitor's session holds a cart at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartPresence {
    /// No cart key in the session.
    Missing,
    /// Cart key present, no lines.
    Empty,
    /// At least one line.
    Filled,
}

impl CartPresence {
    /// Classify the cart loaded from a session.
    #[must_use]
    pub fn of(cart: Option<&Cart>) -> Self {
        match cart {
            None => Self::Missing,
            Some(cart) if cart.is_empty() => Self::Empty,
            Some(_) => Self::Filled,
        }
    }

    /// Whether a cart page or checkout step can be shown.
    #[must_use]
    pub const fn has_lines(self) -> bool {
        matches!(self, Self::Filled)
    }
}

async fn lookup(catalog: &dyn Catalog, product_id: &str) -> Result<crate::models::Product, CartError> {
    let id: ProductId = product_id
        .parse()
        .map_err(|_| CartError::NotFound(product_id.to_owned()))?;

    catalog
        .get(id)
        .await?
        .ok_or_else(|| CartError::NotFound(product_id.to_owned()))
}

/// Add a product to the cart with the requested quantity.
///
/// Stock is not checked here; see [`update_quantity`].
///
/// # Errors
///
/// Returns `CartError::NotFound` if the product does not exist.
/// Returns `CartError::DuplicateItem` if the product is already in the cart.
/// Returns `CartError::InvalidQuantity` for a zero quantity.
#[instrument(skip(cart, catalog), fields(lines = cart.len()))]
pub async fn add_item(
    cart: &mut Cart,
    catalog: &dyn Catalog,
    product_id: &str,
    quantity: u32,
) -> Result<(), CartError> {
    if quantity == 0 {
        return Err(CartError::InvalidQuantity);
    }

    let product = lookup(catalog, product_id).await?;
    let key = product.id.to_string();
    if cart.contains(&key) {
        return Err(CartError::DuplicateItem(key));
    }

    let line = CartLineItem {
        name: product.name,
        unit_price: product.price,
        quantity,
        image_url: product.image_url,
        pid: product.pid,
    };
    *cart = std::mem::take(cart).merge(Cart::single(key, line));

    Ok(())
}

/// Set a line's quantity, clamped to the product's current stock.
///
/// # Errors
///
/// Returns `CartError::NotFound` if the product is not in the cart or no
/// longer in the catalog.
/// Returns `CartError::InvalidQuantity` for a zero quantity.
#[instrument(skip(cart, catalog))]
pub async fn update_quantity(
    cart: &mut Cart,
    catalog: &dyn Catalog,
    product_id: &str,
    quantity: u32,
) -> Result<UpdateOutcome, CartError> {
    if !cart.contains(product_id) {
        return Err(CartError::NotFound(product_id.to_owned()));
    }
    if quantity == 0 {
        return Err(CartError::InvalidQuantity);
    }

    let stock = lookup(catalog, product_id).await?.stock;
    let line = cart
        .get_mut(product_id)
        .ok_or_else(|| CartError::NotFound(product_id.to_owned()))?;

    if quantity > stock {
        line.quantity = stock;
        Ok(UpdateOutcome::StockLimited { stock })
    } else {
        line.quantity = quantity;
        Ok(UpdateOutcome::Updated)
    }
}

/// Remove a line. Removing an absent line is a no-op.
pub fn remove_item(cart: &mut Cart, product_id: &str) {
    cart.remove(product_id);
}

/// Sum of `unit_price * quantity` over all lines.
#[must_use]
pub fn compute_total(cart: &Cart) -> Price {
    cart.lines().map(|(_, line)| line.line_total()).sum()
}
