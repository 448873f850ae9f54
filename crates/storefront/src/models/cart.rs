//! Session-held shopping cart.
//!
//! The serialized layout is a JSON object keyed by the product id string:
//!
//! ```json
//! { "7": { "name": "Mug", "product_price": "9.99", "quantity": 2, "img": "https://...", "pid": 512 } }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use bazaar_core::Price;

/// One product's entry in a cart.
///
/// Name, price, image and pid are a snapshot taken when the line was added;
/// only `quantity` changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub name: String,
    #[serde(rename = "product_price")]
    pub unit_price: Price,
    pub quantity: u32,
    #[serde(rename = "img")]
    pub image_url: String,
    pub pid: i32,
}

impl CartLineItem {
    /// `unit_price * quantity`, unrounded.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// Mapping from product id (string form) to line item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: BTreeMap<String, CartLineItem>,
}

impl Cart {
    /// A cart holding exactly one line.
    #[must_use]
    pub fn single(product_id: impl Into<String>, line: CartLineItem) -> Self {
        let mut lines = BTreeMap::new();
        lines.insert(product_id.into(), line);
        Self { lines }
    }

    /// Union of two carts. Lines in `other` replace lines with the same key.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.lines.extend(other.lines);
        self
    }

    #[must_use]
    pub fn contains(&self, product_id: &str) -> bool {
        self.lines.contains_key(product_id)
    }

    #[must_use]
    pub fn get(&self, product_id: &str) -> Option<&CartLineItem> {
        self.lines.get(product_id)
    }

    pub fn get_mut(&mut self, product_id: &str) -> Option<&mut CartLineItem> {
        self.lines.get_mut(product_id)
    }

    /// Remove a line, returning it if it was present.
    pub fn remove(&mut self, product_id: &str) -> Option<CartLineItem> {
        self.lines.remove(product_id)
    }

    /// Lines in key order.
    pub fn lines(&self) -> impl Iterator<Item = (&str, &CartLineItem)> {
        self.lines.iter().map(|(id, line)| (id.as_str(), line))
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of quantities, for the header badge.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.values().map(|line| u64::from(line.quantity)).sum()
    }
}
