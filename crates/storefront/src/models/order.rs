//! Orders and the customer details captured at checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bazaar_core::{Email, Invoice, OrderId, OrderStatus};

use super::Cart;

/// Problems with submitted customer details.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustomerInfoError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid email: {0}")]
    Email(#[from] bazaar_core::EmailError),
}

/// Shipping and contact details, frozen into the order at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerInfo {
    pub name: String,
    pub city: String,
    pub address: String,
    pub zipcode: String,
    pub email: String,
}

impl CustomerInfo {
    /// Trim and check checkout form fields.
    ///
    /// # Errors
    ///
    /// Returns the first missing field, or an invalid email.
    pub fn new(
        name: &str,
        city: &str,
        address: &str,
        zipcode: &str,
        email: &str,
    ) -> Result<Self, CustomerInfoError> {
        let required = |value: &str, field: &'static str| {
            let value = value.trim();
            if value.is_empty() {
                Err(CustomerInfoError::Missing(field))
            } else {
                Ok(value.to_owned())
            }
        };

        Ok(Self {
            name: required(name, "name")?,
            city: required(city, "city")?,
            address: required(address, "address")?,
            zipcode: required(zipcode, "zipcode")?,
            email: Email::parse(&required(email, "email")?)?.into_inner(),
        })
    }
}

/// An order ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub invoice: Invoice,
    pub customer: CustomerInfo,
    pub line_items: Cart,
}

/// A persisted order.
///
/// `customer` and `line_items` never change after creation; only `status`
/// moves, and only from `Pending` to `Paid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub invoice: Invoice,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub customer: CustomerInfo,
    pub line_items: Cart,
}

impl Order {
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.status == OrderStatus::Paid
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_info_trims_and_normalizes() {
        let info = CustomerInfo::new(" Ada ", "Paris", "1 Rue", "75001", "Ada@Example.com").unwrap();
        assert_eq!(info.name, "Ada");
        assert_eq!(info.email, "ada@example.com");
    }

    #[test]
    fn test_customer_info_requires_fields() {
        assert_eq!(
            CustomerInfo::new("Ada", "", "1 Rue", "75001", "a@b.co"),
            Err(CustomerInfoError::Missing("city"))
        );
        assert!(matches!(
            CustomerInfo::new("Ada", "Paris", "1 Rue", "75001", "nope"),
            Err(CustomerInfoError::Email(_))
        ));
    }
}
