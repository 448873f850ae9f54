//! Invoice tokens that identify orders to shoppers and the payment gateway.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of random bytes behind an invoice (two hex chars each).
const INVOICE_BYTES: usize = 9;

/// Errors that can occur when parsing an [`Invoice`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvoiceError {
    /// Wrong number of characters.
    #[error("invoice must be {expected} characters")]
    Length {
        /// Required length.
        expected: usize,
    },
    /// A character outside `0-9a-f`.
    #[error("invoice must be lowercase hexadecimal")]
    NotHex,
}

/// An 18-character lowercase hex token drawn from the OS-seeded CSPRNG.
///
/// ```
/// use bazaar_core::Invoice;
///
/// let invoice = Invoice::generate();
/// assert_eq!(invoice.as_str().len(), Invoice::LENGTH);
/// assert_eq!(invoice.as_str().parse::<Invoice>().unwrap(), invoice);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Invoice(String);

impl Invoice {
    /// Length of the text form.
    pub const LENGTH: usize = INVOICE_BYTES * 2;

    /// Draw a fresh random invoice.
    #[must_use]
    pub fn generate() -> Self {
        let bytes: [u8; INVOICE_BYTES] = rand::random();
        Self(hex::encode(bytes))
    }

    /// The token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Invoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Invoice {
    type Err = InvoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != Self::LENGTH {
            return Err(InvoiceError::Length {
                expected: Self::LENGTH,
            });
        }
        if !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(InvoiceError::NotHex);
        }
        Ok(Self(s.to_owned()))
    }
}

impl TryFrom<String> for Invoice {
    type Error = InvoiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Invoice> for String {
    fn from(invoice: Invoice) -> Self {
        invoice.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_generated_shape() {
        let invoice = Invoice::generate();
        assert_eq!(invoice.as_str().len(), 18);
        assert!(invoice.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(invoice.as_str(), invoice.as_str().to_lowercase());
    }

    #[test]
    fn test_generated_tokens_differ() {
        let tokens: HashSet<Invoice> = (0..500).map(|_| Invoice::generate()).collect();
        assert_eq!(tokens.len(), 500);
    }

    #[test]
    fn test_parse_rejects_bad_tokens() {
        assert_eq!(
            "abc".parse::<Invoice>(),
            Err(InvoiceError::Length { expected: 18 })
        );
        assert_eq!(
            "ABCDEF0123456789AB".parse::<Invoice>(),
            Err(InvoiceError::NotHex)
        );
        assert!("0123456789abcdef01".parse::<Invoice>().is_ok());
    }
}
