//! Payment gateway adapter.
//!
//! # Architecture
//!
//! - [`PaymentGateway`] is the seam the checkout service talks to
//! - [`StripeClient`] drives Stripe's hosted Checkout over its REST API
//! - [`InMemoryPaymentGateway`] stands in for Stripe in tests
//!
//! The gateway only ever sees one line item: the order's grand total under a
//! fixed label. The invoice travels as `client_reference_id` so a completed
//! session can be mapped back to its order.

mod memory;
mod stripe;

pub use memory::InMemoryPaymentGateway;
pub use stripe::StripeClient;

use async_trait::async_trait;
use thiserror::Error;

use bazaar_core::{Invoice, Price, PriceError};

/// Errors that can occur when talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with an error status.
    #[error("gateway returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The session id is malformed or unknown to the gateway.
    #[error("invalid checkout session: {0}")]
    InvalidSession(String),

    /// The amount cannot be charged.
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] PriceError),

    /// The gateway could not be reached.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

/// What to charge for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub invoice: Invoice,
    /// Grand total of the order.
    pub amount: Price,
    /// Must contain the `{CHECKOUT_SESSION_ID}` placeholder.
    pub success_url: String,
    pub cancel_url: String,
}

/// A hosted checkout session the visitor is sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted payment page.
    pub url: String,
}

/// Who paid, as far as the gateway knows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payer {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// A checkout session read back after the visitor returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedCheckout {
    pub session_id: String,
    /// Invoice passed as the client reference, if it parses.
    pub invoice: Option<Invoice>,
    /// Whether the gateway considers the session paid.
    pub paid: bool,
    pub amount_total: Option<Price>,
    pub payer: Payer,
}

/// Hosted-checkout payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session for one order.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Retrieve a session and its payer.
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CompletedCheckout, GatewayError>;
}

/// The placeholder the gateway replaces with the session id in success URLs.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Whether a session id is safe to put in a request path.
#[must_use]
pub fn is_valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id.len() <= 255
        && session_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_validation() {
        assert!(is_valid_session_id("cs_test_a1B2c3"));
        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("../customers/cus_1"));
        assert!(!is_valid_session_id("cs test"));
    }
}
