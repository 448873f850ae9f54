//! Hosted checkout.
//!
//! `begin` turns a placed order into a gateway session and returns the URL to
//! send the visitor to. `confirm` runs when the gateway sends the visitor
//! back: it reads the session, and if the gateway reports it paid, records
//! the payment in the ledger.

use thiserror::Error;
use tracing::instrument;

use bazaar_core::{Invoice, Price};

use super::cart::compute_total;
use super::orders::{LedgerError, OrderLedger};
use crate::db::OrderStore;
use crate::models::Order;
use crate::payments::{
    CheckoutRequest, CheckoutSession, GatewayError, Payer, PaymentGateway, SESSION_ID_PLACEHOLDER,
};

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// The order was paid already; a second session would charge twice.
    #[error("order {0} is already paid")]
    AlreadyPaid(Invoice),
}

/// What the confirmation page shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub invoice: Option<Invoice>,
    pub paid: bool,
    pub amount_total: Option<Price>,
    pub payer: Payer,
}

/// Bridges the order ledger and the payment gateway.
pub struct CheckoutService<'a> {
    ledger: OrderLedger<'a>,
    gateway: &'a dyn PaymentGateway,
    base_url: &'a str,
    mark_paid_on_create: bool,
}

impl<'a> CheckoutService<'a> {
    /// Create a checkout service. `base_url` is the storefront's public URL.
    #[must_use]
    pub fn new(orders: &'a dyn OrderStore, gateway: &'a dyn PaymentGateway, base_url: &'a str) -> Self {
        Self {
            ledger: OrderLedger::new(orders),
            gateway,
            base_url: base_url.trim_end_matches('/'),
            mark_paid_on_create: false,
        }
    }

    /// Mark orders paid as soon as their session is created instead of when
    /// the gateway confirms payment.
    #[must_use]
    pub fn mark_paid_on_create(mut self, enabled: bool) -> Self {
        self.mark_paid_on_create = enabled;
        self
    }

    /// Start a hosted checkout for a stored order.
    ///
    /// The charged amount always comes from the order's own line items.
    /// `client_price` is only compared against it, and a mismatch is logged.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NotFound` if no order has this invoice.
    /// Returns `CheckoutError::AlreadyPaid` if the order needs no payment.
    /// Returns `CheckoutError::Gateway` if the session cannot be created.
    #[instrument(skip(self), fields(invoice = %invoice))]
    pub async fn begin_for_invoice(
        &self,
        invoice: &Invoice,
        client_price: Option<&str>,
    ) -> Result<CheckoutSession, CheckoutError> {
        let order = self.ledger.find(invoice).await?;
        if order.is_paid() {
            return Err(CheckoutError::AlreadyPaid(order.invoice));
        }
        let total = compute_total(&order.line_items);

        if let Some(claimed) = client_price
            && !claimed
                .parse::<Price>()
                .is_ok_and(|p| p.rounded() == total.rounded())
        {
            tracing::warn!(claimed, total = %total, "Ignoring client-supplied price");
        }

        self.begin(&order, total).await
    }

    /// Create a gateway session charging `total` for `order`.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Gateway` if the session cannot be created.
    pub async fn begin(&self, order: &Order, total: Price) -> Result<CheckoutSession, CheckoutError> {
        let request = CheckoutRequest {
            invoice: order.invoice.clone(),
            amount: total,
            success_url: format!("{}/success?session_id={SESSION_ID_PLACEHOLDER}", self.base_url),
            cancel_url: format!("{}/cancel", self.base_url),
        };

        let session = self.gateway.create_checkout_session(&request).await?;

        if self.mark_paid_on_create {
            self.ledger.mark_paid(&order.invoice).await?;
        }

        Ok(session)
    }

    /// Read back a gateway session and record payment if it completed.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Gateway` if the session is unknown or the
    /// gateway is unreachable.
    #[instrument(skip(self))]
    pub async fn confirm(&self, session_id: &str) -> Result<Confirmation, CheckoutError> {
        let completed = self.gateway.retrieve_checkout_session(session_id).await?;

        if completed.paid
            && let Some(invoice) = &completed.invoice
        {
            match self.ledger.mark_paid(invoice).await {
                Ok(_) => {}
                Err(LedgerError::NotFound(_)) => {
                    tracing::warn!(invoice = %invoice, "Paid session references unknown order");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Confirmation {
            invoice: completed.invoice,
            paid: completed.paid,
            amount_total: completed.amount_total,
            payer: completed.payer,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryOrderStore;
    use crate::models::{Cart, CartLineItem, CustomerInfo};
    use crate::payments::InMemoryPaymentGateway;

    const BASE: &str = "https://shop.test/";

    async fn placed(store: &InMemoryOrderStore) -> Order {
        let cart = Cart::single(
            "7",
            CartLineItem {
                name: "Mug".into(),
                unit_price: "9.99".parse().unwrap(),
                quantity: 2,
                image_url: String::new(),
                pid: 1,
            },
        );
        OrderLedger::new(store)
            .create_order(CustomerInfo::default(), Some(&cart))
            .await
            .unwrap()
            .order
    }

    fn payer() -> Payer {
        Payer {
            name: Some("Ada".into()),
            email: Some("ada@example.com".into()),
        }
    }

    #[tokio::test]
    async fn test_begin_charges_stored_total_and_leaves_order_pending() {
        let store = InMemoryOrderStore::new();
        let gateway = InMemoryPaymentGateway::new(payer());
        let order = placed(&store).await;

        let checkout = CheckoutService::new(&store, &gateway, BASE);
        let session = checkout.begin_for_invoice(&order.invoice, Some("0.01")).await.unwrap();

        assert!(session.url.contains(&session.id));
        let sent = gateway.created();
        assert_eq!(sent[0].amount.to_string(), "19.98");
        assert_eq!(sent[0].success_url, "https://shop.test/success?session_id={CHECKOUT_SESSION_ID}");
        assert_eq!(sent[0].cancel_url, "https://shop.test/cancel");
        assert!(!store.orders()[0].is_paid());
    }

    #[tokio::test]
    async fn test_confirm_marks_paid_only_when_gateway_says_so() {
        let store = InMemoryOrderStore::new();
        let gateway = InMemoryPaymentGateway::new(payer());
        let order = placed(&store).await;
        let checkout = CheckoutService::new(&store, &gateway, BASE);

        let session = checkout.begin(&order, "19.98".parse().unwrap()).await.unwrap();

        let unpaid = checkout.confirm(&session.id).await.unwrap();
        assert!(!unpaid.paid);
        assert!(!store.orders()[0].is_paid());

        gateway.complete(&session.id);
        let paid = checkout.confirm(&session.id).await.unwrap();
        assert!(paid.paid);
        assert_eq!(paid.payer, payer());
        assert_eq!(paid.invoice, Some(order.invoice.clone()));
        assert!(store.orders()[0].is_paid());

        // Reloading the success page is harmless.
        checkout.confirm(&session.id).await.unwrap();
        assert!(store.orders()[0].is_paid());
    }

    #[tokio::test]
    async fn test_mark_paid_on_create_compatibility() {
        let store = InMemoryOrderStore::new();
        let gateway = InMemoryPaymentGateway::default();
        let order = placed(&store).await;

        CheckoutService::new(&store, &gateway, BASE)
            .mark_paid_on_create(true)
            .begin_for_invoice(&order.invoice, None)
            .await
            .unwrap();
        assert!(store.orders()[0].is_paid());
    }

    #[tokio::test]
    async fn test_paid_order_gets_no_second_session() {
        let store = InMemoryOrderStore::new();
        let gateway = InMemoryPaymentGateway::default();
        let order = placed(&store).await;
        OrderLedger::new(&store).mark_paid(&order.invoice).await.unwrap();

        let checkout = CheckoutService::new(&store, &gateway, BASE);
        assert!(matches!(
            checkout.begin_for_invoice(&order.invoice, None).await,
            Err(CheckoutError::AlreadyPaid(invoice)) if invoice == order.invoice
        ));
        assert!(gateway.created().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failures_surface() {
        let store = InMemoryOrderStore::new();
        let gateway = InMemoryPaymentGateway::default();
        let order = placed(&store).await;
        let checkout = CheckoutService::new(&store, &gateway, BASE);

        assert!(matches!(
            checkout.confirm("cs_unknown").await,
            Err(CheckoutError::Gateway(GatewayError::InvalidSession(_)))
        ));

        gateway.set_fail(true);
        assert!(matches!(
            checkout.begin(&order, Price::ZERO).await,
            Err(CheckoutError::Gateway(_))
        ));
        assert!(matches!(
            checkout.begin_for_invoice(&Invoice::generate(), None).await,
            Err(CheckoutError::Ledger(LedgerError::NotFound(_)))
        ));
    }
}
