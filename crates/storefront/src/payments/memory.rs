//! In-memory payment gateway.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use super::{CheckoutRequest, CheckoutSession, CompletedCheckout, GatewayError, Payer, PaymentGateway};

#[derive(Debug, Default)]
struct GatewayState {
    sessions: HashMap<String, (CheckoutRequest, bool)>,
    created: Vec<CheckoutRequest>,
    next_id: u64,
    should_fail: bool,
    payer: Payer,
}

/// Payment gateway that records sessions instead of charging anyone.
///
/// Sessions start unpaid; call [`complete`](Self::complete) to play the payer
/// finishing the hosted page.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<GatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Create a gateway that reports `payer` for every session.
    #[must_use]
    pub fn new(payer: Payer) -> Self {
        let gateway = Self::default();
        gateway.write().payer = payer;
        gateway
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, GatewayState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, GatewayState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent call fail as if the gateway were down.
    pub fn set_fail(&self, should_fail: bool) {
        self.write().should_fail = should_fail;
    }

    /// Mark a session as paid. Returns `false` for unknown sessions.
    pub fn complete(&self, session_id: &str) -> bool {
        self.write()
            .sessions
            .get_mut(session_id)
            .map(|(_, paid)| *paid = true)
            .is_some()
    }

    /// Every checkout request received, oldest first.
    #[must_use]
    pub fn created(&self) -> Vec<CheckoutRequest> {
        self.read().created.clone()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let mut state = self.write();
        if state.should_fail {
            return Err(GatewayError::Unavailable("simulated outage".to_owned()));
        }
        request.amount.minor_units()?;

        state.next_id += 1;
        let id = format!("cs_test_{}", state.next_id);
        state.sessions.insert(id.clone(), (request.clone(), false));
        state.created.push(request.clone());

        Ok(CheckoutSession {
            url: format!("https://checkout.gateway.test/pay/{id}"),
            id,
        })
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CompletedCheckout, GatewayError> {
        let state = self.read();
        if state.should_fail {
            return Err(GatewayError::Unavailable("simulated outage".to_owned()));
        }

        let (request, paid) = state
            .sessions
            .get(session_id)
            .ok_or_else(|| GatewayError::InvalidSession(session_id.to_owned()))?;

        Ok(CompletedCheckout {
            session_id: session_id.to_owned(),
            invoice: Some(request.invoice.clone()),
            paid: *paid,
            amount_total: Some(request.amount),
            payer: state.payer.clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bazaar_core::Invoice;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            invoice: Invoice::generate(),
            amount: "12.00".parse().unwrap(),
            success_url: "https://shop.test/success?session_id={CHECKOUT_SESSION_ID}".into(),
            cancel_url: "https://shop.test/cancel".into(),
        }
    }

    #[tokio::test]
    async fn test_sessions_start_unpaid() {
        let gateway = InMemoryPaymentGateway::default();
        let session = gateway.create_checkout_session(&request()).await.unwrap();

        let done = gateway.retrieve_checkout_session(&session.id).await.unwrap();
        assert!(!done.paid);

        assert!(gateway.complete(&session.id));
        let done = gateway.retrieve_checkout_session(&session.id).await.unwrap();
        assert!(done.paid);
    }

    #[tokio::test]
    async fn test_unknown_session_and_outage() {
        let gateway = InMemoryPaymentGateway::default();
        assert!(matches!(
            gateway.retrieve_checkout_session("cs_nope").await,
            Err(GatewayError::InvalidSession(_))
        ));

        gateway.set_fail(true);
        assert!(matches!(
            gateway.create_checkout_session(&request()).await,
            Err(GatewayError::Unavailable(_))
        ));
        assert!(gateway.created().is_empty());
    }
}
