//! Stripe Checkout over the REST API.
//!
//! Requests are form-encoded and authenticated with the secret key as a
//! bearer token. Only the handful of fields the storefront reads are
//! deserialized.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::instrument;

use bazaar_core::{Invoice, Price};

use super::{
    CheckoutRequest, CheckoutSession, CompletedCheckout, GatewayError, Payer, PaymentGateway,
    is_valid_session_id,
};
use crate::config::StripeConfig;

/// Client for Stripe Checkout.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
    currency: String,
    product_label: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
    client_reference_id: Option<String>,
    payment_status: Option<String>,
    amount_total: Option<i64>,
    customer: Option<String>,
    customer_details: Option<CustomerResponse>,
}

#[derive(Debug, Default, Deserialize)]
struct CustomerResponse {
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl From<CustomerResponse> for Payer {
    fn from(customer: CustomerResponse) -> Self {
        Self {
            name: customer.name,
            email: customer.email,
        }
    }
}

impl StripeClient {
    /// Create a new Stripe client.
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            inner: Arc::new(StripeClientInner {
                client: reqwest::Client::new(),
                api_base: config.api_base.trim_end_matches('/').to_owned(),
                secret_key: config.secret_key.expose_secret().to_owned(),
                currency: config.currency.clone(),
                product_label: config.product_label.clone(),
            }),
        }
    }

    /// Form fields for a one-line, payment-mode checkout session.
    fn session_params(&self, request: &CheckoutRequest) -> Result<Vec<(&'static str, String)>, GatewayError> {
        let unit_amount = request.amount.minor_units()?;

        Ok(vec![
            ("line_items[0][price_data][currency]", self.inner.currency.clone()),
            (
                "line_items[0][price_data][product_data][name]",
                self.inner.product_label.clone(),
            ),
            ("line_items[0][price_data][unit_amount]", unit_amount.to_string()),
            ("line_items[0][quantity]", "1".to_owned()),
            ("mode", "payment".to_owned()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("client_reference_id", request.invoice.to_string()),
            ("customer_creation", "always".to_owned()),
        ])
    }

    /// Read a JSON body, turning error statuses into [`GatewayError::Api`].
    async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| body.chars().take(200).collect());
            tracing::error!(status = %status, message = %message, "Stripe returned non-success status");
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse Stripe response");
            GatewayError::Api {
                status: status.as_u16(),
                message: format!("unreadable response: {e}"),
            }
        })
    }

    async fn fetch_customer(&self, customer_id: &str) -> Result<CustomerResponse, GatewayError> {
        if !is_valid_session_id(customer_id) {
            return Err(GatewayError::InvalidSession(format!("bad customer id {customer_id}")));
        }

        let response = self
            .inner
            .client
            .get(format!("{}/v1/customers/{customer_id}", self.inner.api_base))
            .bearer_auth(&self.inner.secret_key)
            .send()
            .await?;

        Self::parse(response).await
    }
}

fn completed_checkout(session: SessionResponse, payer: Payer) -> CompletedCheckout {
    CompletedCheckout {
        invoice: session
            .client_reference_id
            .as_deref()
            .and_then(|r| r.parse::<Invoice>().ok()),
        paid: matches!(session.payment_status.as_deref(), Some("paid" | "no_payment_required")),
        amount_total: session
            .amount_total
            .and_then(|cents| Price::from_minor_units(cents).ok()),
        session_id: session.id,
        payer,
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[instrument(skip(self, request), fields(invoice = %request.invoice, amount = %request.amount))]
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let params = self.session_params(request)?;

        let response = self
            .inner
            .client
            .post(format!("{}/v1/checkout/sessions", self.inner.api_base))
            .bearer_auth(&self.inner.secret_key)
            .form(&params)
            .send()
            .await?;

        let session: SessionResponse = Self::parse(response).await?;
        let url = session
            .url
            .ok_or_else(|| GatewayError::InvalidSession(format!("session {} has no url", session.id)))?;

        tracing::info!(session_id = %session.id, "Created checkout session");
        Ok(CheckoutSession { id: session.id, url })
    }

    #[instrument(skip(self))]
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CompletedCheckout, GatewayError> {
        if !is_valid_session_id(session_id) {
            return Err(GatewayError::InvalidSession(session_id.to_owned()));
        }

        let response = self
            .inner
            .client
            .get(format!("{}/v1/checkout/sessions/{session_id}", self.inner.api_base))
            .bearer_auth(&self.inner.secret_key)
            .send()
            .await?;

        let mut session: SessionResponse = match Self::parse(response).await {
            Err(GatewayError::Api { status: 404, message }) => {
                return Err(GatewayError::InvalidSession(message));
            }
            other => other?,
        };

        let details = session.customer_details.take().unwrap_or_default();
        let payer = match session.customer.as_deref() {
            Some(customer_id) => match self.fetch_customer(customer_id).await {
                Ok(customer) => Payer::from(customer),
                Err(e) => {
                    tracing::warn!(error = %e, "Falling back to session customer details");
                    Payer::from(details)
                }
            },
            None => Payer::from(details),
        };

        Ok(completed_checkout(session, payer))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn client() -> StripeClient {
        StripeClient::new(&StripeConfig {
            secret_key: SecretString::from("sk_test_x"),
            api_base: "https://api.stripe.test/".to_owned(),
            currency: "usd".to_owned(),
            product_label: "Purchase".to_owned(),
        })
    }

    #[test]
    fn test_session_params_charge_total_once() {
        let request = CheckoutRequest {
            invoice: "0123456789abcdef01".parse().unwrap(),
            amount: "24.98".parse().unwrap(),
            success_url: "https://shop.test/success?session_id={CHECKOUT_SESSION_ID}".to_owned(),
            cancel_url: "https://shop.test/cancel".to_owned(),
        };
        let params = client().session_params(&request).unwrap();
        let get = |key: &str| params.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str());

        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("2498"));
        assert_eq!(get("line_items[0][quantity]"), Some("1"));
        assert_eq!(get("line_items[0][price_data][product_data][name]"), Some("Purchase"));
        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("client_reference_id"), Some("0123456789abcdef01"));
        assert!(get("success_url").unwrap().ends_with("{CHECKOUT_SESSION_ID}"));
    }

    #[test]
    fn test_api_base_trailing_slash_trimmed() {
        assert_eq!(client().inner.api_base, "https://api.stripe.test");
    }

    #[test]
    fn test_completed_checkout_from_session() {
        let session: SessionResponse = serde_json::from_str(
            r#"{
                "id": "cs_test_1",
                "url": null,
                "client_reference_id": "0123456789abcdef01",
                "payment_status": "paid",
                "amount_total": 2498,
                "customer": null,
                "customer_details": {"name": "Ada", "email": "ada@example.com"}
            }"#,
        )
        .unwrap();
        let payer = Payer::from(CustomerResponse {
            name: Some("Ada".into()),
            email: None,
        });
        let done = completed_checkout(session, payer);

        assert!(done.paid);
        assert_eq!(done.invoice.unwrap().as_str(), "0123456789abcdef01");
        assert_eq!(done.amount_total.unwrap().to_string(), "24.98");
        assert_eq!(done.payer.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_unpaid_session_and_foreign_reference() {
        let session: SessionResponse = serde_json::from_str(
            r#"{"id": "cs_test_2", "client_reference_id": "order-42", "payment_status": "unpaid"}"#,
        )
        .unwrap();
        let done = completed_checkout(session, Payer::default());
        assert!(!done.paid);
        assert!(done.invoice.is_none());
    }
}
