//! Checkout route handlers.
//!
//! Flow: `/information` collects customer details, `/checkout` records a
//! pending order, `/create-checkout-session` hands the visitor to the payment
//! gateway, and the gateway sends them back to `/success` or `/cancel`.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::{Invoice, Price};

use super::Layout;
use super::cart::CartView;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::{clear_cart, load_cart_or_discard, push_notice};
use crate::models::{CustomerInfo, Notice, Order};
use crate::services::{CheckoutError, LedgerError, OrderLedger};
use crate::state::AppState;

/// Customer details form, echoed back when validation fails.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CustomerForm {
    pub name: String,
    pub city: String,
    pub address: String,
    pub zipcode: String,
    pub email: String,
}

/// Customer details page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/information.html")]
pub struct InformationTemplate {
    pub layout: Layout,
    pub form: CustomerForm,
}

/// Order review page: the order just placed and the button to pay for it.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/confirm.html")]
pub struct ConfirmTemplate {
    pub layout: Layout,
    pub cart: CartView,
    pub order: Order,
    pub total: Price,
}

/// Payment return page.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/success.html")]
pub struct SuccessTemplate {
    pub layout: Layout,
    pub invoice: Option<Invoice>,
    pub paid: bool,
    pub amount_total: Option<Price>,
    pub payer_name: Option<String>,
    pub payer_email: Option<String>,
}

/// Generic payment failure page.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/failed.html")]
pub struct FailedTemplate {
    pub layout: Layout,
}

/// `Refresh` header that returns the visitor to the shop after payment.
const SUCCESS_REFRESH: &str = "4; url='/'";

async fn failed(state: &AppState, session: &Session) -> Response {
    let layout = Layout::load(state, session).await;
    (StatusCode::BAD_GATEWAY, FailedTemplate { layout }).into_response()
}

/// Ask for shipping and contact details.
#[instrument(skip(state, session))]
pub async fn information(State(state): State<AppState>, session: Session) -> Response {
    if load_cart_or_discard(&session).await.is_none() {
        return Redirect::to("/").into_response();
    }

    let layout = Layout::load(&state, &session).await;
    InformationTemplate {
        layout,
        form: CustomerForm::default(),
    }
    .into_response()
}

/// Record a pending order for the session cart and show it for review.
///
/// Without a cart there is nothing to order, so the visitor goes home before
/// the form is looked at.
#[instrument(skip(state, session, form))]
pub async fn checkout(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CustomerForm>,
) -> Result<Response> {
    let Some(cart) = load_cart_or_discard(&session).await else {
        return Ok(Redirect::to("/").into_response());
    };

    let customer = match CustomerInfo::new(&form.name, &form.city, &form.address, &form.zipcode, &form.email) {
        Ok(customer) => customer,
        Err(err) => {
            let layout = Layout::load(&state, &session)
                .await
                .with_notice(Notice::error(err.to_string()));
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, InformationTemplate { layout, form }).into_response());
        }
    };

    let placed = match OrderLedger::new(state.orders()).create_order(customer, Some(&cart)).await {
        Ok(placed) => placed,
        Err(LedgerError::EmptyCart | LedgerError::NotFound(_)) => return Ok(Redirect::to("/").into_response()),
        Err(LedgerError::Repository(err)) => return Err(err.into()),
    };

    add_breadcrumb("checkout", "Order placed", Some(&[("invoice", placed.order.invoice.as_str())]));
    let layout = Layout::load(&state, &session).await;
    Ok(ConfirmTemplate {
        cart: CartView::from(&placed.order.line_items),
        layout,
        total: placed.total,
        order: placed.order,
    }
    .into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateSessionForm {
    pub invoice: Option<String>,
    pub price: Option<String>,
}

/// Open a hosted checkout session and redirect the visitor to it.
///
/// The amount charged is recomputed from the stored order; a submitted
/// `price` is only compared against it.
#[instrument(skip(state, session))]
pub async fn create_session(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CreateSessionForm>,
) -> Result<Response> {
    let Some(invoice) = form.invoice.as_deref().and_then(|raw| raw.parse::<Invoice>().ok()) else {
        return Ok(Redirect::to("/").into_response());
    };

    match state.checkout().begin_for_invoice(&invoice, form.price.as_deref()).await {
        Ok(checkout) => {
            tracing::info!(invoice = %invoice, session_id = %checkout.id, "Redirecting to payment gateway");
            Ok(Redirect::to(&checkout.url).into_response())
        }
        Err(CheckoutError::Ledger(LedgerError::NotFound(_) | LedgerError::EmptyCart)) => {
            Ok(Redirect::to("/").into_response())
        }
        Err(CheckoutError::AlreadyPaid(_)) => {
            push_notice(&session, Notice::info("This order has already been paid")).await;
            Ok(Redirect::to("/").into_response())
        }
        Err(CheckoutError::Gateway(err)) => {
            tracing::error!(error = %err, invoice = %invoice, "Could not create checkout session");
            Ok(failed(&state, &session).await)
        }
        Err(CheckoutError::Ledger(LedgerError::Repository(err))) => Err(err.into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct SuccessParams {
    pub session_id: Option<String>,
}

/// Payment return page.
///
/// The cart is emptied first: once the visitor has been to the gateway the
/// order owns those lines whatever the outcome.
#[instrument(skip(state, session))]
pub async fn success(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<SuccessParams>,
) -> Result<Response> {
    clear_cart(&session).await?;

    let Some(session_id) = params.session_id.filter(|id| !id.trim().is_empty()) else {
        return Ok(failed(&state, &session).await);
    };

    match state.checkout().confirm(&session_id).await {
        Ok(confirmation) => {
            let layout = Layout::load(&state, &session).await;
            let page = SuccessTemplate {
                layout,
                invoice: confirmation.invoice,
                paid: confirmation.paid,
                amount_total: confirmation.amount_total,
                payer_name: confirmation.payer.name,
                payer_email: confirmation.payer.email,
            };
            Ok(([(header::REFRESH, SUCCESS_REFRESH)], page).into_response())
        }
        Err(err) => {
            tracing::error!(error = %err, "Could not confirm checkout session");
            Ok(failed(&state, &session).await)
        }
    }
}

/// The visitor backed out of payment. The cart is still in the session.
#[instrument(skip(session))]
pub async fn cancel(session: Session) -> Redirect {
    push_notice(&session, Notice::info("Payment cancelled. Your cart is still here.")).await;
    Redirect::to("/cart")
}
