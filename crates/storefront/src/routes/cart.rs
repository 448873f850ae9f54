//! Cart route handlers.
//!
//! The cart lives in the session. Each handler loads it, runs one cart
//! engine operation and writes it back. Recoverable failures become notices
//! on the next page rather than error responses.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::Price;

use super::{Layout, back_to};
use crate::error::{Result, add_breadcrumb};
use crate::middleware::{clear_cart, load_cart_or_discard, push_notice, store_cart};
use crate::models::{Cart, Notice};
use crate::services::cart::{self as engine, CartError, CartPresence, UpdateOutcome};
use crate::state::AppState;

/// One cart line as shown on the cart page.
pub struct CartLineView {
    pub product_id: String,
    pub name: String,
    pub image_url: String,
    pub unit_price: Price,
    pub quantity: u32,
    pub line_total: Price,
}

/// Cart lines and grand total, shared by the cart and order review pages.
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub total: Price,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            lines: cart
                .lines()
                .map(|(id, line)| CartLineView {
                    product_id: id.to_owned(),
                    name: line.name.clone(),
                    image_url: line.image_url.clone(),
                    unit_price: line.unit_price,
                    quantity: line.quantity,
                    line_total: line.line_total(),
                })
                .collect(),
            total: engine::compute_total(cart),
        }
    }
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartTemplate {
    pub layout: Layout,
    pub cart: CartView,
}

/// Missing fields arrive empty and are rejected by the handler with a notice.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddToCartForm {
    pub product_id: String,
    pub quantity: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QuantityForm {
    pub quantity: String,
}

fn parse_quantity(raw: &str) -> Option<u32> {
    raw.trim().parse().ok()
}

/// Redirect for cart failures that are not the shopper's to fix.
fn unexpected(err: &impl std::fmt::Display) -> Response {
    tracing::error!(error = %err, "Cart operation failed");
    Redirect::to("/cart").into_response()
}

/// Add a product to the session cart.
#[instrument(skip(state, session, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Response {
    let back = back_to(&headers, &state.config().base_url, "/");
    let Some(quantity) = parse_quantity(&form.quantity) else {
        push_notice(&session, Notice::error("Please enter a valid quantity")).await;
        return Redirect::to(&back).into_response();
    };

    let mut cart = load_cart_or_discard(&session).await.unwrap_or_default();
    match engine::add_item(&mut cart, state.catalog(), &form.product_id, quantity).await {
        Ok(()) => {
            if let Err(err) = store_cart(&session, &cart).await {
                return unexpected(&err);
            }
            add_breadcrumb("cart", "Added to cart", Some(&[("product_id", form.product_id.as_str())]));
            Redirect::to(&back).into_response()
        }
        Err(CartError::NotFound(_)) => Redirect::to("/").into_response(),
        Err(CartError::DuplicateItem(_)) => {
            push_notice(&session, Notice::warning("This product is already in your cart")).await;
            Redirect::to(&back).into_response()
        }
        Err(CartError::InvalidQuantity) => {
            push_notice(&session, Notice::error("Quantity must be at least 1")).await;
            Redirect::to(&back).into_response()
        }
        Err(err @ CartError::Repository(_)) => unexpected(&err),
    }
}

/// Display the cart, or send the visitor home when there is nothing in it.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Response {
    let cart = load_cart_or_discard(&session).await;
    let Some(cart) = cart.filter(|c| CartPresence::of(Some(c)).has_lines()) else {
        return Redirect::to("/").into_response();
    };

    let layout = Layout::load(&state, &session).await;
    CartTemplate {
        layout,
        cart: CartView::from(&cart),
    }
    .into_response()
}

/// Change a line's quantity, clamped to stock.
#[instrument(skip(state, session, headers, form))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Path(product_id): Path<String>,
    Form(form): Form<QuantityForm>,
) -> Response {
    let back = back_to(&headers, &state.config().base_url, "/cart");
    let Some(mut cart) = load_cart_or_discard(&session).await else {
        return Redirect::to("/").into_response();
    };

    let quantity = parse_quantity(&form.quantity).unwrap_or(0);
    match engine::update_quantity(&mut cart, state.catalog(), &product_id, quantity).await {
        Ok(outcome) => {
            if let Err(err) = store_cart(&session, &cart).await {
                return unexpected(&err);
            }
            let notice = match outcome {
                UpdateOutcome::Updated => Notice::info("Item is updated"),
                UpdateOutcome::StockLimited { stock } => Notice::warning(format!(
                    "This is a maximum amount of items in stock ({stock})"
                )),
            };
            push_notice(&session, notice).await;
            Redirect::to(&back).into_response()
        }
        Err(CartError::NotFound(_)) => Redirect::to("/").into_response(),
        Err(CartError::InvalidQuantity) => {
            push_notice(&session, Notice::error("Quantity must be at least 1")).await;
            Redirect::to(&back).into_response()
        }
        Err(err) => unexpected(&err),
    }
}

/// Remove a line from the cart.
#[instrument(skip(session))]
pub async fn remove(session: Session, Path(product_id): Path<String>) -> Response {
    let Some(mut cart) = load_cart_or_discard(&session).await else {
        return Redirect::to("/").into_response();
    };

    engine::remove_item(&mut cart, &product_id);
    if let Err(err) = store_cart(&session, &cart).await {
        return unexpected(&err);
    }
    Redirect::to("/cart").into_response()
}

/// Drop the whole cart.
#[instrument(skip(session))]
pub async fn clear(session: Session) -> Result<Redirect> {
    clear_cart(&session).await?;
    Ok(Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(" 3 "), Some(3));
        assert_eq!(parse_quantity("-1"), None);
        assert_eq!(parse_quantity("lots"), None);
        assert_eq!(parse_quantity(""), None);
    }
}
