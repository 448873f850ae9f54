//! Session middleware configuration.
//!
//! Sessions carry the shopping cart, the logged-in user and pending notices.
//! Production uses `PostgreSQL`-backed sessions; tests plug in
//! `tower_sessions::MemoryStore`.

use tower_sessions::{Expiry, Session, SessionManagerLayer, SessionStore};

use crate::config::StorefrontConfig;
use crate::models::{Cart, Notice, session_keys};

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "bazaar_session";

/// Idle time after which a session (and its cart) expires, in seconds.
const SESSION_IDLE_SECONDS: i64 = 30 * 60;

/// Create the session layer over `store`.
///
/// # Arguments
///
/// * `store` - Session store (the sessions table must exist for `PostgresStore`)
/// * `config` - Storefront configuration (for the `Secure` cookie flag)
#[must_use]
pub fn create_session_layer<S: SessionStore + Clone>(
    store: S,
    config: &StorefrontConfig,
) -> SessionManagerLayer<S> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_IDLE_SECONDS),
        ))
        .with_secure(config.secure_cookies())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Load the visitor's cart. `None` means the session has no cart key.
///
/// # Errors
///
/// Returns an error if the session store fails or the stored cart is unreadable.
pub async fn load_cart(session: &Session) -> Result<Option<Cart>, tower_sessions::session::Error> {
    session.get::<Cart>(session_keys::SHOPPING_CART).await
}

/// Load the visitor's cart, dropping it if it can no longer be read.
///
/// A cart saved by an older release may not match the current line layout.
/// It is logged and removed, and the visitor continues as if they had no cart.
pub async fn load_cart_or_discard(session: &Session) -> Option<Cart> {
    match load_cart(session).await {
        Ok(cart) => cart,
        Err(e) => {
            tracing::warn!(error = %e, "Discarding unreadable cart");
            if let Err(e) = session.remove_value(session_keys::SHOPPING_CART).await {
                tracing::error!(error = %e, "Failed to drop unreadable cart");
            }
            None
        }
    }
}

/// Save the visitor's cart, creating the cart key if needed.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn store_cart(session: &Session, cart: &Cart) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::SHOPPING_CART, cart).await
}

/// Drop the cart key from the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_cart(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove_value(session_keys::SHOPPING_CART).await?;
    Ok(())
}

/// Queue a notice for the next rendered page.
///
/// Notices are best effort: a session failure is logged, not returned.
pub async fn push_notice(session: &Session, notice: Notice) {
    let mut notices = session
        .get::<Vec<Notice>>(session_keys::NOTICES)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();
    notices.push(notice);

    if let Err(e) = session.insert(session_keys::NOTICES, notices).await {
        tracing::warn!(error = %e, "Failed to queue notice");
    }
}

/// Drain queued notices.
pub async fn take_notices(session: &Session) -> Vec<Notice> {
    match session.remove::<Vec<Notice>>(session_keys::NOTICES).await {
        Ok(notices) => notices.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read notices");
            Vec::new()
        }
    }
}
