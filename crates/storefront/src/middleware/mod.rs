//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors, new hub per request)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions; carts, login and notices live here)

pub mod auth;
pub mod request_id;
pub mod session;

pub use auth::{OptionalUser, RequireAdmin, clear_current_user, set_current_user};
pub use request_id::request_id_middleware;
pub use session::{
    clear_cart, create_session_layer, load_cart, load_cart_or_discard, push_notice, store_cart, take_notices,
};
