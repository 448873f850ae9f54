//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `cart` - Cart engine: add, update, remove and total session cart lines
//! - `orders` - Order ledger: create pending orders, mark them paid
//! - `checkout` - Hosted checkout: begin a gateway session, reconcile on return
//! - `auth` - Password registration and login, admin policy
//!
//! Services take their collaborators as trait objects and hold no state of
//! their own, so handlers build them per request from [`crate::state::AppState`].

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod orders;

pub use auth::{AuthError, AuthService, is_admin};
pub use cart::{CartError, CartPresence, UpdateOutcome};
pub use checkout::{CheckoutError, CheckoutService, Confirmation};
pub use orders::{LedgerError, OrderLedger, PlacedOrder};
