//! Domain models for the storefront.
//!
//! These are validated domain types, separate from database row types and
//! from the view structs handed to templates.

pub mod cart;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use cart::{Cart, CartLineItem};
pub use order::{CustomerInfo, CustomerInfoError, NewOrder, Order};
pub use product::{CatalogSort, ListingQuery, Page, Product, ProductDraft};
pub use session::{Notice, NoticeLevel, keys as session_keys};
pub use user::{CurrentUser, User};
