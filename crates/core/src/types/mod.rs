//! Core types for Bazaar.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod invoice;
pub mod price;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use invoice::{Invoice, InvoiceError};
pub use price::{Price, PriceError};
pub use status::*;
