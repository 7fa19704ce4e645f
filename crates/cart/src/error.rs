//! Crate-level error type.
//!
//! Cart mutations are total and never fail, and storage faults are
//! swallowed by the store. `CartError` covers the fallible commands driven
//! through the cart: checkout and caller input.

use thiserror::Error;

use crate::checkout::CheckoutError;

/// Errors surfaced by cart-adjacent operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Checkout failed; the cart is unchanged.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Caller input could not be interpreted.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;
