//! Session gate for product surfaces.
//!
//! Shoppers must be signed in to add products. The check lives here rather
//! than in [`CartStore`], which stays session-agnostic.

use async_trait::async_trait;
use curio_core::ProductSnapshot;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::store::CartStore;

/// Rejection from a gated cart operation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    /// No active session; the surface should route to sign-in.
    #[error("Sign in required to add items to the cart")]
    SignInRequired,
}

/// Source of truth for "is someone signed in".
#[async_trait]
pub trait SessionGate: Send + Sync {
    async fn has_active_session(&self) -> bool;
}

/// A gate with a fixed answer, for guests and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticSession(pub bool);

#[async_trait]
impl SessionGate for StaticSession {
    async fn has_active_session(&self) -> bool {
        self.0
    }
}

/// Add one unit of `product` if a session is active.
///
/// # Errors
///
/// Returns `GateError::SignInRequired` without touching the cart when no
/// session is active.
pub async fn guarded_add(
    cart: &CartStore,
    gate: &dyn SessionGate,
    product: ProductSnapshot,
) -> Result<(), GateError> {
    guarded_add_units(cart, gate, product, 1).await
}

/// Add `units` units of `product` if a session is active.
///
/// # Errors
///
/// Returns `GateError::SignInRequired` without touching the cart when no
/// session is active.
#[instrument(skip(cart, gate, product), fields(product_id = %product.id))]
pub async fn guarded_add_units(
    cart: &CartStore,
    gate: &dyn SessionGate,
    product: ProductSnapshot,
    units: u32,
) -> Result<(), GateError> {
    if !gate.has_active_session().await {
        debug!("Rejected add to cart without a session");
        return Err(GateError::SignInRequired);
    }
    cart.add_units(product, units);
    Ok(())
}
