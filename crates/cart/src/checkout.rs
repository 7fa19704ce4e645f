//! Checkout boundary.
//!
//! The cart knows nothing about payments or order storage. Checkout reads
//! a snapshot of the cart into an [`OrderDraft`], hands it to an
//! [`OrderSubmitter`], and clears the cart only once the submitter confirms
//! the order was placed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use curio_core::{Email, EmailError, OrderId, OrderStatus, Price, ProductId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::state::CartState;
use crate::store::CartStore;

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart has no items to order.
    #[error("Cart is empty")]
    EmptyCart,

    /// A required shipping field is blank.
    #[error("Missing shipping field: {0}")]
    MissingField(&'static str),

    /// The contact email is invalid.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The order backend did not accept the order.
    #[error("Order submission failed: {0}")]
    Submission(#[from] SubmitError),
}

/// Failure reported by an [`OrderSubmitter`].
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The backend refused the order.
    #[error("Order rejected: {0}")]
    Rejected(String),

    /// The backend could not be reached.
    #[error("Order backend unavailable: {0}")]
    Unavailable(String),
}

/// Where the order ships and who to contact about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub customer_name: String,
    pub email: Email,
    pub address: String,
    pub city: String,
    pub zip: String,
}

impl ShippingDetails {
    /// Validate and build shipping details. Fields are trimmed.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::MissingField` for a blank field and
    /// `CheckoutError::InvalidEmail` for a malformed email.
    pub fn new(
        customer_name: &str,
        email: &str,
        address: &str,
        city: &str,
        zip: &str,
    ) -> Result<Self, CheckoutError> {
        Ok(Self {
            customer_name: required("name", customer_name)?,
            email: Email::parse(email)?,
            address: required("address", address)?,
            city: required("city", city)?,
            zip: required("zip", zip)?,
        })
    }
}

fn required(field: &'static str, value: &str) -> Result<String, CheckoutError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CheckoutError::MissingField(field));
    }
    Ok(value.to_owned())
}

/// One ordered product, priced at the cart's snapshot price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub price_at_purchase: Price,
}

/// An order ready to submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub shipping: ShippingDetails,
    pub lines: Vec<OrderLine>,
    pub total_amount: Price,
    pub status: OrderStatus,
}

impl OrderDraft {
    /// Build an order from a cart snapshot.
    ///
    /// Payment is settled before submission, so drafts are marked
    /// [`OrderStatus::Paid`].
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` if the cart has no items.
    pub fn from_cart(cart: &CartState, shipping: ShippingDetails) -> Result<Self, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        Ok(Self {
            shipping,
            lines: cart
                .items()
                .iter()
                .map(|item| OrderLine {
                    product_id: item.id,
                    quantity: item.quantity,
                    price_at_purchase: item.unit_price,
                })
                .collect(),
            total_amount: cart.total_price(),
            status: OrderStatus::Paid,
        })
    }
}

/// Confirmation returned once an order is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: OrderId,
    pub placed_at: DateTime<Utc>,
}

/// Order backend that persists orders and their lines.
#[async_trait]
pub trait OrderSubmitter: Send + Sync {
    /// Store the order. Returning Ok means the order is placed.
    async fn submit(&self, draft: &OrderDraft) -> Result<OrderReceipt, SubmitError>;
}

/// Submit the current cart as an order and clear the cart on success.
///
/// On any error the cart is left untouched.
///
/// # Errors
///
/// Returns `CheckoutError::EmptyCart` for an empty cart and
/// `CheckoutError::Submission` if the submitter fails.
#[instrument(skip_all, fields(email_domain = %shipping.email.domain()))]
pub async fn place_order(
    cart: &CartStore,
    submitter: &dyn OrderSubmitter,
    shipping: ShippingDetails,
) -> Result<OrderReceipt, CheckoutError> {
    let draft = OrderDraft::from_cart(&cart.snapshot(), shipping)?;

    match submitter.submit(&draft).await {
        Ok(receipt) => {
            info!(
                order_id = %receipt.order_id,
                status = draft.status.as_str(),
                lines = draft.lines.len(),
                total = %draft.total_amount,
                "Order placed"
            );
            cart.clear();
            Ok(receipt)
        }
        Err(e) => {
            warn!(error = %e, "Order submission failed, cart kept");
            Err(e.into())
        }
    }
}
