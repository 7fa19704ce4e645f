//! Saved-for-later products.
//!
//! A wishlist is a per-session list of product snapshots, unique by id and
//! kept in the order they were saved. It is not persisted. Saved products
//! can be sent to the cart while they are in stock; sending one leaves it
//! on the wishlist.

use curio_core::{ProductId, ProductSnapshot};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::store::CartStore;

/// Rejection from [`Wishlist::add_to_cart`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WishlistError {
    #[error("Product {0} is not on the wishlist")]
    NotSaved(ProductId),

    /// The product cannot be bought right now.
    #[error("Product {0} is out of stock")]
    OutOfStock(ProductId),
}

/// A saved product and whether it can currently be bought.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WishlistItem {
    pub product: ProductSnapshot,
    pub in_stock: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wishlist {
    items: Vec<WishlistItem>,
}

impl Wishlist {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Saved products in the order they were saved.
    #[must_use]
    pub fn items(&self) -> &[WishlistItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: ProductId) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<&WishlistItem> {
        self.items.iter().find(|item| item.product.id == id)
    }

    /// Save a product. Returns false if it was already saved, in which case
    /// only its stock flag is refreshed.
    pub fn save(&mut self, product: ProductSnapshot, in_stock: bool) -> bool {
        if let Some(existing) = self.items.iter_mut().find(|item| item.product.id == product.id) {
            existing.in_stock = in_stock;
            return false;
        }
        self.items.push(WishlistItem { product, in_stock });
        true
    }

    /// Remove a saved product. Returns whether it was saved.
    pub fn remove(&mut self, id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.product.id != id);
        self.items.len() != before
    }

    /// Update the stock flag of a saved product. Returns whether it was saved.
    pub fn set_in_stock(&mut self, id: ProductId, in_stock: bool) -> bool {
        match self.items.iter_mut().find(|item| item.product.id == id) {
            Some(item) => {
                item.in_stock = in_stock;
                true
            }
            None => false,
        }
    }

    /// Add one unit of a saved, in-stock product to `cart`.
    ///
    /// # Errors
    ///
    /// Returns `WishlistError::NotSaved` for an unknown id and
    /// `WishlistError::OutOfStock` when the product cannot be bought. The
    /// cart is untouched in both cases.
    #[instrument(skip(self, cart))]
    pub fn add_to_cart(&self, id: ProductId, cart: &CartStore) -> Result<(), WishlistError> {
        let item = self.get(id).ok_or(WishlistError::NotSaved(id))?;
        if !item.in_stock {
            debug!("Saved product is out of stock");
            return Err(WishlistError::OutOfStock(id));
        }
        cart.add_item(item.product.clone());
        Ok(())
    }
}
