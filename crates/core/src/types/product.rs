//! Product snapshot handed from browsing surfaces to the cart.

use serde::{Deserialize, Serialize};

use crate::{Price, ProductId};

/// Display and pricing fields copied from a catalog product.
///
/// The cart trusts these values as given and never re-syncs them with the
/// catalog: a snapshot taken at add time is what the line item keeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    #[serde(rename = "price")]
    pub unit_price: Price,
    /// Image URL or asset reference.
    pub image: String,
    pub category: String,
}

impl ProductSnapshot {
    /// Create a snapshot with empty image and category.
    #[must_use]
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, unit_price: Price) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit_price,
            image: String::new(),
            category: String::new(),
        }
    }

    /// Set the image reference.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Set the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}
