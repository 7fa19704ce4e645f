//! Integration tests for Curio.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p curio-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_persistence` - Cart survives restarts through a shared medium
//! - `cart_properties` - Cart invariants over generated operation sequences
//! - `checkout_flow` - Gate, cart and checkout working together
//!
//! This crate also provides the fixtures those tests share.

use curio_core::{Price, ProductSnapshot};

/// Products from the demo catalog, as browsing surfaces snapshot them.
#[must_use]
pub fn catalog() -> Vec<ProductSnapshot> {
    [
        (1, "Artisan Candle Set", 4500, "Home"),
        (2, "Ceramic Vase Collection", 6800, "Décor"),
        (3, "Handwoven Basket", 5200, "Storage"),
        (4, "Luxury Gift Box", 9500, "Gifts"),
        (5, "Dried Flower Arrangement", 3800, "Décor"),
        (6, "Linen Table Runner", 4200, "Home"),
    ]
    .into_iter()
    .map(|(id, name, cents, category)| {
        ProductSnapshot::new(id, name, Price::from_cents(cents))
            .with_category(category)
            .with_image(format!("https://images.curio.shop/products/{id}.jpg"))
    })
    .collect()
}

/// A single catalog product by ID.
///
/// # Panics
///
/// Panics if `id` is not in [`catalog`].
#[must_use]
pub fn product(id: i32) -> ProductSnapshot {
    catalog()
        .into_iter()
        .find(|product| product.id.as_i32() == id)
        .expect("product id is in the demo catalog")
}
