//! Cart commands.
//!
//! Every command loads the file-backed cart, applies one operation, logs the
//! resulting cart and drains the write queue before returning.

use curio_cart::{CartConfig, CartState, CartStore};
use curio_core::{Price, ProductId, ProductSnapshot};
use tracing::info;

/// Product fields supplied on the command line.
pub struct AddArgs {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub image: String,
    pub category: String,
    pub units: u32,
}

/// Log the current cart.
pub async fn show(config: &CartConfig) {
    let cart = curio_cart::open(config).await;
    log_summary(&cart.snapshot());
    cart.shutdown().await;
}

/// Add a product to the cart.
pub async fn add(config: &CartConfig, args: AddArgs) {
    let product = ProductSnapshot::new(args.id, args.name, args.price)
        .with_image(args.image)
        .with_category(args.category);

    run(config, |cart| {
        info!(product_id = %args.id, units = args.units, "Adding to cart");
        cart.add_units(product, args.units);
    })
    .await;
}

/// Remove a product from the cart.
pub async fn remove(config: &CartConfig, id: ProductId) {
    run(config, |cart| {
        if cart.snapshot().item(id).is_none() {
            info!(product_id = %id, "Product not in cart");
        }
        cart.remove_item(id);
    })
    .await;
}

/// Overwrite the quantity of a product already in the cart.
pub async fn set(config: &CartConfig, id: ProductId, quantity: i64) {
    run(config, |cart| {
        if cart.snapshot().item(id).is_none() {
            info!(product_id = %id, "Product not in cart, nothing to update");
        }
        cart.set_quantity(id, quantity);
    })
    .await;
}

/// Empty the cart.
pub async fn clear(config: &CartConfig) {
    run(config, CartStore::clear).await;
}

async fn run(config: &CartConfig, op: impl FnOnce(&CartStore)) {
    let cart = curio_cart::open(config).await;
    op(&cart);
    log_summary(&cart.snapshot());
    cart.shutdown().await;
}

/// Log each line and the totals of a cart.
pub fn log_summary(state: &CartState) {
    if state.is_empty() {
        info!("Cart is empty");
        return;
    }

    info!("Cart");
    info!("====");
    for item in state.items() {
        info!(
            "  {} x {} (#{}) @ {} = {}",
            item.quantity,
            item.name,
            item.id,
            item.unit_price.display(),
            item.line_total().display()
        );
    }
    info!("Items: {}", state.total_item_count());
    info!("Subtotal: {}", state.total_price().display());
}
