//! Curio Cart - Client-side shopping cart state container.
//!
//! # Architecture
//!
//! - [`store::CartStore`] - the single shared cart: line items, drawer
//!   visibility, derived totals, synchronous listeners and a watch channel
//! - [`persist`] - versioned stored format and the background write queue
//! - [`storage`] - key-value persistence media (memory, files)
//! - [`checkout`] - turns the cart into an order and clears it once placed
//! - [`gate`] - session check guarding add-to-cart on product surfaces
//! - [`wishlist`] - saved products that can be sent to the cart while in stock
//! - [`config`] - environment configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use curio_cart::{CartStore, FileStore, STORAGE_KEY};
//! use curio_core::{Price, ProductSnapshot};
//!
//! # async fn run() {
//! let cart = CartStore::load(Arc::new(FileStore::new(".curio")), STORAGE_KEY).await;
//! cart.add_item(ProductSnapshot::new(1, "Artisan Candle Set", Price::from_cents(4500)));
//! assert_eq!(cart.total_item_count(), 1);
//! cart.shutdown().await;
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkout;
pub mod config;
pub mod error;
pub mod gate;
pub mod persist;
pub mod state;
pub mod storage;
pub mod store;
pub mod wishlist;

use std::sync::Arc;

pub use checkout::{
    CheckoutError, OrderDraft, OrderLine, OrderReceipt, OrderSubmitter, ShippingDetails,
    SubmitError, place_order,
};
pub use config::{CartConfig, ConfigError, LogFormat};
pub use error::{CartError, Result};
pub use gate::{GateError, SessionGate, StaticSession, guarded_add, guarded_add_units};
pub use persist::{STORAGE_KEY, STORAGE_VERSION};
pub use state::{CartLineItem, CartState};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use store::{CartStore, ListenerId};
pub use wishlist::{Wishlist, WishlistError, WishlistItem};

/// Open the file-backed cart described by `config`.
pub async fn open(config: &CartConfig) -> CartStore {
    let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&config.storage_dir));
    CartStore::load(storage, &config.storage_key).await
}
