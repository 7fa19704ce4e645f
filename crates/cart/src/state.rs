//! Cart line items and the cart aggregate.
//!
//! [`CartState`] owns the pure state transitions. Every transition reports
//! a [`Change`] so the store knows whether to publish and whether the item
//! list needs persisting. Transitions never fail: unknown ids, zero
//! quantities and empty carts are all defined no-ops.

use curio_core::{Price, ProductId, ProductSnapshot};
use serde::{Deserialize, Serialize};

/// One product and the quantity of it held in the cart.
///
/// The display and pricing fields are a snapshot taken when the product was
/// first added. `quantity` is at least 1 for as long as the item is in a
/// cart. The unit price is stored as a JSON number, the shape web clients
/// sharing the storage slot read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub id: ProductId,
    pub name: String,
    #[serde(rename = "price", with = "curio_core::price::as_number")]
    pub unit_price: Price,
    pub image: String,
    pub category: String,
    pub quantity: u32,
}

impl CartLineItem {
    fn from_snapshot(product: ProductSnapshot, quantity: u32) -> Self {
        Self {
            id: product.id,
            name: product.name,
            unit_price: product.unit_price,
            image: product.image,
            category: product.category,
            quantity,
        }
    }

    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// What a transition touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Change {
    /// The line-item collection changed (publish and persist).
    pub items: bool,
    /// Drawer visibility changed (publish only).
    pub drawer: bool,
}

impl Change {
    pub const NONE: Self = Self {
        items: false,
        drawer: false,
    };
    pub const ITEMS: Self = Self {
        items: true,
        drawer: false,
    };
    pub const DRAWER: Self = Self {
        items: false,
        drawer: true,
    };

    /// Whether anything changed.
    #[must_use]
    pub const fn any(self) -> bool {
        self.items || self.drawer
    }

    const fn merge(self, other: Self) -> Self {
        Self {
            items: self.items || other.items,
            drawer: self.drawer || other.drawer,
        }
    }
}

/// The cart aggregate: ordered, id-unique line items plus drawer visibility.
///
/// Drawer visibility is transient. It is never persisted and a freshly
/// constructed state always starts with the drawer closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    items: Vec<CartLineItem>,
    is_drawer_open: bool,
}

impl CartState {
    /// Build a closed-drawer state from previously persisted items.
    ///
    /// Stored data is not trusted to uphold the cart invariants: items with
    /// a zero quantity are dropped and repeated ids are merged into the
    /// first occurrence with their quantities summed.
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = CartLineItem>) -> Self {
        let mut state = Self::default();
        for item in items {
            if item.quantity == 0 {
                continue;
            }
            match state.position(item.id) {
                Some(index) => {
                    if let Some(existing) = state.items.get_mut(index) {
                        existing.quantity = existing.quantity.saturating_add(item.quantity);
                    }
                }
                None => state.items.push(item),
            }
        }
        state
    }

    /// Line items in first-added order.
    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    /// Look up the line item for a product.
    #[must_use]
    pub fn item(&self, id: ProductId) -> Option<&CartLineItem> {
        self.items.iter().find(|item| item.id == id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub const fn is_drawer_open(&self) -> bool {
        self.is_drawer_open
    }

    /// Sum of quantities across all line items.
    #[must_use]
    pub fn total_item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Subtotal: sum of `unit_price × quantity`. No tax or shipping.
    ///
    /// Saturates rather than overflowing for absurd prices or quantities.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.items.iter().map(CartLineItem::line_total).sum()
    }

    fn position(&self, id: ProductId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// Add one unit of `product` and open the drawer.
    pub(crate) fn add_item(&mut self, product: ProductSnapshot) -> Change {
        self.add_units(product, 1)
    }

    /// Add `units` units of `product` at once. Zero units changes nothing.
    pub(crate) fn add_units(&mut self, product: ProductSnapshot, units: u32) -> Change {
        if units == 0 {
            return Change::NONE;
        }

        match self.position(product.id) {
            Some(index) => {
                if let Some(item) = self.items.get_mut(index) {
                    item.quantity = item.quantity.saturating_add(units);
                }
            }
            None => self.items.push(CartLineItem::from_snapshot(product, units)),
        }

        Change::ITEMS.merge(self.set_drawer(true))
    }

    pub(crate) fn remove_item(&mut self, id: ProductId) -> Change {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        if self.items.len() == before {
            Change::NONE
        } else {
            Change::ITEMS
        }
    }

    /// Overwrite the quantity of an existing item; `quantity <= 0` removes it.
    ///
    /// Never inserts. Quantities above `u32::MAX` saturate.
    pub(crate) fn set_quantity(&mut self, id: ProductId, quantity: i64) -> Change {
        if quantity <= 0 {
            return self.remove_item(id);
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);

        match self.items.iter_mut().find(|item| item.id == id) {
            Some(item) if item.quantity != quantity => {
                item.quantity = quantity;
                Change::ITEMS
            }
            _ => Change::NONE,
        }
    }

    pub(crate) fn clear(&mut self) -> Change {
        if self.items.is_empty() {
            return Change::NONE;
        }
        self.items.clear();
        Change::ITEMS
    }

    pub(crate) fn set_drawer(&mut self, open: bool) -> Change {
        if self.is_drawer_open == open {
            return Change::NONE;
        }
        self.is_drawer_open = open;
        Change::DRAWER
    }

    pub(crate) fn toggle_drawer(&mut self) -> Change {
        self.set_drawer(!self.is_drawer_open)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn product(id: i32, cents: i64) -> ProductSnapshot {
        ProductSnapshot::new(id, format!("Product {id}"), Price::from_cents(cents))
    }

    fn quantities(state: &CartState) -> Vec<(i32, u32)> {
        state
            .items()
            .iter()
            .map(|item| (item.id.as_i32(), item.quantity))
            .collect()
    }

    #[test]
    fn test_add_item_appends_then_increments() {
        let mut state = CartState::default();
        let first = state.add_item(product(1, 1000));
        assert_eq!(
            first,
            Change {
                items: true,
                drawer: true,
            }
        );
        assert_eq!(state.add_item(product(1, 1000)), Change::ITEMS);
        assert_eq!(quantities(&state), vec![(1, 2)]);
    }

    #[test]
    fn test_readd_keeps_original_position_and_snapshot() {
        let mut state = CartState::default();
        state.add_item(product(1, 1000));
        state.add_item(product(2, 500));
        state.add_item(ProductSnapshot::new(1, "Renamed", Price::from_cents(1)));

        assert_eq!(quantities(&state), vec![(1, 2), (2, 1)]);
        let first = state.item(ProductId::new(1)).unwrap();
        assert_eq!(first.name, "Product 1");
        assert_eq!(first.unit_price, Price::from_cents(1000));
    }

    #[test]
    fn test_add_units_zero_is_noop() {
        let mut state = CartState::default();
        assert_eq!(state.add_units(product(1, 1000), 0), Change::NONE);
        assert!(state.is_empty());
        assert!(!state.is_drawer_open());
    }

    #[test]
    fn test_add_units_accumulates() {
        let mut state = CartState::default();
        state.add_units(product(4, 9500), 3);
        state.add_item(product(4, 9500));
        assert_eq!(quantities(&state), vec![(4, 4)]);
    }

    #[test]
    fn test_set_quantity_non_positive_removes() {
        for quantity in [0, -1, -50, i64::MIN] {
            let mut state = CartState::default();
            state.add_item(product(1, 1000));
            state.add_item(product(2, 500));
            assert_eq!(state.set_quantity(ProductId::new(1), quantity), Change::ITEMS);
            assert!(state.item(ProductId::new(1)).is_none());
            assert_eq!(quantities(&state), vec![(2, 1)]);
        }
    }

    #[test]
    fn test_set_quantity_overwrites_exactly() {
        let mut state = CartState::default();
        state.add_item(product(1, 1000));
        assert_eq!(state.set_quantity(ProductId::new(1), 7), Change::ITEMS);
        assert_eq!(quantities(&state), vec![(1, 7)]);
        assert_eq!(state.set_quantity(ProductId::new(1), 7), Change::NONE);
    }

    #[test]
    fn test_set_quantity_never_inserts() {
        let mut state = CartState::default();
        assert_eq!(state.set_quantity(ProductId::new(9), 3), Change::NONE);
        assert!(state.is_empty());
    }

    #[test]
    fn test_set_quantity_saturates() {
        let mut state = CartState::default();
        state.add_item(product(1, 1));
        state.set_quantity(ProductId::new(1), i64::MAX);
        assert_eq!(state.item(ProductId::new(1)).unwrap().quantity, u32::MAX);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut state = CartState::default();
        state.add_item(product(1, 1000));
        let before = state.clone();
        assert_eq!(state.remove_item(ProductId::new(2)), Change::NONE);
        assert_eq!(state, before);
    }

    #[test]
    fn test_clear_leaves_drawer() {
        let mut state = CartState::default();
        state.add_item(product(1, 1000));
        assert!(state.is_drawer_open());
        assert_eq!(state.clear(), Change::ITEMS);
        assert!(state.is_empty());
        assert!(state.is_drawer_open());
        assert_eq!(state.clear(), Change::NONE);
    }

    #[test]
    fn test_drawer_toggle() {
        let mut state = CartState::default();
        assert_eq!(state.toggle_drawer(), Change::DRAWER);
        assert!(state.is_drawer_open());
        assert_eq!(state.set_drawer(true), Change::NONE);
        assert_eq!(state.toggle_drawer(), Change::DRAWER);
        assert!(!state.is_drawer_open());
    }

    #[test]
    fn test_totals() {
        let mut state = CartState::default();
        assert_eq!(state.total_item_count(), 0);
        assert_eq!(state.total_price(), Price::ZERO);

        state.add_item(product(1, 1000));
        state.add_item(product(1, 1000));
        state.add_item(product(2, 500));
        state.add_units(product(3, 199), 3);

        assert_eq!(state.total_item_count(), 6);
        assert_eq!(state.total_price(), Price::from_cents(3097));
    }

    #[test]
    fn test_total_price_saturates() {
        let max = Price::new(Decimal::MAX);
        let unit_price = "10000000000000000000000000".parse().unwrap();
        let mut state = CartState::default();
        state.add_item(ProductSnapshot::new(1, "Heirloom", unit_price));
        state.set_quantity(ProductId::new(1), 100_000);
        state.add_item(product(2, 500));

        let line = state.item(ProductId::new(1)).unwrap();
        assert_eq!(line.line_total(), max);
        assert_eq!(state.total_price(), max);
    }

    #[test]
    fn test_from_items_repairs_invariants() {
        let line = |id: i32, quantity: u32| CartLineItem {
            quantity,
            ..CartLineItem::from_snapshot(product(id, 100), 1)
        };
        let state = CartState::from_items([line(1, 2), line(2, 0), line(3, 1), line(1, 3)]);

        assert_eq!(quantities(&state), vec![(1, 5), (3, 1)]);
        assert!(!state.is_drawer_open());
    }

    #[test]
    fn test_line_item_wire_format() {
        let item = CartLineItem::from_snapshot(
            product(1, 4500).with_image("candle.jpg").with_category("Home"),
            2,
        );
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["price"], 45.0);
        assert_eq!(json["image"], "candle.jpg");
        assert_eq!(json["quantity"], 2);
    }
}
