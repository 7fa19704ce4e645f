//! Cart invariants over generated operation sequences.

use std::collections::HashSet;

use curio_cart::{CartState, CartStore};
use curio_core::{Price, ProductId};
use curio_integration_tests::product;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Add(i32),
    AddUnits(i32, u32),
    Remove(i32),
    Set(i32, i64),
    Clear,
    Toggle,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (1..=6i32).prop_map(Op::Add),
        1 => (1..=6i32, 0..5u32).prop_map(|(id, units)| Op::AddUnits(id, units)),
        2 => (1..=8i32).prop_map(Op::Remove),
        3 => (1..=8i32, -3..10i64).prop_map(|(id, quantity)| Op::Set(id, quantity)),
        1 => Just(Op::Clear),
        1 => Just(Op::Toggle),
    ]
}

fn apply(cart: &CartStore, op: &Op) {
    match *op {
        Op::Add(id) => cart.add_item(product(id)),
        Op::AddUnits(id, units) => cart.add_units(product(id), units),
        Op::Remove(id) => cart.remove_item(ProductId::new(id)),
        Op::Set(id, quantity) => cart.set_quantity(ProductId::new(id), quantity),
        Op::Clear => cart.clear(),
        Op::Toggle => cart.toggle_drawer(),
    }
}

fn assert_invariants(state: &CartState) {
    let mut seen = HashSet::new();
    for item in state.items() {
        assert!(seen.insert(item.id), "duplicate line for {}", item.id);
        assert!(item.quantity >= 1, "non-positive quantity for {}", item.id);
    }

    let count: u64 = state.items().iter().map(|i| u64::from(i.quantity)).sum();
    let price: Price = state
        .items()
        .iter()
        .map(|i| i.unit_price.times(i.quantity))
        .sum();
    assert_eq!(state.total_item_count(), count);
    assert_eq!(state.total_price(), price);
}

proptest! {
    #[test]
    fn invariants_hold_after_every_operation(ops in prop::collection::vec(op(), 0..60)) {
        let cart = CartStore::new();
        for op in &ops {
            apply(&cart, op);
            assert_invariants(&cart.snapshot());
        }
    }

    #[test]
    fn adding_accumulates_per_product(ids in prop::collection::vec(1..=6i32, 1..40)) {
        let cart = CartStore::new();
        for id in &ids {
            cart.add_item(product(*id));
        }

        for item in cart.items() {
            let expected = ids.iter().filter(|id| **id == item.id.as_i32()).count();
            prop_assert_eq!(item.quantity as usize, expected);
        }
        prop_assert_eq!(cart.total_item_count(), ids.len() as u64);
        prop_assert!(cart.is_drawer_open());
    }

    #[test]
    fn first_add_order_is_kept(ids in prop::collection::vec(1..=6i32, 1..40)) {
        let cart = CartStore::new();
        let mut first_seen = Vec::new();
        for id in &ids {
            if !first_seen.contains(id) {
                first_seen.push(*id);
            }
            cart.add_item(product(*id));
        }

        let order: Vec<i32> = cart.items().iter().map(|i| i.id.as_i32()).collect();
        prop_assert_eq!(order, first_seen);
    }

    #[test]
    fn non_positive_quantity_removes(id in 1..=6i32, quantity in i64::MIN..=0) {
        let cart = CartStore::new();
        cart.add_item(product(id));
        cart.add_item(product(if id == 6 { 1 } else { id + 1 }));

        cart.set_quantity(ProductId::new(id), quantity);

        prop_assert!(cart.items().iter().all(|i| i.id.as_i32() != id));
        prop_assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn removing_absent_id_changes_nothing(ids in prop::collection::vec(1..=3i32, 0..10), absent in 4..=100i32) {
        let cart = CartStore::new();
        for id in &ids {
            cart.add_item(product(*id));
        }
        let before = cart.snapshot();

        cart.remove_item(ProductId::new(absent));
        cart.set_quantity(ProductId::new(absent), 5);

        prop_assert_eq!(cart.snapshot(), before);
    }

    #[test]
    fn clear_leaves_drawer(ids in prop::collection::vec(1..=6i32, 0..10), toggles in 0..4usize) {
        let cart = CartStore::new();
        for id in &ids {
            cart.add_item(product(*id));
        }
        for _ in 0..toggles {
            cart.toggle_drawer();
        }
        let drawer = cart.is_drawer_open();

        cart.clear();

        prop_assert!(cart.is_empty());
        prop_assert_eq!(cart.is_drawer_open(), drawer);
    }
}
