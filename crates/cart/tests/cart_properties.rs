//! Property tests for the cart contract.

use proptest::prelude::*;

use storefront_cart::{CartProduct, CartService, StoredCartService};
use storefront_core::{Money, ProductId};
use storefront_storage::InMemoryStore;

#[derive(Debug, Clone)]
enum Op {
    Add(usize),
    Remove(usize),
    Update(usize, i64),
    Clear,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0usize..5).prop_map(Op::Add),
        1 => (0usize..5).prop_map(Op::Remove),
        2 => ((0usize..5), -2i64..8).prop_map(|(i, q)| Op::Update(i, q)),
        1 => Just(Op::Clear),
    ]
}

fn id(i: usize) -> ProductId {
    ProductId::new(format!("sku-{i}")).unwrap()
}

fn price(i: usize) -> u64 {
    (i as u64 + 1) * 137
}

fn product(i: usize) -> CartProduct {
    CartProduct::new(id(i), format!("Product {i}"), Money::from_minor(price(i)))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    /// Property: n adds of the same product yield one line with quantity n.
    #[test]
    fn repeated_adds_count_calls(n in 1u32..60) {
        let mut cart = StoredCartService::empty(InMemoryStore::new());
        for _ in 0..n {
            cart.add_item(product(0));
        }
        prop_assert_eq!(cart.items().len(), 1);
        prop_assert_eq!(cart.items()[0].quantity, n);
    }

    /// Property: after any operation sequence the total equals Σ price × qty of
    /// a reference model, and every line has quantity >= 1.
    #[test]
    fn total_matches_reference_model(ops in prop::collection::vec(op(), 0..60)) {
        let mut cart = StoredCartService::empty(InMemoryStore::new());
        let mut model: Vec<(usize, u64)> = Vec::new();

        for op in ops {
            match op {
                Op::Add(i) => {
                    cart.add_item(product(i));
                    match model.iter_mut().find(|(j, _)| *j == i) {
                        Some((_, q)) => *q += 1,
                        None => model.push((i, 1)),
                    }
                }
                Op::Remove(i) => {
                    cart.remove_item(&id(i));
                    model.retain(|(j, _)| *j != i);
                }
                Op::Update(i, q) => {
                    cart.update_quantity(&id(i), q);
                    if q < 1 {
                        model.retain(|(j, _)| *j != i);
                    } else if let Some((_, mq)) = model.iter_mut().find(|(j, _)| *j == i) {
                        *mq = q as u64;
                    }
                }
                Op::Clear => {
                    cart.clear();
                    model.clear();
                }
            }
        }

        let expected: u64 = model.iter().map(|(i, q)| price(*i) * q).sum();
        prop_assert_eq!(cart.total(), Money::from_minor(expected));
        prop_assert!(cart.items().iter().all(|l| l.quantity >= 1));

        let ids: Vec<ProductId> = cart.items().iter().map(|l| l.id.clone()).collect();
        let model_ids: Vec<ProductId> = model.iter().map(|(i, _)| id(*i)).collect();
        prop_assert_eq!(ids, model_ids);
    }

    /// Property: removing an absent product never changes the cart.
    #[test]
    fn remove_absent_is_noop(adds in prop::collection::vec(0usize..3, 0..10)) {
        let mut cart = StoredCartService::empty(InMemoryStore::new());
        for i in adds {
            cart.add_item(product(i));
        }
        let before = cart.items().to_vec();
        cart.remove_item(&id(4));
        cart.remove_item(&id(4));
        prop_assert_eq!(cart.items(), before.as_slice());
    }
}
