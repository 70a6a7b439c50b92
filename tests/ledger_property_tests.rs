//! Property-based tests for the inventory ledger and order lifecycle
//!
//! Random sequences of submissions, acceptances and rejections are applied to a
//! fresh market. After every step the ledger bounds, share conservation and the
//! one-way order lifecycle must hold, whatever the individual step returned.

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use share_market::{
    BusinessId, MarketError, MarketService, Money, OrderId, OrderStatus, UserId,
};

// PROPERTY TEST STRATEGIES

#[derive(Debug, Clone)]
enum Step {
    Submit { business: usize, quantity: u64, cents: u64 },
    Decide { order: usize, status: &'static str },
}

/// Strategy for the status an owner asks for, including an out-of-domain one
fn status_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        4 => Just("accepted"),
        2 => Just("rejected"),
        1 => Just("pending"),
        1 => Just("cancelled"),
    ]
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0usize..2, 0u64..=400, 0u64..=10_000).prop_map(|(business, quantity, cents)| {
            Step::Submit {
                business,
                quantity,
                cents,
            }
        }),
        (0usize..32, status_strategy()).prop_map(|(order, status)| Step::Decide { order, status }),
    ]
}

fn rank(status: OrderStatus) -> u8 {
    match status {
        OrderStatus::Pending => 0,
        OrderStatus::Accepted | OrderStatus::Rejected => 1,
    }
}

fn market() -> (MarketService, Vec<BusinessId>) {
    let db = sled::Config::new().temporary(true).open().unwrap();
    let service = MarketService::new(Arc::new(db)).unwrap();
    let owner = UserId::generate().unwrap();
    let businesses = [("North", 500), ("South", 1_000)]
        .into_iter()
        .map(|(name, shares)| service.create_business(&owner, name, shares).unwrap().id().clone())
        .collect();
    (service, businesses)
}

// PROPERTY TESTS
proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Property: the ledger stays in bounds and sold shares equal purchased shares
    ///
    /// Whatever mix of valid and invalid requests arrives, every business keeps
    /// `0 <= available <= total`, and `total - available` is exactly the sum of
    /// its purchase quantities.
    #[test]
    fn ledger_is_conserved(steps in prop::collection::vec(step_strategy(), 1..40)) {
        let (service, businesses) = market();
        let buyer = UserId::generate().unwrap();
        let mut orders: Vec<OrderId> = Vec::new();
        let mut last_seen: HashMap<OrderId, OrderStatus> = HashMap::new();

        for step in steps {
            match step {
                Step::Submit { business, quantity, cents } => {
                    let before = service.business(&businesses[business]).unwrap();
                    match service.submit_order(&businesses[business], &buyer, quantity, Money::from_cents(cents)) {
                        Ok(order) => {
                            prop_assert!(quantity > 0 && cents > 0);
                            prop_assert!(quantity <= before.available_shares());
                            last_seen.insert(order.id().clone(), order.status());
                            orders.push(order.id().clone());
                        }
                        Err(MarketError::Validation(_)) => {
                            prop_assert!(quantity == 0 || cents == 0);
                        }
                        Err(MarketError::InsufficientShares { .. }) => {
                            prop_assert!(quantity > before.available_shares());
                        }
                        Err(other) => {
                            prop_assert!(false, "unexpected error {}", other);
                        }
                    }
                    // submission never moves the ledger
                    let after = service.business(&businesses[business]).unwrap();
                    prop_assert_eq!(before.available_shares(), after.available_shares());
                }
                Step::Decide { order, status } => {
                    if orders.is_empty() {
                        continue;
                    }
                    let order_id = &orders[order % orders.len()];
                    let _ = service.transition_order(order_id, status);
                }
            }

            for business_id in &businesses {
                let business = service.business(business_id).unwrap();
                prop_assert!(business.available_shares() <= business.total_shares());

                let sold: u64 = service
                    .purchases_for_business(business_id)
                    .unwrap()
                    .iter()
                    .map(|p| p.quantity())
                    .sum();
                prop_assert_eq!(sold, business.sold_shares());
            }

            for order_id in &orders {
                let order = service.order(order_id).unwrap();
                let previous = last_seen[order_id];
                prop_assert!(rank(order.status()) >= rank(previous));
                if previous != OrderStatus::Pending {
                    prop_assert_eq!(order.status(), previous);
                }
                prop_assert_eq!(
                    service.purchase_for_order(order_id).unwrap().is_some(),
                    order.status() == OrderStatus::Accepted
                );
                last_seen.insert(order_id.clone(), order.status());
            }
        }
    }

    /// Property: a failed acceptance leaves ledger, order and purchases untouched
    #[test]
    fn failed_acceptance_is_atomic(
        (pool, first, second) in (1u64..=1_000).prop_flat_map(|pool| (Just(pool), 1..=pool, 1..=pool))
    ) {
        prop_assume!(first + second > pool);

        let db = sled::Config::new().temporary(true).open().unwrap();
        let service = MarketService::new(Arc::new(db)).unwrap();
        let business = service.create_business(&UserId::generate().unwrap(), "Pool", pool).unwrap();
        let buyer = UserId::generate().unwrap();

        let a = service.submit_order(business.id(), &buyer, first, Money::from_cents(10)).unwrap();
        let b = service.submit_order(business.id(), &buyer, second, Money::from_cents(10)).unwrap();
        service.transition_order(a.id(), "accepted").unwrap();

        let err = service.transition_order(b.id(), "accepted").unwrap_err();
        let is_insufficient = matches!(err, MarketError::InsufficientShares { .. });
        prop_assert!(is_insufficient);

        prop_assert_eq!(service.business(business.id()).unwrap().available_shares(), pool - first);
        prop_assert_eq!(service.order(b.id()).unwrap().status(), OrderStatus::Pending);
        prop_assert!(service.purchase_for_order(b.id()).unwrap().is_none());
        prop_assert_eq!(service.purchases_for_business(business.id()).unwrap().len(), 1);
    }
}
