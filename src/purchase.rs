//! Immutable purchase receipts emitted by order acceptance
use chrono::Utc;

use crate::error::{MarketError, Result, Violations};
use crate::money::Money;
use crate::order::{BuyOrder, OrderStatus};
use crate::types::{BusinessId, OrderId, PurchaseId, TimeStamp, UserId};

// the part of a purchase covered by the receipt digest
#[derive(minicbor::Encode, Debug)]
struct ReceiptTerms<'a> {
    #[n(0)]
    order_id: &'a OrderId,
    #[n(1)]
    business_id: &'a BusinessId,
    #[n(2)]
    buyer_id: &'a UserId,
    #[n(3)]
    quantity: u64,
    #[n(4)]
    unit_price: Money,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    #[n(0)]
    id: PurchaseId,
    #[n(1)]
    order_id: OrderId,
    #[n(2)]
    business_id: BusinessId,
    #[n(3)]
    buyer_id: UserId,
    #[n(4)]
    quantity: u64,
    #[n(5)]
    unit_price: Money,
    #[n(6)]
    receipt: String, // sha256 of the cbor encoded terms
    #[n(7)]
    created_at: TimeStamp<Utc>,
}

impl Purchase {
    /// Snapshot the terms of an order that has just been accepted. Quantity and price are
    /// copied, later reads of the order or business never feed back into the purchase.
    pub(crate) fn from_accepted(order: &BuyOrder) -> Result<Self> {
        if order.status() != OrderStatus::Accepted {
            return Err(MarketError::Corrupted(format!(
                "purchase requested for order {} in status {}",
                order.id(),
                order.status()
            )));
        }

        let mut purchase = Self {
            id: PurchaseId::generate()?,
            order_id: order.id().clone(),
            business_id: order.business_id().clone(),
            buyer_id: order.buyer_id().clone(),
            quantity: order.quantity(),
            unit_price: order.unit_price(),
            receipt: String::new(),
            created_at: TimeStamp::new(),
        };
        purchase.validate()?;
        purchase.receipt = purchase.digest()?;

        Ok(purchase)
    }

    pub fn id(&self) -> &PurchaseId {
        &self.id
    }
    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }
    pub fn business_id(&self) -> &BusinessId {
        &self.business_id
    }
    pub fn buyer_id(&self) -> &UserId {
        &self.buyer_id
    }
    pub fn quantity(&self) -> u64 {
        self.quantity
    }
    pub fn unit_price(&self) -> Money {
        self.unit_price
    }
    pub fn receipt(&self) -> &str {
        &self.receipt
    }
    pub fn created_at(&self) -> &TimeStamp<Utc> {
        &self.created_at
    }
    pub fn total_price(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }

    pub fn validate(&self) -> Result<()> {
        let mut violations = Violations::default();
        violations.check(self.quantity > 0, "quantity", "must be greater than 0");
        violations.check(self.unit_price.is_positive(), "price", "must be greater than 0");
        violations.into_result()
    }

    /// True when the stored terms still hash to the receipt taken at acceptance.
    pub fn verify_receipt(&self) -> Result<bool> {
        Ok(self.digest()? == self.receipt)
    }

    fn digest(&self) -> Result<String> {
        let terms = ReceiptTerms {
            order_id: &self.order_id,
            business_id: &self.business_id,
            buyer_id: &self.buyer_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
        };
        let contents = minicbor::to_vec(&terms)?;

        Ok(sha256::digest(&contents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted_order() -> BuyOrder {
        let mut order = BuyOrder::new(
            BusinessId::generate().unwrap(),
            UserId::generate().unwrap(),
            1_000,
            Money::from_cents(50_000),
        )
        .unwrap();
        order.set_status(OrderStatus::Accepted);
        order
    }

    #[test]
    fn copies_terms_from_the_order() {
        let order = accepted_order();
        let purchase = Purchase::from_accepted(&order).unwrap();

        assert_eq!(purchase.order_id(), order.id());
        assert_eq!(purchase.quantity(), 1_000);
        assert_eq!(purchase.unit_price(), Money::from_cents(50_000));
        assert_eq!(purchase.total_price(), Some(Money::from_cents(50_000_000)));
        assert!(purchase.verify_receipt().unwrap());
    }

    #[test]
    fn tampered_terms_fail_receipt_check() {
        let mut purchase = Purchase::from_accepted(&accepted_order()).unwrap();
        purchase.quantity = 1;

        assert!(!purchase.verify_receipt().unwrap());
    }

    #[test]
    fn pending_order_cannot_produce_a_purchase() {
        let mut order = accepted_order();
        order.set_status(OrderStatus::Pending);

        assert!(matches!(
            Purchase::from_accepted(&order),
            Err(MarketError::Corrupted(_))
        ));
    }
}
