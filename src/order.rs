//! Buy orders and their one-way status lifecycle
use std::fmt;
use std::str::FromStr;

use chrono::Utc;

use crate::business::Business;
use crate::error::{MarketError, Result, Violations};
use crate::money::Money;
use crate::types::{BusinessId, OrderId, TimeStamp, UserId};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Accepted,
    #[n(2)]
    Rejected,
}

/// What applying a requested status to an order amounts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Target equals the current status, nothing to write.
    Unchanged,
    /// pending -> accepted. Must go through the acceptance transaction.
    Accept,
    /// pending -> rejected. Plain status update.
    Reject,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 3] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }

    /// The single place transition legality is decided.
    ///
    /// Orders only move pending -> accepted or pending -> rejected. Requesting the
    /// status an order already has is a no-op, anything else out of a terminal
    /// state is refused.
    pub fn transition_to(self, target: OrderStatus) -> Result<Transition> {
        match (self, target) {
            (from, to) if from == to => Ok(Transition::Unchanged),
            (OrderStatus::Pending, OrderStatus::Accepted) => Ok(Transition::Accept),
            (OrderStatus::Pending, OrderStatus::Rejected) => Ok(Transition::Reject),
            (from, to) => Err(MarketError::validation(
                "status",
                format!("cannot change from {from} to {to}"),
            )),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| MarketError::validation("status", "is not included in the list"))
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct BuyOrder {
    #[n(0)]
    id: OrderId,
    #[n(1)]
    business_id: BusinessId,
    #[n(2)]
    buyer_id: UserId,
    #[n(3)]
    quantity: u64,
    #[n(4)]
    unit_price: Money,
    #[n(5)]
    status: OrderStatus,
    #[n(6)]
    created_at: TimeStamp<Utc>,
    #[n(7)]
    updated_at: TimeStamp<Utc>,
}

impl BuyOrder {
    /// A new pending order. Business and buyer are fixed here for the order's lifetime.
    pub fn new(
        business_id: BusinessId,
        buyer_id: UserId,
        quantity: u64,
        unit_price: Money,
    ) -> Result<Self> {
        validate_terms(quantity, unit_price)?;

        let now = TimeStamp::new();
        Ok(Self {
            id: OrderId::generate()?,
            business_id,
            buyer_id,
            quantity,
            unit_price,
            status: OrderStatus::Pending,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub fn id(&self) -> &OrderId {
        &self.id
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
    pub fn status(&self) -> OrderStatus {
        self.status
    }
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }
    pub fn created_at(&self) -> &TimeStamp<Utc> {
        &self.created_at
    }
    pub fn updated_at(&self) -> &TimeStamp<Utc> {
        &self.updated_at
    }

    pub fn validate(&self) -> Result<()> {
        validate_terms(self.quantity, self.unit_price)
    }

    pub(crate) fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
        self.updated_at = TimeStamp::new();
    }
}

fn validate_terms(quantity: u64, unit_price: Money) -> Result<()> {
    let mut violations = Violations::default();
    violations.check(quantity > 0, "quantity", "must be greater than 0");
    violations.check(unit_price.is_positive(), "price", "must be greater than 0");
    violations.into_result()
}

/// Submission-time inventory check.
///
/// Advisory only: it reads a snapshot without the business lock, so an order that
/// passes here can still fail when it is accepted.
pub fn ensure_shares_available(business: &Business, quantity: u64) -> Result<()> {
    if business.has_available(quantity) {
        Ok(())
    } else {
        Err(MarketError::InsufficientShares {
            business_id: business.id().clone(),
            requested: quantity,
            available: business.available_shares(),
        })
    }
}
