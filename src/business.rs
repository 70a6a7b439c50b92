//! Inventory ledger for a single business' share pool
use chrono::Utc;

use crate::error::{MarketError, Result, Violations};
use crate::types::{BusinessId, TimeStamp, UserId};

/// A business listing its shares. `available_shares` never leaves `0..=total_shares`.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Business {
    #[n(0)]
    id: BusinessId,
    #[n(1)]
    owner_id: UserId,
    #[n(2)]
    name: String,
    #[n(3)]
    total_shares: u64,
    #[n(4)]
    available_shares: u64,
    #[n(5)]
    created_at: TimeStamp<Utc>,
    #[n(6)]
    updated_at: TimeStamp<Utc>,
}

impl Business {
    /// A freshly listed business has its whole pool available.
    pub fn new(owner_id: UserId, name: impl Into<String>, total_shares: u64) -> Result<Self> {
        let now = TimeStamp::new();
        let business = Self {
            id: BusinessId::generate()?,
            owner_id,
            name: name.into().trim().to_owned(),
            total_shares,
            available_shares: total_shares,
            created_at: now.clone(),
            updated_at: now,
        };
        business.validate()?;

        Ok(business)
    }

    pub fn id(&self) -> &BusinessId {
        &self.id
    }
    pub fn owner_id(&self) -> &UserId {
        &self.owner_id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn total_shares(&self) -> u64 {
        self.total_shares
    }
    pub fn available_shares(&self) -> u64 {
        self.available_shares
    }
    /// Shares already sold through accepted orders.
    pub fn sold_shares(&self) -> u64 {
        self.total_shares.saturating_sub(self.available_shares)
    }
    pub fn created_at(&self) -> &TimeStamp<Utc> {
        &self.created_at
    }
    pub fn updated_at(&self) -> &TimeStamp<Utc> {
        &self.updated_at
    }
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner_id == user
    }

    pub fn has_available(&self, quantity: u64) -> bool {
        self.available_shares >= quantity
    }

    /// Runs every record-level check. Called before each save.
    pub fn validate(&self) -> Result<()> {
        let mut violations = Violations::default();
        violations.check(!self.name.is_empty(), "name", "can't be blank");
        violations.check(
            self.available_shares <= self.total_shares,
            "available_shares",
            format!("must be less than or equal to {}", self.total_shares),
        );
        violations.into_result()
    }

    /// Removes `quantity` shares from the pool. Only the acceptance transaction calls this,
    /// while it holds the business lock.
    pub(crate) fn debit_shares(&mut self, quantity: u64) -> Result<()> {
        if !self.has_available(quantity) {
            return Err(MarketError::InsufficientShares {
                business_id: self.id.clone(),
                requested: quantity,
                available: self.available_shares,
            });
        }
        self.available_shares -= quantity;
        self.updated_at = TimeStamp::new();

        Ok(())
    }
}
