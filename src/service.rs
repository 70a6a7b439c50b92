//! Service layer API for the share market: listing, order submission and order transitions
use std::sync::Arc;
use std::time::Duration;

use crate::business::Business;
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::locks::BusinessLocks;
use crate::money::Money;
use crate::order::{BuyOrder, OrderStatus, Transition, ensure_shares_available};
use crate::policy::{self, Action};
use crate::purchase::Purchase;
use crate::store::{Store, abort};
use crate::types::{Actor, BusinessId, OrderId, UserId};

pub struct MarketService {
    store: Store,
    locks: BusinessLocks,
}

impl MarketService {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self> {
        Self::with_lock_timeout(instance, None)
    }

    pub fn with_lock_timeout(instance: Arc<sled::Db>, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            store: Store::open(instance)?,
            locks: BusinessLocks::new(timeout),
        })
    }

    /// Open (or create) the database at the configured path
    pub fn open(config: &MarketConfig) -> Result<Self> {
        let db = sled::open(&config.db_path)?;
        tracing::info!(path = %config.db_path.display(), lock_timeout = ?config.lock_timeout, "opened market store");
        Self::with_lock_timeout(Arc::new(db), config.lock_timeout)
    }

    pub fn flush(&self) -> Result<usize> {
        self.store.flush()
    }

    /// List a new business with all of its shares available
    pub fn create_business(
        &self,
        owner_id: &UserId,
        name: &str,
        total_shares: u64,
    ) -> Result<Business> {
        let business = Business::new(owner_id.clone(), name, total_shares)?;
        self.store.insert_business(&business)?;

        tracing::info!(
            business_id = %business.id(),
            owner_id = %owner_id,
            total_shares,
            "business listed"
        );
        Ok(business)
    }

    /// Submit a pending buy order.
    ///
    /// The share check here reads without the business lock and only turns away orders
    /// that could not be filled right now; acceptance checks again under the lock.
    pub fn submit_order(
        &self,
        business_id: &BusinessId,
        buyer_id: &UserId,
        quantity: u64,
        unit_price: Money,
    ) -> Result<BuyOrder> {
        let business = self.business(business_id)?;
        let order = BuyOrder::new(business_id.clone(), buyer_id.clone(), quantity, unit_price)?;

        if let Err(err) = ensure_shares_available(&business, quantity) {
            tracing::warn!(
                business_id = %business_id,
                requested = quantity,
                available = business.available_shares(),
                "buy order refused, not enough available shares"
            );
            return Err(err);
        }

        self.store.insert_order(&order)?;

        tracing::info!(
            order_id = %order.id(),
            business_id = %business_id,
            buyer_id = %buyer_id,
            quantity,
            unit_price = %unit_price,
            "buy order submitted"
        );
        Ok(order)
    }

    /// Move an order to `target` ("accepted" or "rejected").
    ///
    /// Accepting debits the business, flips the order and records the purchase in one
    /// transaction under the business lock. Requesting the status the order already has
    /// returns it unchanged.
    pub fn transition_order(&self, order_id: &OrderId, target: &str) -> Result<BuyOrder> {
        let order = self.order(order_id)?;
        let target: OrderStatus = target.parse()?;

        match order.status().transition_to(target)? {
            Transition::Unchanged => {
                tracing::debug!(order_id = %order_id, status = %target, "order already in requested status");
                Ok(order)
            }
            Transition::Accept => self.accept(order_id, order.business_id()),
            Transition::Reject => self.reject(order_id),
        }
    }

    fn accept(&self, order_id: &OrderId, business_id: &BusinessId) -> Result<BuyOrder> {
        let outcome = self.locks.with_lock(business_id, || {
            self.store.transaction(|tx| {
                // state may have moved while we waited for the lock, read it again
                let mut order = tx.order(order_id)?;
                if order.status() == OrderStatus::Accepted {
                    return Ok((order, None));
                }
                order
                    .status()
                    .transition_to(OrderStatus::Accepted)
                    .or_else(abort)?;

                let mut business = tx.business(order.business_id())?;
                business.debit_shares(order.quantity()).or_else(abort)?;
                tx.put_business(&business)?;

                order.set_status(OrderStatus::Accepted);
                tx.put_order(&order)?;

                let purchase = Purchase::from_accepted(&order).or_else(abort)?;
                tx.insert_purchase(&purchase)?;

                Ok((order, Some((purchase, business.available_shares()))))
            })
        });

        match outcome {
            Ok((order, Some((purchase, available)))) => {
                tracing::info!(
                    order_id = %order_id,
                    business_id = %business_id,
                    purchase_id = %purchase.id(),
                    quantity = purchase.quantity(),
                    available_shares = available,
                    "buy order accepted"
                );
                Ok(order)
            }
            Ok((order, None)) => {
                tracing::debug!(order_id = %order_id, "buy order was accepted concurrently");
                Ok(order)
            }
            Err(err @ MarketError::InsufficientShares { .. }) => {
                tracing::warn!(order_id = %order_id, business_id = %business_id, error = %err, "acceptance aborted");
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn reject(&self, order_id: &OrderId) -> Result<BuyOrder> {
        let (order, written) = self.store.transaction(|tx| {
            let mut order = tx.order(order_id)?;
            let transition = order
                .status()
                .transition_to(OrderStatus::Rejected)
                .or_else(abort)?;
            if transition != Transition::Reject {
                return Ok((order, false));
            }
            order.set_status(OrderStatus::Rejected);
            tx.put_order(&order)?;
            Ok((order, true))
        })?;

        if written {
            tracing::info!(order_id = %order_id, business_id = %order.business_id(), "buy order rejected");
        } else {
            tracing::debug!(order_id = %order_id, "buy order was rejected concurrently");
        }
        Ok(order)
    }

    pub fn business(&self, id: &BusinessId) -> Result<Business> {
        self.store
            .business(id)?
            .ok_or_else(|| MarketError::BusinessNotFound(id.clone()))
    }

    pub fn order(&self, id: &OrderId) -> Result<BuyOrder> {
        self.store
            .order(id)?
            .ok_or_else(|| MarketError::OrderNotFound(id.clone()))
    }

    /// Businesses with at least one share left. Values may be stale by the time they are read.
    pub fn businesses_with_available_shares(&self) -> Result<Vec<Business>> {
        let mut businesses: Vec<Business> = self
            .store
            .businesses()?
            .into_iter()
            .filter(|b| b.available_shares() > 0)
            .collect();
        businesses.sort_by(|a, b| a.created_at().cmp(b.created_at()));
        Ok(businesses)
    }

    pub fn businesses_for_owner(&self, owner_id: &UserId) -> Result<Vec<Business>> {
        let mut businesses = self.store.businesses_for_owner(owner_id)?;
        businesses.sort_by(|a, b| a.created_at().cmp(b.created_at()));
        Ok(businesses)
    }

    pub fn orders_for_business(&self, business_id: &BusinessId) -> Result<Vec<BuyOrder>> {
        self.business(business_id)?;
        let mut orders = self.store.orders_for_business(business_id)?;
        orders.sort_by(|a, b| a.created_at().cmp(b.created_at()));
        Ok(orders)
    }

    pub fn pending_orders_for_business(&self, business_id: &BusinessId) -> Result<Vec<BuyOrder>> {
        let mut orders = self.orders_for_business(business_id)?;
        orders.retain(BuyOrder::is_pending);
        Ok(orders)
    }

    pub fn purchases_for_business(&self, business_id: &BusinessId) -> Result<Vec<Purchase>> {
        self.business(business_id)?;
        let mut purchases = self.store.purchases_for_business(business_id)?;
        purchases.sort_by(|a, b| a.created_at().cmp(b.created_at()));
        Ok(purchases)
    }

    pub fn purchase_for_order(&self, order_id: &OrderId) -> Result<Option<Purchase>> {
        self.order(order_id)?;
        self.store.purchase_for_order(order_id)
    }

    // Role-checked entry points for the presentation layer. Each one authorizes the
    // actor and applies the owner scope before delegating to the operations above.

    /// Buyers see businesses with shares left, owners see their own.
    pub fn businesses_as(&self, actor: &Actor) -> Result<Vec<Business>> {
        if policy::permits(actor, Action::ListAvailableBusinesses) {
            self.businesses_with_available_shares()
        } else {
            policy::authorize(actor, Action::ListOwnBusinesses)?;
            self.businesses_for_owner(&actor.id)
        }
    }

    pub fn submit_order_as(
        &self,
        actor: &Actor,
        business_id: &BusinessId,
        quantity: u64,
        unit_price: Money,
    ) -> Result<BuyOrder> {
        policy::authorize(actor, Action::SubmitOrder)?;
        self.submit_order(business_id, &actor.id, quantity, unit_price)
    }

    pub fn orders_for_business_as(
        &self,
        actor: &Actor,
        business_id: &BusinessId,
    ) -> Result<Vec<BuyOrder>> {
        policy::authorize(actor, Action::ListOrders)?;
        let business = self.business(business_id)?;
        policy::ensure_owner_scope(actor, &business)?;
        self.orders_for_business(business_id)
    }

    pub fn purchases_for_business_as(
        &self,
        actor: &Actor,
        business_id: &BusinessId,
    ) -> Result<Vec<Purchase>> {
        policy::authorize(actor, Action::ViewPurchases)?;
        self.purchases_for_business(business_id)
    }

    /// Orders on a business the owner does not own are reported as not found.
    pub fn transition_order_as(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        target: &str,
    ) -> Result<BuyOrder> {
        policy::authorize(actor, Action::TransitionOrder)?;
        let order = self.order(order_id)?;
        let business = self.business(order.business_id())?;
        if !business.is_owned_by(&actor.id) {
            return Err(MarketError::OrderNotFound(order_id.clone()));
        }
        self.transition_order(order_id, target)
    }
}
