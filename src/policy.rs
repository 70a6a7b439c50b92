//! Capability checks the calling layer runs before invoking the market operations
use crate::business::Business;
use crate::error::{MarketError, Result};
use crate::types::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Browse businesses that still have shares for sale.
    ListAvailableBusinesses,
    SubmitOrder,
    ViewPurchases,
    ListOwnBusinesses,
    ListOrders,
    TransitionOrder,
}

impl Action {
    fn describe(&self) -> &'static str {
        match self {
            Action::ListAvailableBusinesses => "list available businesses",
            Action::SubmitOrder => "submit a buy order",
            Action::ViewPurchases => "view purchases",
            Action::ListOwnBusinesses => "list owned businesses",
            Action::ListOrders => "list buy orders",
            Action::TransitionOrder => "update a buy order",
        }
    }
}

pub fn permits(actor: &Actor, action: Action) -> bool {
    match action {
        Action::ListAvailableBusinesses | Action::SubmitOrder | Action::ViewPurchases => {
            actor.is_buyer()
        }
        Action::ListOwnBusinesses | Action::ListOrders | Action::TransitionOrder => {
            actor.is_owner()
        }
    }
}

pub fn authorize(actor: &Actor, action: Action) -> Result<()> {
    if permits(actor, action) {
        Ok(())
    } else {
        Err(MarketError::Forbidden(format!(
            "{:?} may not {}",
            actor.role,
            action.describe()
        )))
    }
}

/// Owners see only their own businesses; anything else is reported as not found.
pub fn ensure_owner_scope(actor: &Actor, business: &Business) -> Result<()> {
    if business.is_owned_by(&actor.id) {
        Ok(())
    } else {
        Err(MarketError::BusinessNotFound(business.id().clone()))
    }
}
