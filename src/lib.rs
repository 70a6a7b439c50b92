//! A share marketplace: owners list share pools, buyers submit buy orders, and owners
//! accept or reject them. Acceptance debits the pool, flips the order and records a
//! purchase as one transaction, serialized per business.

pub mod business;
pub mod config;
pub mod error;
pub mod locks;
pub mod money;
pub mod order;
pub mod policy;
pub mod purchase;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;

pub use business::Business;
pub use config::MarketConfig;
pub use error::{FieldError, MarketError, Result};
pub use money::Money;
pub use order::{BuyOrder, OrderStatus};
pub use purchase::Purchase;
pub use service::MarketService;
pub use types::{Actor, BusinessId, OrderId, PurchaseId, Role, UserId};
