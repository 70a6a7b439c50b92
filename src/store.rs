//! sled persistence: one tree per entity plus secondary indexes, CBOR records
use std::sync::Arc;

use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionResult, TransactionalTree,
};
use sled::{Transactional, Tree};

use crate::business::Business;
use crate::error::{MarketError, Result};
use crate::order::BuyOrder;
use crate::purchase::Purchase;
use crate::types::{BusinessId, OrderId, PurchaseId, UserId};

const BUSINESSES: &str = "businesses";
const BUY_ORDERS: &str = "buy_orders";
const PURCHASES: &str = "purchases";
const OWNER_BUSINESSES: &str = "owner_businesses";
const BUSINESS_ORDERS: &str = "business_orders";
const BUSINESS_PURCHASES: &str = "business_purchases";
const ORDER_PURCHASE: &str = "order_purchase";

pub type TxResult<T> = ConflictableTransactionResult<T, MarketError>;

/// Abort the running transaction. Nothing written inside it is kept.
pub fn abort<T>(err: MarketError) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err))
}

pub struct Store {
    instance: Arc<sled::Db>,
    businesses: Tree,
    orders: Tree,
    purchases: Tree,
    owner_businesses: Tree,
    business_orders: Tree,
    business_purchases: Tree,
    order_purchase: Tree,
}

/// The trees touched by order acceptance, as seen from inside one transaction.
pub struct StoreTx<'a> {
    businesses: &'a TransactionalTree,
    orders: &'a TransactionalTree,
    purchases: &'a TransactionalTree,
    business_purchases: &'a TransactionalTree,
    order_purchase: &'a TransactionalTree,
}

impl Store {
    pub fn open(instance: Arc<sled::Db>) -> Result<Self> {
        Ok(Self {
            businesses: instance.open_tree(BUSINESSES)?,
            orders: instance.open_tree(BUY_ORDERS)?,
            purchases: instance.open_tree(PURCHASES)?,
            owner_businesses: instance.open_tree(OWNER_BUSINESSES)?,
            business_orders: instance.open_tree(BUSINESS_ORDERS)?,
            business_purchases: instance.open_tree(BUSINESS_PURCHASES)?,
            order_purchase: instance.open_tree(ORDER_PURCHASE)?,
            instance,
        })
    }

    pub fn flush(&self) -> Result<usize> {
        Ok(self.instance.flush()?)
    }

    /// Insert a business and its owner index entry together
    pub fn insert_business(&self, business: &Business) -> Result<()> {
        let record = encode(business)?;
        let index = index_key(business.owner_id().as_str(), business.id().as_str());

        let result: TransactionResult<(), MarketError> = (&self.businesses, &self.owner_businesses)
            .transaction(|(businesses, owner_businesses)| {
                businesses.insert(business.id().as_str().as_bytes(), record.as_slice())?;
                owner_businesses.insert(index.as_slice(), business.id().as_str().as_bytes())?;
                Ok(())
            });
        finish(result)
    }

    /// Insert a new order and its business index entry together
    pub fn insert_order(&self, order: &BuyOrder) -> Result<()> {
        let record = encode(order)?;
        let index = index_key(order.business_id().as_str(), order.id().as_str());

        let result: TransactionResult<(), MarketError> = (&self.orders, &self.business_orders)
            .transaction(|(orders, business_orders)| {
                orders.insert(order.id().as_str().as_bytes(), record.as_slice())?;
                business_orders.insert(index.as_slice(), order.id().as_str().as_bytes())?;
                Ok(())
            });
        finish(result)
    }

    pub fn business(&self, id: &BusinessId) -> Result<Option<Business>> {
        get(&self.businesses, id.as_str())
    }

    pub fn order(&self, id: &OrderId) -> Result<Option<BuyOrder>> {
        get(&self.orders, id.as_str())
    }

    pub fn purchase(&self, id: &PurchaseId) -> Result<Option<Purchase>> {
        get(&self.purchases, id.as_str())
    }

    pub fn purchase_for_order(&self, id: &OrderId) -> Result<Option<Purchase>> {
        match self.order_purchase.get(id.as_str().as_bytes())? {
            Some(purchase_id) => {
                let purchase_id = PurchaseId::from(utf8(&purchase_id)?);
                self.purchase(&purchase_id)?
                    .map(Some)
                    .ok_or_else(|| dangling(ORDER_PURCHASE, purchase_id.as_str()))
            }
            None => Ok(None),
        }
    }

    pub fn businesses(&self) -> Result<Vec<Business>> {
        self.businesses
            .iter()
            .values()
            .map(|value| decode(&value?))
            .collect()
    }

    pub fn businesses_for_owner(&self, owner: &UserId) -> Result<Vec<Business>> {
        self.follow_index(&self.owner_businesses, owner.as_str(), |id| {
            self.business(&BusinessId::from(id))
        })
    }

    pub fn orders_for_business(&self, business: &BusinessId) -> Result<Vec<BuyOrder>> {
        self.follow_index(&self.business_orders, business.as_str(), |id| {
            self.order(&OrderId::from(id))
        })
    }

    pub fn purchases_for_business(&self, business: &BusinessId) -> Result<Vec<Purchase>> {
        self.follow_index(&self.business_purchases, business.as_str(), |id| {
            self.purchase(&PurchaseId::from(id))
        })
    }

    /// Run `f` as one all-or-nothing unit over the business, order and purchase trees.
    ///
    /// `f` may be re-run by sled on a write conflict, so it must not have side effects
    /// outside the transaction.
    pub fn transaction<T>(&self, f: impl Fn(&StoreTx<'_>) -> TxResult<T>) -> Result<T> {
        let result = (
            &self.businesses,
            &self.orders,
            &self.purchases,
            &self.business_purchases,
            &self.order_purchase,
        )
            .transaction(
                |(businesses, orders, purchases, business_purchases, order_purchase)| {
                    let tx = StoreTx {
                        businesses,
                        orders,
                        purchases,
                        business_purchases,
                        order_purchase,
                    };
                    f(&tx)
                },
            );
        finish(result)
    }

    fn follow_index<T>(
        &self,
        index: &Tree,
        owner: &str,
        load: impl Fn(String) -> Result<Option<T>>,
    ) -> Result<Vec<T>> {
        let mut prefix = owner.as_bytes().to_vec();
        prefix.push(b'/');

        index
            .scan_prefix(prefix)
            .values()
            .map(|id| {
                let id = utf8(&id?)?;
                load(id.clone())?.ok_or_else(|| dangling(owner, &id))
            })
            .collect()
    }
}

impl StoreTx<'_> {
    pub fn business(&self, id: &BusinessId) -> TxResult<Business> {
        match self.businesses.get(id.as_str().as_bytes())? {
            Some(bytes) => decode(&bytes).or_else(abort),
            None => abort(MarketError::BusinessNotFound(id.clone())),
        }
    }

    pub fn order(&self, id: &OrderId) -> TxResult<BuyOrder> {
        match self.orders.get(id.as_str().as_bytes())? {
            Some(bytes) => decode(&bytes).or_else(abort),
            None => abort(MarketError::OrderNotFound(id.clone())),
        }
    }

    /// Validates then writes. A failing record aborts the whole transaction.
    pub fn put_business(&self, business: &Business) -> TxResult<()> {
        business.validate().or_else(abort)?;
        let record = encode(business).or_else(abort)?;
        self.businesses
            .insert(business.id().as_str().as_bytes(), record)?;
        Ok(())
    }

    pub fn put_order(&self, order: &BuyOrder) -> TxResult<()> {
        order.validate().or_else(abort)?;
        let record = encode(order).or_else(abort)?;
        self.orders.insert(order.id().as_str().as_bytes(), record)?;
        Ok(())
    }

    /// Purchases are append-only, an existing receipt for the order is never replaced.
    pub fn insert_purchase(&self, purchase: &Purchase) -> TxResult<()> {
        purchase.validate().or_else(abort)?;
        let order_key = purchase.order_id().as_str().as_bytes();
        if self.order_purchase.get(order_key)?.is_some() {
            return abort(MarketError::Corrupted(format!(
                "order {} already has a purchase",
                purchase.order_id()
            )));
        }

        let record = encode(purchase).or_else(abort)?;
        let id = purchase.id().as_str().as_bytes();
        let index = index_key(purchase.business_id().as_str(), purchase.id().as_str());

        self.purchases.insert(id, record)?;
        self.business_purchases.insert(index, id)?;
        self.order_purchase.insert(order_key, id)?;
        Ok(())
    }
}

fn finish<T>(result: TransactionResult<T, MarketError>) -> Result<T> {
    result.map_err(|err| match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => MarketError::Storage(err),
    })
}

fn get<T>(tree: &Tree, key: &str) -> Result<Option<T>>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    tree.get(key.as_bytes())?
        .map(|bytes| decode(&bytes))
        .transpose()
}

fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>> {
    Ok(minicbor::to_vec(value)?)
}

fn decode<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    Ok(minicbor::decode(bytes)?)
}

fn index_key(owner: &str, member: &str) -> Vec<u8> {
    format!("{owner}/{member}").into_bytes()
}

fn utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|err| MarketError::Corrupted(format!("index entry is not utf-8: {err}")))
}

fn dangling(index: &str, id: &str) -> MarketError {
    MarketError::Corrupted(format!("index {index} points at missing record {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;

    fn store() -> Store {
        let db = sled::Config::new().temporary(true).open().unwrap();
        Store::open(Arc::new(db)).unwrap()
    }

    #[test]
    fn aborted_transaction_writes_nothing() {
        let store = store();
        let business = Business::new(UserId::generate().unwrap(), "Acme", 100).unwrap();
        store.insert_business(&business).unwrap();

        let order = BuyOrder::new(
            business.id().clone(),
            UserId::generate().unwrap(),
            10,
            Money::from_cents(100),
        )
        .unwrap();
        store.insert_order(&order).unwrap();

        let err = store
            .transaction(|tx| {
                let mut b = tx.business(business.id())?;
                b.debit_shares(10).or_else(abort)?;
                tx.put_business(&b)?;
                abort::<()>(MarketError::Corrupted("stop".into()))
            })
            .unwrap_err();

        assert!(matches!(err, MarketError::Corrupted(_)));
        assert_eq!(
            store.business(business.id()).unwrap().unwrap().available_shares(),
            100
        );
    }

    #[test]
    fn indexes_list_members_of_their_owner() {
        let store = store();
        let owner = UserId::generate().unwrap();
        let first = Business::new(owner.clone(), "First", 10).unwrap();
        let second = Business::new(owner.clone(), "Second", 20).unwrap();
        let other = Business::new(UserId::generate().unwrap(), "Other", 30).unwrap();
        for b in [&first, &second, &other] {
            store.insert_business(b).unwrap();
        }

        let mut names: Vec<String> = store
            .businesses_for_owner(&owner)
            .unwrap()
            .iter()
            .map(|b| b.name().to_owned())
            .collect();
        names.sort();

        assert_eq!(names, vec!["First", "Second"]);
        assert_eq!(store.businesses().unwrap().len(), 3);
    }
}
