//! Per-business mutual exclusion for the acceptance transaction
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{MarketError, Result};
use crate::types::BusinessId;

/// One exclusive lock per business. Acceptances on the same business run one at a
/// time, acceptances on different businesses never contend.
#[derive(Debug, Default)]
pub struct BusinessLocks {
    slots: Mutex<HashMap<BusinessId, Arc<Mutex<()>>>>,
    timeout: Option<Duration>,
}

impl BusinessLocks {
    /// `None` waits for as long as it takes.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Runs `f` while holding the lock for `business_id`.
    pub fn with_lock<T>(
        &self,
        business_id: &BusinessId,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let slot = self.slot(business_id);

        let _guard = match slot.try_lock() {
            Some(guard) => guard,
            None => {
                tracing::debug!(business_id = %business_id, "waiting for business lock");
                let started = Instant::now();
                match self.timeout {
                    Some(timeout) => slot.try_lock_for(timeout).ok_or_else(|| {
                        tracing::warn!(business_id = %business_id, ?timeout, "business lock wait timed out");
                        MarketError::LockTimeout {
                            business_id: business_id.clone(),
                            waited: started.elapsed(),
                        }
                    })?,
                    None => slot.lock(),
                }
            }
        };

        f()
    }

    // Slots are never evicted; the table grows with the number of businesses, not requests.
    fn slot(&self, business_id: &BusinessId) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock();
        slots
            .entry(business_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
