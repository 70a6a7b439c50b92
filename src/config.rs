//! Runtime configuration read from the environment (a `.env` file is honoured)
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "share_market.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketConfig {
    pub db_path: PathBuf,
    /// How long an acceptance waits for its business lock. `None` waits indefinitely.
    pub lock_timeout: Option<Duration>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            lock_timeout: None,
        }
    }
}

impl MarketConfig {
    /// Reads `MARKET_DB_PATH` and `MARKET_LOCK_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = lookup("MARKET_DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        // unset, unparsable or 0 all mean "wait"
        let lock_timeout = lookup("MARKET_LOCK_TIMEOUT_MS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        Self {
            db_path,
            lock_timeout,
        }
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }
}
