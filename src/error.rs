use std::convert::Infallible;
use std::fmt;
use std::time::Duration;

use crate::types::{BusinessId, OrderId};

pub type Result<T> = std::result::Result<T, MarketError>;

/// A single field-level violation, rendered as a full message ("Quantity must be greater than 0").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chars = self.field.chars();
        match chars.next() {
            Some(first) => write!(
                f,
                "{}{} {}",
                first.to_ascii_uppercase(),
                chars.as_str().replace('_', " "),
                self.message
            ),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum MarketError {
    #[error("validation failed: {}", join_messages(.0))]
    Validation(Vec<FieldError>),
    #[error("Not enough available shares to fulfill this order. business {business_id} has {available}, requested {requested}")]
    InsufficientShares {
        business_id: BusinessId,
        requested: u64,
        available: u64,
    },
    #[error("Business not found: {0}")]
    BusinessNotFound(BusinessId),
    #[error("Buy order not found: {0}")]
    OrderNotFound(OrderId),
    #[error("timed out after {waited:?} waiting for the lock on business {business_id}")]
    LockTimeout {
        business_id: BusinessId,
        waited: Duration,
    },
    #[error("You are not authorized to perform this action: {0}")]
    Forbidden(String),
    #[error("stored record is inconsistent: {0}")]
    Corrupted(String),
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("failed to encode record: {0}")]
    Encode(#[from] minicbor::encode::Error<Infallible>),
    #[error("failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("failed to generate identifier: {0}")]
    IdEncoding(#[from] bech32::EncodeError),
}

impl MarketError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        MarketError::Validation(vec![FieldError::new(field, message)])
    }

    /// Itemized full messages for validation failures, empty for every other kind.
    pub fn field_messages(&self) -> Vec<String> {
        match self {
            MarketError::Validation(errors) => errors.iter().map(ToString::to_string).collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MarketError::BusinessNotFound(_) | MarketError::OrderNotFound(_)
        )
    }

    /// Only a lock-wait timeout is transient; nothing was applied so the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MarketError::LockTimeout { .. })
    }
}

fn join_messages(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Collects field errors and turns them into a single `Validation` error.
#[derive(Debug, Default)]
pub(crate) struct Violations(Vec<FieldError>);

impl Violations {
    pub(crate) fn check(&mut self, ok: bool, field: &'static str, message: impl Into<String>) {
        if !ok {
            self.0.push(FieldError::new(field, message));
        }
    }

    pub(crate) fn into_result(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(MarketError::Validation(self.0))
        }
    }
}
