//! Monetary amounts in integer minor units of the single market currency
use std::fmt;

/// An amount in cents. No currency is stored, the market trades in one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Money(u64);

impl Money {
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }
    pub const fn cents(&self) -> u64 {
        self.0
    }
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }
    /// Major-unit value for presentation, e.g. 50000 cents -> 500.0
    pub fn to_major(&self) -> f64 {
        self.0 as f64 / 100.0
    }
    /// Total cost of `quantity` units at this unit price, `None` on overflow.
    pub fn checked_mul(&self, quantity: u64) -> Option<Money> {
        self.0.checked_mul(quantity).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl From<u64> for Money {
    fn from(cents: u64) -> Self {
        Money(cents)
    }
}

impl<C> minicbor::Encode<C> for Money {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.u64(self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Money {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(Money(d.u64()?))
    }
}
