//! Utility functions for identifier generation

use bech32::{Bech32m, EncodeError, Hrp};
use uuid7::uuid7;

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = Hrp::parse(hrp)?;
    let encode = new_id(hrp)?;
    Ok(encode)
}

// prefix is one of our fixed entity prefixes, so only the encoding itself can fail
pub(crate) fn new_id(hrp: Hrp) -> Result<String, EncodeError> {
    bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
}
