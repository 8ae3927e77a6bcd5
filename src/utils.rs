//! Identifier generation

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique id then encode using bech32 with the given human readable prefix
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

pub fn new_request_id() -> anyhow::Result<String> {
    new_uuid_to_bech32("leave")
}

pub fn new_rule_id() -> anyhow::Result<String> {
    new_uuid_to_bech32("rule")
}

pub fn new_substitution_id() -> anyhow::Result<String> {
    new_uuid_to_bech32("subst")
}
