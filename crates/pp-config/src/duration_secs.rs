//! Serde (de)serialization of `Duration` as whole seconds, the shape every
//! duration field takes on the wire (TOML has no native duration type, and
//! whole seconds keep `PP_..._SECS` environment overrides unambiguous).

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    d.as_secs().serialize(s)
}

pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    let secs = u64::deserialize(d)?;
    Ok(Duration::from_secs(secs))
}
