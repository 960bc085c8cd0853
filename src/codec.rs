//! Codec Module
//!
//! Serialization boundary between in-process values and the remote wire form.

use serde_json::Value;

use crate::error::Result;

// == Codec Trait ==
/// Converts values to and from the bytes stored in the remote tier.
///
/// The memory tier keeps values as [`Value`]; only the remote tier sees
/// encoded bytes.
pub trait Codec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<Value>;

    fn name(&self) -> &'static str;
}

// == JSON Codec ==
/// Plain JSON text, readable with `redis-cli`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn name(&self) -> &'static str {
        "json"
    }
}
