use ahash::AHashMap;
use bytes::Bytes;
use serde_json::Value;

use crate::error::{Error, Result};

/// Maps a fully qualified message name to structured decoders.
///
/// Decoded values are JSON objects keyed by proto field name with
/// default-valued fields present.
pub trait SchemaRegistry: Send + Sync {
    fn decode_request(&self, name: &str, data: &[u8]) -> Result<Value>;
    fn decode_response(&self, name: &str, data: &[u8]) -> Result<Value>;
}

pub type DecodeFn = Box<dyn Fn(&[u8]) -> Result<Value> + Send + Sync>;

struct Entry {
    request: DecodeFn,
    response: Option<DecodeFn>,
}

/// Registry backed by a table of decode closures
#[derive(Default)]
pub struct SchemaTable {
    entries: AHashMap<String, Entry>,
}

impl SchemaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an RPC method with request and response decoders
    pub fn register_method(&mut self, name: impl Into<String>, request: DecodeFn, response: DecodeFn) {
        self.entries.insert(name.into(), Entry { request, response: Some(response) });
    }

    /// Register a plain message type (notifications, action payloads)
    pub fn register_message(&mut self, name: impl Into<String>, decode: DecodeFn) {
        self.entries.insert(name.into(), Entry { request: decode, response: None });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn unknown(name: &str, data: &[u8], is_response: bool) -> Error {
    Error::UnknownMessage {
        name: name.to_string(),
        raw: Bytes::copy_from_slice(data),
        is_response,
    }
}

impl SchemaRegistry for SchemaTable {
    fn decode_request(&self, name: &str, data: &[u8]) -> Result<Value> {
        match self.entries.get(name) {
            Some(entry) => (entry.request)(data),
            None => Err(unknown(name, data, false)),
        }
    }

    fn decode_response(&self, name: &str, data: &[u8]) -> Result<Value> {
        match self.entries.get(name).and_then(|e| e.response.as_ref()) {
            Some(decode) => decode(data),
            None => Err(unknown(name, data, true)),
        }
    }
}

/// Decoder for a generated prost type that also derives `Serialize`
pub fn prost_decoder<M>() -> DecodeFn
where
    M: prost::Message + Default + serde::Serialize + 'static,
{
    Box::new(|data: &[u8]| {
        let message = M::decode(data).map_err(|e| Error::InvalidPacket(e.to_string()))?;
        Ok(serde_json::to_value(&message)?)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Clone, PartialEq, prost::Message, serde::Serialize)]
    struct ReqHeartbeat {
        #[prost(uint32, tag = "1")]
        no_operation_counter: u32,
    }

    #[test]
    fn test_unknown_name_carries_raw_bytes() {
        let table = SchemaTable::new();
        let err = table.decode_request(".lq.Lobby.fetchNew", &[0x08, 0x01]).unwrap_err();
        match &err {
            Error::UnknownMessage { name, raw, is_response } => {
                assert_eq!(name, ".lq.Lobby.fetchNew");
                assert_eq!(&raw[..], &[0x08, 0x01]);
                assert!(!is_response);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("1: 1"));
    }

    #[test]
    fn test_message_type_has_no_response() {
        let mut table = SchemaTable::new();
        table.register_message(".lq.NotifyShopUpdate", Box::new(|_| Ok(json!({}))));
        assert!(table.decode_request(".lq.NotifyShopUpdate", &[]).is_ok());
        assert!(matches!(
            table.decode_response(".lq.NotifyShopUpdate", &[]),
            Err(Error::UnknownMessage { is_response: true, .. })
        ));
    }

    #[test]
    fn test_prost_decoder() {
        let mut table = SchemaTable::new();
        table.register_method(
            ".lq.Lobby.heatbeat",
            prost_decoder::<ReqHeartbeat>(),
            Box::new(|_| Ok(json!({}))),
        );
        let value = table.decode_request(".lq.Lobby.heatbeat", &[0x08, 0x03]).unwrap();
        assert_eq!(value, json!({"no_operation_counter": 3}));
        assert_eq!(table.len(), 1);
    }
}
