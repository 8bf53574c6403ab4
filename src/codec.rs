//! Payload validation seam.
//!
//! Encoding an application value to a line and decoding it back live with the
//! application; the store only ever asks whether a payload is acceptable.
//! [`PlainCodec`] accepts any line-safe payload, [`JsonCodec`] additionally
//! requires the payload to parse as a JSON value.

/// Validates payloads on their way into ([`push`](crate::RecordStore::push))
/// and out of ([`get_first`](crate::RecordStore::get_first)) the store.
pub trait PayloadCodec: Send + Sync {
    /// Whether `payload` is a well-formed record for this codec.
    fn is_valid(&self, payload: &str) -> bool;
}

/// Accepts every line-safe payload.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainCodec;

impl PayloadCodec for PlainCodec {
    fn is_valid(&self, _payload: &str) -> bool {
        true
    }
}

/// Requires payloads to be single-line JSON values.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn is_valid(&self, payload: &str) -> bool {
        serde_json::from_str::<serde_json::Value>(payload).is_ok()
    }
}
