//! Type aliases for the JSON values flowing through the endpoint.

use serde_json_bytes::ByteString;

/// A JSON object.
pub type Object = serde_json_bytes::Map<ByteString, Value>;

pub use serde_json_bytes::Value;
