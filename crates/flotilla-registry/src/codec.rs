//! Leaf value codecs.
//!
//! Provides a [`Codec`] trait with implementations for the three wire
//! formats registry leaves use: raw UTF-8 strings, space-separated lists,
//! and JSON trees. A codec failure surfaces as
//! [`RegistryError::BadValue`].

use bytes::Bytes;

use crate::RegistryError;

/// Translates between a leaf's bytes and a typed value.
pub trait Codec {
    /// The decoded value type.
    type Value;

    /// Encodes a value into leaf bytes.
    fn encode(&self, value: &Self::Value) -> Result<Bytes, RegistryError>;

    /// Decodes leaf bytes into a value.
    fn decode(&self, body: &[u8]) -> Result<Self::Value, RegistryError>;
}

/// Identity codec over UTF-8 strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl Codec for StringCodec {
    type Value = String;

    fn encode(&self, value: &String) -> Result<Bytes, RegistryError> {
        Ok(Bytes::copy_from_slice(value.as_bytes()))
    }

    fn decode(&self, body: &[u8]) -> Result<String, RegistryError> {
        String::from_utf8(body.to_vec()).map_err(|e| RegistryError::BadValue {
            reason: format!("invalid UTF-8: {e}"),
        })
    }
}

/// Space-separated list of strings.
///
/// The format has no escaping, so elements must not contain the separator;
/// `encode` rejects offending elements instead of producing a line that
/// would decode differently.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListCodec;

/// The list element separator.
const SEPARATOR: char = ' ';

impl Codec for ListCodec {
    type Value = Vec<String>;

    fn encode(&self, value: &Vec<String>) -> Result<Bytes, RegistryError> {
        for element in value {
            if element.contains(SEPARATOR) {
                return Err(RegistryError::BadValue {
                    reason: format!("list element {element:?} contains the separator"),
                });
            }
        }
        Ok(Bytes::from(value.join(" ")))
    }

    fn decode(&self, body: &[u8]) -> Result<Vec<String>, RegistryError> {
        let line = StringCodec.decode(body)?;
        if line.is_empty() {
            return Ok(Vec::new());
        }
        Ok(line.split(SEPARATOR).map(str::to_owned).collect())
    }
}

/// JSON tree codec over [`serde_json::Value`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    type Value = serde_json::Value;

    fn encode(&self, value: &serde_json::Value) -> Result<Bytes, RegistryError> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| RegistryError::BadValue {
                reason: format!("JSON encode failed: {e}"),
            })
    }

    fn decode(&self, body: &[u8]) -> Result<serde_json::Value, RegistryError> {
        serde_json::from_slice(body).map_err(|e| RegistryError::BadValue {
            reason: format!("JSON decode failed: {e}"),
        })
    }
}
