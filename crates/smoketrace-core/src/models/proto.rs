//! proto3 JSON scalar encodings
//!
//! Protobuf JSON prints 64-bit integers as strings, bytes as base64 and enums
//! by name, while OTLP/JSON prints ids as hex. Both producers are accepted.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use serde::{de, Deserialize, Deserializer};

/// Trace id width in bytes
pub const TRACE_ID_LEN: usize = 16;
/// Span id width in bytes
pub const SPAN_ID_LEN: usize = 8;

/// A signed 64-bit integer printed either as a number or a decimal string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ProtoInt {
    Number(i64),
    Text(String),
}

impl ProtoInt {
    pub(crate) fn value(&self) -> Result<i64, String> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|e| format!("invalid int64 {s:?}: {e}")),
        }
    }
}

/// An unsigned 64-bit integer printed either as a number or a decimal string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProtoUint {
    Number(u64),
    Text(String),
}

/// A double, including the string spellings of non-finite values
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ProtoDouble {
    Number(f64),
    Text(String),
}

impl ProtoDouble {
    pub(crate) fn value(&self) -> Result<f64, String> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => match s.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                other => other
                    .parse()
                    .map_err(|e| format!("invalid double {other:?}: {e}")),
            },
        }
    }
}

/// An enum printed either by name or by number
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ProtoEnum {
    Number(i64),
    Name(String),
}

/// Decode a bytes field printed as base64 (standard or URL-safe alphabet)
pub(crate) fn decode_bytes(raw: &str) -> Result<Vec<u8>, String> {
    STANDARD
        .decode(raw)
        .or_else(|_| URL_SAFE.decode(raw))
        .map_err(|e| format!("invalid base64 {raw:?}: {e}"))
}

/// Normalize a trace or span id to lowercase hex.
///
/// Accepts hex of exactly `byte_len * 2` characters, or base64 decoding to
/// exactly `byte_len` bytes. The empty string stays empty.
pub fn normalize_id(raw: &str, byte_len: usize) -> Result<String, String> {
    if raw.is_empty() {
        return Ok(String::new());
    }

    if raw.len() == byte_len * 2 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
        return Ok(raw.to_ascii_lowercase());
    }

    match decode_bytes(raw) {
        Ok(bytes) if bytes.len() == byte_len => Ok(hex::encode(bytes)),
        Ok(bytes) => Err(format!(
            "id {raw:?} decodes to {} bytes, expected {byte_len}",
            bytes.len()
        )),
        Err(_) => Err(format!("id {raw:?} is neither hex nor base64")),
    }
}

fn deserialize_id<'de, D>(deserializer: D, byte_len: usize) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    normalize_id(&raw, byte_len).map_err(de::Error::custom)
}

pub(crate) fn deserialize_trace_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_id(deserializer, TRACE_ID_LEN)
}

pub(crate) fn deserialize_span_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_id(deserializer, SPAN_ID_LEN)
}

pub(crate) fn deserialize_parent_span_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let id = deserialize_id(deserializer, SPAN_ID_LEN)?;
    Ok((!id.is_empty()).then_some(id))
}

/// fixed64 timestamps, printed as strings by protobuf JSON
pub(crate) fn deserialize_fixed64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<ProtoUint>::deserialize(deserializer)? {
        None => Ok(0),
        Some(ProtoUint::Number(n)) => Ok(n),
        Some(ProtoUint::Text(s)) => s
            .trim()
            .parse()
            .map_err(|e| de::Error::custom(format!("invalid fixed64 {s:?}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_ids_are_lowercased() {
        let id = normalize_id("4BF92F3577B34DA6A3CE929D0E0E4736", TRACE_ID_LEN).unwrap();
        assert_eq!(id, "4bf92f3577b34da6a3ce929d0e0e4736");
    }

    #[test]
    fn test_base64_ids_become_hex() {
        // 0x00f067aa0ba902b7
        let id = normalize_id("APBnqgupArc=", SPAN_ID_LEN).unwrap();
        assert_eq!(id, "00f067aa0ba902b7");
    }

    #[test]
    fn test_wrong_width_id_is_rejected() {
        assert!(normalize_id("APBnqgupArc=", TRACE_ID_LEN).is_err());
        assert!(normalize_id("not an id!", SPAN_ID_LEN).is_err());
    }

    #[test]
    fn test_int_and_double_spellings() {
        assert_eq!(ProtoInt::Text("-42".into()).value().unwrap(), -42);
        assert!(ProtoInt::Text("forty".into()).value().is_err());
        assert!(ProtoDouble::Text("NaN".into()).value().unwrap().is_nan());
        assert_eq!(
            ProtoDouble::Text("-Infinity".into()).value().unwrap(),
            f64::NEG_INFINITY
        );
    }
}
