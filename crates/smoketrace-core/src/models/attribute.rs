//! Attribute data model

use std::fmt;

use serde::{de, Deserialize, Deserializer};

use super::proto::{self, ProtoDouble, ProtoInt};

/// A typed attribute value carried by a resource, span, event or link
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// UTF-8 string
    String(String),
    /// Signed 64-bit integer
    Int(i64),
    /// Double-precision float
    Double(f64),
    /// Boolean
    Bool(bool),
    /// Homogeneous or mixed array
    Array(Vec<AttributeValue>),
    /// Nested key-value list
    Map(Vec<KeyValue>),
    /// Raw bytes
    Bytes(Vec<u8>),
}

/// A single attribute
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KeyValue {
    /// Attribute key
    #[serde(default)]
    pub key: String,

    /// Attribute value, `None` when the producer sent an empty value
    #[serde(default, deserialize_with = "deserialize_any_value")]
    pub value: Option<AttributeValue>,
}

impl KeyValue {
    /// Create a new attribute
    pub fn new(key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }
}

/// Find the first value stored under `key`
pub fn lookup<'a>(attributes: &'a [KeyValue], key: &str) -> Option<&'a AttributeValue> {
    attributes
        .iter()
        .filter(|kv| kv.key == key)
        .find_map(|kv| kv.value.as_ref())
}

impl AttributeValue {
    /// Get the string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the double value; integers widen
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(n) => Some(*n),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Get the boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the array elements
    pub fn as_array(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::Array(values) => Some(values),
            _ => None,
        }
    }

    /// Get the nested key-value list
    pub fn as_map(&self) -> Option<&[KeyValue]> {
        match self {
            Self::Map(values) => Some(values),
            _ => None,
        }
    }

    /// Render as plain JSON, for reports and CLI output
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Int(n) => Value::from(*n),
            Self::Double(n) => serde_json::Number::from_f64(*n)
                .map_or_else(|| Value::String(n.to_string()), Value::Number),
            Self::Bool(b) => Value::Bool(*b),
            Self::Array(values) => Value::Array(values.iter().map(Self::to_json).collect()),
            Self::Map(values) => Value::Object(
                values
                    .iter()
                    .map(|kv| {
                        let value = kv.value.as_ref().map_or(Value::Null, Self::to_json);
                        (kv.key.clone(), value)
                    })
                    .collect(),
            ),
            Self::Bytes(bytes) => Value::String(hex::encode(bytes)),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Double(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Array(values) => {
                f.write_str("[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
            Self::Map(values) => {
                f.write_str("{")?;
                for (i, kv) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match &kv.value {
                        Some(value) => write!(f, "{}: {value}", kv.key)?,
                        None => write!(f, "{}: <empty>", kv.key)?,
                    }
                }
                f.write_str("}")
            }
            Self::Bytes(bytes) => write!(f, "0x{}", hex::encode(bytes)),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// `AnyValue` as printed on the wire: a message with a single populated field
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnyValue {
    #[serde(alias = "string_value")]
    string_value: Option<String>,
    #[serde(alias = "int_value")]
    int_value: Option<ProtoInt>,
    #[serde(alias = "double_value")]
    double_value: Option<ProtoDouble>,
    #[serde(alias = "bool_value")]
    bool_value: Option<bool>,
    #[serde(alias = "array_value")]
    array_value: Option<RawValueList<RawAnyValue>>,
    #[serde(alias = "kvlist_value")]
    kvlist_value: Option<RawValueList<KeyValue>>,
    #[serde(alias = "bytes_value")]
    bytes_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawValueList<T> {
    #[serde(default = "Vec::new")]
    values: Vec<T>,
}

impl RawAnyValue {
    fn into_value(self) -> Result<Option<AttributeValue>, String> {
        let mut populated = Vec::with_capacity(1);

        if let Some(s) = self.string_value {
            populated.push(AttributeValue::String(s));
        }
        if let Some(n) = self.int_value {
            populated.push(AttributeValue::Int(n.value()?));
        }
        if let Some(n) = self.double_value {
            populated.push(AttributeValue::Double(n.value()?));
        }
        if let Some(b) = self.bool_value {
            populated.push(AttributeValue::Bool(b));
        }
        if let Some(array) = self.array_value {
            // Empty elements carry nothing to assert on.
            let values = array
                .values
                .into_iter()
                .map(Self::into_value)
                .filter_map(Result::transpose)
                .collect::<Result<Vec<_>, _>>()?;
            populated.push(AttributeValue::Array(values));
        }
        if let Some(kvlist) = self.kvlist_value {
            populated.push(AttributeValue::Map(kvlist.values));
        }
        if let Some(raw) = self.bytes_value {
            populated.push(AttributeValue::Bytes(proto::decode_bytes(&raw)?));
        }

        if populated.len() > 1 {
            return Err(format!(
                "AnyValue has {} populated fields, expected at most one",
                populated.len()
            ));
        }

        Ok(populated.pop())
    }
}

fn deserialize_any_value<'de, D>(deserializer: D) -> Result<Option<AttributeValue>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawAnyValue>::deserialize(deserializer)? {
        Some(raw) => raw.into_value().map_err(de::Error::custom),
        None => Ok(None),
    }
}
