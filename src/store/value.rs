//! Value Module
//!
//! The dynamically-typed payload stored under every cache key.

use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

// == Value ==
/// A cached payload.
///
/// `Map` is a free-form string mapping while `Record` holds the fields of a
/// serialized struct. Both use the text codec; every other variant uses the
/// binary codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Seq(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Record(BTreeMap<String, Value>),
}

impl Value {
    // == Record ==
    /// Captures a struct as a `Record`.
    ///
    /// Fails with `Encode` if `value` does not serialize to an object.
    pub fn record<T: Serialize>(value: &T) -> Result<Self> {
        let json = serde_json::to_value(value).map_err(|e| CacheError::Encode(e.to_string()))?;
        match Value::from_json(json) {
            Value::Map(fields) => Ok(Value::Record(fields)),
            other => Err(CacheError::Encode(format!(
                "expected a struct, got {}",
                other.kind()
            ))),
        }
    }

    // == JSON Bridge ==
    /// Converts a JSON document. Objects become `Map`.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Seq(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(fields) => Value::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts to a plain JSON document. Bytes become an array of numbers.
    ///
    /// Fails with `Encode` on non-finite floats.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::UInt(u) => serde_json::Value::from(*u),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| CacheError::Encode(format!("{f} has no JSON representation")))?,
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::from(b.clone()),
            Value::Seq(items) => serde_json::Value::Array(
                items.iter().map(Value::to_json).collect::<Result<_>>()?,
            ),
            Value::Map(fields) | Value::Record(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_json()?)))
                    .collect::<Result<_>>()?,
            ),
        })
    }

    // == Typed Decode ==
    /// Decodes into a caller-chosen type.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.to_json()?).map_err(|e| CacheError::Decode(e.to_string()))
    }

    // == Accessors ==
    /// Returns the integer held by a counter-compatible value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    /// True for the shapes routed through the text codec.
    pub fn is_structured(&self) -> bool {
        matches!(self, Value::Map(_) | Value::Record(_))
    }

    /// Short name of the variant, for log and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Seq(_) => "sequence",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
        }
    }
}

// == Conversions ==
macro_rules! impl_from {
    ($($ty:ty => $variant:ident as $cast:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v as $cast)
                }
            }
        )*
    };
}

impl_from! {
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => UInt as u64,
    u16 => UInt as u64,
    u32 => UInt as u64,
    u64 => UInt as u64,
    f32 => Float as f64,
    f64 => Float as f64,
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Seq(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl<V: Into<Value>> From<HashMap<String, V>> for Value {
    fn from(v: HashMap<String, V>) -> Self {
        Value::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value::Seq(iter.into_iter().map(Into::into).collect())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct User {
        name: String,
        age: u32,
    }

    #[test]
    fn test_record_from_struct() {
        let user = User {
            name: "go".to_string(),
            age: 13,
        };
        let value = Value::record(&user).unwrap();

        match &value {
            Value::Record(fields) => {
                assert_eq!(fields.get("name"), Some(&Value::Str("go".to_string())));
                assert_eq!(fields.get("age"), Some(&Value::Int(13)));
            }
            other => panic!("expected record, got {other:?}"),
        }

        let back: User = value.deserialize_into().unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn test_record_rejects_scalars() {
        assert!(matches!(Value::record(&5), Err(CacheError::Encode(_))));
    }

    #[test]
    fn test_from_json_numbers() {
        assert_eq!(Value::from_json(serde_json::json!(-4)), Value::Int(-4));
        assert_eq!(
            Value::from_json(serde_json::json!(u64::MAX)),
            Value::UInt(u64::MAX)
        );
        assert_eq!(Value::from_json(serde_json::json!(1.5)), Value::Float(1.5));
    }

    #[test]
    fn test_to_json_rejects_nan() {
        assert!(matches!(
            Value::Float(f64::NAN).to_json(),
            Err(CacheError::Encode(_))
        ));
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(Value::Int(7).as_i64(), Some(7));
        assert_eq!(Value::UInt(7).as_i64(), Some(7));
        assert_eq!(Value::UInt(u64::MAX).as_i64(), None);
        assert_eq!(Value::Str("7".to_string()).as_i64(), None);
        assert_eq!(Value::Float(7.0).as_i64(), None);
    }

    #[test]
    fn test_collect_into_seq() {
        let value: Value = vec![1i64, 2, 3].into_iter().collect();
        assert_eq!(
            value,
            Value::Seq(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn test_hashmap_into_map() {
        let mut map = HashMap::new();
        map.insert("name".to_string(), "go");
        let value = Value::from(map);
        assert!(value.is_structured());
        assert_eq!(value.kind(), "map");
    }

    #[test]
    fn test_deserialize_bytes_into_vec() {
        let value = Value::Bytes(vec![1, 2, 3]);
        let bytes: Vec<u8> = value.deserialize_into().unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }
}
