//! Typed host values.
//!
//! The host is a typed configuration language: every value has a type, nulls are typed,
//! and a value may be unknown until later evaluation. Collections come in several kinds:
//! homogeneous lists, sets and maps, and structural tuples and objects.

use core::fmt;
use std::collections::BTreeMap;

use serde_json::{Number, Value};
use thiserror::Error;

/// The type of a host value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostType {
    /// Any type; decided at call time.
    Dynamic,
    Bool,
    Number,
    String,
    List(Box<HostType>),
    Set(Box<HostType>),
    Map(Box<HostType>),
    Tuple(Vec<HostType>),
    Object(BTreeMap<String, HostType>),
    /// An opaque application-defined type.
    Capsule(String),
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostType::Dynamic => f.write_str("dynamic"),
            HostType::Bool => f.write_str("bool"),
            HostType::Number => f.write_str("number"),
            HostType::String => f.write_str("string"),
            HostType::List(elem) => write!(f, "list of {}", elem),
            HostType::Set(elem) => write!(f, "set of {}", elem),
            HostType::Map(elem) => write!(f, "map of {}", elem),
            HostType::Tuple(_) => f.write_str("tuple"),
            HostType::Object(_) => f.write_str("object"),
            HostType::Capsule(name) => write!(f, "{}", name),
        }
    }
}

/// A host-typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    /// A null of the given type.
    Null(HostType),
    /// A value of the given type that is not known yet.
    Unknown(HostType),
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<HostValue>),
    Set(Vec<HostValue>),
    Tuple(Vec<HostValue>),
    Map(BTreeMap<String, HostValue>),
    Object(BTreeMap<String, HostValue>),
    /// An opaque application value; only its type name is visible.
    Capsule { type_name: String },
}

/// Error encoding a host value as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostValueError {
    #[error("value is not yet known")]
    Unknown,

    #[error("values of type {0} cannot be encoded as JSON")]
    Capsule(String),
}

impl HostValue {
    /// An untyped null.
    pub fn null() -> Self {
        HostValue::Null(HostType::Dynamic)
    }

    pub fn string(s: impl Into<String>) -> Self {
        HostValue::String(s.into())
    }

    pub fn number(n: impl Into<Number>) -> Self {
        HostValue::Number(n.into())
    }

    /// Build a sequence value, choosing its kind from the element types.
    ///
    /// Elements that all share one type make a list; anything else, including the
    /// empty sequence, makes a tuple.
    pub fn sequence(items: Vec<HostValue>) -> Self {
        let homogeneous = match items.split_first() {
            Some((first, rest)) => {
                let ty = first.ty();
                rest.iter().all(|item| item.ty() == ty)
            }
            None => false,
        };
        if homogeneous {
            HostValue::List(items)
        } else {
            HostValue::Tuple(items)
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null(_))
    }

    pub fn is_known(&self) -> bool {
        match self {
            HostValue::Unknown(_) => false,
            HostValue::List(items) | HostValue::Set(items) | HostValue::Tuple(items) => {
                items.iter().all(HostValue::is_known)
            }
            HostValue::Map(map) | HostValue::Object(map) => map.values().all(HostValue::is_known),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The most specific type of this value.
    pub fn ty(&self) -> HostType {
        fn element_type<'a>(mut items: impl Iterator<Item = &'a HostValue>) -> Box<HostType> {
            Box::new(items.next().map_or(HostType::Dynamic, HostValue::ty))
        }

        match self {
            HostValue::Null(ty) | HostValue::Unknown(ty) => ty.clone(),
            HostValue::Bool(_) => HostType::Bool,
            HostValue::Number(_) => HostType::Number,
            HostValue::String(_) => HostType::String,
            HostValue::List(items) => HostType::List(element_type(items.iter())),
            HostValue::Set(items) => HostType::Set(element_type(items.iter())),
            HostValue::Map(map) => HostType::Map(element_type(map.values())),
            HostValue::Tuple(items) => HostType::Tuple(items.iter().map(HostValue::ty).collect()),
            HostValue::Object(map) => {
                HostType::Object(map.iter().map(|(k, v)| (k.clone(), v.ty())).collect())
            }
            HostValue::Capsule { type_name } => HostType::Capsule(type_name.clone()),
        }
    }

    /// Convert a JSON value into the most specific host value.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => HostValue::null(),
            Value::Bool(b) => HostValue::Bool(b),
            Value::Number(n) => HostValue::Number(n),
            Value::String(s) => HostValue::String(s),
            Value::Array(items) => {
                HostValue::sequence(items.into_iter().map(HostValue::from_json).collect())
            }
            Value::Object(map) => HostValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, HostValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Encode this value as JSON. Unknown and capsule values cannot be encoded.
    pub fn to_json(&self) -> Result<Value, HostValueError> {
        Ok(match self {
            HostValue::Null(_) => Value::Null,
            HostValue::Unknown(_) => return Err(HostValueError::Unknown),
            HostValue::Bool(b) => Value::Bool(*b),
            HostValue::Number(n) => Value::Number(n.clone()),
            HostValue::String(s) => Value::String(s.clone()),
            HostValue::List(items) | HostValue::Set(items) | HostValue::Tuple(items) => Value::Array(
                items
                    .iter()
                    .map(HostValue::to_json)
                    .collect::<Result<_, _>>()?,
            ),
            HostValue::Map(map) | HostValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_json()?)))
                    .collect::<Result<_, HostValueError>>()?,
            ),
            HostValue::Capsule { type_name } => {
                return Err(HostValueError::Capsule(type_name.clone()))
            }
        })
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<i64> for HostValue {
    fn from(n: i64) -> Self {
        HostValue::Number(n.into())
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sequence_kind() {
        assert!(matches!(
            HostValue::sequence(vec![1i64.into(), 2i64.into()]),
            HostValue::List(_)
        ));
        assert!(matches!(
            HostValue::sequence(vec![1i64.into(), "a".into()]),
            HostValue::Tuple(_)
        ));
        assert_eq!(HostValue::sequence(vec![]), HostValue::Tuple(vec![]));
    }

    #[test]
    fn test_from_json() {
        let value = HostValue::from_json(json!({"name": "Alice", "tags": ["a", "b"], "n": null}));
        let HostValue::Object(map) = &value else {
            panic!("expected object, got {:?}", value);
        };
        assert_eq!(map["name"], HostValue::string("Alice"));
        assert_eq!(
            map["tags"],
            HostValue::List(vec![HostValue::string("a"), HostValue::string("b")])
        );
        assert_eq!(map["n"], HostValue::null());
    }

    #[test]
    fn test_ty() {
        let value = HostValue::from_json(json!([{"a": 1}, {"a": 2}]));
        let expected_elem = HostType::Object([("a".to_string(), HostType::Number)].into());
        assert_eq!(value.ty(), HostType::List(Box::new(expected_elem)));
        assert_eq!(HostType::List(Box::new(HostType::String)).to_string(), "list of string");
    }

    #[test]
    fn test_to_json() {
        let value = HostValue::Set(vec![HostValue::number(1), HostValue::null()]);
        assert_eq!(value.to_json().unwrap(), json!([1, null]));
        assert_eq!(
            HostValue::Unknown(HostType::String).to_json(),
            Err(HostValueError::Unknown)
        );
        let capsule = HostValue::Capsule {
            type_name: "file handle".into(),
        };
        assert_eq!(
            capsule.to_json().unwrap_err().to_string(),
            "values of type file handle cannot be encoded as JSON"
        );
    }

    #[test]
    fn test_is_known() {
        let value = HostValue::Tuple(vec![HostValue::Unknown(HostType::Dynamic)]);
        assert!(!value.is_known());
        assert!(HostValue::null().is_known());
    }
}
