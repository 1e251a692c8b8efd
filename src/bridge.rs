//! Conversion between host values and jq values.
//!
//! Two directions, each total over what it claims to handle:
//!
//! - host to jq: scalars map to scalars, lists, sets and tuples to arrays, maps and
//!   objects to objects. Unknown and capsule values have no jq form.
//! - jq to host: the most specific host value is rebuilt. Arrays become lists when their
//!   elements share a type and tuples otherwise; objects become host objects.
//!
//! The text path skips host values entirely: JSON text decodes straight into a
//! [`JqValue`] and encodes straight back.

use indexmap::IndexMap;
use serde_json::Number;
use thiserror::Error;

use crate::host::HostValue;
use crate::jq::JqValue;

/// A value that cannot cross between the host and jq value models.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("value is not yet known")]
    Unknown,

    #[error("values of type {0} have no JSON representation")]
    Capsule(String),

    #[error("number {0} cannot be represented")]
    NonFiniteNumber(f64),
}

/// Convert a host value to a jq value.
pub fn to_native(value: &HostValue) -> Result<JqValue, ConversionError> {
    Ok(match value {
        HostValue::Null(_) => JqValue::Null,
        HostValue::Unknown(_) => return Err(ConversionError::Unknown),
        HostValue::Bool(b) => JqValue::Bool(*b),
        HostValue::Number(n) => number_to_native(n)?,
        HostValue::String(s) => JqValue::String(s.clone()),
        HostValue::List(items) | HostValue::Set(items) | HostValue::Tuple(items) => {
            JqValue::Array(items.iter().map(to_native).collect::<Result<_, _>>()?)
        }
        HostValue::Map(map) | HostValue::Object(map) => JqValue::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), to_native(v)?)))
                .collect::<Result<IndexMap<_, _>, ConversionError>>()?,
        ),
        HostValue::Capsule { type_name } => {
            return Err(ConversionError::Capsule(type_name.clone()))
        }
    })
}

fn number_to_native(n: &Number) -> Result<JqValue, ConversionError> {
    if let Some(i) = n.as_i64() {
        return Ok(JqValue::Int(i));
    }
    match n.as_f64() {
        Some(f) if f.is_finite() => Ok(JqValue::number(f)),
        Some(f) => Err(ConversionError::NonFiniteNumber(f)),
        None => Err(ConversionError::NonFiniteNumber(f64::NAN)),
    }
}

/// Convert a jq value to the most specific host value.
pub fn from_native(value: &JqValue) -> Result<HostValue, ConversionError> {
    Ok(match value {
        JqValue::Null => HostValue::null(),
        JqValue::Bool(b) => HostValue::Bool(*b),
        JqValue::Int(n) => HostValue::Number((*n).into()),
        JqValue::Float(f) => HostValue::Number(
            Number::from_f64(*f).ok_or(ConversionError::NonFiniteNumber(*f))?,
        ),
        JqValue::String(s) => HostValue::String(s.clone()),
        JqValue::Array(items) => {
            HostValue::sequence(items.iter().map(from_native).collect::<Result<_, _>>()?)
        }
        JqValue::Object(map) => HostValue::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), from_native(v)?)))
                .collect::<Result<_, ConversionError>>()?,
        ),
    })
}

/// Decode JSON text into a jq value.
pub fn decode_text(text: &str) -> Result<JqValue, serde_json::Error> {
    serde_json::from_str(text)
}

/// Encode a jq value as compact JSON text. Non-finite numbers are rejected.
pub fn encode_text(value: &JqValue) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostType;
    use std::collections::BTreeMap;

    #[test]
    fn test_host_to_native() {
        let host = HostValue::Object(BTreeMap::from([
            ("n".to_string(), HostValue::number(3)),
            ("f".to_string(), HostValue::Number(Number::from_f64(1.5).unwrap())),
            ("s".to_string(), HostValue::Set(vec![HostValue::string("x")])),
            ("z".to_string(), HostValue::Null(HostType::String)),
        ]));
        let native = to_native(&host).unwrap();
        assert_eq!(
            native,
            serde_json::from_str::<JqValue>(r#"{"f": 1.5, "n": 3, "s": ["x"], "z": null}"#).unwrap()
        );
    }

    #[test]
    fn test_host_to_native_rejects_unknown_and_capsules() {
        let nested = HostValue::List(vec![HostValue::Unknown(HostType::Number)]);
        assert_eq!(to_native(&nested), Err(ConversionError::Unknown));

        let capsule = HostValue::Capsule {
            type_name: "socket".into(),
        };
        assert_eq!(
            to_native(&capsule).unwrap_err().to_string(),
            "values of type socket have no JSON representation"
        );
    }

    #[test]
    fn test_native_to_host() {
        let native: JqValue = serde_json::from_str(r#"{"list": [1, 2], "tuple": [1, "a"], "empty": []}"#).unwrap();
        let HostValue::Object(map) = from_native(&native).unwrap() else {
            panic!("expected object");
        };
        assert_eq!(map["list"], HostValue::List(vec![HostValue::number(1), HostValue::number(2)]));
        assert!(matches!(map["tuple"], HostValue::Tuple(_)));
        assert_eq!(map["empty"], HostValue::Tuple(vec![]));
    }

    #[test]
    fn test_native_to_host_rejects_non_finite() {
        assert_eq!(
            from_native(&JqValue::Float(f64::INFINITY)),
            Err(ConversionError::NonFiniteNumber(f64::INFINITY))
        );
    }

    #[test]
    fn test_text_path() {
        let value = decode_text(r#"{"b": [true, null], "a": "x"}"#).unwrap();
        assert_eq!(encode_text(&value).unwrap(), r#"{"b":[true,null],"a":"x"}"#);
        assert!(decode_text("{not json").is_err());
        assert!(encode_text(&JqValue::Float(f64::NAN)).is_err());
    }

    #[test]
    fn test_integral_floats_read_as_integers() {
        let value = decode_text(r#"{"subtotal": 100.00, "tax": 7.5}"#).unwrap();
        assert_eq!(encode_text(&value).unwrap(), r#"{"subtotal":100,"tax":7.5}"#);

        let host = HostValue::Number(Number::from_f64(100.0).unwrap());
        assert_eq!(to_native(&host).unwrap(), JqValue::Int(100));
    }
}
