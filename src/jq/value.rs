//! Owned JSON values for jq evaluation.
//!
//! Every value the evaluator sees or produces is a [`JqValue`]: subjects decoded from
//! JSON text, values bridged in from the host, and everything constructed by a query.

use core::cmp::Ordering;
use core::fmt;

use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, Serialize, SerializeMap, SerializeSeq, Serializer};

use super::expr::Literal;

/// An owned JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum JqValue {
    /// JSON null
    Null,
    /// JSON boolean
    Bool(bool),
    /// JSON integer (stored as i64 for precision)
    Int(i64),
    /// JSON floating-point number
    Float(f64),
    /// JSON string
    String(String),
    /// JSON array
    Array(Vec<JqValue>),
    /// JSON object (IndexMap preserves insertion order like jq)
    Object(IndexMap<String, JqValue>),
}

impl JqValue {
    /// Create a string value.
    pub fn string(s: impl Into<String>) -> Self {
        JqValue::String(s.into())
    }

    /// Create a number, folding integral floats that fit exactly into integers.
    ///
    /// JSON does not tell `100` from `100.0`, so neither does jq.
    pub fn number(f: f64) -> Self {
        const EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
        if f.is_finite() && f.fract() == 0.0 && f.abs() < EXACT {
            JqValue::Int(f as i64)
        } else {
            JqValue::Float(f)
        }
    }

    /// Create an object from key-value pairs.
    pub fn object_from(pairs: impl IntoIterator<Item = (String, JqValue)>) -> Self {
        JqValue::Object(pairs.into_iter().collect())
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, JqValue::Null)
    }

    /// Check if this value is "truthy" (not null and not false).
    pub fn is_truthy(&self) -> bool {
        !matches!(self, JqValue::Null | JqValue::Bool(false))
    }

    /// Get the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            JqValue::Null => "null",
            JqValue::Bool(_) => "boolean",
            JqValue::Int(_) | JqValue::Float(_) => "number",
            JqValue::String(_) => "string",
            JqValue::Array(_) => "array",
            JqValue::Object(_) => "object",
        }
    }

    /// Convert to an i64, if this is an integral number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            JqValue::Int(n) => Some(*n),
            JqValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    /// Convert to an f64, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            JqValue::Int(n) => Some(*n as f64),
            JqValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Convert to a string reference, if possible.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            JqValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the length of this value.
    /// - null: 0
    /// - number: absolute value
    /// - string: UTF-8 codepoint count
    /// - array: element count
    /// - object: key count
    /// - boolean: no length (returns None)
    pub fn length(&self) -> Option<JqValue> {
        match self {
            JqValue::Null => Some(JqValue::Int(0)),
            JqValue::Int(n) => Some(n.checked_abs().map_or_else(
                || JqValue::Float((*n as f64).abs()),
                JqValue::Int,
            )),
            JqValue::Float(f) => Some(JqValue::Float(f.abs())),
            JqValue::String(s) => Some(JqValue::Int(s.chars().count() as i64)),
            JqValue::Array(arr) => Some(JqValue::Int(arr.len() as i64)),
            JqValue::Object(obj) => Some(JqValue::Int(obj.len() as i64)),
            JqValue::Bool(_) => None,
        }
    }

    /// Format this value as compact JSON.
    ///
    /// Non-finite floats are written as `null`, matching jq's own output. Use
    /// `serde_json::to_string` when non-finite numbers must be rejected instead.
    pub fn to_json(&self) -> String {
        match self {
            JqValue::Float(f) if !f.is_finite() => "null".into(),
            JqValue::Array(arr) => {
                let elements: Vec<String> = arr.iter().map(|v| v.to_json()).collect();
                format!("[{}]", elements.join(","))
            }
            JqValue::Object(obj) => {
                let entries: Vec<String> = obj
                    .iter()
                    .map(|(k, v)| format!("{}:{}", quote(k), v.to_json()))
                    .collect();
                format!("{{{}}}", entries.join(","))
            }
            other => serde_json::to_string(other).unwrap_or_else(|_| "null".into()),
        }
    }

    /// Compare two values using jq ordering:
    /// null < false < true < numbers < strings < arrays < objects.
    pub fn jq_cmp(&self, other: &JqValue) -> Ordering {
        fn type_order(v: &JqValue) -> u8 {
            match v {
                JqValue::Null => 0,
                JqValue::Bool(false) => 1,
                JqValue::Bool(true) => 2,
                JqValue::Int(_) | JqValue::Float(_) => 3,
                JqValue::String(_) => 4,
                JqValue::Array(_) => 5,
                JqValue::Object(_) => 6,
            }
        }

        let by_type = type_order(self).cmp(&type_order(other));
        if by_type != Ordering::Equal {
            return by_type;
        }

        match (self, other) {
            (JqValue::Int(a), JqValue::Int(b)) => a.cmp(b),
            (a, b) if a.as_f64().is_some() => {
                let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (JqValue::String(a), JqValue::String(b)) => a.cmp(b),
            (JqValue::Array(a), JqValue::Array(b)) => {
                for (ai, bi) in a.iter().zip(b.iter()) {
                    match ai.jq_cmp(bi) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                a.len().cmp(&b.len())
            }
            (JqValue::Object(a), JqValue::Object(b)) => {
                // Objects compare by their sorted key sets first, then value by value.
                let mut ak: Vec<&String> = a.keys().collect();
                let mut bk: Vec<&String> = b.keys().collect();
                ak.sort();
                bk.sort();
                match ak.cmp(&bk) {
                    Ordering::Equal => {}
                    other => return other,
                }
                for key in ak {
                    match a[key].jq_cmp(&b[key]) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                Ordering::Equal
            }
            _ => Ordering::Equal,
        }
    }

    /// jq equality: numbers compare by value, so `1 == 1.0`.
    pub fn jq_eq(&self, other: &JqValue) -> bool {
        self.jq_cmp(other) == Ordering::Equal
    }
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| String::from("\"\""))
}

impl fmt::Display for JqValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

impl Serialize for JqValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            JqValue::Null => serializer.serialize_unit(),
            JqValue::Bool(b) => serializer.serialize_bool(*b),
            JqValue::Int(n) => serializer.serialize_i64(*n),
            JqValue::Float(f) if f.is_finite() => match JqValue::number(*f) {
                JqValue::Int(n) => serializer.serialize_i64(n),
                _ => serializer.serialize_f64(*f),
            },
            JqValue::Float(f) => Err(ser::Error::custom(format!(
                "unsupported value: {} is not representable in JSON",
                f
            ))),
            JqValue::String(s) => serializer.serialize_str(s),
            JqValue::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for item in arr {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            JqValue::Object(obj) => {
                let mut map = serializer.serialize_map(Some(obj.len()))?;
                for (k, v) in obj {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for JqValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(JqValueVisitor)
    }
}

struct JqValueVisitor;

impl<'de> Visitor<'de> for JqValueVisitor {
    type Value = JqValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<JqValue, E> {
        Ok(JqValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<JqValue, E> {
        Ok(JqValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<JqValue, D::Error> {
        Deserialize::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<JqValue, E> {
        Ok(JqValue::Bool(b))
    }

    fn visit_i64<E: de::Error>(self, n: i64) -> Result<JqValue, E> {
        Ok(JqValue::Int(n))
    }

    fn visit_u64<E: de::Error>(self, n: u64) -> Result<JqValue, E> {
        Ok(i64::try_from(n).map_or(JqValue::Float(n as f64), JqValue::Int))
    }

    fn visit_f64<E: de::Error>(self, f: f64) -> Result<JqValue, E> {
        Ok(JqValue::number(f))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<JqValue, E> {
        Ok(JqValue::String(s.to_owned()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<JqValue, E> {
        Ok(JqValue::String(s))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<JqValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(JqValue::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<JqValue, A::Error> {
        let mut obj = IndexMap::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((k, v)) = map.next_entry::<String, JqValue>()? {
            obj.insert(k, v);
        }
        Ok(JqValue::Object(obj))
    }
}

impl From<Literal> for JqValue {
    fn from(lit: Literal) -> Self {
        match lit {
            Literal::Null => JqValue::Null,
            Literal::Bool(b) => JqValue::Bool(b),
            Literal::Int(n) => JqValue::Int(n),
            Literal::Float(f) => JqValue::number(f),
            Literal::String(s) => JqValue::String(s),
        }
    }
}

impl From<bool> for JqValue {
    fn from(b: bool) -> Self {
        JqValue::Bool(b)
    }
}

impl From<i64> for JqValue {
    fn from(n: i64) -> Self {
        JqValue::Int(n)
    }
}

impl From<f64> for JqValue {
    fn from(f: f64) -> Self {
        JqValue::Float(f)
    }
}

impl From<String> for JqValue {
    fn from(s: String) -> Self {
        JqValue::String(s)
    }
}

impl From<&str> for JqValue {
    fn from(s: &str) -> Self {
        JqValue::String(s.to_string())
    }
}

impl<T: Into<JqValue>> From<Vec<T>> for JqValue {
    fn from(arr: Vec<T>) -> Self {
        JqValue::Array(arr.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthy() {
        assert!(!JqValue::Null.is_truthy());
        assert!(!JqValue::Bool(false).is_truthy());
        assert!(JqValue::Bool(true).is_truthy());
        assert!(JqValue::Int(0).is_truthy()); // 0 is truthy in jq!
        assert!(JqValue::String("".into()).is_truthy()); // "" is truthy in jq!
        assert!(JqValue::Array(vec![]).is_truthy()); // [] is truthy in jq!
    }

    #[test]
    fn test_type_name() {
        assert_eq!(JqValue::Null.type_name(), "null");
        assert_eq!(JqValue::Bool(true).type_name(), "boolean");
        assert_eq!(JqValue::Int(42).type_name(), "number");
        assert_eq!(JqValue::Float(2.5).type_name(), "number");
        assert_eq!(JqValue::String("".into()).type_name(), "string");
        assert_eq!(JqValue::Array(vec![]).type_name(), "array");
        assert_eq!(JqValue::Object(IndexMap::new()).type_name(), "object");
    }

    #[test]
    fn test_length() {
        assert_eq!(JqValue::Null.length(), Some(JqValue::Int(0)));
        assert_eq!(JqValue::string("héllo").length(), Some(JqValue::Int(5))); // Unicode
        assert_eq!(
            JqValue::from(vec![1i64, 2]).length(),
            Some(JqValue::Int(2))
        );
        assert_eq!(JqValue::Int(-3).length(), Some(JqValue::Int(3)));
        assert_eq!(JqValue::Bool(true).length(), None);
    }

    #[test]
    fn test_to_json() {
        assert_eq!(JqValue::Null.to_json(), "null");
        assert_eq!(JqValue::Bool(false).to_json(), "false");
        assert_eq!(JqValue::Int(42).to_json(), "42");
        assert_eq!(JqValue::Float(2.5).to_json(), "2.5");
        assert_eq!(JqValue::string("hello\nworld").to_json(), "\"hello\\nworld\"");
        assert_eq!(JqValue::from(vec![1i64, 2]).to_json(), "[1,2]");
        assert_eq!(JqValue::Float(f64::NAN).to_json(), "null");
    }

    #[test]
    fn test_deserialize_preserves_key_order() {
        let value: JqValue = serde_json::from_str(r#"{"b": 1, "a": [true, null, 1.5]}"#).unwrap();
        let JqValue::Object(obj) = &value else {
            panic!("expected object, got {:?}", value);
        };
        assert_eq!(obj.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(
            obj["a"],
            JqValue::Array(vec![JqValue::Bool(true), JqValue::Null, JqValue::Float(1.5)])
        );
    }

    #[test]
    fn test_deserialize_large_unsigned_becomes_float() {
        let value: JqValue = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(value, JqValue::Float(u64::MAX as f64));
    }

    #[test]
    fn test_integral_floats_become_integers() {
        let value: JqValue = serde_json::from_str("[100.00, 1e3, -0.0, 2.5, 1e300]").unwrap();
        assert_eq!(
            value,
            JqValue::Array(vec![
                JqValue::Int(100),
                JqValue::Int(1000),
                JqValue::Int(0),
                JqValue::Float(2.5),
                JqValue::Float(1e300),
            ])
        );
        assert_eq!(serde_json::to_string(&JqValue::Float(100.0)).unwrap(), "100");
        assert_eq!(serde_json::to_string(&JqValue::Float(2.5)).unwrap(), "2.5");
        let two_53 = 9_007_199_254_740_992.0;
        assert_eq!(JqValue::number(two_53), JqValue::Float(two_53));
    }

    #[test]
    fn test_serialize_rejects_non_finite() {
        let value = JqValue::Array(vec![JqValue::Float(f64::INFINITY)]);
        assert!(serde_json::to_string(&value).is_err());
    }

    #[test]
    fn test_jq_ordering() {
        let ordered = [
            JqValue::Null,
            JqValue::Bool(false),
            JqValue::Bool(true),
            JqValue::Int(-1),
            JqValue::Float(0.5),
            JqValue::string("a"),
            JqValue::Array(vec![]),
            JqValue::Object(IndexMap::new()),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(pair[0].jq_cmp(&pair[1]), Ordering::Less, "{:?}", pair);
        }
        assert!(JqValue::Int(1).jq_eq(&JqValue::Float(1.0)));
    }
}
