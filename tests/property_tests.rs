//! Property-based tests for value conversion and function calls.

use indexmap::IndexMap;
use jqfunc::host::{HostValue, SourceRange};
use jqfunc::jq::JqValue;
use jqfunc::{decode_text, encode_text, from_native, to_native, Function, FunctionDefinition};
use proptest::prelude::*;

fn jq_value() -> impl Strategy<Value = JqValue> {
    let leaf = prop_oneof![
        Just(JqValue::Null),
        any::<bool>().prop_map(JqValue::Bool),
        any::<i64>().prop_map(JqValue::Int),
        // Quarters are exact in binary, so decimal text reproduces them bit for bit.
        (-1_000_000i32..1_000_000).prop_map(|n| JqValue::Float(f64::from(n) + 0.25)),
        (-1_000_000i32..1_000_000).prop_map(|n| JqValue::Float(f64::from(n))),
        Just(JqValue::Float(100.0)),
        "[a-z ]{0,8}".prop_map(JqValue::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(JqValue::Array),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|map| JqValue::Object(map.into_iter().collect::<IndexMap<_, _>>())),
        ]
    })
}

/// The form a value takes after a trip through JSON: integral floats become integers.
fn canonical(value: &JqValue) -> JqValue {
    match value {
        JqValue::Float(f) => JqValue::number(*f),
        JqValue::Array(items) => JqValue::Array(items.iter().map(canonical).collect()),
        JqValue::Object(map) => {
            JqValue::Object(map.iter().map(|(k, v)| (k.clone(), canonical(v))).collect())
        }
        other => other.clone(),
    }
}

fn identity() -> Function {
    let def = FunctionDefinition::new("id", vec![], ".", SourceRange::default());
    Function::new(def.compile().unwrap(), "input")
}

// ============================================================================
// Property-based tests
// ============================================================================

proptest! {
    /// Converting to a host value and back yields an equal jq value
    #[test]
    fn host_conversion_round_trips(value in jq_value()) {
        let host = from_native(&value).unwrap();
        prop_assert_eq!(to_native(&host).unwrap(), canonical(&value));
    }

    /// The identity query over a text subject returns the compact JSON text,
    /// except that a lone string comes back unquoted. Integral floats print as
    /// integers, so `100.0` reads back as `100`
    #[test]
    fn identity_over_text(value in jq_value()) {
        let text = encode_text(&value).unwrap();
        prop_assert_eq!(decode_text(&text).unwrap(), canonical(&value));
        let out = identity().call(&[HostValue::String(text.clone())]).unwrap();
        match &value {
            JqValue::String(s) => prop_assert_eq!(out, HostValue::String(s.clone())),
            _ => prop_assert_eq!(out, HostValue::String(text)),
        }
    }

    /// The identity query over a typed subject returns the most specific host value
    #[test]
    fn identity_over_typed(value in jq_value()) {
        let host = from_native(&value).unwrap();
        let expected = from_native(&canonical(&value)).unwrap();
        prop_assert_eq!(identity().call(&[host]).unwrap(), expected);
    }

    /// A function takes the subject plus one argument per declared parameter
    #[test]
    fn arity_counts_subject_and_params(params in prop::collection::vec("[a-z][a-z0-9_]{0,5}", 0..6)) {
        let def = FunctionDefinition::new("f", params.clone(), ".", SourceRange::default());
        let function = Function::new(def.compile().unwrap(), "input");
        prop_assert_eq!(function.arity(), params.len() + 1);

        let args = vec![HostValue::null(); params.len() + 1];
        prop_assert!(function.call(&args).is_ok());
        prop_assert!(function.call(&args[1..]).is_err());
    }
}
