//! End-to-end tests for jq functions: definition, compilation, and calls.

use std::collections::BTreeMap;
use std::error::Error as _;

use insta::assert_snapshot;
use jqfunc::host::{HostType, HostValue, SourcePos, SourceRange};
use jqfunc::jq::CompileError;
use jqfunc::{Cause, Function, FunctionDefinition, JqFunctionError};

fn range() -> SourceRange {
    SourceRange::new("main.hcl", SourcePos::new(2, 1, 10), SourcePos::new(4, 2, 60))
}

fn define(params: &[&str], query: &str) -> Result<Function, JqFunctionError> {
    let def = FunctionDefinition::new(
        "f",
        params.iter().map(|p| p.to_string()).collect(),
        query,
        range(),
    );
    Ok(Function::new(def.compile()?, "input"))
}

fn function(params: &[&str], query: &str) -> Function {
    define(params, query).expect("definition should compile")
}

fn text(s: &str) -> HostValue {
    HostValue::string(s)
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_string_result_from_text_subject_is_unquoted() {
    let f = function(&[], ".name");
    let out = f.call(&[text(r#"{"name":"Alice","age":30}"#)]).unwrap();
    assert_eq!(out, text("Alice"));
}

#[test]
fn test_scalar_result_from_text_subject_is_json() {
    let f = function(&[], ".age");
    let out = f.call(&[text(r#"{"name":"Alice","age":30}"#)]).unwrap();
    assert_eq!(out, text("30"));
}

#[test]
fn test_parameters_are_bound_as_variables() {
    let f = function(&["x", "y"], "$x + $y");
    let out = f
        .call(&[HostValue::null(), HostValue::number(5), HostValue::number(3)])
        .unwrap();
    assert_eq!(out, HostValue::number(8));
}

#[test]
fn test_multiple_results_from_typed_subject_form_a_list() {
    let f = function(&[], ".[]");
    let subject = HostValue::Object(BTreeMap::from([
        ("a".to_string(), HostValue::number(1)),
        ("b".to_string(), HostValue::number(2)),
        ("c".to_string(), HostValue::number(3)),
    ]));
    let out = f.call(&[subject]).unwrap();
    assert_eq!(
        out,
        HostValue::List(vec![
            HostValue::number(1),
            HostValue::number(2),
            HostValue::number(3)
        ])
    );
}

#[test]
fn test_no_results() {
    let f = function(&[], "empty");
    assert_eq!(f.call(&[text("{}")]).unwrap(), text("null"));
    assert_eq!(
        f.call(&[HostValue::Object(BTreeMap::new())]).unwrap(),
        HostValue::null()
    );
}

#[test]
fn test_undeclared_variable_fails_to_compile() {
    let err = define(&["z"], "$z + $unknown").unwrap_err();
    assert!(err.is_compile_error());
    match err.cause() {
        Cause::Compile(CompileError::UndefinedVariable(name)) => assert_eq!(name, "unknown"),
        other => panic!("unexpected cause: {:?}", other),
    }
}

// =============================================================================
// Result shaping
// =============================================================================

#[test]
fn test_multiple_results_from_text_subject_are_one_json_array() {
    let f = function(&[], ".[]");
    let out = f.call(&[text(r#"{"a":1,"b":"x"}"#)]).unwrap();
    assert_eq!(out, text(r#"[1,"x"]"#));
}

#[test]
fn test_mixed_results_from_typed_subject_form_a_tuple() {
    let f = function(&[], ".a, .b");
    let subject = HostValue::Object(BTreeMap::from([
        ("a".to_string(), HostValue::number(1)),
        ("b".to_string(), text("x")),
    ]));
    assert_eq!(
        f.call(&[subject]).unwrap(),
        HostValue::Tuple(vec![HostValue::number(1), text("x")])
    );
}

#[test]
fn test_string_result_from_typed_subject_is_a_host_string() {
    let f = function(&[], ".[0]");
    let subject = HostValue::List(vec![text("a"), text("b")]);
    assert_eq!(f.call(&[subject]).unwrap(), text("a"));
}

#[test]
fn test_non_string_result_from_typed_subject_stays_typed() {
    let f = function(&[], "length");
    let subject = HostValue::List(vec![text("a"), text("b")]);
    assert_eq!(f.call(&[subject]).unwrap(), HostValue::number(2));
}

#[test]
fn test_object_result_from_typed_subject() {
    let f = function(&["key"], "{($key): .}");
    let out = f.call(&[HostValue::number(1), text("n")]).unwrap();
    assert_eq!(
        out,
        HostValue::Object(BTreeMap::from([("n".to_string(), HostValue::number(1))]))
    );
}

#[test]
fn test_string_subject_is_decoded_as_json() {
    let f = function(&[], "type");
    assert_eq!(f.call(&[text(r#""hi""#)]).unwrap(), text("string"));
    assert_eq!(f.call(&[text("[1]")]).unwrap(), text("array"));
}

#[test]
fn test_integral_float_in_text_subject_prints_as_integer() {
    let doc = text(r#"{"subtotal": 100.00, "rate": 0.25}"#);
    assert_eq!(function(&[], ".subtotal").call(&[doc.clone()]).unwrap(), text("100"));
    assert_eq!(function(&[], ".rate").call(&[doc.clone()]).unwrap(), text("0.25"));
    assert_eq!(
        function(&[], ".").call(&[doc]).unwrap(),
        text(r#"{"subtotal":100,"rate":0.25}"#)
    );
}

// =============================================================================
// Parameters
// =============================================================================

#[test]
fn test_parameter_lookup_by_name() {
    let f = function(&["field"], ".[$field]");
    let out = f
        .call(&[text(r#"{"name":"Alice"}"#), text("name")])
        .unwrap();
    assert_eq!(out, text("Alice"));
}

#[test]
fn test_structured_parameters() {
    let f = function(&["keys"], "[.[$keys[]]]");
    let keys = HostValue::List(vec![text("b"), text("a")]);
    let out = f.call(&[text(r#"{"a":1,"b":2}"#), keys]).unwrap();
    assert_eq!(out, text("[2,1]"));
}

#[test]
fn test_duplicate_parameter_names_later_one_wins() {
    let f = function(&["a", "a"], "$a");
    assert_eq!(f.arity(), 3);
    let out = f
        .call(&[HostValue::null(), HostValue::number(1), HostValue::number(2)])
        .unwrap();
    assert_eq!(out, HostValue::number(2));
}

#[test]
fn test_signature() {
    let f = function(&["a", "b"], "$a");
    assert_eq!(f.name(), "f");
    let params: Vec<_> = f.params().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(params, vec!["input", "a", "b"]);
    assert!(f.params().iter().all(|p| p.ty == HostType::Dynamic));
    assert_eq!(f.return_type(), &HostType::Dynamic);
}

#[test]
fn test_functions_are_reusable_and_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Function>();

    let f = function(&["n"], ". * $n");
    let handles: Vec<_> = (1..=4i64)
        .map(|n| {
            let f = f.clone();
            std::thread::spawn(move || f.call(&[HostValue::number(10), HostValue::number(n)]))
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();
    assert_eq!(
        results,
        (1..=4i64).map(|n| HostValue::number(10 * n)).collect::<Vec<_>>()
    );
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_invalid_json_subject() {
    let f = function(&[], ".");
    let err = f.call(&[text("not json")]).unwrap_err();
    assert!(matches!(err.cause(), Cause::InvalidJsonInput(_)));
    assert!(err.to_string().starts_with("jq function f at main.hcl:2,1-4,2: invalid JSON input: "));
}

#[test]
fn test_unknown_parameter_value() {
    let f = function(&["a"], "$a");
    let err = f
        .call(&[HostValue::null(), HostValue::Unknown(HostType::String)])
        .unwrap_err();
    assert_snapshot!(
        err.to_string(),
        @"jq function f at main.hcl:2,1-4,2: failed to convert parameter a: value is not yet known"
    );
}

#[test]
fn test_capsule_subject() {
    let f = function(&[], ".");
    let subject = HostValue::Capsule {
        type_name: "file handle".to_string(),
    };
    let err = f.call(&[subject]).unwrap_err();
    assert_snapshot!(
        err.to_string(),
        @"jq function f at main.hcl:2,1-4,2: failed to convert input: values of type file handle have no JSON representation"
    );
}

#[test]
fn test_execution_error_discards_partial_results() {
    let f = function(&[], r#"1, error("stop"), 2"#);
    let err = f.call(&[text("null")]).unwrap_err();
    assert_snapshot!(
        err.to_string(),
        @"jq function f at main.hcl:2,1-4,2: jq execution error: stop"
    );
}

#[test]
fn test_execution_error_message() {
    let f = function(&[], ".a");
    let err = f.call(&[text("[1]")]).unwrap_err();
    assert_snapshot!(
        err.to_string(),
        @r#"jq function f at main.hcl:2,1-4,2: jq execution error: cannot index array with "a""#
    );
}

#[test]
fn test_oversized_results_are_execution_errors() {
    let f = function(&["n"], r#""ab" * $n"#);
    let err = f
        .call(&[HostValue::null(), HostValue::number(1_000_000_000_000_000_000i64)])
        .unwrap_err();
    assert_snapshot!(
        err.to_string(),
        @"jq function f at main.hcl:2,1-4,2: jq execution error: repeat string result too long"
    );

    let err = function(&[], ".[100000000000] = 1").call(&[HostValue::null()]).unwrap_err();
    assert_snapshot!(
        err.to_string(),
        @"jq function f at main.hcl:2,1-4,2: jq execution error: array index too large"
    );
}

#[test]
fn test_out_of_range_literal_encodes_as_largest_double() {
    let out = function(&[], "1e999").call(&[text("null")]).unwrap();
    assert_eq!(out, text("1.7976931348623157e308"));
}

#[test]
fn test_parse_error() {
    let err = define(&[], "$y | invalid_func(").unwrap_err();
    assert!(matches!(err.cause(), Cause::Parse(_)));
    assert_eq!(err.query, "$y | invalid_func(");
    assert_eq!(err.to_diagnostic().summary, "Invalid jq query");
}

#[test]
fn test_compile_error_display() {
    let err = define(&[], "$missing").unwrap_err();
    assert_snapshot!(
        err.to_string(),
        @"jq function f at main.hcl:2,1-4,2: failed to compile jq query: variable not defined: $missing"
    );
    let diag = err.to_diagnostic();
    assert_eq!(diag.summary, "Failed to compile jq query");
    assert_eq!(diag.subject, Some(range()));
}

#[test]
fn test_argument_count() {
    let f = function(&["a"], "$a");
    let err = f.call(&[HostValue::null()]).unwrap_err();
    assert_snapshot!(
        err.to_string(),
        @"jq function f at main.hcl:2,1-4,2: expected 2 arguments, got 1"
    );
}

#[test]
fn test_error_chain_can_be_walked() {
    let f = function(&[], ".a");
    let err = f.call(&[text("[1]")]).unwrap_err();

    let cause = err.source().expect("error should have a cause");
    assert!(cause.downcast_ref::<Cause>().is_some());

    let inner = cause.source().expect("cause should have a source");
    let eval = inner
        .downcast_ref::<jqfunc::jq::EvalError>()
        .expect("innermost error should be the query error");
    assert_eq!(eval.message(), r#"cannot index array with "a""#);
}
