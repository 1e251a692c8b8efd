//! Definitions files: TOML arrays of tables, one table per function.
//!
//! ```toml
//! [[jqfunction]]
//! name = "get_field"
//! params = ["field"]
//! query = ".[$field]"
//! ```
//!
//! Each table becomes a host block. `name` is the block label; every other key becomes an
//! attribute. String elements of `params` stand in for bare identifiers.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use jqfunc::host::{Attribute, Block, Body, Expression, HostValue, SourceRange};
use std::path::Path;
use toml::{Spanned, Value};

type RawTable = IndexMap<String, Spanned<Value>>;
type RawFile = IndexMap<String, Vec<RawTable>>;

const NAME: &str = "name";
const PARAMS: &str = "params";

/// Read a definitions file into a host body.
pub fn load(path: &Path) -> Result<Body> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read definitions: {}", path.display()))?;
    parse(&path.display().to_string(), &text)
}

pub fn parse(file: &str, text: &str) -> Result<Body> {
    let raw: RawFile =
        toml::from_str(text).with_context(|| format!("Invalid definitions file: {}", file))?;

    let mut body = Body::new();
    for (block_type, tables) in raw {
        for table in tables {
            body = body.with_block(block(file, text, &block_type, table));
        }
    }
    Ok(body)
}

fn block(file: &str, text: &str, block_type: &str, table: RawTable) -> Block {
    let range = |value: &Spanned<Value>| SourceRange::from_byte_span(file, text, value.span());

    let def_range = table
        .get(NAME)
        .or_else(|| table.values().next())
        .map(range)
        .unwrap_or_else(|| SourceRange::from_byte_span(file, text, 0..0));

    let mut labels = Vec::new();
    let mut body = Body::new();
    for (key, value) in table {
        let value_range = range(&value);
        if key == NAME {
            if let Value::String(name) = value.get_ref() {
                labels.push(name.clone());
                continue;
            }
        }
        let expr = if key == PARAMS {
            params_expression(value.into_inner(), value_range.clone())
        } else {
            expression(value.into_inner(), value_range.clone())
        };
        body = body.with_attribute(Attribute::new(key, expr, value_range));
    }

    Block::new(block_type, labels, body, def_range)
}

/// `params = ["a", "b"]` reads as the tuple of identifiers `[a, b]`.
fn params_expression(value: Value, range: SourceRange) -> Expression {
    match value {
        Value::Array(items) => Expression::tuple(
            items
                .into_iter()
                .map(|item| match item {
                    Value::String(name) => Expression::ident(name, range.clone()),
                    other => expression(other, range.clone()),
                })
                .collect(),
            range,
        ),
        other => expression(other, range),
    }
}

fn expression(value: Value, range: SourceRange) -> Expression {
    match value {
        Value::Array(items) => Expression::tuple(
            items
                .into_iter()
                .map(|item| expression(item, range.clone()))
                .collect(),
            range,
        ),
        other => Expression::literal(host_value(other), range),
    }
}

fn host_value(value: Value) -> HostValue {
    match value {
        Value::String(s) => HostValue::String(s),
        Value::Integer(n) => HostValue::number(n),
        Value::Float(f) => serde_json::Number::from_f64(f).map_or_else(HostValue::null, HostValue::Number),
        Value::Boolean(b) => HostValue::Bool(b),
        Value::Datetime(d) => HostValue::String(d.to_string()),
        Value::Array(items) => HostValue::sequence(items.into_iter().map(host_value).collect()),
        Value::Table(table) => HostValue::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, host_value(v)))
                .collect(),
        ),
    }
}
