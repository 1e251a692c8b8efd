//! Decoding function definitions from configuration blocks.
//!
//! A definition looks like:
//!
//! ```text
//! jqfunction "get_field" {
//!   params = [field]
//!   query  = ".[$field]"
//! }
//! ```

use tracing::warn;

use crate::config::Settings;
use crate::function::FunctionDefinition;
use crate::host::{Block, Body, Diagnostic, Diagnostics, HostValue};
use crate::params::parse_params;
use crate::table::FunctionTable;

const PARAMS: &str = "params";
const QUERY: &str = "query";

/// Extract and compile every function block from `body`.
///
/// Blocks of `settings.block_type` are consumed; every other block and all attributes
/// are returned untouched in the remaining body. A bad definition is skipped with at
/// least one error diagnostic and never stops its siblings from compiling.
pub fn decode_functions(body: Body, settings: &Settings) -> (FunctionTable, Body, Diagnostics) {
    let mut table = FunctionTable::new();
    let mut diags = Diagnostics::new();

    let (selected, others): (Vec<Block>, Vec<Block>) = body
        .blocks
        .into_iter()
        .partition(|b| b.block_type == settings.block_type);
    let remaining = Body {
        attributes: body.attributes,
        blocks: others,
    };

    for block in selected {
        match decode_definition(&block, settings) {
            Ok(def) => table.compile_definition(def, settings, &mut diags),
            Err(block_diags) => {
                warn!(
                    block_type = %block.block_type,
                    range = %block.def_range,
                    errors = block_diags.len(),
                    "skipping invalid jq function block"
                );
                diags.extend(block_diags);
            }
        }
    }

    (table, remaining, diags)
}

/// Read one function block into a definition, without compiling it.
pub fn decode_definition(block: &Block, settings: &Settings) -> Result<FunctionDefinition, Diagnostics> {
    let block_type = &settings.block_type;
    let name = match block.labels.as_slice() {
        [name] => name.clone(),
        [] => {
            return Err(Diagnostic::error(
                format!("Missing name for {}", block_type),
                format!("All {} blocks must have 1 labels (name).", block_type),
                Some(block.def_range.clone()),
            )
            .into())
        }
        _ => {
            return Err(Diagnostic::error(
                format!("Extraneous label for {}", block_type),
                format!("Only 1 labels (name) are expected for {} blocks.", block_type),
                Some(block.def_range.clone()),
            )
            .into())
        }
    };

    check_body_schema(block)?;

    let params = match block.body.attribute(PARAMS) {
        Some(attr) => parse_params(&attr.expr)?,
        None => Vec::new(),
    };

    let query = match block.body.attribute(QUERY) {
        Some(attr) => match attr.expr.static_value()? {
            HostValue::String(query) => query,
            _ => {
                return Err(Diagnostic::error(
                    "Invalid query type",
                    "Query must be a string literal",
                    Some(attr.expr.range().clone()),
                )
                .into())
            }
        },
        None => String::new(),
    };

    if query.is_empty() {
        return Err(Diagnostic::error(
            "Missing query",
            format!("{} blocks must specify a 'query' attribute", block_type),
            Some(block.def_range.clone()),
        )
        .into());
    }

    Ok(FunctionDefinition::new(
        name,
        params,
        query,
        block.def_range.clone(),
    ))
}

/// The body may hold only `params` and `query`, each at most once, and `query` is required.
fn check_body_schema(block: &Block) -> Result<(), Diagnostics> {
    let mut diags = Diagnostics::new();

    for (i, attr) in block.body.attributes.iter().enumerate() {
        if attr.name != PARAMS && attr.name != QUERY {
            diags.push(Diagnostic::error(
                "Unsupported argument",
                format!("An argument named \"{}\" is not expected here.", attr.name),
                Some(attr.range.clone()),
            ));
        } else if let Some(first) = block.body.attributes[..i].iter().find(|a| a.name == attr.name) {
            diags.push(Diagnostic::error(
                "Duplicate argument",
                format!(
                    "The argument \"{}\" was already set at {}.",
                    attr.name, first.range
                ),
                Some(attr.range.clone()),
            ));
        }
    }

    for nested in &block.body.blocks {
        diags.push(Diagnostic::error(
            "Unsupported block type",
            format!("Blocks of type \"{}\" are not expected here.", nested.block_type),
            Some(nested.def_range.clone()),
        ));
    }

    if block.body.attribute(QUERY).is_none() {
        diags.push(Diagnostic::error(
            "Missing required argument",
            format!("The argument \"{}\" is required, but no definition was found.", QUERY),
            Some(block.def_range.clone()),
        ));
    }

    if diags.has_errors() {
        Err(diags)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Attribute, Expression, SourceRange};

    fn r() -> SourceRange {
        SourceRange::default()
    }

    fn block(labels: &[&str], attrs: Vec<Attribute>) -> Block {
        let body = attrs.into_iter().fold(Body::new(), Body::with_attribute);
        Block::new(
            "jqfunction",
            labels.iter().map(|l| l.to_string()).collect(),
            body,
            r(),
        )
    }

    fn query(text: &str) -> Attribute {
        Attribute::new("query", Expression::literal(text, r()), r())
    }

    fn summaries(diags: &Diagnostics) -> Vec<&str> {
        diags.iter().map(|d| d.summary.as_str()).collect()
    }

    #[test]
    fn test_decode_definition() {
        let params = Attribute::new(
            "params",
            Expression::tuple(vec![Expression::ident("field", r())], r()),
            r(),
        );
        let def = decode_definition(&block(&["get"], vec![params, query(".[$field]")]), &Settings::default()).unwrap();
        assert_eq!(def.name, "get");
        assert_eq!(def.params, vec!["field"]);
        assert_eq!(def.query, ".[$field]");
    }

    #[test]
    fn test_label_count() {
        let settings = Settings::default();
        let diags = decode_definition(&block(&[], vec![query(".")]), &settings).unwrap_err();
        assert_eq!(summaries(&diags), vec!["Missing name for jqfunction"]);
        let diags = decode_definition(&block(&["a", "b"], vec![query(".")]), &settings).unwrap_err();
        assert_eq!(summaries(&diags), vec!["Extraneous label for jqfunction"]);
    }

    #[test]
    fn test_body_schema() {
        let settings = Settings::default();
        let extra = Attribute::new("other", Expression::literal(1i64, r()), r());
        let diags = decode_definition(&block(&["f"], vec![extra]), &settings).unwrap_err();
        assert_eq!(
            summaries(&diags),
            vec!["Unsupported argument", "Missing required argument"]
        );

        let diags = decode_definition(&block(&["f"], vec![query("."), query(".a")]), &settings).unwrap_err();
        assert_eq!(summaries(&diags), vec!["Duplicate argument"]);
    }

    #[test]
    fn test_query_value() {
        let settings = Settings::default();
        let number = Attribute::new("query", Expression::literal(5i64, r()), r());
        let diags = decode_definition(&block(&["f"], vec![number]), &settings).unwrap_err();
        assert_eq!(summaries(&diags), vec!["Invalid query type"]);

        let diags = decode_definition(&block(&["f"], vec![query("")]), &settings).unwrap_err();
        assert_eq!(summaries(&diags), vec!["Missing query"]);

        let variable = Attribute::new("query", Expression::ident("q", r()), r());
        let diags = decode_definition(&block(&["f"], vec![variable]), &settings).unwrap_err();
        assert_eq!(summaries(&diags), vec!["Variables not allowed"]);
    }

    #[test]
    fn test_remaining_body() {
        let other = Block::new("resource", vec!["x".into()], Body::new(), r());
        let attr = Attribute::new("name", Expression::literal("app", r()), r());
        let body = Body::new()
            .with_attribute(attr.clone())
            .with_block(block(&["f"], vec![query(".a")]))
            .with_block(other.clone());

        let (table, remaining, diags) = decode_functions(body, &Settings::default());
        assert!(diags.is_empty());
        assert!(table.contains("f"));
        assert_eq!(remaining.attributes, vec![attr]);
        assert_eq!(remaining.blocks, vec![other]);
    }
}
