//! Parsed host expressions.
//!
//! Only the shapes needed to read function definitions are modelled: literals, string
//! templates, tuple and object constructors, variable traversals, and function calls.

use std::collections::BTreeMap;

use super::diagnostics::{Diagnostic, Diagnostics};
use super::range::SourceRange;
use super::value::HostValue;

/// One step of a traversal after its root name: `.attr` or `[index]`.
#[derive(Debug, Clone, PartialEq)]
pub enum TraversalStep {
    Attr(String),
    Index(HostValue),
}

/// A piece of a string template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    Interpolation(Expression),
}

/// A parsed host expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A literal value: `"text"`, `42`, `true`, `null`.
    Literal { value: HostValue, range: SourceRange },

    /// A string template: `"hello ${name}"`.
    Template {
        parts: Vec<TemplatePart>,
        range: SourceRange,
    },

    /// A tuple constructor: `[a, b, c]`.
    Tuple {
        items: Vec<Expression>,
        range: SourceRange,
    },

    /// An object constructor: `{ key = value }`.
    Object {
        items: Vec<(Expression, Expression)>,
        range: SourceRange,
    },

    /// A variable reference: `name`, `name.attr`, `name[0]`.
    ScopeTraversal {
        root: String,
        steps: Vec<TraversalStep>,
        range: SourceRange,
    },

    /// A function call: `upper(name)`.
    FunctionCall {
        name: String,
        args: Vec<Expression>,
        range: SourceRange,
    },
}

impl Expression {
    pub fn literal(value: impl Into<HostValue>, range: SourceRange) -> Self {
        Expression::Literal {
            value: value.into(),
            range,
        }
    }

    pub fn tuple(items: Vec<Expression>, range: SourceRange) -> Self {
        Expression::Tuple { items, range }
    }

    /// A bare identifier: a traversal with a root and no further steps.
    pub fn ident(name: impl Into<String>, range: SourceRange) -> Self {
        Expression::ScopeTraversal {
            root: name.into(),
            steps: Vec::new(),
            range,
        }
    }

    /// The source range this expression covers.
    pub fn range(&self) -> &SourceRange {
        match self {
            Expression::Literal { range, .. }
            | Expression::Template { range, .. }
            | Expression::Tuple { range, .. }
            | Expression::Object { range, .. }
            | Expression::ScopeTraversal { range, .. }
            | Expression::FunctionCall { range, .. } => range,
        }
    }

    /// If this is a bare identifier, its name.
    pub fn as_bare_identifier(&self) -> Option<&str> {
        match self {
            Expression::ScopeTraversal { root, steps, .. } if steps.is_empty() => Some(root),
            _ => None,
        }
    }

    /// Evaluate the expression without any variables or functions in scope.
    pub fn static_value(&self) -> Result<HostValue, Diagnostics> {
        match self {
            Expression::Literal { value, .. } => Ok(value.clone()),

            Expression::Template { parts, .. } => {
                let mut text = String::new();
                let mut diags = Diagnostics::new();
                for part in parts {
                    match part {
                        TemplatePart::Literal(s) => text.push_str(s),
                        TemplatePart::Interpolation(expr) => match expr.static_value() {
                            Ok(value) => match template_text(&value) {
                                Some(s) => text.push_str(&s),
                                None => diags.push(Diagnostic::error(
                                    "Invalid template interpolation value",
                                    format!(
                                        "Cannot include a {} value in a string template.",
                                        value.ty()
                                    ),
                                    Some(expr.range().clone()),
                                )),
                            },
                            Err(d) => diags.extend(d),
                        },
                    }
                }
                if diags.has_errors() {
                    Err(diags)
                } else {
                    Ok(HostValue::String(text))
                }
            }

            Expression::Tuple { items, .. } => {
                let mut values = Vec::with_capacity(items.len());
                let mut diags = Diagnostics::new();
                for item in items {
                    match item.static_value() {
                        Ok(v) => values.push(v),
                        Err(d) => diags.extend(d),
                    }
                }
                if diags.has_errors() {
                    Err(diags)
                } else {
                    Ok(HostValue::Tuple(values))
                }
            }

            Expression::Object { items, .. } => {
                let mut map = BTreeMap::new();
                let mut diags = Diagnostics::new();
                for (key, value) in items {
                    // A bare word in key position names the attribute.
                    let key_text = match key.as_bare_identifier() {
                        Some(name) => Some(name.to_string()),
                        None => match key.static_value() {
                            Ok(HostValue::String(s)) => Some(s),
                            Ok(other) => {
                                diags.push(Diagnostic::error(
                                    "Incorrect key type",
                                    format!("Can't use this value as a key: {} found.", other.ty()),
                                    Some(key.range().clone()),
                                ));
                                None
                            }
                            Err(d) => {
                                diags.extend(d);
                                None
                            }
                        },
                    };
                    match (key_text, value.static_value()) {
                        (Some(k), Ok(v)) => {
                            map.insert(k, v);
                        }
                        (_, Err(d)) => diags.extend(d),
                        (None, Ok(_)) => {}
                    }
                }
                if diags.has_errors() {
                    Err(diags)
                } else {
                    Ok(HostValue::Object(map))
                }
            }

            Expression::ScopeTraversal { range, .. } => Err(Diagnostic::error(
                "Variables not allowed",
                "Variables may not be used here.",
                Some(range.clone()),
            )
            .into()),

            Expression::FunctionCall { range, .. } => Err(Diagnostic::error(
                "Function calls not allowed",
                "Functions may not be called here.",
                Some(range.clone()),
            )
            .into()),
        }
    }
}

fn template_text(value: &HostValue) -> Option<String> {
    match value {
        HostValue::String(s) => Some(s.clone()),
        HostValue::Number(n) => Some(n.to_string()),
        HostValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r() -> SourceRange {
        SourceRange::default()
    }

    #[test]
    fn test_static_literal_and_template() {
        assert_eq!(
            Expression::literal(".name", r()).static_value().unwrap(),
            HostValue::string(".name")
        );

        let template = Expression::Template {
            parts: vec![
                TemplatePart::Literal(".items[".into()),
                TemplatePart::Interpolation(Expression::literal(2i64, r())),
                TemplatePart::Literal("]".into()),
            ],
            range: r(),
        };
        assert_eq!(template.static_value().unwrap(), HostValue::string(".items[2]"));
    }

    #[test]
    fn test_static_rejects_variables_and_calls() {
        let diags = Expression::ident("x", r()).static_value().unwrap_err();
        assert_eq!(diags.iter().next().unwrap().summary, "Variables not allowed");

        let call = Expression::FunctionCall {
            name: "upper".into(),
            args: vec![],
            range: r(),
        };
        let diags = call.static_value().unwrap_err();
        assert_eq!(diags.iter().next().unwrap().summary, "Function calls not allowed");
    }

    #[test]
    fn test_static_object_with_bare_keys() {
        let object = Expression::Object {
            items: vec![(Expression::ident("a", r()), Expression::literal(true, r()))],
            range: r(),
        };
        let HostValue::Object(map) = object.static_value().unwrap() else {
            panic!("expected object");
        };
        assert_eq!(map["a"], HostValue::Bool(true));
    }

    #[test]
    fn test_bare_identifier() {
        assert_eq!(Expression::ident("a", r()).as_bare_identifier(), Some("a"));
        let dotted = Expression::ScopeTraversal {
            root: "a".into(),
            steps: vec![TraversalStep::Attr("b".into())],
            range: r(),
        };
        assert_eq!(dotted.as_bare_identifier(), None);
    }
}
