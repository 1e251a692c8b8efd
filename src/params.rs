//! Validation of parameter declarations.
//!
//! A parameter declaration is a tuple of bare identifiers, as in `params = [a, b, c]`.

use crate::host::{Diagnostic, Diagnostics, Expression};

/// Read the parameter names from a `params` expression.
///
/// Every element that is not a bare identifier produces its own diagnostic, so a single
/// call reports all bad elements at once. Anything other than a tuple fails with one
/// diagnostic covering the whole expression.
pub fn parse_params(expr: &Expression) -> Result<Vec<String>, Diagnostics> {
    let Expression::Tuple { items, .. } = expr else {
        return Err(Diagnostic::error(
            "Invalid params syntax",
            "params must be a list of bare identifiers, e.g., params = [a, b, c]",
            Some(expr.range().clone()),
        )
        .into());
    };

    let mut params = Vec::with_capacity(items.len());
    let mut diags = Diagnostics::new();
    for item in items {
        match item.as_bare_identifier() {
            Some(name) => params.push(name.to_string()),
            None => diags.push(Diagnostic::error(
                "Invalid parameter",
                "Parameters must be bare identifiers (e.g., [a, b, c])",
                Some(item.range().clone()),
            )),
        }
    }

    if diags.has_errors() {
        Err(diags)
    } else {
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{SourcePos, SourceRange, TraversalStep};

    fn at(col: usize) -> SourceRange {
        SourceRange::new("main.hcl", SourcePos::new(1, col, col - 1), SourcePos::new(1, col + 1, col))
    }

    #[test]
    fn test_bare_identifiers() {
        let expr = Expression::tuple(
            vec![Expression::ident("a", at(2)), Expression::ident("b", at(5))],
            at(1),
        );
        assert_eq!(parse_params(&expr).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_list() {
        let expr = Expression::tuple(vec![], at(1));
        assert_eq!(parse_params(&expr).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_duplicates_are_kept() {
        let expr = Expression::tuple(
            vec![Expression::ident("a", at(2)), Expression::ident("a", at(5))],
            at(1),
        );
        assert_eq!(parse_params(&expr).unwrap(), vec!["a", "a"]);
    }

    #[test]
    fn test_reports_every_bad_element() {
        let dotted = Expression::ScopeTraversal {
            root: "a".into(),
            steps: vec![TraversalStep::Attr("b".into())],
            range: at(2),
        };
        let expr = Expression::tuple(
            vec![
                dotted,
                Expression::ident("ok", at(6)),
                Expression::literal("c", at(10)),
            ],
            at(1),
        );
        let diags = parse_params(&expr).unwrap_err();
        let subjects: Vec<_> = diags.iter().map(|d| d.subject.clone().unwrap()).collect();
        assert_eq!(subjects, vec![at(2), at(10)]);
        assert!(diags.iter().all(|d| d.summary == "Invalid parameter"));
    }

    #[test]
    fn test_not_a_list() {
        let expr = Expression::ident("a", at(3));
        let diags = parse_params(&expr).unwrap_err();
        assert_eq!(diags.len(), 1);
        let diag = diags.iter().next().unwrap();
        assert_eq!(diag.summary, "Invalid params syntax");
        assert_eq!(diag.subject, Some(at(3)));
    }
}
