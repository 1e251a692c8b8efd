//! Compilation of parsed jq expressions.
//!
//! Compiling resolves every function call against the builtin table and checks that
//! every `$name` reference is bound, either by a declared variable or by an enclosing
//! `as` / `reduce` binding. The result is an immutable [`Code`] that can be run any
//! number of times, from any number of threads.

use thiserror::Error;

use super::eval::{Evaluator, Outputs};
use super::expr::{Builtin, Expr, ObjectEntry, ObjectKey, TypeFilter};
use super::value::JqValue;

/// Error that occurs while compiling a parsed query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A `$name` reference with no binding in scope.
    #[error("variable not defined: ${0}")]
    UndefinedVariable(String),

    /// A call to a function that does not exist with the given arity.
    #[error("function not defined: {name}/{arity}")]
    UndefinedFunction { name: String, arity: usize },

    /// A declared variable name that is not of the form `$name`.
    #[error("invalid variable name: {0:?}")]
    InvalidVariableName(String),
}

/// A compiled query, ready to run.
#[derive(Debug, Clone)]
pub struct Code {
    expr: Expr,
    variables: Vec<String>,
}

impl Code {
    /// The declared variable names, without the `$` sigil, in declaration order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// The resolved expression.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Run the query against `input`, binding `values` to the declared variables
    /// positionally.
    ///
    /// When a name is declared more than once, the later declaration wins.
    pub fn run(&self, input: JqValue, values: Vec<JqValue>) -> Outputs {
        if values.len() != self.variables.len() {
            return Outputs::failed(super::eval::EvalError::new(format!(
                "expected {} variable values, got {}",
                self.variables.len(),
                values.len()
            )));
        }

        let bindings = self.variables.iter().cloned().zip(values).collect();
        Evaluator::new(bindings).run(&self.expr, &input)
    }
}

/// Compile a parsed expression with the given variable names.
///
/// Variable names carry their `$` sigil, as in `["$x", "$y"]`.
///
/// # Examples
///
/// ```
/// use jqfunc::jq::{compile, parse, JqValue};
///
/// let code = compile(&parse("$x + $y").unwrap(), &["$x", "$y"]).unwrap();
/// let outputs: Vec<_> = code
///     .run(JqValue::Null, vec![JqValue::Int(5), JqValue::Int(3)])
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(outputs, vec![JqValue::Int(8)]);
/// ```
pub fn compile<S: AsRef<str>>(expr: &Expr, variables: &[S]) -> Result<Code, CompileError> {
    let mut names = Vec::with_capacity(variables.len());
    for var in variables {
        let var = var.as_ref();
        match var.strip_prefix('$') {
            Some(name) if is_identifier(name) => names.push(name.to_string()),
            _ => return Err(CompileError::InvalidVariableName(var.to_string())),
        }
    }

    let mut resolver = Resolver {
        scope: names.clone(),
    };
    let expr = resolver.resolve(expr)?;

    Ok(Code {
        expr,
        variables: names,
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

struct Resolver {
    scope: Vec<String>,
}

impl Resolver {
    fn boxed(&mut self, expr: &Expr) -> Result<Box<Expr>, CompileError> {
        Ok(Box::new(self.resolve(expr)?))
    }

    fn all(&mut self, exprs: &[Expr]) -> Result<Vec<Expr>, CompileError> {
        exprs.iter().map(|e| self.resolve(e)).collect()
    }

    fn with_binding<T>(
        &mut self,
        var: &str,
        f: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        self.scope.push(var.to_string());
        let result = f(self);
        self.scope.pop();
        result
    }

    fn resolve(&mut self, expr: &Expr) -> Result<Expr, CompileError> {
        Ok(match expr {
            Expr::Identity
            | Expr::RecursiveDescent
            | Expr::Field(_)
            | Expr::Iterate
            | Expr::Literal(_) => expr.clone(),

            Expr::Index { target, index } => Expr::Index {
                target: self.boxed(target)?,
                index: self.boxed(index)?,
            },
            Expr::Slice { target, start, end } => Expr::Slice {
                target: self.boxed(target)?,
                start: start.as_deref().map(|e| self.boxed(e)).transpose()?,
                end: end.as_deref().map(|e| self.boxed(e)).transpose()?,
            },
            Expr::Optional(e) => Expr::Optional(self.boxed(e)?),
            Expr::Pipe(exprs) => Expr::Pipe(self.all(exprs)?),
            Expr::Comma(exprs) => Expr::Comma(self.all(exprs)?),
            Expr::Array(inner) => {
                Expr::Array(inner.as_deref().map(|e| self.boxed(e)).transpose()?)
            }
            Expr::Object(entries) => Expr::Object(
                entries
                    .iter()
                    .map(|entry| {
                        let key = match &entry.key {
                            ObjectKey::Literal(s) => ObjectKey::Literal(s.clone()),
                            ObjectKey::Expr(e) => ObjectKey::Expr(self.boxed(e)?),
                        };
                        Ok(ObjectEntry {
                            key,
                            value: self.resolve(&entry.value)?,
                        })
                    })
                    .collect::<Result<_, CompileError>>()?,
            ),
            Expr::Arithmetic { op, left, right } => Expr::Arithmetic {
                op: *op,
                left: self.boxed(left)?,
                right: self.boxed(right)?,
            },
            Expr::Neg(e) => Expr::Neg(self.boxed(e)?),
            Expr::Compare { op, left, right } => Expr::Compare {
                op: *op,
                left: self.boxed(left)?,
                right: self.boxed(right)?,
            },
            Expr::And(l, r) => Expr::And(self.boxed(l)?, self.boxed(r)?),
            Expr::Or(l, r) => Expr::Or(self.boxed(l)?, self.boxed(r)?),
            Expr::Alternative(l, r) => Expr::Alternative(self.boxed(l)?, self.boxed(r)?),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => Expr::If {
                cond: self.boxed(cond)?,
                then_branch: self.boxed(then_branch)?,
                else_branch: self.boxed(else_branch)?,
            },
            Expr::Try { expr, catch } => Expr::Try {
                expr: self.boxed(expr)?,
                catch: catch.as_deref().map(|e| self.boxed(e)).transpose()?,
            },
            Expr::Var(name) => {
                if !self.scope.iter().any(|v| v == name) {
                    return Err(CompileError::UndefinedVariable(name.clone()));
                }
                expr.clone()
            }
            Expr::As { source, var, body } => {
                let source = self.boxed(source)?;
                let body = self.with_binding(var, |r| r.boxed(body))?;
                Expr::As {
                    source,
                    var: var.clone(),
                    body,
                }
            }
            Expr::Reduce {
                source,
                var,
                init,
                update,
            } => {
                let source = self.boxed(source)?;
                let init = self.boxed(init)?;
                let update = self.with_binding(var, |r| r.boxed(update))?;
                Expr::Reduce {
                    source,
                    var: var.clone(),
                    init,
                    update,
                }
            }
            Expr::Assign { path, value } => Expr::Assign {
                path: self.boxed(path)?,
                value: self.boxed(value)?,
            },
            Expr::Update { path, f } => Expr::Update {
                path: self.boxed(path)?,
                f: self.boxed(f)?,
            },
            Expr::Call { name, args } => Expr::Builtin(self.resolve_call(name, args)?),
            Expr::Builtin(_) => expr.clone(),
        })
    }

    /// Look up a builtin by name and arity.
    fn resolve_call(&mut self, name: &str, args: &[Expr]) -> Result<Builtin, CompileError> {
        let arity = args.len();
        let mut args = self.all(args)?.into_iter().map(Box::new);
        let mut arg = || args.next().unwrap_or_else(|| Box::new(Expr::Identity));

        let builtin = match (name, arity) {
            ("empty", 0) => Builtin::Empty,
            ("not", 0) => Builtin::Not,
            ("length", 0) => Builtin::Length,
            ("utf8bytelength", 0) => Builtin::Utf8ByteLength,
            ("keys", 0) => Builtin::Keys,
            ("keys_unsorted", 0) => Builtin::KeysUnsorted,
            ("add", 0) => Builtin::Add,
            ("any", 0) => Builtin::Any,
            ("all", 0) => Builtin::All,
            ("min", 0) => Builtin::Min,
            ("max", 0) => Builtin::Max,
            ("type", 0) => Builtin::Type,
            ("tostring", 0) => Builtin::ToString,
            ("tonumber", 0) => Builtin::ToNumber,
            ("tojson", 0) => Builtin::ToJson,
            ("fromjson", 0) => Builtin::FromJson,
            ("ascii_downcase", 0) => Builtin::AsciiDowncase,
            ("ascii_upcase", 0) => Builtin::AsciiUpcase,
            ("sort", 0) => Builtin::Sort,
            ("reverse", 0) => Builtin::Reverse,
            ("unique", 0) => Builtin::Unique,
            ("to_entries", 0) => Builtin::ToEntries,
            ("from_entries", 0) => Builtin::FromEntries,
            ("floor", 0) => Builtin::Floor,
            ("first", 0) => Builtin::First(None),
            ("last", 0) => Builtin::Last(None),
            ("error", 0) => Builtin::Error(None),
            ("arrays", 0) => Builtin::Filter(TypeFilter::Arrays),
            ("objects", 0) => Builtin::Filter(TypeFilter::Objects),
            ("iterables", 0) => Builtin::Filter(TypeFilter::Iterables),
            ("booleans", 0) => Builtin::Filter(TypeFilter::Booleans),
            ("numbers", 0) => Builtin::Filter(TypeFilter::Numbers),
            ("strings", 0) => Builtin::Filter(TypeFilter::Strings),
            ("nulls", 0) => Builtin::Filter(TypeFilter::Nulls),
            ("values", 0) => Builtin::Filter(TypeFilter::Values),
            ("scalars", 0) => Builtin::Filter(TypeFilter::Scalars),

            ("has", 1) => Builtin::Has(arg()),
            ("in", 1) => Builtin::In(arg()),
            ("select", 1) => Builtin::Select(arg()),
            ("map", 1) => Builtin::Map(arg()),
            ("map_values", 1) => Builtin::MapValues(arg()),
            ("min_by", 1) => Builtin::MinBy(arg()),
            ("max_by", 1) => Builtin::MaxBy(arg()),
            ("sort_by", 1) => Builtin::SortBy(arg()),
            ("startswith", 1) => Builtin::StartsWith(arg()),
            ("endswith", 1) => Builtin::EndsWith(arg()),
            ("ltrimstr", 1) => Builtin::LtrimStr(arg()),
            ("rtrimstr", 1) => Builtin::RtrimStr(arg()),
            ("split", 1) => Builtin::Split(arg()),
            ("join", 1) => Builtin::Join(arg()),
            ("contains", 1) => Builtin::Contains(arg()),
            ("with_entries", 1) => Builtin::WithEntries(arg()),
            ("first", 1) => Builtin::First(Some(arg())),
            ("last", 1) => Builtin::Last(Some(arg())),
            ("error", 1) => Builtin::Error(Some(arg())),
            ("range", 1) => Builtin::Range {
                from: None,
                upto: arg(),
            },

            ("range", 2) => {
                let from = arg();
                Builtin::Range {
                    from: Some(from),
                    upto: arg(),
                }
            }
            ("limit", 2) => {
                let n = arg();
                Builtin::Limit { n, f: arg() }
            }

            (_, arity) => {
                return Err(CompileError::UndefinedFunction {
                    name: name.to_string(),
                    arity,
                })
            }
        };

        Ok(builtin)
    }
}
