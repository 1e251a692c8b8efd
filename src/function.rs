//! Function definitions, their compiled form, and the callables built from them.

use std::sync::Arc;

use tracing::trace;

use crate::bridge::{decode_text, to_native};
use crate::error::{Cause, JqFunctionError};
use crate::exec::execute;
use crate::host::{HostType, HostValue, SourceRange};
use crate::jq::{self, Code};
use crate::shape::{shape, SubjectKind};

/// A function definition as read from configuration, before compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub params: Vec<String>,
    pub query: String,
    pub range: SourceRange,
}

impl FunctionDefinition {
    pub fn new(
        name: impl Into<String>,
        params: Vec<String>,
        query: impl Into<String>,
        range: SourceRange,
    ) -> Self {
        FunctionDefinition {
            name: name.into(),
            params,
            query: query.into(),
            range,
        }
    }

    /// Parse and compile the query once, binding each parameter as `$name`.
    ///
    /// Duplicate parameter names are allowed; at call time the later one shadows the
    /// earlier one.
    pub fn compile(self) -> Result<CompiledFunction, JqFunctionError> {
        let fail = |def: &FunctionDefinition, cause| {
            JqFunctionError::new(&def.name, &def.query, def.range.clone(), cause)
        };

        let expr = match jq::parse(&self.query) {
            Ok(expr) => expr,
            Err(err) => return Err(fail(&self, Cause::Parse(err))),
        };

        let variables: Vec<String> = self.params.iter().map(|p| format!("${}", p)).collect();
        let code = match jq::compile(&expr, &variables) {
            Ok(code) => code,
            Err(err) => return Err(fail(&self, Cause::Compile(err))),
        };

        Ok(CompiledFunction {
            definition: self,
            code,
        })
    }
}

/// A definition paired with its compiled query. Immutable, and safe to share across
/// threads.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    definition: FunctionDefinition,
    code: Code,
}

impl CompiledFunction {
    pub fn definition(&self) -> &FunctionDefinition {
        &self.definition
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn params(&self) -> &[String] {
        &self.definition.params
    }

    fn error(&self, cause: Cause) -> JqFunctionError {
        JqFunctionError::new(
            &self.definition.name,
            &self.definition.query,
            self.definition.range.clone(),
            cause,
        )
    }

    /// Run the function on a subject and one value per declared parameter.
    ///
    /// A string subject is decoded as JSON text and the result is shaped as text; any
    /// other subject is converted as a typed value and the result is shaped as a typed
    /// value.
    pub fn invoke(&self, subject: &HostValue, params: &[HostValue]) -> Result<HostValue, JqFunctionError> {
        if params.len() != self.definition.params.len() {
            return Err(self.error(Cause::ArgumentCount {
                expected: self.definition.params.len() + 1,
                got: params.len() + 1,
            }));
        }

        let (input, kind) = match subject {
            HostValue::String(text) => (
                decode_text(text).map_err(|e| self.error(Cause::InvalidJsonInput(e)))?,
                SubjectKind::Text,
            ),
            other => (
                to_native(other).map_err(|e| self.error(Cause::ConvertInput(e)))?,
                SubjectKind::Typed,
            ),
        };

        let values = self
            .definition
            .params
            .iter()
            .zip(params)
            .map(|(name, value)| {
                to_native(value).map_err(|source| {
                    self.error(Cause::ConvertParam {
                        name: name.clone(),
                        source,
                    })
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        trace!(function = %self.definition.name, ?kind, "calling jq function");
        let results = execute(&self.code, input, values).map_err(|e| self.error(Cause::Execution(e)))?;
        shape(results, kind).map_err(|cause| self.error(cause))
    }
}

/// A positional parameter of a [`Function`].
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: HostType,
}

/// A host-callable function backed by a compiled jq query.
///
/// The signature is the subject followed by the declared parameters, all of dynamic type.
/// Cloning is cheap; clones share the compiled query.
#[derive(Debug, Clone)]
pub struct Function {
    params: Vec<Parameter>,
    return_type: HostType,
    inner: Arc<CompiledFunction>,
}

impl Function {
    /// Wrap a compiled function, naming its subject parameter `subject_param`.
    pub fn new(compiled: CompiledFunction, subject_param: &str) -> Self {
        let params = std::iter::once(subject_param)
            .chain(compiled.params().iter().map(String::as_str))
            .map(|name| Parameter {
                name: name.to_string(),
                ty: HostType::Dynamic,
            })
            .collect();

        Function {
            params,
            return_type: HostType::Dynamic,
            inner: Arc::new(compiled),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn return_type(&self) -> &HostType {
        &self.return_type
    }

    /// Number of positional arguments: the subject plus each declared parameter.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn compiled(&self) -> &CompiledFunction {
        &self.inner
    }

    /// Call the function with positional arguments, subject first.
    pub fn call(&self, args: &[HostValue]) -> Result<HostValue, JqFunctionError> {
        match args.split_first() {
            Some((subject, params)) if args.len() == self.arity() => {
                self.inner.invoke(subject, params)
            }
            _ => Err(self.inner.error(Cause::ArgumentCount {
                expected: self.arity(),
                got: args.len(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jq::CompileError;

    fn define(params: &[&str], query: &str) -> FunctionDefinition {
        FunctionDefinition::new(
            "f",
            params.iter().map(|p| p.to_string()).collect(),
            query,
            SourceRange::default(),
        )
    }

    #[test]
    fn test_compile_and_call() {
        let f = Function::new(define(&["x", "y"], "$x + $y").compile().unwrap(), "input");
        assert_eq!(f.arity(), 3);
        assert_eq!(
            f.params().iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["input", "x", "y"]
        );
        assert_eq!(
            f.call(&[HostValue::null(), HostValue::number(5), HostValue::number(3)]).unwrap(),
            HostValue::number(8)
        );
    }

    #[test]
    fn test_compile_errors() {
        let err = define(&[], "$y | invalid_func(").compile().unwrap_err();
        assert!(matches!(err.cause(), Cause::Parse(_)));

        let err = define(&["z"], "$z + $unknown").compile().unwrap_err();
        match err.cause() {
            Cause::Compile(CompileError::UndefinedVariable(name)) => assert_eq!(name, "unknown"),
            other => panic!("unexpected cause: {:?}", other),
        }
    }

    #[test]
    fn test_argument_count() {
        let f = Function::new(define(&["a"], "$a").compile().unwrap(), "input");
        let err = f.call(&[HostValue::null()]).unwrap_err();
        assert!(matches!(
            err.cause(),
            Cause::ArgumentCount { expected: 2, got: 1 }
        ));
        let err = f.call(&[]).unwrap_err();
        assert!(matches!(
            err.cause(),
            Cause::ArgumentCount { expected: 2, got: 0 }
        ));
    }

    #[test]
    fn test_conversion_errors_name_their_role() {
        let f = Function::new(define(&["a"], "$a").compile().unwrap(), "input");
        let unknown = HostValue::Unknown(HostType::Dynamic);

        let err = f.call(&[unknown.clone(), HostValue::null()]).unwrap_err();
        assert!(matches!(err.cause(), Cause::ConvertInput(_)));

        let err = f.call(&[HostValue::null(), unknown]).unwrap_err();
        assert_eq!(err.cause().to_string(), "failed to convert parameter a: value is not yet known");
    }

    #[test]
    fn test_shared_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Function>();
        assert_send_sync::<CompiledFunction>();
    }
}
