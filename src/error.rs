//! The structured error returned by jq functions.

use thiserror::Error;

use crate::bridge::ConversionError;
use crate::host::{Diagnostic, SourceRange};
use crate::jq::{CompileError, EvalError, ParseError};

/// An error from compiling or calling a jq function.
///
/// Always carries the function name, the query source, and the definition's source
/// range. The underlying [`Cause`] is available through [`JqFunctionError::cause`] and
/// through [`std::error::Error::source`].
#[derive(Debug, Error)]
#[error("jq function {function_name} at {range}: {cause}")]
pub struct JqFunctionError {
    pub function_name: String,
    pub query: String,
    pub range: SourceRange,
    #[source]
    pub cause: Cause,
}

/// What went wrong inside a jq function.
#[derive(Debug, Error)]
pub enum Cause {
    /// The query text is not valid jq.
    #[error("failed to parse jq query: {0}")]
    Parse(#[source] ParseError),

    /// The query parsed but does not compile against the declared parameters.
    #[error("failed to compile jq query: {0}")]
    Compile(#[source] CompileError),

    /// A text subject is not valid JSON.
    #[error("invalid JSON input: {0}")]
    InvalidJsonInput(#[source] serde_json::Error),

    /// A typed subject cannot be converted to a jq value.
    #[error("failed to convert input: {0}")]
    ConvertInput(#[source] ConversionError),

    /// A parameter value cannot be converted to a jq value.
    #[error("failed to convert parameter {name}: {source}")]
    ConvertParam {
        name: String,
        #[source]
        source: ConversionError,
    },

    /// The query raised an error while running.
    #[error("jq execution error: {0}")]
    Execution(#[source] EvalError),

    /// The result of a text-subject call cannot be encoded as JSON.
    #[error("failed to marshal result: {0}")]
    EncodeResult(#[source] serde_json::Error),

    /// The result of a typed-subject call cannot be converted to a host value.
    #[error("failed to convert result: {0}")]
    ConvertResult(#[source] ConversionError),

    /// The call supplied the wrong number of arguments.
    #[error("expected {expected} arguments, got {got}")]
    ArgumentCount { expected: usize, got: usize },
}

impl JqFunctionError {
    pub fn new(
        function_name: impl Into<String>,
        query: impl Into<String>,
        range: SourceRange,
        cause: Cause,
    ) -> Self {
        JqFunctionError {
            function_name: function_name.into(),
            query: query.into(),
            range,
            cause,
        }
    }

    pub fn cause(&self) -> &Cause {
        &self.cause
    }

    /// True for errors raised while compiling the definition, as opposed to calling it.
    pub fn is_compile_error(&self) -> bool {
        matches!(self.cause, Cause::Parse(_) | Cause::Compile(_))
    }

    /// Render this error as a configuration diagnostic at the definition's range.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let subject = Some(self.range.clone());
        match &self.cause {
            Cause::Parse(err) => Diagnostic::error(
                "Invalid jq query",
                format!("Failed to parse jq query: {}", err),
                subject,
            ),
            Cause::Compile(err) => Diagnostic::error(
                "Failed to compile jq query",
                format!("Failed to compile jq query with variables: {}", err),
                subject,
            ),
            other => Diagnostic::error(
                "Error in jq function",
                format!("jq function {}: {}", self.function_name, other),
                subject,
            ),
        }
    }
}
